//! # rotcenter
//!
//! Estimates the **center of rotation of an image series** from the pixel
//! positions of the same objects across three or more exposures.
//!
//! Each exposure is reduced to a catalog of detected objects. Objects are
//! cross-matched so that every surviving object has one row per frame, and
//! the rotation center is the point equidistant from each object's positions
//! in every pair of frames, solved in the least-squares sense.
//!
//! ## Features
//!
//! - **Two matching strategies** — pairwise pattern matching through an external
//!   matcher tool, or exact cross-identification of sky-coordinate catalogs
//! - **Robust alignment** — ID-keyed reordering that keeps every column of the
//!   match table in lockstep
//! - **QR least squares** — rank-checked solve with a residual norm reported
//! - **FITS tables** — chunked reads of binary tables behind the `fits` feature
//!
//! ## Example
//!
//! ```no_run
//! use rotcenter::{pipeline, RunConfig};
//!
//! let frames = pipeline::read_frame_list("frames.lst").unwrap();
//! let outcome = pipeline::estimate(&frames, &RunConfig::default()).unwrap();
//! println!("center: {:.1} {:.1}", outcome.center.x(), outcome.center.y());
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Reading** — load one catalog per frame (ASCII columns or FITS tables)
//! 2. **Matching** — extend a match table frame by frame; objects lost in any
//!    frame are dropped from all frames
//! 3. **Solving** — for every object and every frame pair `(i, j)`, the center
//!    `c` satisfies `2 (p_j - p_i) · c = |p_j|² - |p_i|²`
//!

pub mod align;
pub mod catalogs;
pub mod config;
pub mod error;
pub mod external;
pub mod matching;
pub mod pipeline;
pub mod report;
pub mod solver;

pub use catalogs::{Catalog, CoordKind};
pub use config::{ExternalMatcherConfig, FitsTableConfig, MatchMethod, RunConfig};
pub use error::{Error, ErrorKind, Result};
pub use external::ExternalMatcher;
pub use matching::triangle::{PairMatch, PairMatcher};
pub use matching::MatchTable;
pub use pipeline::{FrameInput, RunOutcome};
pub use solver::RotationCenter;
