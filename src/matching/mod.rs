//! Cross-matching of per-frame catalogs into a [`MatchTable`].
//!
//! Two strategies build the same table:
//!
//! - [`triangle`] — pairwise matching delegated to an external
//!   triangle-matching tool, chained through the surviving reference set
//! - [`astrometric`] — exact (or optionally toleranced) RA/Dec equality
//!   between astrometrically calibrated catalogs
//!
//! Both grow the table one frame at a time through [`MatchTable::extend`],
//! which realigns earlier frames to the surviving objects so that the
//! object count never increases.

pub mod astrometric;
pub mod triangle;

use tracing::debug;

use crate::align;
use crate::{Error, Result};

/// `n_frames x n_objects` table of catalog IDs.
///
/// `id(f, c)` is the ID, in frame `f`'s catalog, of matched object `c`.
/// Column 0 holds reference-frame IDs and is the key used for realignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchTable {
    frames: Vec<Vec<u64>>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of objects matched in every frame so far.
    pub fn n_objects(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.n_objects() == 0
    }

    /// IDs of every matched object in frame `frame`.
    pub fn frame_ids(&self, frame: usize) -> &[u64] {
        &self.frames[frame]
    }

    pub fn id(&self, frame: usize, object: usize) -> u64 {
        self.frames[frame][object]
    }

    /// Add the result of matching frame `self.n_frames()` against the
    /// reference.
    ///
    /// `reference_ids[i]` (a reference-frame ID) and `frame_ids[i]` (an ID in
    /// the new frame) label the same object. On the first call both columns
    /// seed the table. Afterwards every existing column is realigned to
    /// `reference_ids`, which drops objects the new frame failed to match.
    pub fn extend(&mut self, reference_ids: &[u64], frame_ids: Vec<u64>) -> Result<()> {
        let frame = self.n_frames().max(1);
        if reference_ids.len() != frame_ids.len() {
            return Err(Error::BadMatch {
                frame,
                reason: format!(
                    "{} reference ids but {} frame ids",
                    reference_ids.len(),
                    frame_ids.len()
                ),
            });
        }
        if reference_ids.is_empty() {
            return Err(Error::EmptyCatalog { frame });
        }

        if self.frames.is_empty() {
            self.frames.push(reference_ids.to_vec());
            self.frames.push(frame_ids);
            return Ok(());
        }

        if reference_ids.len() > self.n_objects() {
            return Err(Error::BadMatch {
                frame,
                reason: format!(
                    "{} matches for only {} surviving objects",
                    reference_ids.len(),
                    self.n_objects()
                ),
            });
        }

        let before = self.n_objects();
        align::align_table(&mut self.frames, 0, reference_ids).map_err(|e| e.in_frame(frame))?;
        self.frames.push(frame_ids);
        debug!(
            "Frame {}: {} of {} objects survive",
            frame,
            self.n_objects(),
            before
        );
        Ok(())
    }
}
