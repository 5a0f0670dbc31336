//! Rotation-center least-squares solver.
//!
//! A source at fixed distance from the rotation center `(x0, y0)` satisfies,
//! for any two frames `i` and `j`,
//!
//! ```text
//! (x_i - x0)² + (y_i - y0)² = (x_j - x0)² + (y_j - y0)²
//! ```
//!
//! which is linear in the unknowns:
//!
//! ```text
//! 2(x_j - x_i)·x0 + 2(y_j - y_i)·y0 = (x_j² + y_j²) - (x_i² + y_i²)
//! ```
//!
//! Every matched object contributes one equation per frame pair, giving
//! `M · C(N, 2)` rows. The overdetermined system is solved through a
//! Householder QR decomposition rather than the normal equations.

use nalgebra::{DMatrix, DVector, Point2};
use tracing::{debug, info};

use crate::catalogs::Catalog;
use crate::error::try_zeroed;
use crate::matching::MatchTable;
use crate::{Error, Result};

/// Minimum number of frames for a rotation-center solve.
pub const MIN_FRAMES: usize = 3;

/// Solved rotation center and fit quality.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationCenter {
    center: Point2<f64>,
    residual: f64,
    n_equations: usize,
}

impl RotationCenter {
    pub fn x(&self) -> f64 {
        self.center.x
    }

    pub fn y(&self) -> f64 {
        self.center.y
    }

    pub fn center(&self) -> Point2<f64> {
        self.center
    }

    /// `sqrt(Σ r_k²) / (N_eq - 1)` over the equation residuals.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    pub fn n_equations(&self) -> usize {
        self.n_equations
    }
}

/// Pixel positions of matched objects: `tracks[c][f]` is object `c` in frame `f`.
pub type Tracks = Vec<Vec<Point2<f64>>>;

/// Gather the pixel position of every table entry from per-frame catalogs.
///
/// `pixel_catalogs[f]` must contain every ID in `table.frame_ids(f)`.
pub fn gather_tracks(table: &MatchTable, pixel_catalogs: &[Catalog]) -> Result<Tracks> {
    if pixel_catalogs.len() != table.n_frames() {
        return Err(Error::BadMatch {
            frame: pixel_catalogs.len().min(table.n_frames()),
            reason: format!(
                "{} pixel catalogs for {} matched frames",
                pixel_catalogs.len(),
                table.n_frames()
            ),
        });
    }

    (0..table.n_objects())
        .map(|object| {
            pixel_catalogs
                .iter()
                .enumerate()
                .map(|(frame, catalog)| {
                    catalog
                        .position_of(table.id(frame, object))
                        .map_err(|e| e.in_frame(frame))
                })
                .collect()
        })
        .collect()
}

/// Solve for the rotation center of a match table.
pub fn solve_rotation_center(
    table: &MatchTable,
    pixel_catalogs: &[Catalog],
) -> Result<RotationCenter> {
    if table.n_objects() == 0 {
        return Err(Error::EmptyCatalog {
            frame: table.n_frames().saturating_sub(1),
        });
    }
    let tracks = gather_tracks(table, pixel_catalogs)?;
    solve_tracks(&tracks)
}

/// Solve for the rotation center from per-object position tracks.
///
/// Every track must have the same number of frames (at least [`MIN_FRAMES`]).
pub fn solve_tracks(tracks: &[Vec<Point2<f64>>]) -> Result<RotationCenter> {
    if tracks.is_empty() {
        return Err(Error::EmptyCatalog { frame: 0 });
    }
    let n_frames = tracks[0].len();
    if n_frames < MIN_FRAMES {
        return Err(Error::TooFewFrames { frames: n_frames });
    }
    if let Some(bad) = tracks.iter().position(|t| t.len() != n_frames) {
        return Err(Error::BadMatch {
            frame: tracks[bad].len().min(n_frames),
            reason: format!(
                "object {} has {} positions, expected {}",
                bad,
                tracks[bad].len(),
                n_frames
            ),
        });
    }

    let (a, b) = build_system(tracks)?;
    let n_equations = a.nrows();
    let solution = solve_least_squares(a.clone(), b.clone())?;

    let residuals = &b - &a * &solution;
    let residual = residuals.norm() / (n_equations as f64 - 1.0);

    let result = RotationCenter {
        center: Point2::new(solution[0], solution[1]),
        residual,
        n_equations,
    };
    info!(
        "Rotation center ({:.3}, {:.3}) from {} objects x {} frames ({} equations), residual {:.3e}",
        result.x(),
        result.y(),
        tracks.len(),
        n_frames,
        n_equations,
        residual
    );
    Ok(result)
}

/// Number of equations for `n_objects` objects seen in `n_frames` frames.
pub fn equation_count(n_objects: usize, n_frames: usize) -> usize {
    n_objects * n_frames * n_frames.saturating_sub(1) / 2
}

/// Build the `N_eq x 2` design matrix and right-hand side.
pub fn build_system(tracks: &[Vec<Point2<f64>>]) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let n_frames = tracks.first().map_or(0, Vec::len);
    let n_equations = equation_count(tracks.len(), n_frames);

    let mut a = DMatrix::from_vec(n_equations, 2, try_zeroed("design matrix", n_equations * 2)?);
    let mut b = DVector::from_vec(try_zeroed("right-hand side", n_equations)?);

    let mut row = 0;
    for track in tracks {
        for i in 0..n_frames {
            for j in (i + 1)..n_frames {
                let p = track[i];
                let q = track[j];
                a[(row, 0)] = 2.0 * (q.x - p.x);
                a[(row, 1)] = 2.0 * (q.y - p.y);
                b[row] = (q.x * q.x + q.y * q.y) - (p.x * p.x + p.y * p.y);
                row += 1;
            }
        }
    }
    debug_assert_eq!(row, n_equations);
    debug!("Built {} x 2 rotation-center system", n_equations);

    Ok((a, b))
}

/// Least-squares solution of `a · x ≈ b` via QR.
///
/// Fails with [`Error::SingularSystem`] when `a` is (numerically) rank deficient.
pub fn solve_least_squares(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>> {
    let n_equations = a.nrows();
    let n_unknowns = a.ncols();
    if n_equations < n_unknowns {
        return Err(Error::SingularSystem { n_equations });
    }

    let qr = a.qr();
    let r = qr.r();

    let max_diag = r.diagonal().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let tol = f64::EPSILON * n_equations as f64 * max_diag;
    if max_diag == 0.0 || r.diagonal().iter().any(|v| !v.is_finite() || v.abs() <= tol) {
        return Err(Error::SingularSystem { n_equations });
    }

    let mut qtb = b;
    qr.q_tr_mul(&mut qtb);
    let rhs = qtb.rows(0, n_unknowns).into_owned();

    r.solve_upper_triangular(&rhs)
        .ok_or(Error::SingularSystem { n_equations })
}
