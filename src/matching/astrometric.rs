//! Coordinate-equality matching of astrometrically calibrated catalogs.
//!
//! Calibrated catalogs echo reference-catalog coordinates, so the same star
//! carries bit-identical RA/Dec in every frame where it was identified. Every
//! row of frame 0 starts as a candidate; each later frame keeps the
//! candidates it contains and drops the rest from all frames.
//!
//! Sky coordinates only establish identity. The positions used for solving
//! come from each frame's pixel sidecar, selected by the surviving IDs.

use std::collections::HashMap;

use tracing::{debug, info};

use super::MatchTable;
use crate::catalogs::Catalog;
use crate::{Error, Result};

/// Build the match table for sky catalogs (RA, Dec in degrees), frame 0 first.
///
/// With `tolerance_deg = None` a candidate matches only a row with exactly
/// the same RA and Dec bits. With `Some(tol)` it matches the nearest row
/// within `tol` degrees of angular separation.
pub fn match_sky_catalogs(catalogs: &[Catalog], tolerance_deg: Option<f64>) -> Result<MatchTable> {
    if catalogs.len() < 2 {
        return Err(Error::TooFewFrames {
            frames: catalogs.len(),
        });
    }
    let reference = &catalogs[0];
    if reference.is_empty() {
        return Err(Error::EmptyCatalog { frame: 0 });
    }

    let mut table = MatchTable::new();
    let mut survivors: Vec<usize> = (0..reference.len()).collect();

    for (frame_index, frame) in catalogs.iter().enumerate().skip(1) {
        let lookup = FrameLookup::new(frame, tolerance_deg);
        let mut kept = Vec::with_capacity(survivors.len());
        let mut frame_ids = Vec::with_capacity(survivors.len());
        let mut claimed: HashMap<usize, u64> = HashMap::new();

        for &row in &survivors {
            let (ra, dec) = reference.coords(row);
            let Some(frame_row) = lookup.find(ra, dec) else {
                continue;
            };
            let ref_id = reference.ids()[row];
            if let Some(other) = claimed.insert(frame_row, ref_id) {
                return Err(Error::BadMatch {
                    frame: frame_index,
                    reason: format!(
                        "row id {} matched by reference ids {} and {}",
                        frame.ids()[frame_row],
                        other,
                        ref_id
                    ),
                });
            }
            kept.push(row);
            frame_ids.push(frame.ids()[frame_row]);
        }

        if kept.is_empty() {
            return Err(Error::EmptyCatalog { frame: frame_index });
        }

        let kept_ids: Vec<u64> = kept.iter().map(|&row| reference.ids()[row]).collect();
        table.extend(&kept_ids, frame_ids)?;
        info!(
            "Frame {}: {} of {} candidates have identical sky coordinates",
            frame_index,
            kept.len(),
            survivors.len()
        );
        survivors = kept;
    }

    Ok(table)
}

/// Pick, for every frame, the pixel rows of the matched objects in table order.
pub fn select_pixel_rows(table: &MatchTable, sidecars: &[Catalog]) -> Result<Vec<Catalog>> {
    if sidecars.len() != table.n_frames() {
        return Err(Error::BadMatch {
            frame: sidecars.len().min(table.n_frames()),
            reason: format!(
                "{} pixel catalogs for {} matched frames",
                sidecars.len(),
                table.n_frames()
            ),
        });
    }
    sidecars
        .iter()
        .enumerate()
        .map(|(frame, sidecar)| {
            let selected = sidecar
                .select(table.frame_ids(frame))
                .map_err(|e| e.in_frame(frame))?;
            debug!("Frame {}: selected {} pixel rows", frame, selected.len());
            Ok(selected)
        })
        .collect()
}

enum FrameLookup<'a> {
    Exact(HashMap<(u64, u64), usize>),
    Tolerance { frame: &'a Catalog, tol_deg: f64 },
}

impl<'a> FrameLookup<'a> {
    fn new(frame: &'a Catalog, tolerance_deg: Option<f64>) -> Self {
        match tolerance_deg {
            None => {
                let mut by_bits = HashMap::with_capacity(frame.len());
                for row in 0..frame.len() {
                    let (ra, dec) = frame.coords(row);
                    by_bits.entry((ra.to_bits(), dec.to_bits())).or_insert(row);
                }
                FrameLookup::Exact(by_bits)
            }
            Some(tol_deg) => FrameLookup::Tolerance { frame, tol_deg },
        }
    }

    fn find(&self, ra: f64, dec: f64) -> Option<usize> {
        match self {
            FrameLookup::Exact(by_bits) => by_bits.get(&(ra.to_bits(), dec.to_bits())).copied(),
            FrameLookup::Tolerance { frame, tol_deg } => (0..frame.len())
                .map(|row| {
                    let (ra2, dec2) = frame.coords(row);
                    (row, small_angle_separation_deg(ra, dec, ra2, dec2))
                })
                .filter(|&(_, sep)| sep <= *tol_deg)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(row, _)| row),
        }
    }
}

/// Flat-sky separation in degrees; adequate for arcsecond-scale tolerances.
fn small_angle_separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let dra = (ra1 - ra2 + 180.0).rem_euclid(360.0) - 180.0;
    let mean_dec = (0.5 * (dec1 + dec2)).to_radians();
    (dra * mean_dec.cos()).hypot(dec1 - dec2)
}
