//! Source catalogs.
//!
//! A [`Catalog`] is column oriented: one ID column plus two coordinate
//! columns and any number of payload columns (magnitude, flux, ...). Row
//! order carries no meaning; rows are labelled by their IDs, which are
//! positive and unique within one catalog.
//!
//! Readers:
//! - [`ascii`] — whitespace-delimited text tables (detection-tool output)
//! - `fits` — two-column binary tables (calibration-tool output), behind
//!   the `fits` cargo feature

pub mod ascii;
#[cfg(feature = "fits")]
pub mod fits;

use std::collections::HashSet;

use nalgebra::Point2;

use crate::align;
use crate::{Error, Result};

/// What the two coordinate columns hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordKind {
    /// Pixel `(x, y)`.
    Pixel,
    /// Celestial `(ra, dec)` in degrees.
    Sky,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    kind: CoordKind,
    ids: Vec<u64>,
    c1: Vec<f64>,
    c2: Vec<f64>,
    extra: Vec<Vec<f64>>,
}

impl Catalog {
    /// Build a catalog from reader output: column 0 is the ID, columns 1 and 2
    /// the coordinates, anything after that is payload.
    ///
    /// IDs must be finite positive integers and unique.
    pub fn from_columns(mut columns: Vec<Vec<f64>>, kind: CoordKind) -> Result<Self> {
        let n_columns = columns.len();
        let extra = columns.split_off(n_columns.min(3));
        let [raw_ids, c1, c2]: [Vec<f64>; 3] =
            columns.try_into().map_err(|_| Error::Unsupported {
                what: format!("a catalog needs id and two coordinate columns, got {n_columns}"),
            })?;

        let ids = raw_ids
            .iter()
            .enumerate()
            .map(|(row, &value)| id_from_f64(row, value))
            .collect::<Result<Vec<u64>>>()?;

        Self::new(kind, ids, c1, c2, extra)
    }

    /// Build a catalog whose IDs are the 1-based row numbers.
    pub fn with_sequential_ids(kind: CoordKind, c1: Vec<f64>, c2: Vec<f64>) -> Result<Self> {
        let ids = (1..=c1.len() as u64).collect();
        Self::new(kind, ids, c1, c2, Vec::new())
    }

    /// Build a catalog from already-typed columns.
    ///
    /// All columns must have the same length and IDs must be unique and non-zero.
    pub fn new(
        kind: CoordKind,
        ids: Vec<u64>,
        c1: Vec<f64>,
        c2: Vec<f64>,
        extra: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let n = ids.len();
        if c1.len() != n || c2.len() != n || extra.iter().any(|col| col.len() != n) {
            return Err(Error::Unsupported {
                what: "catalog columns have different lengths".to_string(),
            });
        }
        let mut seen = HashSet::with_capacity(n);
        for (row, &id) in ids.iter().enumerate() {
            if id == 0 {
                return Err(Error::InvalidId { row, value: 0.0 });
            }
            if !seen.insert(id) {
                return Err(Error::DuplicateId { row, id });
            }
        }
        Ok(Self {
            kind,
            ids,
            c1,
            c2,
            extra,
        })
    }

    pub fn kind(&self) -> CoordKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// First coordinate column (x or RA).
    pub fn c1(&self) -> &[f64] {
        &self.c1
    }

    /// Second coordinate column (y or Dec).
    pub fn c2(&self) -> &[f64] {
        &self.c2
    }

    /// Payload columns after the coordinates.
    pub fn extra(&self) -> &[Vec<f64>] {
        &self.extra
    }

    /// Coordinates of the row at `row`.
    pub fn coords(&self, row: usize) -> (f64, f64) {
        (self.c1[row], self.c2[row])
    }

    /// Row index holding `id`.
    ///
    /// IDs written by detection and calibration tools are 1-based row numbers,
    /// so row `id - 1` is checked first before falling back to a scan.
    pub fn row_of(&self, id: u64) -> Option<usize> {
        let guess = (id as usize).wrapping_sub(1);
        if self.ids.get(guess) == Some(&id) {
            return Some(guess);
        }
        self.ids.iter().position(|&v| v == id)
    }

    /// Coordinates of the object labelled `id`.
    pub fn position_of(&self, id: u64) -> Result<Point2<f64>> {
        let row = self.row_of(id).ok_or(Error::IdNotFound { id, frame: None })?;
        let (a, b) = self.coords(row);
        Ok(Point2::new(a, b))
    }

    /// Reorder and truncate all columns so that row `i` is `new_id[i]`.
    pub fn align(&mut self, new_id: &[u64]) -> Result<()> {
        let order = align::alignment_order(&self.ids, new_id)?;
        align::apply_order(&mut self.ids, &order);
        align::apply_order(&mut self.c1, &order);
        align::apply_order(&mut self.c2, &order);
        for column in &mut self.extra {
            align::apply_order(column, &order);
        }
        Ok(())
    }

    /// Copy of this catalog restricted to `ids`, in that order.
    pub fn select(&self, ids: &[u64]) -> Result<Self> {
        let mut out = self.clone();
        out.align(ids)?;
        Ok(out)
    }

    /// Back to reader layout: id, c1, c2, extra...
    pub fn to_columns(&self) -> Vec<Vec<f64>> {
        let mut columns = Vec::with_capacity(3 + self.extra.len());
        columns.push(self.ids.iter().map(|&id| id as f64).collect());
        columns.push(self.c1.clone());
        columns.push(self.c2.clone());
        columns.extend(self.extra.iter().cloned());
        columns
    }
}

fn id_from_f64(row: usize, value: f64) -> Result<u64> {
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Ok(value as u64)
    } else {
        Err(Error::InvalidId { row, value })
    }
}
