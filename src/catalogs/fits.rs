//! FITS binary-table catalogs.
//!
//! Calibration tools write their catalogs as a binary table with two
//! double-precision coordinate columns. Rows carry no ID column; the reader
//! synthesizes 1-based sequential IDs so that row `k` has ID `k + 1`.
//!
//! Tables are read in row chunks rather than whole columns. By default the
//! chunk length is CFITSIO's optimal row count for the file's buffers.

use std::ops::Range;
use std::os::raw::{c_int, c_long};
use std::path::Path;

use fitsio::hdu::HduInfo;
use fitsio::FitsFile;
use tracing::debug;

use super::{Catalog, CoordKind};
use crate::config::FitsTableConfig;
use crate::error::try_with_capacity;
use crate::{Error, Result};

/// Read columns `names[0]` and `names[1]` from the configured table HDU.
///
/// Returns three equal-length sequences: synthesized ID (1..=rows), then
/// the two requested columns.
pub fn read_table_columns<P: AsRef<Path>>(
    path: P,
    config: &FitsTableConfig,
    names: [&str; 2],
) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidFilename {
            name: String::new(),
        });
    }
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut fptr = FitsFile::open(path).map_err(|e| cfitsio_error(path, e))?;
    let hdu = fptr.hdu(config.hdu).map_err(|e| cfitsio_error(path, e))?;
    let num_rows = match &hdu.info {
        HduInfo::TableInfo { num_rows, .. } => *num_rows,
        _ => {
            return Err(Error::Unsupported {
                what: format!("HDU {} of '{}' is not a table", config.hdu, path.display()),
            })
        }
    };

    let chunk_rows = match config.chunk_rows {
        Some(n) => n.max(1),
        None => optimal_chunk_rows(&mut fptr, path)?,
    };

    let mut ids: Vec<f64> = try_with_capacity("FITS id column", num_rows)?;
    let mut first: Vec<f64> = try_with_capacity("FITS coordinate column", num_rows)?;
    let mut second: Vec<f64> = try_with_capacity("FITS coordinate column", num_rows)?;

    for range in chunk_ranges(num_rows, chunk_rows) {
        let a: Vec<f64> = hdu
            .read_col_range(&mut fptr, names[0], &range)
            .map_err(|e| cfitsio_error(path, e))?;
        let b: Vec<f64> = hdu
            .read_col_range(&mut fptr, names[1], &range)
            .map_err(|e| cfitsio_error(path, e))?;
        ids.extend(range.clone().map(|row| (row + 1) as f64));
        first.extend(a);
        second.extend(b);
    }

    debug!(
        "Read {} rows ({}, {}) from {} in chunks of {}",
        num_rows,
        names[0],
        names[1],
        path.display(),
        chunk_rows
    );
    Ok(vec![ids, first, second])
}

/// Read an astrometric sky catalog (RA, Dec in degrees).
pub fn load_sky_catalog<P: AsRef<Path>>(path: P, config: &FitsTableConfig) -> Result<Catalog> {
    let names = [config.ra_column.as_str(), config.dec_column.as_str()];
    let path = path.as_ref();
    let columns = read_table_columns(path, config, names)?;
    Catalog::from_columns(columns, CoordKind::Sky).map_err(|e| e.at_source(path, |row| row + 1))
}

/// Read the pixel-coordinate sidecar of a sky catalog.
pub fn load_pixel_catalog<P: AsRef<Path>>(path: P, config: &FitsTableConfig) -> Result<Catalog> {
    let names = [config.x_column.as_str(), config.y_column.as_str()];
    let path = path.as_ref();
    let columns = read_table_columns(path, config, names)?;
    Catalog::from_columns(columns, CoordKind::Pixel).map_err(|e| e.at_source(path, |row| row + 1))
}

/// Split `0..num_rows` into consecutive ranges of at most `chunk_rows`.
fn chunk_ranges(num_rows: usize, chunk_rows: usize) -> impl Iterator<Item = Range<usize>> {
    (0..num_rows)
        .step_by(chunk_rows)
        .map(move |start| start..(start + chunk_rows).min(num_rows))
}

fn optimal_chunk_rows(fptr: &mut FitsFile, path: &Path) -> Result<usize> {
    let mut nrows: c_long = 0;
    let mut status: c_int = 0;
    // SAFETY: `fptr` is open and positioned on the table HDU; fits_get_rowsize
    // only inspects its buffer configuration.
    unsafe {
        fitsio::sys::ffgrsz(fptr.as_raw(), &mut nrows, &mut status);
    }
    if status != 0 {
        return Err(Error::Cfitsio {
            path: path.to_path_buf(),
            code: status,
            message: "fits_get_rowsize failed".to_string(),
        });
    }
    Ok((nrows as usize).max(1))
}

fn cfitsio_error(path: &Path, err: fitsio::errors::Error) -> Error {
    match err {
        fitsio::errors::Error::Fits(e) => Error::Cfitsio {
            path: path.to_path_buf(),
            code: e.status,
            message: e.message,
        },
        other => Error::Cfitsio {
            path: path.to_path_buf(),
            code: -1,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use fitsio::tables::{ColumnDataType, ColumnDescription, ConcreteColumnDescription};

    use super::*;
    use crate::ErrorKind;

    fn write_table(path: &Path, names: [&str; 2], a: &[f64], b: &[f64]) {
        let mut fptr = FitsFile::create(path).open().unwrap();
        let columns: Vec<ConcreteColumnDescription> = names
            .iter()
            .map(|name| {
                ColumnDescription::new(*name)
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap()
            })
            .collect();
        let hdu = fptr.create_table("CATALOG", &columns).unwrap();
        hdu.write_col(&mut fptr, names[0], a).unwrap();
        hdu.write_col(&mut fptr, names[1], b).unwrap();
    }

    #[test]
    fn chunk_ranges_cover_every_row_once() {
        let ranges: Vec<_> = chunk_ranges(10, 4).collect();
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
        assert_eq!(chunk_ranges(0, 4).count(), 0);
    }

    #[test]
    fn reads_sky_table_in_small_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.rdls");
        let ra: Vec<f64> = (0..7).map(|i| 150.0 + i as f64 * 0.01).collect();
        let dec: Vec<f64> = (0..7).map(|i| 2.0 - i as f64 * 0.02).collect();
        write_table(&path, ["RA", "DEC"], &ra, &dec);

        let config = FitsTableConfig {
            chunk_rows: Some(3),
            ..Default::default()
        };
        let cat = load_sky_catalog(&path, &config).unwrap();
        assert_eq!(cat.ids(), &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(cat.c1(), ra.as_slice());
        assert_eq!(cat.c2(), dec.as_slice());
    }

    #[test]
    fn optimal_chunking_matches_fixed_chunking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.xyls");
        let x: Vec<f64> = (0..25).map(|i| i as f64 * 3.5).collect();
        let y: Vec<f64> = (0..25).map(|i| 1000.0 - i as f64).collect();
        write_table(&path, ["X", "Y"], &x, &y);

        let optimal = load_pixel_catalog(&path, &FitsTableConfig::default()).unwrap();
        let fixed = load_pixel_catalog(
            &path,
            &FitsTableConfig {
                chunk_rows: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(optimal, fixed);
    }

    #[test]
    fn missing_file_and_column() {
        let err = load_sky_catalog("/nonexistent/field.rdls", &FitsTableConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xy.fits");
        write_table(&path, ["X", "Y"], &[1.0], &[2.0]);
        let err = load_sky_catalog(&path, &FitsTableConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cfitsio);
    }
}
