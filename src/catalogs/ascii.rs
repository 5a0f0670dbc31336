//! Whitespace-delimited ASCII catalogs.
//!
//! One row per line; the first `n_items` whitespace-separated fields of each
//! row are parsed as `f64`, any trailing fields are ignored. Blank lines and
//! lines starting with `#` are skipped. A row with fewer than `n_items`
//! numeric fields aborts the read with [`Error::MalformedRow`]; no partial
//! catalog is returned. A file with no data rows yields empty columns.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::{Catalog, CoordKind};
use crate::{Error, Result};

const COMMENT_MARKER: char = '#';

/// Read `n_items` columns from an ASCII catalog file.
pub fn read_columns<P: AsRef<Path>>(path: P, n_items: usize) -> Result<Vec<Vec<f64>>> {
    read_rows(path.as_ref(), n_items).map(|(columns, _)| columns)
}

/// Parse `n_items` columns from any buffered reader. `path` is only used
/// for error context.
pub fn parse_columns<R: BufRead>(reader: R, n_items: usize, path: &Path) -> Result<Vec<Vec<f64>>> {
    parse_rows(reader, n_items, path).map(|(columns, _)| columns)
}

/// Read a pixel catalog (id, x, y, payload...) from an ASCII file.
///
/// Invalid or duplicated IDs are reported as [`Error::MalformedRow`] at the
/// offending line.
pub fn load_catalog<P: AsRef<Path>>(path: P, n_items: usize) -> Result<Catalog> {
    let path = path.as_ref();
    let (columns, line_numbers) = read_rows(path, n_items)?;
    Catalog::from_columns(columns, CoordKind::Pixel)
        .map_err(|e| e.at_source(path, |row| line_numbers[row]))
}

fn read_rows(path: &Path, n_items: usize) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidFilename {
            name: String::new(),
        });
    }
    let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
    let (columns, line_numbers) = parse_rows(BufReader::new(file), n_items, path)?;
    debug!(
        "Read {} rows x {} columns from {}",
        line_numbers.len(),
        n_items,
        path.display()
    );
    Ok((columns, line_numbers))
}

/// Columns plus the 1-based line number of every data row.
fn parse_rows<R: BufRead>(
    reader: R,
    n_items: usize,
    path: &Path,
) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); n_items];
    let mut line_numbers = Vec::new();
    let mut rows_with_extra = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => Error::MalformedRow {
                path: path.to_path_buf(),
                line: line_no,
                reason: "line is not valid UTF-8".to_string(),
            },
            _ => Error::from_io(path, e),
        })?;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        for (col, column) in columns.iter_mut().enumerate() {
            let field = fields.next().ok_or_else(|| Error::MalformedRow {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("expected {n_items} fields, found {col}"),
            })?;
            let value: f64 = field.parse().map_err(|_| Error::MalformedRow {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("field {} ('{}') is not a number", col + 1, field),
            })?;
            column.push(value);
        }
        if fields.next().is_some() {
            rows_with_extra += 1;
        }
        line_numbers.push(line_no);
    }

    if rows_with_extra > 0 {
        warn!(
            "{}: ignored trailing fields beyond column {} on {} rows",
            path.display(),
            n_items,
            rows_with_extra
        );
    }
    Ok((columns, line_numbers))
}

/// Write a catalog in the same layout [`read_columns`] accepts.
///
/// Values use Rust's shortest round-trip formatting so a re-read yields
/// bit-identical coordinates.
pub fn write_catalog<P: AsRef<Path>>(path: P, catalog: &Catalog) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::from_io(path, e))?;
    let mut out = BufWriter::new(file);
    let columns = catalog.to_columns();

    let write_all = |out: &mut BufWriter<File>| -> std::io::Result<()> {
        for row in 0..catalog.len() {
            write!(out, "{}", catalog.ids()[row])?;
            for column in &columns[1..] {
                write!(out, " {}", column[row])?;
            }
            writeln!(out)?;
        }
        out.flush()
    };
    write_all(&mut out).map_err(|e| Error::from_io(path, e))
}
