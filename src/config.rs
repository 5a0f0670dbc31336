//! Run configuration.
//!
//! A single immutable [`RunConfig`] value is built once (by the CLI or by a
//! library caller) and passed by reference into every stage.

use crate::{Error, Result};

/// Cross-matching strategy used to build the match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMethod {
    /// Per-frame pixel catalogs matched pairwise by an external
    /// triangle-matching tool.
    #[default]
    Triangle,
    /// Astrometrically calibrated sky catalogs matched by coordinate equality,
    /// with pixel positions taken from a sidecar catalog.
    Astrometric,
}

impl MatchMethod {
    pub fn name(&self) -> &'static str {
        match self {
            MatchMethod::Triangle => "triangle",
            MatchMethod::Astrometric => "astrometric",
        }
    }
}

/// Layout of the FITS binary tables read in astrometric mode.
#[derive(Debug, Clone)]
pub struct FitsTableConfig {
    /// HDU holding the binary table. Default 1 (first extension).
    pub hdu: usize,
    /// Right ascension column of the sky catalog. Default "RA".
    pub ra_column: String,
    /// Declination column of the sky catalog. Default "DEC".
    pub dec_column: String,
    /// Pixel x column of the sidecar catalog. Default "X".
    pub x_column: String,
    /// Pixel y column of the sidecar catalog. Default "Y".
    pub y_column: String,
    /// Rows read per chunk. None = ask CFITSIO for its optimal row count.
    pub chunk_rows: Option<usize>,
}

impl Default for FitsTableConfig {
    fn default() -> Self {
        Self {
            hdu: 1,
            ra_column: "RA".to_string(),
            dec_column: "DEC".to_string(),
            x_column: "X".to_string(),
            y_column: "Y".to_string(),
            chunk_rows: None,
        }
    }
}

/// How the external triangle-matching program is invoked.
///
/// The program receives two ASCII catalogs laid out as `id x y mag` and is
/// expected to write the matched rows of each side to `<stem>.mtA` and
/// `<stem>.mtB` in the same layout.
#[derive(Debug, Clone)]
pub struct ExternalMatcherConfig {
    pub program: String,
    /// Additional `key=value` arguments appended verbatim (e.g. `trirad=0.002`).
    pub extra_args: Vec<String>,
    pub output_stem: String,
}

impl Default for ExternalMatcherConfig {
    fn default() -> Self {
        Self {
            program: "match".to_string(),
            extra_args: Vec::new(),
            output_stem: "matched".to_string(),
        }
    }
}

/// Parameters for a complete rotation-center run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub method: MatchMethod,
    /// Matching tolerance handed to the triangle matcher, in pixels. Default 5.0.
    pub matchrad: f64,
    /// Number of leading numeric columns read from each ASCII catalog
    /// (id, x, y, then payload such as magnitude). Default 4.
    pub ascii_columns: usize,
    /// Sky-coordinate tolerance in degrees for astrometric matching.
    /// None (the default) requires bit-identical RA/Dec.
    pub sky_tolerance_deg: Option<f64>,
    pub fits: FitsTableConfig,
    pub matcher: ExternalMatcherConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            method: MatchMethod::Triangle,
            matchrad: 5.0,
            ascii_columns: 4,
            sky_tolerance_deg: None,
            fits: FitsTableConfig::default(),
            matcher: ExternalMatcherConfig::default(),
        }
    }
}

impl RunConfig {
    /// Check parameter ranges before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.matchrad.is_nan() || self.matchrad <= 0.0 {
            return Err(Error::Unsupported {
                what: format!("matchrad must be positive, got {}", self.matchrad),
            });
        }
        if self.ascii_columns < 3 {
            return Err(Error::Unsupported {
                what: format!(
                    "ascii catalogs need at least 3 columns (id, x, y), got {}",
                    self.ascii_columns
                ),
            });
        }
        if self.fits.chunk_rows == Some(0) {
            return Err(Error::Unsupported {
                what: "FITS chunk size must be at least one row".to_string(),
            });
        }
        if let Some(tol) = self.sky_tolerance_deg {
            if tol.is_nan() || tol < 0.0 {
                return Err(Error::Unsupported {
                    what: format!("sky tolerance must be non-negative, got {tol}"),
                });
            }
        }
        Ok(())
    }
}
