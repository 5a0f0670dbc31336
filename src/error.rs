//! Error taxonomy for the rotation-center pipeline.
//!
//! Every failure is fatal to a run. Each variant carries enough context
//! (file, line, frame index, id, tool) to diagnose it, and maps onto an
//! [`ErrorKind`] with a distinct process status code.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Machine-checkable category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFilename,
    FileNotFound,
    MalformedRow,
    EmptyCatalog,
    IdNotFound,
    BadAllocation,
    SingularSystem,
    BadMatch,
    ExternalToolUnavailable,
    ExternalToolFailed,
    Cfitsio,
    TooFewFrames,
    Io,
    Unsupported,
}

impl ErrorKind {
    /// Non-zero process exit status reported for this kind.
    pub fn status_code(self) -> i32 {
        match self {
            ErrorKind::FileNotFound => 10,
            ErrorKind::InvalidFilename => 11,
            ErrorKind::MalformedRow => 12,
            ErrorKind::EmptyCatalog => 13,
            ErrorKind::IdNotFound => 14,
            ErrorKind::BadAllocation => 15,
            ErrorKind::SingularSystem => 16,
            ErrorKind::BadMatch => 17,
            ErrorKind::ExternalToolUnavailable => 18,
            ErrorKind::ExternalToolFailed => 19,
            ErrorKind::Cfitsio => 20,
            ErrorKind::TooFewFrames => 21,
            ErrorKind::Io => 22,
            ErrorKind::Unsupported => 23,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid file name '{name}'")]
    InvalidFilename { name: String },

    #[error("file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("malformed row in '{path}' at line {line}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid catalog id {value} in data row {}: ids must be positive integers", .row + 1)]
    InvalidId { row: usize, value: f64 },

    #[error("duplicate catalog id {id} in data row {}", .row + 1)]
    DuplicateId { row: usize, id: u64 },

    #[error("no objects survive matching at frame {frame}")]
    EmptyCatalog { frame: usize },

    #[error("id {id} not found{}", frame_suffix(.frame))]
    IdNotFound { id: u64, frame: Option<usize> },

    #[error("failed to allocate {what} ({elements} elements)")]
    BadAllocation { what: &'static str, elements: usize },

    #[error("rotation-center system is singular ({n_equations} equations): matched objects do not constrain the center")]
    SingularSystem { n_equations: usize },

    #[error("bad match at frame {frame}: {reason}")]
    BadMatch { frame: usize, reason: String },

    #[error("external tool '{tool}' could not be started: {source}")]
    ExternalToolUnavailable {
        tool: String,
        source: std::io::Error,
    },

    #[error("external tool '{tool}' failed ({status}): {stderr}")]
    ExternalToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("CFITSIO error {code} reading '{path}': {message}")]
    Cfitsio {
        path: PathBuf,
        code: i32,
        message: String,
    },

    #[error("at least 3 frames are required, got {frames}")]
    TooFewFrames { frames: usize },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported: {what}")]
    Unsupported { what: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidFilename { .. } => ErrorKind::InvalidFilename,
            Error::FileNotFound { .. } => ErrorKind::FileNotFound,
            Error::MalformedRow { .. } | Error::InvalidId { .. } | Error::DuplicateId { .. } => {
                ErrorKind::MalformedRow
            }
            Error::EmptyCatalog { .. } => ErrorKind::EmptyCatalog,
            Error::IdNotFound { .. } => ErrorKind::IdNotFound,
            Error::BadAllocation { .. } => ErrorKind::BadAllocation,
            Error::SingularSystem { .. } => ErrorKind::SingularSystem,
            Error::BadMatch { .. } => ErrorKind::BadMatch,
            Error::ExternalToolUnavailable { .. } => ErrorKind::ExternalToolUnavailable,
            Error::ExternalToolFailed { .. } => ErrorKind::ExternalToolFailed,
            Error::Cfitsio { .. } => ErrorKind::Cfitsio,
            Error::TooFewFrames { .. } => ErrorKind::TooFewFrames,
            Error::Io { .. } => ErrorKind::Io,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// Shorthand for `self.kind().status_code()`.
    pub fn status_code(&self) -> i32 {
        self.kind().status_code()
    }

    /// Attach the frame index to an [`Error::IdNotFound`] raised while
    /// looking up that frame's catalog.
    pub(crate) fn in_frame(self, frame: usize) -> Self {
        match self {
            Error::IdNotFound { id, frame: None } => Error::IdNotFound {
                id,
                frame: Some(frame),
            },
            other => other,
        }
    }

    /// Turn catalog ID validation errors into [`Error::MalformedRow`] on
    /// `path`; `line_of` maps a 0-based data row to its line (or table row)
    /// number.
    pub(crate) fn at_source(self, path: &Path, line_of: impl Fn(usize) -> usize) -> Self {
        let (row, reason) = match self {
            Error::InvalidId { row, value } => (
                row,
                format!("invalid id {value}: ids must be positive integers"),
            ),
            Error::DuplicateId { row, id } => (row, format!("duplicate id {id}")),
            other => return other,
        };
        Error::MalformedRow {
            path: path.to_path_buf(),
            line: line_of(row),
            reason,
        }
    }

    /// Map an I/O error on `path`, turning `NotFound` into [`Error::FileNotFound`].
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound { path }
        } else {
            Error::Io { path, source }
        }
    }
}

fn frame_suffix(frame: &Option<usize>) -> String {
    match frame {
        Some(f) => format!(" in frame {f}"),
        None => String::new(),
    }
}

/// Empty buffer with room for `elements`, reporting allocation failure
/// instead of aborting.
pub(crate) fn try_with_capacity<T>(what: &'static str, elements: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(elements)
        .map_err(|_| Error::BadAllocation { what, elements })?;
    Ok(buf)
}

/// Zero-filled `f64` buffer of length `elements`.
pub(crate) fn try_zeroed(what: &'static str, elements: usize) -> Result<Vec<f64>> {
    let mut buf = try_with_capacity(what, elements)?;
    buf.resize(elements, 0.0);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const ALL_KINDS: [ErrorKind; 14] = [
        ErrorKind::InvalidFilename,
        ErrorKind::FileNotFound,
        ErrorKind::MalformedRow,
        ErrorKind::EmptyCatalog,
        ErrorKind::IdNotFound,
        ErrorKind::BadAllocation,
        ErrorKind::SingularSystem,
        ErrorKind::BadMatch,
        ErrorKind::ExternalToolUnavailable,
        ErrorKind::ExternalToolFailed,
        ErrorKind::Cfitsio,
        ErrorKind::TooFewFrames,
        ErrorKind::Io,
        ErrorKind::Unsupported,
    ];

    #[test]
    fn status_codes_are_distinct_and_nonzero() {
        let codes: HashSet<i32> = ALL_KINDS.iter().map(|k| k.status_code()).collect();
        assert_eq!(codes.len(), ALL_KINDS.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn not_found_io_maps_to_file_not_found() {
        let err = Error::from_io(
            "missing.cat",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::FileNotFound);

        let err = Error::from_io(
            "locked.cat",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn id_validation_errors_are_malformed_rows() {
        assert_eq!(
            Error::InvalidId { row: 0, value: 1.5 }.kind(),
            ErrorKind::MalformedRow
        );
        assert_eq!(
            Error::DuplicateId { row: 2, id: 3 }.kind(),
            ErrorKind::MalformedRow
        );
    }

    #[test]
    fn id_errors_gain_file_and_line() {
        let lines = [3, 5, 9];
        let err = Error::DuplicateId { row: 2, id: 1 }.at_source(Path::new("frame7.cat"), |r| lines[r]);
        assert!(matches!(err, Error::MalformedRow { line: 9, .. }));
        let msg = err.to_string();
        assert!(msg.contains("frame7.cat"), "{msg}");
        assert!(msg.contains("duplicate id 1"), "{msg}");

        let err = Error::TooFewFrames { frames: 2 }.at_source(Path::new("x"), |r| r);
        assert!(matches!(err, Error::TooFewFrames { frames: 2 }));
    }

    #[test]
    fn id_not_found_names_frame() {
        let err = Error::IdNotFound { id: 4, frame: None }.in_frame(3);
        assert_eq!(err.to_string(), "id 4 not found in frame 3");
        // An already attributed frame is kept.
        let err = err.in_frame(5);
        assert!(matches!(err, Error::IdNotFound { id: 4, frame: Some(3) }));
    }

    #[test]
    fn try_zeroed_allocates_requested_length() {
        let buf = try_zeroed("test buffer", 16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn try_zeroed_reports_impossible_allocation() {
        let err = try_zeroed("huge buffer", usize::MAX / 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadAllocation);
    }
}
