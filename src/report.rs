//! Text artifact for a solved run: a commented header followed by one data
//! line `x0 y0` with one decimal place.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::MatchMethod;
use crate::solver::RotationCenter;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub timestamp: DateTime<Utc>,
    /// Identifies the input, usually the frame list path.
    pub source: String,
    pub method: MatchMethod,
    pub n_frames: usize,
    pub n_objects: usize,
}

impl ReportHeader {
    /// Header stamped with the current time.
    pub fn now(source: impl Into<String>, method: MatchMethod, n_frames: usize, n_objects: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            method,
            n_frames,
            n_objects,
        }
    }
}

pub fn format_report(center: &RotationCenter, header: &ReportHeader) -> String {
    format!(
        "# rotation center\n\
         # date: {}\n\
         # source: {}\n\
         # method: {}\n\
         # frames: {}\n\
         # objects: {}\n\
         {:.1} {:.1}\n",
        header.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        header.source,
        header.method.name(),
        header.n_frames,
        header.n_objects,
        center.x(),
        center.y()
    )
}

pub fn write_report<P: AsRef<Path>>(path: P, center: &RotationCenter, header: &ReportHeader) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, format_report(center, header)).map_err(|e| Error::from_io(path, e))
}
