//! End-to-end run: frame list → catalogs → match table → rotation center.
//!
//! The run moves through `Idle → Reading → Matching → Solving → Done`
//! exactly once; the first error ends it and is logged with the stage it
//! occurred in.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::catalogs::{ascii, Catalog};
use crate::config::{MatchMethod, RunConfig};
use crate::external::ExternalMatcher;
use crate::matching::triangle::{self, PairMatcher};
use crate::matching::{astrometric, MatchTable};
use crate::solver::{self, RotationCenter, MIN_FRAMES};
use crate::{Error, Result};

/// Catalog files for one exposure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInput {
    /// Detection catalog (triangle mode) or sky catalog (astrometric mode).
    pub catalog: PathBuf,
    /// Pixel sidecar of the sky catalog; astrometric mode only.
    pub pixels: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Reading,
    Matching,
    Solving,
    Done,
}

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub center: RotationCenter,
    pub table: MatchTable,
}

/// Read a frame list: one frame per line, `catalog [pixel_sidecar]`.
///
/// Blank lines and `#` comments are skipped. Relative paths are resolved
/// against the directory of the list file.
pub fn read_frame_list<P: AsRef<Path>>(path: P) -> Result<Vec<FrameInput>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidFilename {
            name: String::new(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_frame_list(&text, base, path)
}

/// Parse frame list text; `list_path` is only used for error context.
pub fn parse_frame_list(text: &str, base: &Path, list_path: &Path) -> Result<Vec<FrameInput>> {
    let mut frames = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() > 2 {
            return Err(Error::MalformedRow {
                path: list_path.to_path_buf(),
                line: idx + 1,
                reason: format!("expected 'catalog [pixel_sidecar]', found {} fields", fields.len()),
            });
        }
        frames.push(FrameInput {
            catalog: base.join(fields[0]),
            pixels: fields.get(1).map(|p| base.join(p)),
        });
    }
    Ok(frames)
}

/// Run with the configured method, using [`ExternalMatcher`] in triangle mode.
pub fn estimate(frames: &[FrameInput], config: &RunConfig) -> Result<RunOutcome> {
    match config.method {
        MatchMethod::Triangle => {
            config.validate()?;
            let mut matcher = ExternalMatcher::new(config.matcher.clone())?;
            estimate_triangle(frames, config, &mut matcher)
        }
        MatchMethod::Astrometric => estimate_astrometric(frames, config),
    }
}

/// Triangle-mode run with a caller-supplied matcher.
pub fn estimate_triangle(
    frames: &[FrameInput],
    config: &RunConfig,
    matcher: &mut dyn PairMatcher,
) -> Result<RunOutcome> {
    let mut run = Run::start(frames.len());
    let result = (|| {
        config.validate()?;
        check_frame_count(frames.len())?;

        run.enter(Stage::Reading);
        let catalogs = frames
            .iter()
            .map(|f| ascii::load_catalog(&f.catalog, config.ascii_columns))
            .collect::<Result<Vec<Catalog>>>()?;

        run.enter(Stage::Matching);
        let table = triangle::match_frames(&catalogs, matcher, config.matchrad)?;

        run.enter(Stage::Solving);
        let center = solver::solve_rotation_center(&table, &catalogs)?;
        Ok(RunOutcome { center, table })
    })();
    run.finish(result)
}

/// Astrometric-mode run from sky catalogs and their pixel sidecars on disk.
#[cfg(feature = "fits")]
pub fn estimate_astrometric(frames: &[FrameInput], config: &RunConfig) -> Result<RunOutcome> {
    use crate::catalogs::fits;

    let mut run = Run::start(frames.len());
    let result = (|| {
        config.validate()?;
        check_frame_count(frames.len())?;

        run.enter(Stage::Reading);
        let mut sky = Vec::with_capacity(frames.len());
        let mut pixels = Vec::with_capacity(frames.len());
        for frame in frames {
            let sidecar = frame.pixels.as_ref().ok_or_else(|| Error::InvalidFilename {
                name: format!("{} (missing pixel sidecar)", frame.catalog.display()),
            })?;
            sky.push(fits::load_sky_catalog(&frame.catalog, &config.fits)?);
            pixels.push(fits::load_pixel_catalog(sidecar, &config.fits)?);
        }

        run.enter(Stage::Matching);
        let table = astrometric::match_sky_catalogs(&sky, config.sky_tolerance_deg)?;
        let selected = astrometric::select_pixel_rows(&table, &pixels)?;

        run.enter(Stage::Solving);
        let center = solver::solve_rotation_center(&table, &selected)?;
        Ok(RunOutcome { center, table })
    })();
    run.finish(result)
}

#[cfg(not(feature = "fits"))]
pub fn estimate_astrometric(_frames: &[FrameInput], _config: &RunConfig) -> Result<RunOutcome> {
    Err(Error::Unsupported {
        what: "astrometric matching needs FITS support (build with --features fits)".to_string(),
    })
}

/// Astrometric-mode run from catalogs already in memory.
pub fn estimate_astrometric_catalogs(
    sky: &[Catalog],
    pixels: &[Catalog],
    config: &RunConfig,
) -> Result<RunOutcome> {
    let mut run = Run::start(sky.len());
    let result = (|| {
        config.validate()?;
        check_frame_count(sky.len())?;

        run.enter(Stage::Matching);
        let table = astrometric::match_sky_catalogs(sky, config.sky_tolerance_deg)?;
        let selected = astrometric::select_pixel_rows(&table, pixels)?;

        run.enter(Stage::Solving);
        let center = solver::solve_rotation_center(&table, &selected)?;
        Ok(RunOutcome { center, table })
    })();
    run.finish(result)
}

fn check_frame_count(frames: usize) -> Result<()> {
    if frames < MIN_FRAMES {
        return Err(Error::TooFewFrames { frames });
    }
    Ok(())
}

struct Run {
    stage: Stage,
}

impl Run {
    fn start(n_frames: usize) -> Self {
        info!("Starting rotation-center run over {} frames", n_frames);
        Self { stage: Stage::Idle }
    }

    fn enter(&mut self, stage: Stage) {
        info!("{:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    fn finish(mut self, result: Result<RunOutcome>) -> Result<RunOutcome> {
        match &result {
            Ok(outcome) => {
                self.enter(Stage::Done);
                info!(
                    "Center ({:.1}, {:.1}) from {} objects",
                    outcome.center.x(),
                    outcome.center.y(),
                    outcome.table.n_objects()
                );
            }
            Err(e) => {
                error!("Run failed during {:?}: {}", self.stage, e);
            }
        }
        result
    }
}
