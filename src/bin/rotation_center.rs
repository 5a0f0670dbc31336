//! Estimate the rotation center of an image series.
//!
//! Usage:
//! ```text
//! rotation_center frames.lst [OPTIONS]
//! ```
//!
//! `frames.lst` names one catalog per line (`catalog [pixel_sidecar]`).
//! The center is printed as `x y` with one decimal. On failure the process
//! exits with the status code of the error kind.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use rotcenter::report::{self, ReportHeader};
use rotcenter::{pipeline, MatchMethod, RunConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    /// Pairwise matching of pixel catalogs through the external matcher
    Triangle,
    /// Exact cross-identification of sky catalogs (FITS tables)
    Astrometric,
}

impl From<Method> for MatchMethod {
    fn from(m: Method) -> Self {
        match m {
            Method::Triangle => MatchMethod::Triangle,
            Method::Astrometric => MatchMethod::Astrometric,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "rotation_center",
    about = "Estimate the center of rotation from object positions in three or more frames",
    long_about = None
)]
struct Args {
    /// Text file listing one frame catalog per line
    file_list: PathBuf,

    /// Cross-matching strategy
    #[arg(long, value_enum, default_value = "triangle")]
    method: Method,

    /// Match radius handed to the external matcher (pixels)
    #[arg(long, default_value_t = 5.0)]
    matchrad: f64,

    /// Numeric columns read from each ASCII catalog row
    #[arg(long, default_value_t = 4)]
    columns: usize,

    /// External matcher executable
    #[arg(long, default_value = "match")]
    match_program: String,

    /// Extra `key=value` argument for the matcher (repeatable)
    #[arg(long = "match-arg")]
    match_args: Vec<String>,

    /// FITS HDU holding the catalog table
    #[arg(long, default_value_t = 1)]
    hdu: usize,

    #[arg(long, default_value = "RA")]
    ra_column: String,

    #[arg(long, default_value = "DEC")]
    dec_column: String,

    #[arg(long, default_value = "X")]
    x_column: String,

    #[arg(long, default_value = "Y")]
    y_column: String,

    /// FITS rows per read; defaults to CFITSIO's optimal row count
    #[arg(long)]
    chunk_rows: Option<usize>,

    /// Accept sky matches within this separation (degrees) instead of exact equality
    #[arg(long)]
    sky_tolerance: Option<f64>,

    /// Also write the result with a provenance header to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> RunConfig {
        let mut config = RunConfig {
            method: self.method.into(),
            matchrad: self.matchrad,
            ascii_columns: self.columns,
            sky_tolerance_deg: self.sky_tolerance,
            ..Default::default()
        };
        config.fits.hdu = self.hdu;
        config.fits.ra_column = self.ra_column.clone();
        config.fits.dec_column = self.dec_column.clone();
        config.fits.x_column = self.x_column.clone();
        config.fits.y_column = self.y_column.clone();
        config.fits.chunk_rows = self.chunk_rows;
        config.matcher.program = self.match_program.clone();
        config.matcher.extra_args = self.match_args.clone();
        config
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = args.to_config();
    let frames = pipeline::read_frame_list(&args.file_list)?;
    let outcome = pipeline::estimate(&frames, &config)?;

    println!("{:.1} {:.1}", outcome.center.x(), outcome.center.y());

    if let Some(path) = &args.output {
        let header = ReportHeader::now(
            args.file_list.display().to_string(),
            config.method,
            outcome.table.n_frames(),
            outcome.table.n_objects(),
        );
        report::write_report(path, &outcome.center, &header)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rotation_center: {err:#}");
            let code = err
                .downcast_ref::<rotcenter::Error>()
                .map(|e| e.status_code())
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
