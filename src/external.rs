//! Subprocess implementation of [`PairMatcher`].
//!
//! Runs a triangle-matching program in the style of Michael Richmond's
//! `match`: both catalogs are written as ASCII `id x y mag` files into a
//! private temporary directory, the program is run to completion, and its
//! `<stem>.mtA` / `<stem>.mtB` outputs are read back once it has exited.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, error};

use crate::catalogs::{ascii, Catalog, CoordKind};
use crate::config::ExternalMatcherConfig;
use crate::matching::triangle::{PairMatch, PairMatcher};
use crate::{Error, Result};

/// Columns of the files exchanged with the program: id, x, y, mag.
const EXCHANGE_COLUMNS: usize = 4;

#[derive(Debug)]
pub struct ExternalMatcher {
    config: ExternalMatcherConfig,
    workdir: TempDir,
}

impl ExternalMatcher {
    pub fn new(config: ExternalMatcherConfig) -> Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("rotcenter-match-")
            .tempdir()
            .map_err(|e| Error::from_io(std::env::temp_dir(), e))?;
        Ok(Self { config, workdir })
    }

    /// Directory holding the exchange files for the lifetime of the matcher.
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    fn build_command(
        &self,
        reference: &Path,
        frame: &Path,
        stem: &Path,
        matchrad: f64,
    ) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg(reference)
            .args(["1", "2", "3"])
            .arg(frame)
            .args(["1", "2", "3"])
            .arg("id1=0")
            .arg("id2=0")
            .arg(format!("matchrad={matchrad}"))
            .arg(format!("outfile={}", stem.display()))
            .args(&self.config.extra_args);
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<()> {
        debug!("Command: {:?}", cmd);
        let output = cmd.output().map_err(|source| Error::ExternalToolUnavailable {
            tool: self.config.program.clone(),
            source,
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("{} failed ({}): {}", self.config.program, output.status, stderr);
            return Err(Error::ExternalToolFailed {
                tool: self.config.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

impl PairMatcher for ExternalMatcher {
    fn match_pair(
        &mut self,
        reference: &Catalog,
        frame: &Catalog,
        frame_index: usize,
        matchrad: f64,
    ) -> Result<PairMatch> {
        let round_dir = self.workdir.path().join(format!("frame{frame_index:03}"));
        std::fs::create_dir_all(&round_dir).map_err(|e| Error::from_io(&round_dir, e))?;

        let reference_path = round_dir.join("reference.cat");
        let frame_path = round_dir.join("frame.cat");
        ascii::write_catalog(&reference_path, &exchange_layout(reference)?)?;
        ascii::write_catalog(&frame_path, &exchange_layout(frame)?)?;

        let stem = round_dir.join(&self.config.output_stem);
        let cmd = self.build_command(&reference_path, &frame_path, &stem, matchrad);
        self.run(cmd)?;

        let matched_reference = ascii::load_catalog(suffixed(&stem, "mtA"), EXCHANGE_COLUMNS)?;
        let matched_frame = ascii::load_catalog(suffixed(&stem, "mtB"), EXCHANGE_COLUMNS)?;
        debug!(
            "Frame {}: external matcher paired {} rows",
            frame_index,
            matched_reference.len()
        );

        Ok(PairMatch {
            reference: matched_reference,
            frame: matched_frame,
        })
    }
}

/// Re-shape a catalog to exactly `id x y mag`, using 0 when it has no magnitude.
fn exchange_layout(catalog: &Catalog) -> Result<Catalog> {
    let mag = catalog
        .extra()
        .first()
        .cloned()
        .unwrap_or_else(|| vec![0.0; catalog.len()]);
    Catalog::new(
        CoordKind::Pixel,
        catalog.ids().to_vec(),
        catalog.c1().to_vec(),
        catalog.c2().to_vec(),
        vec![mag],
    )
}

fn suffixed(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use crate::matching::triangle::match_frames;
    use crate::ErrorKind;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Pairs rows line by line, truncated to the shorter catalog.
    const ROWWISE_MATCH: &str = r#"
for arg in "$@"; do
  case "$arg" in outfile=*) stem="${arg#outfile=}" ;; esac
done
n=$(wc -l < "$1")
m=$(wc -l < "$5")
[ "$m" -lt "$n" ] && n=$m
printf '%s\n' "$@" > "$stem.args"
head -n "$n" "$1" > "$stem.mtA"
head -n "$n" "$5" > "$stem.mtB"
"#;

    fn pixel(ids: &[u64]) -> Catalog {
        let x: Vec<f64> = ids.iter().map(|&i| i as f64 * 10.0).collect();
        let y: Vec<f64> = ids.iter().map(|&i| i as f64 * -3.0).collect();
        Catalog::new(CoordKind::Pixel, ids.to_vec(), x, y, Vec::new()).unwrap()
    }

    #[test]
    fn runs_program_and_reads_both_sides() {
        let bin = tempfile::tempdir().unwrap();
        let program = script(bin.path(), "fake-match", ROWWISE_MATCH);
        let mut matcher = ExternalMatcher::new(ExternalMatcherConfig {
            program,
            ..Default::default()
        })
        .unwrap();

        let result = matcher
            .match_pair(&pixel(&[1, 2, 3]), &pixel(&[7, 8]), 1, 2.5)
            .unwrap();
        assert_eq!(result.reference.ids(), &[1, 2]);
        assert_eq!(result.frame.ids(), &[7, 8]);
        assert_eq!(result.frame.c1(), &[70.0, 80.0]);
    }

    #[test]
    fn passes_exchange_columns_and_radius() {
        let bin = tempfile::tempdir().unwrap();
        let program = script(bin.path(), "fake-match", ROWWISE_MATCH);
        let mut matcher = ExternalMatcher::new(ExternalMatcherConfig {
            program,
            extra_args: vec!["trirad=0.002".to_string()],
            ..Default::default()
        })
        .unwrap();
        matcher
            .match_pair(&pixel(&[1, 2]), &pixel(&[3, 4]), 2, 2.5)
            .unwrap();

        let round = matcher.workdir().join("frame002");
        let args = std::fs::read_to_string(round.join("matched.args")).unwrap();
        let args: Vec<&str> = args.lines().collect();
        let reference = round.join("reference.cat");
        let frame = round.join("frame.cat");
        let stem = round.join("matched");
        let outfile = format!("outfile={}", stem.display());
        assert_eq!(
            args,
            vec![
                reference.to_str().unwrap(),
                "1",
                "2",
                "3",
                frame.to_str().unwrap(),
                "1",
                "2",
                "3",
                "id1=0",
                "id2=0",
                "matchrad=2.5",
                outfile.as_str(),
                "trirad=0.002",
            ]
        );
    }

    #[test]
    fn chains_rounds_through_match_frames() {
        let bin = tempfile::tempdir().unwrap();
        let program = script(bin.path(), "fake-match", ROWWISE_MATCH);
        let mut matcher = ExternalMatcher::new(ExternalMatcherConfig {
            program,
            ..Default::default()
        })
        .unwrap();

        let catalogs = vec![pixel(&[1, 2, 3, 4]), pixel(&[5, 6, 7]), pixel(&[8, 9, 10, 11])];
        let table = match_frames(&catalogs, &mut matcher, 3.0).unwrap();
        assert_eq!(table.n_objects(), 3);
        assert_eq!(table.frame_ids(0), &[1, 2, 3]);
        assert_eq!(table.frame_ids(2), &[8, 9, 10]);
    }

    #[test]
    fn missing_program_is_unavailable() {
        let mut matcher = ExternalMatcher::new(ExternalMatcherConfig {
            program: "/nonexistent/bin/match-tool".to_string(),
            ..Default::default()
        })
        .unwrap();
        let err = matcher
            .match_pair(&pixel(&[1]), &pixel(&[1]), 1, 1.0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolUnavailable);
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let bin = tempfile::tempdir().unwrap();
        let program = script(bin.path(), "failing-match", "echo 'not enough stars' >&2\nexit 3");
        let mut matcher = ExternalMatcher::new(ExternalMatcherConfig {
            program,
            ..Default::default()
        })
        .unwrap();
        let err = matcher
            .match_pair(&pixel(&[1]), &pixel(&[1]), 1, 1.0)
            .unwrap_err();
        match err {
            Error::ExternalToolFailed { stderr, .. } => assert_eq!(stderr, "not enough stars"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn suffix_appends_extension() {
        assert_eq!(
            suffixed(Path::new("/tmp/x/matched"), "mtA"),
            PathBuf::from("/tmp/x/matched.mtA")
        );
    }
}
