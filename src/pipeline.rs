//! Top-level run driver: target list in, materialized library out.
//!
//! Targets are processed strictly sequentially. That is deliberate: the
//! upstream provider rate-limits aggressively and the pacing built into the
//! provider options only works when requests are serialized.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::flatten::Flattener;
use crate::ledger::Ledger;
use crate::materialize::{Orchestrator, Outcome};
use crate::resolver::MetadataResolver;

/// Reads a target list file: one catalog URL per line, blank lines and
/// `#`-prefixed comment lines skipped.
///
/// # Errors
///
/// Returns an I/O error when the file cannot be read.
pub fn read_targets(path: &Path) -> std::io::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}

/// Aggregate counts for one full run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub materialized: usize,
    pub skipped: usize,
    pub failed: usize,
    pub planned: usize,
}

impl RunStats {
    fn tally(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Materialized => self.materialized += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::PermanentFailure => self.failed += 1,
            Outcome::DryRun => self.planned += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.materialized + self.skipped + self.failed + self.planned
    }
}

/// Sequential mirror pipeline over a list of root catalog URLs.
pub struct Pipeline {
    settings: Settings,
    resolver: MetadataResolver,
    ledger: Arc<Ledger>,
    orchestrator: Orchestrator,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        settings: Settings,
        resolver: MetadataResolver,
        ledger: Arc<Ledger>,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            settings,
            resolver,
            ledger,
            orchestrator,
        }
    }

    /// Runs the full mirror pass over `targets`.
    ///
    /// Each target is flattened and its records materialized before the next
    /// target starts. Per-record failures are contained by the orchestrator;
    /// nothing here aborts the run.
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    pub async fn run(&self, targets: &[String]) -> RunStats {
        let mut stats = RunStats::default();

        for target in targets {
            info!(target = %target, "processing target");

            let flattener = Flattener::new(
                &self.resolver,
                &self.ledger,
                self.settings.refresh_cache_at_scan,
            );
            let output = flattener.flatten(target).await;

            if output.tracks.is_empty() && output.creator.is_empty() {
                warn!(target = %target, "target produced no records");
                continue;
            }

            self.orchestrator
                .fetch_creator_art(&output.creator, &output.creator_art)
                .await;

            let total = output.tracks.len();
            for (position, record) in output.tracks.iter().enumerate() {
                info!(
                    progress = %format!("[{}/{total}]", position + 1),
                    title = %record.title,
                    "processing record"
                );
                stats.tally(self.orchestrator.process(record).await);
            }
        }

        stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_targets_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(
            &path,
            "https://x/@band/releases\n\n# a comment\n  https://x/@other/videos  \n",
        )
        .unwrap();

        let targets = read_targets(&path).unwrap();
        assert_eq!(
            targets,
            vec![
                "https://x/@band/releases".to_string(),
                "https://x/@other/videos".to_string(),
            ]
        );
    }

    #[test]
    fn test_read_targets_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_targets(&dir.path().join("absent.txt")).is_err());
    }

    #[test]
    fn test_run_stats_tally_and_total() {
        let mut stats = RunStats::default();
        stats.tally(Outcome::Materialized);
        stats.tally(Outcome::Materialized);
        stats.tally(Outcome::Skipped);
        stats.tally(Outcome::PermanentFailure);
        stats.tally(Outcome::DryRun);

        assert_eq!(stats.materialized, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.planned, 1);
        assert_eq!(stats.total(), 5);
    }
}
