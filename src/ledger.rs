//! Append-only dedup ledger of processed references.
//!
//! The ledger is the primary cross-run dedup mechanism: a reference is
//! appended once it has been fully materialized or has permanently failed,
//! and every pipeline stage checks membership before doing remote work.
//! Membership is monotonic - entries are never removed.
//!
//! Durability model: the backing file is newline-delimited, opened in append
//! mode, and flushed on every append so a crash loses at most the in-flight
//! item. The file is read once at startup into an in-memory set; duplicate
//! persisted lines are therefore harmless.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors produced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// I/O failure reading or appending the backing file.
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Append-only set of processed reference strings.
///
/// Appends are linearized behind a mutex: the ledger is the dedup source of
/// truth, so the file write and the in-memory set update happen atomically
/// with respect to other appenders.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    inner: Mutex<LedgerInner>,
}

#[derive(Debug)]
struct LedgerInner {
    entries: HashSet<String>,
    file: File,
}

impl Ledger {
    /// Opens (creating if absent) the ledger file and loads all entries.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the file cannot be opened or read.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .map_err(|source| LedgerError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries = HashSet::new();
        let reader = BufReader::new(&file);
        for line in reader.lines() {
            let line = line.map_err(|source| LedgerError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                entries.insert(trimmed.to_string());
            }
        }

        info!(entries = entries.len(), "ledger loaded");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(LedgerInner { entries, file }),
        })
    }

    /// Returns true if the reference has already been processed.
    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.lock().entries.contains(reference)
    }

    /// Appends a reference, persisting it before the in-memory set is
    /// updated. Re-appending a present reference is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the write or flush fails; on failure
    /// the in-memory set is left unchanged.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn append(&self, reference: &str) -> Result<(), LedgerError> {
        let mut inner = self.lock();

        if inner.entries.contains(reference) {
            debug!("reference already ledgered");
            return Ok(());
        }

        writeln!(inner.file, "{reference}").map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        inner.file.flush().map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;

        inner.entries.insert(reference.to_string());
        info!("reference ledgered");
        Ok(())
    }

    /// Number of distinct ledgered references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if no references are ledgered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        // A poisoned lock only means another appender panicked mid-append;
        // the set and file are still internally consistent line-by-line.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
