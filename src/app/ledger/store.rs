//! Flat-file persistence for the ledger
//!
//! One identifier per line, oldest first. Writes go through a temporary file
//! and a rename so a crash never leaves a half-written ledger behind.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::constants::persistence;
use crate::errors::{LedgerError, LedgerResult};

const TEMP_SUFFIX: &str = "tmp";

/// Result of a compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactionOutcome {
    /// Whether the file was rewritten
    pub compacted: bool,
    pub lines_before: usize,
    pub lines_after: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Size summary of a ledger file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerFileStats {
    pub bytes: u64,
    pub lines: usize,
}

/// Reads and writes the persisted ledger history
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
    compaction_threshold: u64,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compaction_threshold: persistence::COMPACTION_THRESHOLD_BYTES,
        }
    }

    /// Set the file size above which compaction halves the history
    pub fn with_compaction_threshold(mut self, bytes: u64) -> Self {
        self.compaction_threshold = bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Load persisted identifiers, oldest first
    ///
    /// A missing file is an empty history, not an error.
    pub async fn load(&self) -> LedgerResult<Vec<String>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No ledger file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let ids: Vec<String> = parse_lines(&content).map(str::to_string).collect();
        info!(
            "Loaded {} ledger entries from {}",
            ids.len(),
            self.path.display()
        );
        Ok(ids)
    }

    /// Replace the file with `ids`, then compact if it grew past the threshold
    pub async fn save(&self, ids: &[String]) -> LedgerResult<CompactionOutcome> {
        let mut content = String::with_capacity(ids.iter().map(|id| id.len() + 1).sum());
        for id in ids {
            content.push_str(id);
            content.push('\n');
        }
        self.write_atomic(&content).await?;
        debug!("Saved {} ledger entries to {}", ids.len(), self.path.display());

        self.compact().await
    }

    /// Keep only the newer half of the lines once the file exceeds the threshold
    pub async fn compact(&self) -> LedgerResult<CompactionOutcome> {
        let bytes_before = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CompactionOutcome::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let lines: Vec<&str> = parse_lines(&content).collect();

        if bytes_before <= self.compaction_threshold {
            return Ok(CompactionOutcome {
                compacted: false,
                lines_before: lines.len(),
                lines_after: lines.len(),
                bytes_before,
                bytes_after: bytes_before,
            });
        }

        let kept = &lines[lines.len() / 2..];
        let mut compacted = kept.join("\n");
        if !compacted.is_empty() {
            compacted.push('\n');
        }
        self.write_atomic(&compacted).await?;

        let outcome = CompactionOutcome {
            compacted: true,
            lines_before: lines.len(),
            lines_after: kept.len(),
            bytes_before,
            bytes_after: compacted.len() as u64,
        };
        warn!(
            "Ledger file {} exceeded {} bytes, compacted {} -> {} entries",
            self.path.display(),
            self.compaction_threshold,
            outcome.lines_before,
            outcome.lines_after
        );
        Ok(outcome)
    }

    /// Size and line count of the file, `None` if it does not exist
    pub async fn file_stats(&self) -> LedgerResult<Option<LedgerFileStats>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(LedgerFileStats {
                bytes: content.len() as u64,
                lines: parse_lines(&content).count(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write_atomic(&self, content: &str) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let temp_path = self.path.with_extension(match self.path.extension() {
            Some(ext) => format!("{}.{}", ext.to_string_lossy(), TEMP_SUFFIX),
            None => TEMP_SUFFIX.to_string(),
        });

        fs::write(&temp_path, content)
            .await
            .map_err(|e| self.io_error(e))?;

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(LedgerError::PersistFailed {
                path: self.path.clone(),
                reason: format!("Atomic rename failed: {}", e),
            });
        }
        Ok(())
    }
}

fn parse_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|line| !line.is_empty())
}
