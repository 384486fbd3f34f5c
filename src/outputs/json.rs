//! Corpus file persistence.
//!
//! The corpus for a target date lives in a single JSON array:
//!
//! ```text
//! output_dir/
//! └── 2024-11-14.json
//! ```
//!
//! It is read once when a run starts and rewritten once when it ends.
//! A missing file is an empty corpus. An unreadable or undecodable file is
//! logged and also treated as empty, but a failed *write* is an error: the
//! merged result would otherwise be lost.

use chrono::NaiveDate;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

use crate::dates::canonical;
use crate::error::PersistenceError;
use crate::models::ArticleRecord;

/// `{output_dir}/{YYYY-MM-DD}.json`
pub fn corpus_path(output_dir: &str, target: NaiveDate) -> PathBuf {
    Path::new(output_dir).join(format!("{}.json", canonical(target)))
}

/// Read the corpus at `path`. A missing file yields an empty corpus.
///
/// # Errors
///
/// Any other I/O or decoding failure.
pub async fn read_corpus(path: &Path) -> Result<Vec<ArticleRecord>, PersistenceError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the corpus, degrading any failure to an empty corpus.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_corpus(path: &Path) -> Vec<ArticleRecord> {
    match read_corpus(path).await {
        Ok(records) => {
            info!(count = records.len(), "Loaded corpus");
            records
        }
        Err(e) => {
            warn!(error = %e, "Could not load corpus; starting from an empty one");
            Vec::new()
        }
    }
}

/// Write `records` as a pretty-printed JSON array.
///
/// The file is written next to its final location and renamed into place,
/// so a crash mid-write leaves the previous corpus intact.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_corpus(path: &Path, records: &[ArticleRecord]) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let tmp = path.with_extension("json.tmp");
    let write = async {
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, path).await
    };
    if let Err(source) = write.await {
        error!(error = %source, "Failed to write corpus");
        let _ = fs::remove_file(&tmp).await;
        return Err(PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    info!("Wrote corpus");
    Ok(())
}
