//! JSON-lines export for bulk import into a document database.
//!
//! One compact record per line, written under a `res/` directory next to the
//! corpus:
//!
//! ```text
//! output_dir/
//! ├── 2024-11-14.json
//! └── res/
//!     └── 2024-11-14.jsonl
//! ```

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::dates::canonical;
use crate::error::PersistenceError;
use crate::models::ArticleRecord;

/// `{output_dir}/res/{YYYY-MM-DD}.jsonl`
pub fn export_path(output_dir: &str, target: NaiveDate) -> PathBuf {
    Path::new(output_dir)
        .join("res")
        .join(format!("{}.jsonl", canonical(target)))
}

/// Render `records` one JSON object per line.
pub fn to_lines(records: &[ArticleRecord]) -> Result<String, PersistenceError> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write the JSON-lines export, creating `res/` as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_lines(path: &Path, records: &[ArticleRecord]) -> Result<(), PersistenceError> {
    let body = to_lines(records)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    fs::write(path, body)
        .await
        .map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Wrote JSON-lines export");
    Ok(())
}
