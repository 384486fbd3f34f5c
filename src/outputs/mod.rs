//! Output files written at the end of a run.
//!
//! # Submodules
//!
//! - [`json`]: the per-date corpus file (read at start, rewritten at end)
//! - [`lines`]: optional JSON-lines export of the merged corpus
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 2024-11-14.json      # corpus
//! └── res/
//!     └── 2024-11-14.jsonl # --export-lines
//! ```

pub mod json;
pub mod lines;
