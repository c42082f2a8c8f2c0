//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Reads and writes sponsor lists as JSON files
//!
//! # Output Structure
//!
//! ```text
//! ./
//! ├── sponsors.json          # raw crawl output
//! └── sponsors_unique.json   # after deduplication
//! ```

pub mod json;
