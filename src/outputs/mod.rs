//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Reads and writes collection and mapped-feed JSON files
//!
//! # Output Files
//!
//! ```text
//! feeds.json          # scraper: every detail page, one record per slug
//! feeds_mapped.json   # mapper: ok records above the subscriber threshold
//! ```

pub mod json;
