//! Sidestack directory scrapers.
//!
//! Scraping follows the same two-phase pattern as any listing site:
//!
//! 1. **Indexing** ([`directory`]): fetch the 27 bucket pages and collect
//!    links to detail pages
//! 2. **Fetching** ([`detail`]): download and parse each detail page into a
//!    feed record, then confirm its feed URL ([`feed`])
//!
//! Failed bucket fetches are logged and skipped. Failed detail fetches become
//! records with an error status.

pub mod detail;
pub mod directory;
pub mod feed;
