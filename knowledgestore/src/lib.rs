//! KnowledgeStore - deduplicated, keyword-indexed knowledge for one research run
//!
//! Knowledge lives in-process for the lifetime of a single research run; there
//! is no persistence layer. Items are append-only: a corrected fact is
//! inserted as a new item whose `metadata` carries a `supersedes` reference to
//! the id it replaces, never an in-place update.

mod bloom;
mod store;

pub use store::{CoverageReport, KnowledgeItem, KnowledgeStore, SourceKind};
