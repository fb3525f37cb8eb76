//! xref Indexer
//!
//! This crate provides the cross-reference indexing engine for C++ sources:
//! - Stable symbol identifiers for every named entity
//! - Two-pass template handling with heuristic dependent-name resolution
//! - Macro expansion tracking with re-flowed expansion text
//! - Structured layout and signature metadata
//! - Lock-protected, idempotent merging into per-file record databases

pub mod context;
mod error;
pub mod forwarding;
pub mod heuristic;
pub mod indexer;
pub mod location;
pub mod macros;
pub mod mangle;
pub mod model;
pub mod record;
pub mod storage;
pub mod structured;
pub mod template;

pub use error::IndexerError;
pub use indexer::{index_translation_unit, FileOutput, IndexOutput, Indexer};
pub use location::{FileRegistry, FileType, LocationClassifier, GENERATED_PREFIX};
pub use mangle::{hash, mangle_file, Mangler};
pub use model::TranslationUnit;
pub use storage::{merge_into, merge_sorted, write_output, MergeStats};
