//! Context collectors: the heap slice and source excerpts shipped to the
//! oracle alongside the constraints.
//!
//! Collectors report failures as values; deciding to degrade gracefully
//! (drop the field, keep solving) is the hybrid solver's call, not
//! theirs.

pub mod heap;
pub mod source;

use std::fmt;

pub use heap::{collect_heap, ClassSchema, HeapSnapshot, ObjectDump};
pub use source::{collect_source, LineNumbers, SourceContext};

/// A collector could not produce its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    /// No method under analysis and no frame to fall back to.
    NoMethod,
    /// Class missing from the class path.
    UnknownClass(String),
    /// Class has no attached source text.
    NoSource(String),
    /// Method has no line range to excerpt.
    NoLineInfo(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::NoMethod => f.write_str("no method under analysis"),
            CollectError::UnknownClass(name) => write!(f, "unknown class: {}", name),
            CollectError::NoSource(name) => write!(f, "no source for class: {}", name),
            CollectError::NoLineInfo(name) => write!(f, "no line info for method: {}", name),
        }
    }
}

impl std::error::Error for CollectError {}
