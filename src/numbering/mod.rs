//! Document numbering: `PREFIX-YEAR-COUNTER` identifiers and their allocation

pub mod allocator;
pub mod document_number;

pub use allocator::*;
pub use document_number::*;
