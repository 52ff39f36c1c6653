//! Utility modules

pub mod memory_storage;
pub mod normalization;
pub mod retry;
pub mod validation;

pub use memory_storage::*;
pub use normalization::*;
pub use retry::*;
pub use validation::*;
