//! Payroll ("paie") and its synchronization with the cash register

pub mod sync;

pub use sync::*;
