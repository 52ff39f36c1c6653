//! # Heraclion Core
//!
//! Back-office core for a small business: document numbering, a cash
//! register ledger and payroll lines that mirror themselves into it.
//!
//! ## Features
//!
//! - **Document numbering**: `PREFIX-YYYY-NNN` numbers with per-family, per-year counters
//! - **Cash ledger**: signed movements with filtering, balances and monthly archiving
//! - **Payroll sync**: every payroll line records its `Salaire` outflow in the same unit of work
//! - **Trash**: deletions keep a serialized copy that can be restored
//! - **Storage abstraction**: everything runs against the `BackOfficeStorage` trait
//!
//! ## Quick Start
//!
//! ```rust
//! use heraclion_core::{BackOffice, MemoryStorage, PayrollInput};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let office = BackOffice::new(MemoryStorage::new());
//! let (_, movement) = office
//!     .record_payroll(&PayrollInput::new("2024-01-31", "Rakoto", 12345))
//!     .await
//!     .unwrap();
//! assert_eq!(movement.label, "Salaire Rakoto");
//! # });
//! ```

pub mod config;
pub mod ledger;
pub mod numbering;
pub mod payroll;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use crate::config::HeraclionConfig;
pub use ledger::*;
pub use numbering::{
    DocumentKind, DocumentNumber, DocumentNumberer, NumberingPolicy, DEFAULT_COUNTER_WIDTH,
    DEFAULT_YEAR_WINDOW,
};
pub use payroll::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::{Fault, MemoryStorage, StorageOp};
pub use utils::normalization::{PayrollInput, RawCashMovement};
pub use utils::retry::RetryPolicy;
