//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::ledger::filter::MovementFilter;
use crate::types::*;

/// Storage abstraction for the back-office
///
/// Each method is one statement or one atomic unit against the shared
/// database. Implementations report connectivity problems as
/// [`HeraclionError::TransientStorage`] so callers can retry them, and every
/// other storage fault as [`HeraclionError::FatalStorage`].
#[async_trait]
pub trait BackOfficeStorage: Send + Sync {
    /// Insert a cash movement and return it with its generated id
    async fn insert_movement(&self, movement: &NewCashMovement) -> HeraclionResult<CashMovement>;

    /// Get a cash movement by id
    async fn get_movement(&self, id: i64) -> HeraclionResult<Option<CashMovement>>;

    /// Overwrite a stored cash movement
    async fn update_movement(&self, movement: &CashMovement) -> HeraclionResult<()>;

    /// List movements matching `filter`, ordered by date then id
    async fn list_movements(&self, filter: &MovementFilter) -> HeraclionResult<Vec<CashMovement>>;

    /// Sum of amounts over live movements, optionally up to a date
    async fn sum_movements(&self, as_of_date: Option<NaiveDate>) -> HeraclionResult<BigDecimal>;

    /// Flag every movement dated within `[from, to]` as archived, returning
    /// how many rows changed
    async fn archive_movements(&self, from: NaiveDate, to: NaiveDate) -> HeraclionResult<u64>;

    /// Copy a movement into the trash table and remove it, in one unit
    async fn trash_movement(&self, id: i64, deleted_by: &str) -> HeraclionResult<TrashedRecord>;

    /// Write a payroll row then its mirrored movement, in one unit.
    /// Nothing stays visible when either write fails.
    async fn insert_payroll_with_movement(
        &self,
        payroll: &NewPayroll,
        movement: &NewCashMovement,
    ) -> HeraclionResult<(PayrollEntry, CashMovement)>;

    /// Get a payroll row by id
    async fn get_payroll(&self, id: i64) -> HeraclionResult<Option<PayrollEntry>>;

    /// List payroll rows within a date range, ordered by date then id
    async fn list_payrolls(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> HeraclionResult<Vec<PayrollEntry>>;

    /// Live payroll row whose mirrored movement is `movement_id`
    async fn payroll_for_movement(&self, movement_id: i64)
        -> HeraclionResult<Option<PayrollEntry>>;

    /// Trash a payroll row together with its mirrored movement
    async fn trash_payroll_with_movement(
        &self,
        id: i64,
        deleted_by: &str,
    ) -> HeraclionResult<Vec<TrashedRecord>>;

    /// Get a trashed row by its trash id
    async fn get_trashed(&self, trash_id: Uuid) -> HeraclionResult<Option<TrashedRecord>>;

    /// List trashed rows, optionally for one source table
    async fn list_trash(&self, source_table: Option<&str>) -> HeraclionResult<Vec<TrashedRecord>>;

    /// Reinsert a validated row under its original id and drop the trash
    /// record, in one unit
    async fn restore_record(&self, trash_id: Uuid, record: &RestoredRecord)
        -> HeraclionResult<()>;

    /// Reinsert a trashed payroll row and, when given, its trashed mirrored
    /// movement, dropping both trash records in one unit. Nothing is
    /// restored when either half fails.
    async fn restore_payroll_with_movement(
        &self,
        payroll_trash_id: Uuid,
        payroll: &PayrollEntry,
        movement: Option<(Uuid, &CashMovement)>,
    ) -> HeraclionResult<()>;

    /// Last counter allocated in a `(prefix, year)` scope
    async fn last_counter(&self, prefix: &str, year: i32) -> HeraclionResult<Option<u64>>;

    /// Store `next` as the scope's counter if it still equals `expected`.
    /// Returns false when another caller got there first.
    async fn compare_and_set_counter(
        &self,
        prefix: &str,
        year: i32,
        expected: Option<u64>,
        next: u64,
    ) -> HeraclionResult<bool>;
}

/// Trait for implementing custom cash movement validation rules
pub trait MovementValidator: Send + Sync {
    /// Validate a movement before it is inserted or after it is patched
    fn validate_movement(&self, movement: &NewCashMovement) -> HeraclionResult<()>;
}

/// Default movement validator with the sign and label rules
pub struct DefaultMovementValidator;

impl MovementValidator for DefaultMovementValidator {
    fn validate_movement(&self, movement: &NewCashMovement) -> HeraclionResult<()> {
        if movement.label.trim().is_empty() {
            return Err(HeraclionError::Validation(
                "Movement label cannot be empty".to_string(),
            ));
        }

        if !movement.kind.accepts(&movement.amount) {
            return Err(HeraclionError::Validation(format!(
                "{} movement cannot carry amount {}",
                movement.kind.as_str(),
                movement.amount
            )));
        }

        Ok(())
    }
}
