//! Cash register ledger: movements, balance, archiving and trash

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::HeraclionConfig;
use crate::ledger::filter::MovementFilter;
use crate::traits::*;
use crate::types::*;
use crate::utils::normalization::RawCashMovement;
use crate::utils::retry::{with_retry, RetryPolicy};

/// First and last day of a calendar month
pub fn month_bounds(year: i32, month: u32) -> HeraclionResult<(NaiveDate, NaiveDate)> {
    let invalid = || HeraclionError::InvalidArgument(format!("invalid month {}-{:02}", year, month));

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next_first.pred_opt().ok_or_else(invalid)?;

    Ok((first, last))
}

/// Cash ledger for recording and querying register movements
pub struct CashLedger<S: BackOfficeStorage> {
    storage: S,
    validator: Box<dyn MovementValidator>,
    retry: RetryPolicy,
}

impl<S: BackOfficeStorage> CashLedger<S> {
    /// Create a new cash ledger
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultMovementValidator),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a new cash ledger with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn MovementValidator>) -> Self {
        Self {
            storage,
            validator,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_config(
        storage: S,
        validator: Box<dyn MovementValidator>,
        config: &HeraclionConfig,
    ) -> Self {
        Self {
            storage,
            validator,
            retry: config.retry.clone(),
        }
    }

    /// Record a movement and return the stored row
    #[instrument(skip(self, movement), fields(kind = movement.kind.as_str(), amount = %movement.amount))]
    pub async fn insert(&self, movement: NewCashMovement) -> HeraclionResult<CashMovement> {
        self.validator.validate_movement(&movement)?;

        let storage = &self.storage;
        let movement = &movement;
        let row = with_retry(&self.retry, "insert_movement", move || {
            storage.insert_movement(movement)
        })
        .await?;

        debug!(id = row.id, "cash movement recorded");
        Ok(row)
    }

    /// Normalize front-end input, then record it
    pub async fn insert_raw(&self, raw: &RawCashMovement) -> HeraclionResult<CashMovement> {
        self.insert(raw.normalize()?).await
    }

    /// Get a movement by id
    pub async fn get(&self, id: i64) -> HeraclionResult<Option<CashMovement>> {
        let storage = &self.storage;
        with_retry(&self.retry, "get_movement", move || storage.get_movement(id)).await
    }

    /// Get a movement by id, returning an error if not found
    pub async fn get_required(&self, id: i64) -> HeraclionResult<CashMovement> {
        self.get(id)
            .await?
            .ok_or_else(|| HeraclionError::not_found("CashMovement", id))
    }

    /// Apply `patch` to a movement and return the updated row
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: &CashMovementPatch) -> HeraclionResult<CashMovement> {
        let mut movement = self.get_required(id).await?;
        if patch.is_empty() {
            return Ok(movement);
        }
        if patch.changes_posting() {
            self.ensure_not_mirrored(id).await?;
        }

        patch.apply_to(&mut movement);
        self.validator.validate_movement(&movement.to_new())?;
        movement.updated_at = chrono::Utc::now().naive_utc();

        let storage = &self.storage;
        let updated = &movement;
        with_retry(&self.retry, "update_movement", move || {
            storage.update_movement(updated)
        })
        .await?;

        Ok(movement)
    }

    /// Move a movement to the trash table
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: i64, deleted_by: &str) -> HeraclionResult<TrashedRecord> {
        self.ensure_not_mirrored(id).await?;

        let storage = &self.storage;
        let record = with_retry(&self.retry, "trash_movement", move || {
            storage.trash_movement(id, deleted_by)
        })
        .await?;

        info!(trash_id = %record.id, "cash movement moved to trash");
        Ok(record)
    }

    /// Reinsert a trashed cash movement after checking its payload
    #[instrument(skip(self))]
    pub async fn restore(&self, trash_id: Uuid) -> HeraclionResult<CashMovement> {
        let record = self.trashed_required(trash_id).await?;

        let movement = match RestoredRecord::from_trash(&record)? {
            RestoredRecord::Cash(movement) => movement,
            RestoredRecord::Payroll(payroll) => {
                return Err(HeraclionError::Validation(format!(
                    "trash record {} holds payroll entry {}, not a cash movement",
                    trash_id, payroll.id
                )))
            }
        };
        self.validator.validate_movement(&movement.to_new())?;

        let restored = RestoredRecord::Cash(movement.clone());
        self.restore_record(trash_id, &restored).await?;

        info!(id = movement.id, "cash movement restored");
        Ok(movement)
    }

    /// List trashed rows, optionally for one source table
    pub async fn list_trash(&self, source_table: Option<&str>) -> HeraclionResult<Vec<TrashedRecord>> {
        let storage = &self.storage;
        with_retry(&self.retry, "list_trash", move || storage.list_trash(source_table)).await
    }

    /// Salary outflows change only through their payroll line
    async fn ensure_not_mirrored(&self, id: i64) -> HeraclionResult<()> {
        let storage = &self.storage;
        let payroll = with_retry(&self.retry, "payroll_for_movement", move || {
            storage.payroll_for_movement(id)
        })
        .await?;

        match payroll {
            Some(payroll) => Err(HeraclionError::Validation(format!(
                "cash movement {} mirrors payroll entry {}; change or remove the payroll instead",
                id, payroll.id
            ))),
            None => Ok(()),
        }
    }

    pub(crate) async fn trashed_required(&self, trash_id: Uuid) -> HeraclionResult<TrashedRecord> {
        let storage = &self.storage;
        with_retry(&self.retry, "get_trashed", move || storage.get_trashed(trash_id))
            .await?
            .ok_or_else(|| HeraclionError::not_found("TrashedRecord", trash_id))
    }

    pub(crate) async fn restore_record(
        &self,
        trash_id: Uuid,
        record: &RestoredRecord,
    ) -> HeraclionResult<()> {
        let storage = &self.storage;
        with_retry(&self.retry, "restore_record", move || {
            storage.restore_record(trash_id, record)
        })
        .await
    }

    /// Movements matching `filter`, ordered by date then id
    pub async fn list(&self, filter: &MovementFilter) -> HeraclionResult<Vec<CashMovement>> {
        let storage = &self.storage;
        with_retry(&self.retry, "list_movements", move || {
            storage.list_movements(filter)
        })
        .await
    }

    /// Sum of every live movement; zero on an empty ledger
    pub async fn balance(&self) -> HeraclionResult<BigDecimal> {
        let storage = &self.storage;
        with_retry(&self.retry, "sum_movements", move || storage.sum_movements(None)).await
    }

    /// Sum of live movements dated on or before `as_of_date`
    pub async fn balance_as_of(&self, as_of_date: NaiveDate) -> HeraclionResult<BigDecimal> {
        let storage = &self.storage;
        with_retry(&self.retry, "sum_movements", move || {
            storage.sum_movements(Some(as_of_date))
        })
        .await
    }

    /// Totals per category over the movements matching `filter`
    pub async fn totals_by_category(
        &self,
        filter: &MovementFilter,
    ) -> HeraclionResult<BTreeMap<Option<String>, BigDecimal>> {
        let mut totals: BTreeMap<Option<String>, BigDecimal> = BTreeMap::new();
        for movement in self.list(filter).await? {
            *totals
                .entry(movement.category)
                .or_insert_with(|| BigDecimal::from(0)) += movement.amount;
        }
        Ok(totals)
    }

    /// Flag every movement of a calendar month as archived
    #[instrument(skip(self))]
    pub async fn archive_month(&self, year: i32, month: u32) -> HeraclionResult<u64> {
        let (first, last) = month_bounds(year, month)?;

        let storage = &self.storage;
        let archived = with_retry(&self.retry, "archive_movements", move || {
            storage.archive_movements(first, last)
        })
        .await?;

        info!(%first, %last, archived, "month archived");
        Ok(archived)
    }
}
