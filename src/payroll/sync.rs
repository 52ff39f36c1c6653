//! Payroll recording with its mirrored cash register outflow

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::HeraclionConfig;
use crate::traits::*;
use crate::types::*;
use crate::utils::normalization::PayrollInput;
use crate::utils::retry::{with_retry, RetryPolicy};

/// The outflow every payroll line produces: `Salaire <agent>`, category
/// `Salaire`, amount `-|payroll amount|`, same date
pub fn salary_movement(payroll: &NewPayroll) -> NewCashMovement {
    NewCashMovement::sortie(
        payroll.date,
        format!("{} {}", SALARY_CATEGORY, payroll.agent),
        payroll.amount.clone(),
    )
    .with_category(SALARY_CATEGORY)
}

/// Records payroll lines and keeps the cash register in step with them
pub struct PayrollSynchronizer<S: BackOfficeStorage> {
    storage: S,
    retry: RetryPolicy,
    default_currency: String,
}

impl<S: BackOfficeStorage> PayrollSynchronizer<S> {
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, &HeraclionConfig::default())
    }

    pub fn with_config(storage: S, config: &HeraclionConfig) -> Self {
        Self {
            storage,
            retry: config.retry.clone(),
            default_currency: config.default_currency.clone(),
        }
    }

    /// Validate a payroll line, then store it with its cash outflow.
    ///
    /// Nothing is stored when validation fails, and a failed outflow write
    /// rolls the payroll row back with it.
    #[instrument(skip(self, input), fields(agent = input.agent.as_deref().unwrap_or_default()))]
    pub async fn record_payroll(
        &self,
        input: &PayrollInput,
    ) -> HeraclionResult<(PayrollEntry, CashMovement)> {
        let payroll = input.normalize(&self.default_currency)?;
        self.record_new_payroll(&payroll).await
    }

    /// Store an already typed payroll line with its cash outflow
    pub async fn record_new_payroll(
        &self,
        payroll: &NewPayroll,
    ) -> HeraclionResult<(PayrollEntry, CashMovement)> {
        if payroll.agent.trim().is_empty() {
            return Err(HeraclionError::Validation("agent is required".to_string()));
        }

        let movement = salary_movement(payroll);
        let storage = &self.storage;
        let movement_ref = &movement;
        let (entry, cash) = with_retry(&self.retry, "insert_payroll_with_movement", move || {
            storage.insert_payroll_with_movement(payroll, movement_ref)
        })
        .await
        .inspect_err(|e| warn!(error = %e, "payroll not recorded"))?;

        info!(
            payroll_id = entry.id,
            cash_movement_id = cash.id,
            amount = %cash.amount,
            "payroll recorded"
        );
        Ok((entry, cash))
    }

    /// Record several payroll lines in order, one outflow each.
    ///
    /// Stops at the first failure; lines recorded before it stay recorded.
    pub async fn record_payrolls(
        &self,
        inputs: &[PayrollInput],
    ) -> HeraclionResult<Vec<(PayrollEntry, CashMovement)>> {
        let mut recorded = Vec::with_capacity(inputs.len());
        for input in inputs {
            recorded.push(self.record_payroll(input).await?);
        }
        Ok(recorded)
    }

    /// Get a payroll line by id
    pub async fn get_payroll(&self, id: i64) -> HeraclionResult<Option<PayrollEntry>> {
        let storage = &self.storage;
        with_retry(&self.retry, "get_payroll", move || storage.get_payroll(id)).await
    }

    /// Get a payroll line by id, returning an error if not found
    pub async fn get_payroll_required(&self, id: i64) -> HeraclionResult<PayrollEntry> {
        self.get_payroll(id)
            .await?
            .ok_or_else(|| HeraclionError::not_found("PayrollEntry", id))
    }

    /// Payroll lines within a date range, ordered by date then id
    pub async fn list_payrolls(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> HeraclionResult<Vec<PayrollEntry>> {
        let storage = &self.storage;
        with_retry(&self.retry, "list_payrolls", move || {
            storage.list_payrolls(date_from, date_to)
        })
        .await
    }

    /// Total paid to one agent
    pub async fn total_for_agent(&self, agent: &str) -> HeraclionResult<BigDecimal> {
        let agent = agent.trim();
        Ok(self
            .list_payrolls(None, None)
            .await?
            .iter()
            .filter(|payroll| payroll.agent == agent)
            .map(|payroll| &payroll.amount)
            .sum())
    }

    /// Trash a payroll line together with its cash outflow
    #[instrument(skip(self))]
    pub async fn remove_payroll(
        &self,
        id: i64,
        deleted_by: &str,
    ) -> HeraclionResult<Vec<TrashedRecord>> {
        let storage = &self.storage;
        let records = with_retry(&self.retry, "trash_payroll_with_movement", move || {
            storage.trash_payroll_with_movement(id, deleted_by)
        })
        .await?;

        info!(trashed = records.len(), "payroll moved to trash");
        Ok(records)
    }

    /// Bring a trashed payroll line back, together with its outflow when
    /// that is still in the trash. Both rows come back in one unit.
    #[instrument(skip(self))]
    pub async fn restore_payroll(
        &self,
        trash_id: Uuid,
    ) -> HeraclionResult<(PayrollEntry, Option<CashMovement>)> {
        let storage = &self.storage;
        let record = with_retry(&self.retry, "get_trashed", move || {
            storage.get_trashed(trash_id)
        })
        .await?
        .ok_or_else(|| HeraclionError::not_found("TrashedRecord", trash_id))?;

        let payroll = match RestoredRecord::from_trash(&record)? {
            RestoredRecord::Payroll(payroll) => payroll,
            RestoredRecord::Cash(movement) => {
                return Err(HeraclionError::Validation(format!(
                    "trash record {} holds cash movement {}, not a payroll entry",
                    trash_id, movement.id
                )))
            }
        };

        let mirrored = match payroll.cash_movement_id {
            Some(movement_id) => self.trashed_movement(movement_id).await?,
            None => None,
        };
        if mirrored.is_none() {
            warn!(payroll_id = payroll.id, "mirrored cash movement not found in trash");
        }

        let payroll_ref = &payroll;
        let mirrored_ref = mirrored
            .as_ref()
            .map(|(movement_trash_id, movement)| (*movement_trash_id, movement));
        with_retry(&self.retry, "restore_payroll_with_movement", move || {
            storage.restore_payroll_with_movement(trash_id, payroll_ref, mirrored_ref)
        })
        .await?;

        info!(payroll_id = payroll.id, "payroll restored");
        Ok((payroll, mirrored.map(|(_, movement)| movement)))
    }

    async fn trashed_movement(
        &self,
        movement_id: i64,
    ) -> HeraclionResult<Option<(Uuid, CashMovement)>> {
        let storage = &self.storage;
        let trash = with_retry(&self.retry, "list_trash", move || {
            storage.list_trash(Some(CASH_TABLE))
        })
        .await?;

        for record in trash {
            if record.payload.get("id").and_then(|id| id.as_i64()) != Some(movement_id) {
                continue;
            }
            if let RestoredRecord::Cash(movement) = RestoredRecord::from_trash(&record)? {
                return Ok(Some((record.id, movement)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::{Fault, MemoryStorage, StorageOp};

    fn synchronizer(storage: MemoryStorage) -> PayrollSynchronizer<MemoryStorage> {
        let config = HeraclionConfig::default()
            .retry(RetryPolicy::fixed(3, std::time::Duration::from_millis(1)));
        PayrollSynchronizer::with_config(storage, &config)
    }

    #[test]
    fn test_salary_movement_shape() {
        let payroll = NewPayroll {
            date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            agent: "Rakoto".to_string(),
            amount: BigDecimal::from(12345),
            comment: None,
            currency: "MGA".to_string(),
            rate: None,
        };
        let movement = salary_movement(&payroll);

        assert_eq!(movement.label, "Salaire Rakoto");
        assert_eq!(movement.category.as_deref(), Some("Salaire"));
        assert_eq!(movement.amount, BigDecimal::from(-12345));
        assert_eq!(movement.kind, MovementKind::Sortie);
        assert_eq!(movement.date, payroll.date);
    }

    #[tokio::test]
    async fn test_negative_payroll_amount_still_produces_outflow() {
        let sync = synchronizer(MemoryStorage::new());
        let (entry, cash) = sync
            .record_payroll(&PayrollInput::new("2024-01-31", "Rabe", -500))
            .await
            .unwrap();

        assert_eq!(entry.amount, BigDecimal::from(-500));
        assert_eq!(cash.amount, BigDecimal::from(-500));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let storage = MemoryStorage::new();
        storage.inject_fault(StorageOp::InsertMovement, Fault::Transient(2));
        let sync = synchronizer(storage.clone());

        let (entry, cash) = sync
            .record_payroll(&PayrollInput::new("2024-01-31", "Rakoto", 100))
            .await
            .unwrap();

        assert_eq!(entry.id, 1);
        assert_eq!(entry.cash_movement_id, Some(cash.id));
        assert_eq!(sync.list_payrolls(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_nothing_behind() {
        let storage = MemoryStorage::new();
        storage.inject_fault(StorageOp::InsertMovement, Fault::Transient(10));
        let sync = synchronizer(storage.clone());

        let err = sync
            .record_payroll(&PayrollInput::new("2024-01-31", "Rakoto", 100))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FatalStorage);
        assert!(sync.list_payrolls(None, None).await.unwrap().is_empty());
        assert_eq!(
            storage.sum_movements(None).await.unwrap(),
            BigDecimal::from(0)
        );
    }

    #[tokio::test]
    async fn test_total_for_agent() {
        let sync = synchronizer(MemoryStorage::new());
        sync.record_payrolls(&[
            PayrollInput::new("2024-01-31", "Rakoto", 100),
            PayrollInput::new("2024-02-29", "Rakoto", 150),
            PayrollInput::new("2024-02-29", "Rabe", 90),
        ])
        .await
        .unwrap();

        assert_eq!(sync.total_for_agent("Rakoto").await.unwrap(), BigDecimal::from(250));
        assert_eq!(sync.total_for_agent("Nobody").await.unwrap(), BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_remove_and_restore_payroll() {
        let storage = MemoryStorage::new();
        let sync = synchronizer(storage.clone());
        let (entry, cash) = sync
            .record_payroll(&PayrollInput::new("2024-01-31", "Rakoto", 100))
            .await
            .unwrap();

        let records = sync.remove_payroll(entry.id, "rh").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_table, PAYROLL_TABLE);
        assert_eq!(records[1].source_table, CASH_TABLE);
        assert!(sync.get_payroll(entry.id).await.unwrap().is_none());
        assert!(storage.get_movement(cash.id).await.unwrap().is_none());

        let (payroll, movement) = sync.restore_payroll(records[0].id).await.unwrap();
        assert_eq!(payroll, entry);
        assert_eq!(movement, Some(cash.clone()));
        assert_eq!(storage.get_movement(cash.id).await.unwrap(), Some(cash));
        assert!(storage.list_trash(None).await.unwrap().is_empty());

        let err = sync.restore_payroll(records[1].id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_both_rows_in_trash() {
        let storage = MemoryStorage::new();
        let sync = synchronizer(storage.clone());
        let (entry, cash) = sync
            .record_payroll(&PayrollInput::new("2024-01-31", "Rakoto", 100))
            .await
            .unwrap();
        let records = sync.remove_payroll(entry.id, "rh").await.unwrap();

        storage.inject_fault(StorageOp::RestoreRecord, Fault::Transient(10));
        let err = sync.restore_payroll(records[0].id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FatalStorage);
        assert!(sync.get_payroll(entry.id).await.unwrap().is_none());
        assert!(storage.get_movement(cash.id).await.unwrap().is_none());
        assert_eq!(storage.list_trash(None).await.unwrap().len(), 2);

        storage.clear_faults();
        let (payroll, movement) = sync.restore_payroll(records[0].id).await.unwrap();
        assert_eq!(payroll, entry);
        assert_eq!(movement, Some(cash));
    }
}
