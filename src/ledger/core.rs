//! Back-office orchestrator that coordinates numbering, payroll and the cash ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::HeraclionConfig;
use crate::ledger::cash::CashLedger;
use crate::ledger::filter::MovementFilter;
use crate::numbering::{DocumentKind, DocumentNumber, DocumentNumberer};
use crate::payroll::PayrollSynchronizer;
use crate::traits::*;
use crate::types::*;
use crate::utils::normalization::{PayrollInput, RawCashMovement};

/// Main entry point that orchestrates all back-office operations
pub struct BackOffice<S: BackOfficeStorage> {
    cash: CashLedger<S>,
    payroll: PayrollSynchronizer<S>,
    numbering: DocumentNumberer<S>,
}

impl<S: BackOfficeStorage + Clone> BackOffice<S> {
    /// Create a new back-office with the given storage backend
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, HeraclionConfig::default())
    }

    /// Create a new back-office with explicit configuration
    pub fn with_config(storage: S, config: HeraclionConfig) -> Self {
        Self::with_validator(storage, config, Box::new(DefaultMovementValidator))
    }

    /// Create a new back-office with a custom movement validator
    pub fn with_validator(
        storage: S,
        config: HeraclionConfig,
        validator: Box<dyn MovementValidator>,
    ) -> Self {
        Self {
            cash: CashLedger::with_config(storage.clone(), validator, &config),
            payroll: PayrollSynchronizer::with_config(storage.clone(), &config),
            numbering: DocumentNumberer::with_config(storage, &config),
        }
    }

    pub fn cash(&self) -> &CashLedger<S> {
        &self.cash
    }

    pub fn payroll(&self) -> &PayrollSynchronizer<S> {
        &self.payroll
    }

    pub fn numbering(&self) -> &DocumentNumberer<S> {
        &self.numbering
    }

    // Numbering operations
    /// Claim the next number of a document family
    pub async fn next_document_number(
        &self,
        kind: DocumentKind,
        year: i32,
    ) -> HeraclionResult<DocumentNumber> {
        self.numbering.allocate_for(kind, year).await
    }

    // Payroll operations
    /// Record a payroll line and its cash outflow
    pub async fn record_payroll(
        &self,
        input: &PayrollInput,
    ) -> HeraclionResult<(PayrollEntry, CashMovement)> {
        self.payroll.record_payroll(input).await
    }

    /// Record several payroll lines, one outflow each
    pub async fn record_payrolls(
        &self,
        inputs: &[PayrollInput],
    ) -> HeraclionResult<Vec<(PayrollEntry, CashMovement)>> {
        self.payroll.record_payrolls(inputs).await
    }

    /// Trash a payroll line and its outflow
    pub async fn remove_payroll(
        &self,
        id: i64,
        deleted_by: &str,
    ) -> HeraclionResult<Vec<TrashedRecord>> {
        self.payroll.remove_payroll(id, deleted_by).await
    }

    // Cash operations
    /// Record a cash movement
    pub async fn record_movement(&self, movement: NewCashMovement) -> HeraclionResult<CashMovement> {
        self.cash.insert(movement).await
    }

    /// Record a cash movement sent with front-end field names
    pub async fn record_raw_movement(
        &self,
        raw: &RawCashMovement,
    ) -> HeraclionResult<CashMovement> {
        self.cash.insert_raw(raw).await
    }

    /// Update a cash movement
    pub async fn update_movement(
        &self,
        id: i64,
        patch: &CashMovementPatch,
    ) -> HeraclionResult<CashMovement> {
        self.cash.update(id, patch).await
    }

    /// Trash a cash movement
    pub async fn delete_movement(&self, id: i64, deleted_by: &str) -> HeraclionResult<TrashedRecord> {
        self.cash.soft_delete(id, deleted_by).await
    }

    /// List cash movements
    pub async fn list_movements(&self, filter: &MovementFilter) -> HeraclionResult<Vec<CashMovement>> {
        self.cash.list(filter).await
    }

    /// Current register balance
    pub async fn balance(&self) -> HeraclionResult<BigDecimal> {
        self.cash.balance().await
    }

    /// Archive a calendar month of the register
    pub async fn archive_month(&self, year: i32, month: u32) -> HeraclionResult<u64> {
        self.cash.archive_month(year, month).await
    }

    // Trash operations
    /// Restore any trashed row; payroll rows come back with their outflow
    pub async fn restore(&self, trash_id: Uuid) -> HeraclionResult<RestoredRecord> {
        let record = self.cash.trashed_required(trash_id).await?;
        if record.source_table == PAYROLL_TABLE {
            let (payroll, _) = self.payroll.restore_payroll(trash_id).await?;
            Ok(RestoredRecord::Payroll(payroll))
        } else {
            Ok(RestoredRecord::Cash(self.cash.restore(trash_id).await?))
        }
    }

    // Reporting
    /// Cash statement between two dates, both inclusive
    pub async fn generate_cash_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> HeraclionResult<CashStatement> {
        if end_date < start_date {
            return Err(HeraclionError::InvalidArgument(format!(
                "statement ends ({}) before it starts ({})",
                end_date, start_date
            )));
        }

        let opening_balance = match start_date.pred_opt() {
            Some(day_before) => self.cash.balance_as_of(day_before).await?,
            None => BigDecimal::from(0),
        };

        let filter = MovementFilter::new().date_from(start_date).date_to(end_date);
        let movements = self.cash.list(&filter).await?;

        let zero = BigDecimal::from(0);
        let mut total_inflows = BigDecimal::from(0);
        let mut total_outflows = BigDecimal::from(0);
        let mut by_category: BTreeMap<String, BigDecimal> = BTreeMap::new();

        for movement in &movements {
            if movement.amount >= zero {
                total_inflows += &movement.amount;
            } else {
                total_outflows += &movement.amount;
            }
            let category = movement
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            *by_category.entry(category).or_insert_with(|| BigDecimal::from(0)) +=
                &movement.amount;
        }

        let closing_balance = &opening_balance + &total_inflows + &total_outflows;

        Ok(CashStatement {
            start_date,
            end_date,
            opening_balance,
            total_inflows,
            total_outflows,
            closing_balance,
            movement_count: movements.len(),
            by_category,
        })
    }
}

/// Category name used in statements for movements without one
pub const UNCATEGORIZED: &str = "Divers";

/// Cash register statement over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Balance at the end of the day before `start_date`
    pub opening_balance: BigDecimal,
    pub total_inflows: BigDecimal,
    /// Sum of outflows, as a negative amount
    pub total_outflows: BigDecimal,
    pub closing_balance: BigDecimal,
    pub movement_count: usize,
    pub by_category: BTreeMap<String, BigDecimal>,
}
