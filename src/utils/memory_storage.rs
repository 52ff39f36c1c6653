//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::ledger::filter::{ledger_order, MovementFilter};
use crate::traits::*;
use crate::types::*;

/// Storage operations a fault can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    InsertMovement,
    GetMovement,
    UpdateMovement,
    ListMovements,
    SumMovements,
    ArchiveMovements,
    TrashMovement,
    InsertPayroll,
    GetPayroll,
    ListPayrolls,
    TrashPayroll,
    RestorePayroll,
    GetTrashed,
    ListTrash,
    RestoreRecord,
    LastCounter,
    ClaimCounter,
}

/// Failure injected into a storage operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with a transient error this many times, then recover
    Transient(u32),
    /// Fail with a fatal error until cleared
    Fatal,
    /// Another writer claims the counter first this many times
    /// (`ClaimCounter` only)
    Conflict(u32),
}

#[derive(Debug, Default)]
struct Tables {
    movements: BTreeMap<i64, CashMovement>,
    payrolls: BTreeMap<i64, PayrollEntry>,
    trash: Vec<TrashedRecord>,
    counters: HashMap<(String, i32), u64>,
    last_movement_id: i64,
    last_payroll_id: i64,
}

impl Tables {
    fn next_movement_id(&mut self) -> i64 {
        self.last_movement_id += 1;
        self.last_movement_id
    }

    fn next_payroll_id(&mut self) -> i64 {
        self.last_payroll_id += 1;
        self.last_payroll_id
    }
}

/// Live payroll row mirrored by movement `movement_id`
fn mirrored_by(tables: &Tables, movement_id: i64) -> Option<&PayrollEntry> {
    tables
        .payrolls
        .values()
        .find(|payroll| payroll.cash_movement_id == Some(movement_id))
}

/// In-memory storage implementation for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<HashMap<StorageOp, Fault>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail according to `fault`
    pub fn inject_fault(&self, op: StorageOp, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(op, fault);
        }
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> HeraclionResult<()> {
        *self.write()? = Tables::default();
        Ok(())
    }

    fn read(&self) -> HeraclionResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| HeraclionError::FatalStorage("storage lock poisoned".to_string()))
    }

    fn write(&self) -> HeraclionResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| HeraclionError::FatalStorage("storage lock poisoned".to_string()))
    }

    /// Fail if a fault is armed for `op`
    fn trip(&self, op: StorageOp) -> HeraclionResult<()> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| HeraclionError::FatalStorage("fault table poisoned".to_string()))?;

        match faults.get_mut(&op) {
            Some(Fault::Fatal) => Err(HeraclionError::FatalStorage(format!(
                "{:?} rejected by storage",
                op
            ))),
            Some(Fault::Transient(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Err(HeraclionError::TransientStorage(format!(
                    "{:?} lost its connection",
                    op
                )))
            }
            _ => Ok(()),
        }
    }

    /// Consume one armed conflict for `op`
    fn take_conflict(&self, op: StorageOp) -> HeraclionResult<bool> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| HeraclionError::FatalStorage("fault table poisoned".to_string()))?;

        match faults.get_mut(&op) {
            Some(Fault::Conflict(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn now() -> chrono::NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}

#[async_trait]
impl BackOfficeStorage for MemoryStorage {
    async fn insert_movement(&self, movement: &NewCashMovement) -> HeraclionResult<CashMovement> {
        self.trip(StorageOp::InsertMovement)?;
        let mut tables = self.write()?;
        let id = tables.next_movement_id();
        let row = CashMovement::from_new(id, movement, Self::now());
        tables.movements.insert(id, row.clone());
        Ok(row)
    }

    async fn get_movement(&self, id: i64) -> HeraclionResult<Option<CashMovement>> {
        self.trip(StorageOp::GetMovement)?;
        Ok(self.read()?.movements.get(&id).cloned())
    }

    async fn update_movement(&self, movement: &CashMovement) -> HeraclionResult<()> {
        self.trip(StorageOp::UpdateMovement)?;
        let mut tables = self.write()?;
        match tables.movements.get_mut(&movement.id) {
            Some(row) => {
                *row = movement.clone();
                Ok(())
            }
            None => Err(HeraclionError::not_found("CashMovement", movement.id)),
        }
    }

    async fn list_movements(&self, filter: &MovementFilter) -> HeraclionResult<Vec<CashMovement>> {
        self.trip(StorageOp::ListMovements)?;
        let tables = self.read()?;
        let mut rows: Vec<CashMovement> = tables
            .movements
            .values()
            .filter(|movement| filter.matches(movement))
            .cloned()
            .collect();
        rows.sort_by(ledger_order);
        Ok(rows)
    }

    async fn sum_movements(&self, as_of_date: Option<NaiveDate>) -> HeraclionResult<BigDecimal> {
        self.trip(StorageOp::SumMovements)?;
        let tables = self.read()?;
        Ok(tables
            .movements
            .values()
            .filter(|movement| as_of_date.is_none_or(|as_of| movement.date <= as_of))
            .map(|movement| &movement.amount)
            .sum())
    }

    async fn archive_movements(&self, from: NaiveDate, to: NaiveDate) -> HeraclionResult<u64> {
        self.trip(StorageOp::ArchiveMovements)?;
        let mut tables = self.write()?;
        let now = Self::now();
        let mut archived = 0;
        for movement in tables.movements.values_mut() {
            if movement.date >= from && movement.date <= to && !movement.archived {
                movement.archived = true;
                movement.updated_at = now;
                archived += 1;
            }
        }
        Ok(archived)
    }

    async fn trash_movement(&self, id: i64, deleted_by: &str) -> HeraclionResult<TrashedRecord> {
        self.trip(StorageOp::TrashMovement)?;
        let mut tables = self.write()?;
        let movement = tables
            .movements
            .get(&id)
            .ok_or_else(|| HeraclionError::not_found("CashMovement", id))?;
        if let Some(payroll) = mirrored_by(&tables, id) {
            return Err(HeraclionError::Validation(format!(
                "cash movement {} mirrors payroll entry {}",
                id, payroll.id
            )));
        }

        let record = TrashedRecord::capture(CASH_TABLE, movement, deleted_by, Self::now())?;
        tables.movements.remove(&id);
        tables.trash.push(record.clone());
        Ok(record)
    }

    async fn insert_payroll_with_movement(
        &self,
        payroll: &NewPayroll,
        movement: &NewCashMovement,
    ) -> HeraclionResult<(PayrollEntry, CashMovement)> {
        // Both rows are staged under one write lock and only committed once
        // the second write succeeds.
        let mut tables = self.write()?;
        let now = Self::now();

        self.trip(StorageOp::InsertPayroll)?;
        let payroll_id = tables.last_payroll_id + 1;
        let mut entry = PayrollEntry::from_new(payroll_id, payroll, now);

        self.trip(StorageOp::InsertMovement)?;
        let movement_id = tables.next_movement_id();
        let cash = CashMovement::from_new(movement_id, movement, now);

        tables.last_payroll_id = payroll_id;
        entry.cash_movement_id = Some(movement_id);
        tables.payrolls.insert(payroll_id, entry.clone());
        tables.movements.insert(movement_id, cash.clone());
        Ok((entry, cash))
    }

    async fn get_payroll(&self, id: i64) -> HeraclionResult<Option<PayrollEntry>> {
        self.trip(StorageOp::GetPayroll)?;
        Ok(self.read()?.payrolls.get(&id).cloned())
    }

    async fn list_payrolls(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> HeraclionResult<Vec<PayrollEntry>> {
        self.trip(StorageOp::ListPayrolls)?;
        let tables = self.read()?;
        let mut rows: Vec<PayrollEntry> = tables
            .payrolls
            .values()
            .filter(|payroll| {
                date_from.is_none_or(|from| payroll.date >= from)
                    && date_to.is_none_or(|to| payroll.date <= to)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn payroll_for_movement(
        &self,
        movement_id: i64,
    ) -> HeraclionResult<Option<PayrollEntry>> {
        self.trip(StorageOp::GetPayroll)?;
        let tables = self.read()?;
        Ok(mirrored_by(&tables, movement_id).cloned())
    }

    async fn trash_payroll_with_movement(
        &self,
        id: i64,
        deleted_by: &str,
    ) -> HeraclionResult<Vec<TrashedRecord>> {
        self.trip(StorageOp::TrashPayroll)?;
        let mut tables = self.write()?;
        let now = Self::now();
        let payroll = tables
            .payrolls
            .get(&id)
            .ok_or_else(|| HeraclionError::not_found("PayrollEntry", id))?;

        let mut records = vec![TrashedRecord::capture(PAYROLL_TABLE, payroll, deleted_by, now)?];
        let movement_id = payroll.cash_movement_id;
        if let Some(movement) = movement_id.and_then(|mid| tables.movements.get(&mid)) {
            records.push(TrashedRecord::capture(CASH_TABLE, movement, deleted_by, now)?);
        }

        tables.payrolls.remove(&id);
        if let Some(mid) = movement_id {
            tables.movements.remove(&mid);
        }
        tables.trash.extend(records.iter().cloned());
        Ok(records)
    }

    async fn get_trashed(&self, trash_id: Uuid) -> HeraclionResult<Option<TrashedRecord>> {
        self.trip(StorageOp::GetTrashed)?;
        Ok(self
            .read()?
            .trash
            .iter()
            .find(|record| record.id == trash_id)
            .cloned())
    }

    async fn list_trash(&self, source_table: Option<&str>) -> HeraclionResult<Vec<TrashedRecord>> {
        self.trip(StorageOp::ListTrash)?;
        Ok(self
            .read()?
            .trash
            .iter()
            .filter(|record| source_table.is_none_or(|table| record.source_table == table))
            .cloned()
            .collect())
    }

    async fn restore_record(
        &self,
        trash_id: Uuid,
        record: &RestoredRecord,
    ) -> HeraclionResult<()> {
        self.trip(StorageOp::RestoreRecord)?;
        let mut tables = self.write()?;
        let position = tables
            .trash
            .iter()
            .position(|trashed| trashed.id == trash_id)
            .ok_or_else(|| HeraclionError::not_found("TrashedRecord", trash_id))?;

        match record {
            RestoredRecord::Cash(movement) => {
                if tables.movements.contains_key(&movement.id) {
                    return Err(HeraclionError::Validation(format!(
                        "cash movement {} already exists",
                        movement.id
                    )));
                }
                tables.last_movement_id = tables.last_movement_id.max(movement.id);
                tables.movements.insert(movement.id, movement.clone());
            }
            RestoredRecord::Payroll(payroll) => {
                if tables.payrolls.contains_key(&payroll.id) {
                    return Err(HeraclionError::Validation(format!(
                        "payroll entry {} already exists",
                        payroll.id
                    )));
                }
                tables.last_payroll_id = tables.last_payroll_id.max(payroll.id);
                tables.payrolls.insert(payroll.id, payroll.clone());
            }
        }

        tables.trash.remove(position);
        Ok(())
    }

    async fn restore_payroll_with_movement(
        &self,
        payroll_trash_id: Uuid,
        payroll: &PayrollEntry,
        movement: Option<(Uuid, &CashMovement)>,
    ) -> HeraclionResult<()> {
        // Every check runs before the first write, so a failure leaves both
        // rows in the trash.
        let mut tables = self.write()?;

        self.trip(StorageOp::RestorePayroll)?;
        if !tables.trash.iter().any(|record| record.id == payroll_trash_id) {
            return Err(HeraclionError::not_found("TrashedRecord", payroll_trash_id));
        }
        if tables.payrolls.contains_key(&payroll.id) {
            return Err(HeraclionError::Validation(format!(
                "payroll entry {} already exists",
                payroll.id
            )));
        }

        if let Some((movement_trash_id, cash)) = movement {
            self.trip(StorageOp::RestoreRecord)?;
            if !tables.trash.iter().any(|record| record.id == movement_trash_id) {
                return Err(HeraclionError::not_found("TrashedRecord", movement_trash_id));
            }
            if tables.movements.contains_key(&cash.id) {
                return Err(HeraclionError::Validation(format!(
                    "cash movement {} already exists",
                    cash.id
                )));
            }
            tables.last_movement_id = tables.last_movement_id.max(cash.id);
            tables.movements.insert(cash.id, cash.clone());
            tables.trash.retain(|record| record.id != movement_trash_id);
        }

        tables.last_payroll_id = tables.last_payroll_id.max(payroll.id);
        tables.payrolls.insert(payroll.id, payroll.clone());
        tables.trash.retain(|record| record.id != payroll_trash_id);
        Ok(())
    }

    async fn last_counter(&self, prefix: &str, year: i32) -> HeraclionResult<Option<u64>> {
        self.trip(StorageOp::LastCounter)?;
        Ok(self
            .read()?
            .counters
            .get(&(prefix.to_string(), year))
            .copied())
    }

    async fn compare_and_set_counter(
        &self,
        prefix: &str,
        year: i32,
        expected: Option<u64>,
        next: u64,
    ) -> HeraclionResult<bool> {
        self.trip(StorageOp::ClaimCounter)?;
        let mut tables = self.write()?;
        let key = (prefix.to_string(), year);
        if self.take_conflict(StorageOp::ClaimCounter)? {
            let current = tables.counters.get(&key).copied().unwrap_or(0);
            tables.counters.insert(key, current + 1);
            return Ok(false);
        }
        if tables.counters.get(&key).copied() != expected {
            return Ok(false);
        }
        tables.counters.insert(key, next);
        Ok(true)
    }
}
