//! Core types and data structures for the back-office

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trash tag for rows coming from the cash register table
pub const CASH_TABLE: &str = "caisse";
/// Trash tag for rows coming from the payroll table
pub const PAYROLL_TABLE: &str = "paie";

/// Label prefix and category given to cash movements derived from payroll
pub const SALARY_CATEGORY: &str = "Salaire";

/// Direction of a cash register movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Money coming into the register (amount >= 0)
    Entree,
    /// Money leaving the register (amount <= 0)
    Sortie,
}

impl MovementKind {
    /// Parse the textual form used by the front-end (`ENTREE`, `sortie`, ...)
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_uppercase().as_str() {
            "ENTREE" | "ENTRÉE" => Some(MovementKind::Entree),
            "SORTIE" => Some(MovementKind::Sortie),
            _ => None,
        }
    }

    /// Kind implied by the sign of an amount
    pub fn from_amount(amount: &BigDecimal) -> Self {
        if *amount < BigDecimal::from(0) {
            MovementKind::Sortie
        } else {
            MovementKind::Entree
        }
    }

    /// Whether `amount` carries the sign this kind requires
    pub fn accepts(&self, amount: &BigDecimal) -> bool {
        let zero = BigDecimal::from(0);
        match self {
            MovementKind::Entree => *amount >= zero,
            MovementKind::Sortie => *amount <= zero,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entree => "ENTREE",
            MovementKind::Sortie => "SORTIE",
        }
    }
}

/// A cash movement waiting to be stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCashMovement {
    pub date: NaiveDate,
    pub label: String,
    pub kind: MovementKind,
    /// Signed amount, negative for outflows
    pub amount: BigDecimal,
    pub category: Option<String>,
    /// Invoice or payslip number this movement settles
    pub reference_document: Option<String>,
}

impl NewCashMovement {
    /// Create a movement with an explicit kind and signed amount
    pub fn new(date: NaiveDate, label: String, kind: MovementKind, amount: BigDecimal) -> Self {
        Self {
            date,
            label,
            kind,
            amount,
            category: None,
            reference_document: None,
        }
    }

    /// Create an inflow; the magnitude is stored as a positive amount
    pub fn entree(date: NaiveDate, label: String, magnitude: BigDecimal) -> Self {
        Self::new(date, label, MovementKind::Entree, magnitude.abs())
    }

    /// Create an outflow; the magnitude is stored as a negative amount
    pub fn sortie(date: NaiveDate, label: String, magnitude: BigDecimal) -> Self {
        Self::new(date, label, MovementKind::Sortie, -magnitude.abs())
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference_document = Some(reference.into());
        self
    }
}

/// A stored cash register movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashMovement {
    pub id: i64,
    pub date: NaiveDate,
    pub label: String,
    pub kind: MovementKind,
    pub amount: BigDecimal,
    pub category: Option<String>,
    pub reference_document: Option<String>,
    /// Set by monthly archiving; archived rows stay in the live table
    #[serde(default)]
    pub archived: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CashMovement {
    /// Materialize a stored row from its insert shape
    pub fn from_new(id: i64, movement: &NewCashMovement, now: NaiveDateTime) -> Self {
        Self {
            id,
            date: movement.date,
            label: movement.label.clone(),
            kind: movement.kind,
            amount: movement.amount.clone(),
            category: movement.category.clone(),
            reference_document: movement.reference_document.clone(),
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The insert shape of this row, used to re-validate after a patch
    pub fn to_new(&self) -> NewCashMovement {
        NewCashMovement {
            date: self.date,
            label: self.label.clone(),
            kind: self.kind,
            amount: self.amount.clone(),
            category: self.category.clone(),
            reference_document: self.reference_document.clone(),
        }
    }
}

/// Partial update of a cash movement; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashMovementPatch {
    pub date: Option<NaiveDate>,
    pub label: Option<String>,
    pub kind: Option<MovementKind>,
    pub amount: Option<BigDecimal>,
    /// `Some(None)` clears the category
    pub category: Option<Option<String>>,
    pub reference_document: Option<Option<String>>,
}

impl CashMovementPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.label.is_none()
            && self.kind.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.reference_document.is_none()
    }

    /// Whether the patch changes more than the reference document, i.e.
    /// the posting itself
    pub fn changes_posting(&self) -> bool {
        self.date.is_some()
            || self.label.is_some()
            || self.kind.is_some()
            || self.amount.is_some()
            || self.category.is_some()
    }

    /// Apply the present fields onto `movement`
    pub fn apply_to(&self, movement: &mut CashMovement) {
        if let Some(date) = self.date {
            movement.date = date;
        }
        if let Some(ref label) = self.label {
            movement.label = label.clone();
        }
        if let Some(kind) = self.kind {
            movement.kind = kind;
        }
        if let Some(ref amount) = self.amount {
            movement.amount = amount.clone();
        }
        if let Some(ref category) = self.category {
            movement.category = category.clone();
        }
        if let Some(ref reference) = self.reference_document {
            movement.reference_document = reference.clone();
        }
    }
}

/// A payroll line waiting to be stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayroll {
    pub date: NaiveDate,
    pub agent: String,
    pub amount: BigDecimal,
    pub comment: Option<String>,
    pub currency: String,
    /// Exchange rate to the reference currency, when paid in another one
    pub rate: Option<BigDecimal>,
}

/// A stored payroll line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub agent: String,
    pub amount: BigDecimal,
    pub comment: Option<String>,
    pub currency: String,
    pub rate: Option<BigDecimal>,
    /// Mirrored outflow written by the synchronizer
    pub cash_movement_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl PayrollEntry {
    pub fn from_new(id: i64, payroll: &NewPayroll, now: NaiveDateTime) -> Self {
        Self {
            id,
            date: payroll.date,
            agent: payroll.agent.clone(),
            amount: payroll.amount.clone(),
            comment: payroll.comment.clone(),
            currency: payroll.currency.clone(),
            rate: payroll.rate.clone(),
            cash_movement_id: None,
            created_at: now,
        }
    }
}

/// A row moved to the generic trash table before being removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashedRecord {
    pub id: Uuid,
    /// Name of the table the row was removed from
    pub source_table: String,
    /// The row as it was when deleted
    pub payload: serde_json::Value,
    pub deleted_by: String,
    pub deleted_at: NaiveDateTime,
}

impl TrashedRecord {
    /// Snapshot `row` for the trash table
    pub fn capture<T: Serialize>(
        source_table: &str,
        row: &T,
        deleted_by: &str,
        deleted_at: NaiveDateTime,
    ) -> HeraclionResult<Self> {
        let payload = serde_json::to_value(row).map_err(|e| {
            HeraclionError::FatalStorage(format!("cannot serialize {} row: {}", source_table, e))
        })?;
        Ok(Self {
            id: Uuid::new_v4(),
            source_table: source_table.to_string(),
            payload,
            deleted_by: deleted_by.to_string(),
            deleted_at,
        })
    }
}

/// A trashed row validated against the schema of its source table
#[derive(Debug, Clone, PartialEq)]
pub enum RestoredRecord {
    Cash(CashMovement),
    Payroll(PayrollEntry),
}

impl RestoredRecord {
    /// Decode a trash payload, rejecting unknown tables and malformed rows
    pub fn from_trash(record: &TrashedRecord) -> HeraclionResult<Self> {
        match record.source_table.as_str() {
            CASH_TABLE => {
                let movement: CashMovement = serde_json::from_value(record.payload.clone())
                    .map_err(|e| {
                        HeraclionError::Validation(format!(
                            "trashed row {} is not a valid cash movement: {}",
                            record.id, e
                        ))
                    })?;
                if !movement.kind.accepts(&movement.amount) {
                    return Err(HeraclionError::Validation(format!(
                        "trashed row {} has an amount inconsistent with its kind",
                        record.id
                    )));
                }
                Ok(RestoredRecord::Cash(movement))
            }
            PAYROLL_TABLE => {
                let payroll: PayrollEntry = serde_json::from_value(record.payload.clone())
                    .map_err(|e| {
                        HeraclionError::Validation(format!(
                            "trashed row {} is not a valid payroll entry: {}",
                            record.id, e
                        ))
                    })?;
                Ok(RestoredRecord::Payroll(payroll))
            }
            other => Err(HeraclionError::Validation(format!(
                "cannot restore rows of unknown table '{}'",
                other
            ))),
        }
    }
}

/// Structured error kind handed to callers alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InvalidArgument,
    Parse,
    NotFound,
    TransientStorage,
    FatalStorage,
}

/// Errors that can occur in the back-office core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeraclionError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage temporarily unavailable: {0}")]
    TransientStorage(String),
    #[error("Storage error: {0}")]
    FatalStorage(String),
}

impl HeraclionError {
    /// Not-found error for an entity and its identifier
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        HeraclionError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HeraclionError::Validation(_) => ErrorKind::Validation,
            HeraclionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            HeraclionError::Parse(_) => ErrorKind::Parse,
            HeraclionError::NotFound(_) => ErrorKind::NotFound,
            HeraclionError::TransientStorage(_) => ErrorKind::TransientStorage,
            HeraclionError::FatalStorage(_) => ErrorKind::FatalStorage,
        }
    }

    /// Only connectivity hiccups are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, HeraclionError::TransientStorage(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HeraclionError::NotFound(_))
    }
}

/// Result type for back-office operations
pub type HeraclionResult<T> = Result<T, HeraclionError>;
