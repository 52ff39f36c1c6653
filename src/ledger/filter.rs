//! Filtering and ordering of cash movements

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::{CashMovement, MovementKind};

/// Criteria for listing movements. Every present option narrows the result
/// (AND semantics); absent options impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementFilter {
    /// Inclusive lower date bound
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub date_to: Option<NaiveDate>,
    pub kind: Option<MovementKind>,
    /// Exact category match
    pub category: Option<String>,
    /// Inclusive lower bound on the signed amount
    pub amount_min: Option<BigDecimal>,
    /// Inclusive upper bound on the signed amount
    pub amount_max: Option<BigDecimal>,
    /// Case-insensitive substring of the label
    pub label_contains: Option<String>,
    pub archived: Option<bool>,
}

impl MovementFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn kind(mut self, kind: MovementKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn amount_min(mut self, amount: BigDecimal) -> Self {
        self.amount_min = Some(amount);
        self
    }

    pub fn amount_max(mut self, amount: BigDecimal) -> Self {
        self.amount_max = Some(amount);
        self
    }

    pub fn label_contains(mut self, needle: impl Into<String>) -> Self {
        self.label_contains = Some(needle.into());
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Whether `movement` satisfies every present criterion
    pub fn matches(&self, movement: &CashMovement) -> bool {
        if let Some(from) = self.date_from {
            if movement.date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if movement.date > to {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if movement.kind != kind {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if movement.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(ref min) = self.amount_min {
            if movement.amount < *min {
                return false;
            }
        }
        if let Some(ref max) = self.amount_max {
            if movement.amount > *max {
                return false;
            }
        }
        if let Some(ref needle) = self.label_contains {
            if !movement
                .label
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(archived) = self.archived {
            if movement.archived != archived {
                return false;
            }
        }
        true
    }
}

/// Ledger order: date ascending, then id ascending
pub fn ledger_order(a: &CashMovement, b: &CashMovement) -> Ordering {
    a.date.cmp(&b.date).then(a.id.cmp(&b.id))
}
