//! Mapping of loosely-typed caller input onto the strict domain types

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::types::*;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date field
pub fn parse_date(field: &str, raw: Option<&str>) -> HeraclionResult<NaiveDate> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HeraclionError::Validation(format!("{} is required", field)))?;

    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        HeraclionError::Validation(format!("{} must be a YYYY-MM-DD date, got '{}'", field, raw))
    })
}

/// Parse an amount given as a JSON number or a numeric string
pub fn parse_amount(field: &str, raw: Option<&Value>) -> HeraclionResult<BigDecimal> {
    let text = match raw {
        None | Some(Value::Null) => {
            return Err(HeraclionError::Validation(format!("{} is required", field)))
        }
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => {
            return Err(HeraclionError::Validation(format!(
                "{} must be a number, got {}",
                field, other
            )))
        }
    };

    if text.is_empty() {
        return Err(HeraclionError::Validation(format!("{} is required", field)));
    }

    BigDecimal::from_str(&text).map_err(|_| {
        HeraclionError::Validation(format!("{} must be a number, got '{}'", field, text))
    })
}

/// Pick the value of a field that callers may send under two names.
/// Sending both with different values is rejected.
fn one_of<'a>(
    field: &str,
    (first_name, first): (&str, Option<&'a str>),
    (second_name, second): (&str, Option<&'a str>),
) -> HeraclionResult<Option<&'a str>> {
    let first = first.map(str::trim).filter(|s| !s.is_empty());
    let second = second.map(str::trim).filter(|s| !s.is_empty());

    match (first, second) {
        (Some(a), Some(b)) if a != b => Err(HeraclionError::Validation(format!(
            "{} given twice with different values ('{}' as {}, '{}' as {})",
            field, a, first_name, b, second_name
        ))),
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

/// Cash movement as sent by the front-end, with its historical field names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCashMovement {
    pub date: Option<String>,
    pub libelle: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub type_operation: Option<String>,
    pub amount: Option<Value>,
    pub category: Option<String>,
    pub reference_document: Option<String>,
}

impl RawCashMovement {
    /// Resolve aliases and types into a [`NewCashMovement`].
    ///
    /// When a kind is given the amount is read as a magnitude and signed by
    /// the kind; otherwise the kind follows the sign of the amount.
    pub fn normalize(&self) -> HeraclionResult<NewCashMovement> {
        let date = parse_date("date", self.date.as_deref())?;

        let label = one_of(
            "label",
            ("libelle", self.libelle.as_deref()),
            ("description", self.description.as_deref()),
        )?
        .ok_or_else(|| HeraclionError::Validation("libelle is required".to_string()))?
        .to_string();

        let amount = parse_amount("amount", self.amount.as_ref())?;

        let kind = one_of(
            "kind",
            ("type", self.type_.as_deref()),
            ("type_operation", self.type_operation.as_deref()),
        )?
        .map(|text| {
            MovementKind::parse(text).ok_or_else(|| {
                HeraclionError::Validation(format!("unknown movement type '{}'", text))
            })
        })
        .transpose()?;

        let mut movement = match kind {
            Some(MovementKind::Entree) => NewCashMovement::entree(date, label, amount),
            Some(MovementKind::Sortie) => NewCashMovement::sortie(date, label, amount),
            None => {
                let kind = MovementKind::from_amount(&amount);
                NewCashMovement::new(date, label, kind, amount)
            }
        };

        movement.category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        movement.reference_document = self
            .reference_document
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(movement)
    }
}

/// Payroll line as sent by the front-end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayrollInput {
    pub date: Option<String>,
    pub agent: Option<String>,
    pub amount: Option<Value>,
    pub comment: Option<String>,
    pub currency: Option<String>,
    pub rate: Option<Value>,
}

impl PayrollInput {
    pub fn new(date: &str, agent: &str, amount: impl Into<Value>) -> Self {
        Self {
            date: Some(date.to_string()),
            agent: Some(agent.to_string()),
            amount: Some(amount.into()),
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>, rate: impl Into<Value>) -> Self {
        self.currency = Some(currency.into());
        self.rate = Some(rate.into());
        self
    }

    /// Validate the line and resolve it into a [`NewPayroll`]
    pub fn normalize(&self, default_currency: &str) -> HeraclionResult<NewPayroll> {
        let date = parse_date("date", self.date.as_deref())?;

        let agent = self
            .agent
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HeraclionError::Validation("agent is required".to_string()))?
            .to_string();

        let amount = parse_amount("amount", self.amount.as_ref())?;

        let rate = match self.rate {
            None | Some(Value::Null) => None,
            Some(ref raw) => Some(parse_amount("rate", Some(raw))?),
        };

        let currency = self
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_currency)
            .to_uppercase();

        Ok(NewPayroll {
            date,
            agent,
            amount,
            comment: self.comment.clone().filter(|c| !c.trim().is_empty()),
            currency,
            rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(
            parse_amount("amount", Some(&json!(12345))).unwrap(),
            BigDecimal::from(12345)
        );
        assert_eq!(
            parse_amount("amount", Some(&json!(" 12.50 "))).unwrap(),
            BigDecimal::from_str("12.5").unwrap()
        );
        for bad in [json!("abc"), json!(""), json!(true), json!([1]), json!(null)] {
            let err = parse_amount("amount", Some(&bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", bad);
        }
        assert!(parse_amount("amount", None).is_err());
    }

    #[test]
    fn test_raw_movement_aliases() {
        let raw: RawCashMovement = serde_json::from_value(json!({
            "date": "2024-03-04",
            "description": "Achat fournitures",
            "type_operation": "sortie",
            "amount": "1500",
            "category": "Fournitures"
        }))
        .unwrap();

        let movement = raw.normalize().unwrap();
        assert_eq!(movement.label, "Achat fournitures");
        assert_eq!(movement.kind, MovementKind::Sortie);
        assert_eq!(movement.amount, BigDecimal::from(-1500));
        assert_eq!(movement.category.as_deref(), Some("Fournitures"));
    }

    #[test]
    fn test_raw_movement_kind_from_sign() {
        let raw: RawCashMovement = serde_json::from_value(json!({
            "date": "2024-03-04",
            "libelle": "Vente comptoir",
            "amount": 800
        }))
        .unwrap();

        let movement = raw.normalize().unwrap();
        assert_eq!(movement.kind, MovementKind::Entree);
        assert_eq!(movement.amount, BigDecimal::from(800));
    }

    #[test]
    fn test_raw_movement_conflicting_aliases() {
        let raw = RawCashMovement {
            date: Some("2024-03-04".to_string()),
            libelle: Some("Vente".to_string()),
            description: Some("Achat".to_string()),
            amount: Some(json!(10)),
            ..Default::default()
        };
        assert_eq!(raw.normalize().unwrap_err().kind(), ErrorKind::Validation);

        let raw = RawCashMovement {
            date: Some("2024-03-04".to_string()),
            libelle: Some("Vente".to_string()),
            type_: Some("ENTREE".to_string()),
            type_operation: Some("SORTIE".to_string()),
            amount: Some(json!(10)),
            ..Default::default()
        };
        assert_eq!(raw.normalize().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_payroll_input_validation() {
        let ok = PayrollInput::new("2024-01-31", " Rakoto ", "12345")
            .normalize("MGA")
            .unwrap();
        assert_eq!(ok.agent, "Rakoto");
        assert_eq!(ok.amount, BigDecimal::from(12345));
        assert_eq!(ok.currency, "MGA");

        let missing_agent = PayrollInput {
            agent: None,
            ..PayrollInput::new("2024-01-31", "x", 1)
        };
        let missing_date = PayrollInput {
            date: None,
            ..PayrollInput::new("2024-01-31", "x", 1)
        };
        let bad_date = PayrollInput::new("31/01/2024", "Rakoto", 1);
        let bad_amount = PayrollInput::new("2024-01-31", "Rakoto", "douze");
        let blank_agent = PayrollInput::new("2024-01-31", "   ", 1);

        for input in [missing_agent, missing_date, bad_date, bad_amount, blank_agent] {
            let err = input.normalize("MGA").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_payroll_input_currency_and_rate() {
        let payroll = PayrollInput::new("2024-01-31", "Rabe", 100)
            .with_currency("eur", "4850.5")
            .normalize("MGA")
            .unwrap();
        assert_eq!(payroll.currency, "EUR");
        assert_eq!(payroll.rate, Some(BigDecimal::from_str("4850.5").unwrap()));
    }
}
