//! Validation utilities

use bigdecimal::BigDecimal;

use crate::traits::*;
use crate::types::*;

/// Validate that an amount is not zero
pub fn validate_non_zero_amount(amount: &BigDecimal) -> HeraclionResult<()> {
    if *amount == BigDecimal::from(0) {
        Err(HeraclionError::Validation(
            "Amount cannot be zero".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that a movement label is valid
pub fn validate_label(label: &str) -> HeraclionResult<()> {
    if label.trim().is_empty() {
        return Err(HeraclionError::Validation(
            "Movement label cannot be empty".to_string(),
        ));
    }

    if label.chars().count() > 255 {
        return Err(HeraclionError::Validation(
            "Movement label cannot exceed 255 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a category name is valid
pub fn validate_category(category: &str) -> HeraclionResult<()> {
    if category.trim().is_empty() {
        return Err(HeraclionError::Validation(
            "Category cannot be blank".to_string(),
        ));
    }

    if category.chars().count() > 100 {
        return Err(HeraclionError::Validation(
            "Category cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a document reference parses as a document number
pub fn validate_reference_document(reference: &str) -> HeraclionResult<()> {
    crate::numbering::parse(reference)
        .map(|_| ())
        .map_err(|e| HeraclionError::Validation(format!("Invalid reference document: {}", e)))
}

/// Enhanced movement validator with detailed checks
pub struct EnhancedMovementValidator;

impl MovementValidator for EnhancedMovementValidator {
    fn validate_movement(&self, movement: &NewCashMovement) -> HeraclionResult<()> {
        // Basic validation
        DefaultMovementValidator.validate_movement(movement)?;

        validate_label(&movement.label)?;
        validate_non_zero_amount(&movement.amount)?;

        if let Some(ref category) = movement.category {
            validate_category(category)?;
        }

        if let Some(ref reference) = movement.reference_document {
            validate_reference_document(reference)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn movement(label: &str, amount: i64) -> NewCashMovement {
        NewCashMovement::entree(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            label.to_string(),
            BigDecimal::from(amount),
        )
    }

    #[test]
    fn test_default_validator() {
        assert!(DefaultMovementValidator
            .validate_movement(&movement("Vente", 10))
            .is_ok());
        assert!(DefaultMovementValidator
            .validate_movement(&movement("  ", 10))
            .is_err());

        let mut wrong_sign = movement("Vente", 10);
        wrong_sign.kind = MovementKind::Sortie;
        assert!(DefaultMovementValidator.validate_movement(&wrong_sign).is_err());
    }

    #[test]
    fn test_enhanced_validator() {
        let validator = EnhancedMovementValidator;

        assert!(validator.validate_movement(&movement("Vente", 10)).is_ok());
        assert!(validator.validate_movement(&movement("Vente", 0)).is_err());
        assert!(validator
            .validate_movement(&movement(&"x".repeat(256), 10))
            .is_err());

        let with_reference = movement("Règlement facture", 10).with_reference("FAC-2024-001");
        assert!(validator.validate_movement(&with_reference).is_ok());

        let bad_reference = movement("Règlement facture", 10).with_reference("facture 1");
        assert!(validator.validate_movement(&bad_reference).is_err());

        let blank_category = movement("Vente", 10).with_category(" ");
        assert!(validator.validate_movement(&blank_category).is_err());
    }
}
