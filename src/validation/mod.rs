use std::fmt;

use crate::error::AppError;
use crate::schemas::{ActivationRequest, VoidRequest};

pub const PRODUCT_EAN_MAX_LEN: usize = 50;
pub const INVOICE_NO_MAX_LEN: usize = 50;
pub const UNIQUE_REF_MAX_LEN: usize = 100;
pub const STORE_CODE_MAX_LEN: usize = 20;
pub const DEVICE_ID_MAX_LEN: usize = 50;
pub const CARD_NO_MAX_LEN: usize = 100;
pub const CURRENCY_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control() || ch.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if sanitize_string(value).is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

fn validate_text(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, max_len)
}

/// ISO-4217 style code: exactly three uppercase ASCII letters.
pub fn validate_currency(currency: &str) -> ValidationResult {
    if currency.len() != CURRENCY_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            "must be a 3-letter uppercase code",
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: i64) -> ValidationResult {
    if amount <= 0 {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_activation(req: &ActivationRequest) -> ValidationResult {
    validate_text("product_ean", &req.product_ean, PRODUCT_EAN_MAX_LEN)?;
    validate_positive_amount(req.amount)?;
    validate_currency(&req.currency)?;
    if let Some(card_no) = &req.card_no {
        validate_max_len("card_no", card_no, CARD_NO_MAX_LEN)?;
    }
    validate_text("invoice_no", &req.invoice_no, INVOICE_NO_MAX_LEN)?;
    validate_text("unique_ref", &req.unique_ref, UNIQUE_REF_MAX_LEN)?;
    validate_text("store_code", &req.store_code, STORE_CODE_MAX_LEN)?;
    validate_text("device_id", &req.device_id, DEVICE_ID_MAX_LEN)?;

    Ok(())
}

pub fn validate_void(req: &VoidRequest) -> ValidationResult {
    validate_text("unique_ref", &req.unique_ref, UNIQUE_REF_MAX_LEN)?;
    validate_text("invoice_no", &req.invoice_no, INVOICE_NO_MAX_LEN)?;
    validate_text("product_ean", &req.product_ean, PRODUCT_EAN_MAX_LEN)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn activation() -> ActivationRequest {
        ActivationRequest {
            product_ean: "MCF-AV-12M-001".to_string(),
            amount: 25000,
            currency: "INR".to_string(),
            card_no: None,
            invoice_no: "INV-2025-001".to_string(),
            unique_ref: "TXN-2025-001-001".to_string(),
            store_code: "STR001".to_string(),
            device_id: "POS-001".to_string(),
            txn_date: Utc::now(),
        }
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
        assert!(validate_required("field", "\u{0007}").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_currency() {
        assert!(validate_currency("INR").is_ok());
        assert!(validate_currency("inr").is_err());
        assert!(validate_currency("INRS").is_err());
        assert!(validate_currency("IN1").is_err());
    }

    #[test]
    fn accepts_well_formed_activation() {
        assert!(validate_activation(&activation()).is_ok());
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut req = activation();
        req.amount = 0;
        assert_eq!(validate_activation(&req).unwrap_err().field, "amount");
    }

    #[test]
    fn rejects_oversized_store_code() {
        let mut req = activation();
        req.store_code = "S".repeat(STORE_CODE_MAX_LEN + 1);
        assert_eq!(validate_activation(&req).unwrap_err().field, "store_code");
    }

    #[test]
    fn void_requires_all_keys() {
        let req = VoidRequest {
            unique_ref: "R1".to_string(),
            invoice_no: " ".to_string(),
            product_ean: "P1".to_string(),
        };
        let err = validate_void(&req).unwrap_err();
        assert_eq!(err.field, "invoice_no");
        assert_eq!(AppError::from(err).code(), "VAL01");
    }
}
