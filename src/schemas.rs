use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{NewTransaction, Transaction, TransactionStatus};

pub const VOID_SUCCESS: &str = "00";
pub const VOID_FAILURE: &str = "02";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivationRequest {
    pub product_ean: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub card_no: Option<String>,
    pub invoice_no: String,
    pub unique_ref: String,
    pub store_code: String,
    pub device_id: String,
    pub txn_date: DateTime<Utc>,
}

impl From<ActivationRequest> for NewTransaction {
    fn from(req: ActivationRequest) -> Self {
        NewTransaction {
            unique_ref: req.unique_ref,
            product_code: req.product_ean,
            amount: req.amount,
            currency: req.currency,
            card_no: req.card_no,
            invoice_no: req.invoice_no,
            store_code: req.store_code,
            device_id: req.device_id,
            txn_date: req.txn_date,
        }
    }
}

/// Returned by activation and by status lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivationResponse {
    pub product_ean: String,
    pub amount: i64,
    pub currency: String,
    pub card_no: Option<String>,
    pub invoice_no: String,
    pub unique_ref: String,
    pub activation_code: Option<String>,
    pub status: String,
    pub tnc: Option<String>,
    pub activation_steps: Option<String>,
}

impl From<&Transaction> for ActivationResponse {
    fn from(tx: &Transaction) -> Self {
        ActivationResponse {
            product_ean: tx.product_code.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            card_no: tx.card_no.clone(),
            invoice_no: tx.invoice_no.clone(),
            unique_ref: tx.unique_ref.clone(),
            activation_code: tx.activation_code.clone(),
            status: tx.status.as_str().to_string(),
            tnc: tx.tnc.clone(),
            activation_steps: tx.activation_steps.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoidRequest {
    pub unique_ref: String,
    pub invoice_no: String,
    pub product_ean: String,
}

/// Void outcome. Vendor declines are reported here with `response_code = "02"`
/// rather than as an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VoidResponse {
    pub response_code: String,
    pub message: String,
    pub status: String,
    pub unique_ref: String,
    pub void_code: Option<String>,
}

impl VoidResponse {
    pub fn voided(unique_ref: &str, message: &str, void_code: Option<String>) -> Self {
        VoidResponse {
            response_code: VOID_SUCCESS.to_string(),
            message: message.to_string(),
            status: TransactionStatus::Voided.as_str().to_string(),
            unique_ref: unique_ref.to_string(),
            void_code,
        }
    }

    pub fn failed(unique_ref: &str, message: impl Into<String>) -> Self {
        VoidResponse {
            response_code: VOID_FAILURE.to_string(),
            message: message.into(),
            status: TransactionStatus::Failed.as_str().to_string(),
            unique_ref: unique_ref.to_string(),
            void_code: None,
        }
    }
}
