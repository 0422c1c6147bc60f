//! Sale activation domain entity.
//! Framework-agnostic representation of one point-of-sale activation and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a transaction.
///
/// `New` and `Pending` are transient, `Failed` and `Voided` are terminal.
/// `Activated` is only non-terminal with respect to voiding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    New,
    Pending,
    Activated,
    Failed,
    Voided,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::New => "NEW",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Activated => "ACTIVATED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Voided => "VOIDED",
        }
    }

    /// Edges of the activation/void state machine.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (New, Activated)
                | (New, Failed)
                | (New, Pending)
                | (Pending, Activated)
                | (Pending, Failed)
                | (Pending, Pending)
                | (Activated, Voided)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(TransactionStatus::New),
            "PENDING" => Ok(TransactionStatus::Pending),
            "ACTIVATED" => Ok(TransactionStatus::Activated),
            "FAILED" => Ok(TransactionStatus::Failed),
            "VOIDED" => Ok(TransactionStatus::Voided),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal transition {from} -> {to} for {unique_ref}")]
pub struct InvalidTransition {
    pub unique_ref: String,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

/// Fields captured from the point of sale when a transaction is first created.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub unique_ref: String,
    pub product_code: String,
    pub amount: i64,
    pub currency: String,
    pub card_no: Option<String>,
    pub invoice_no: String,
    pub store_code: String,
    pub device_id: String,
    pub txn_date: DateTime<Utc>,
}

/// Domain entity representing a sale activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub unique_ref: String,
    pub product_code: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub card_no: Option<String>,
    pub invoice_no: String,
    pub store_code: String,
    pub device_id: String,
    pub txn_date: DateTime<Utc>,
    pub status: TransactionStatus,
    pub activation_code: Option<String>,
    pub void_code: Option<String>,
    pub tnc: Option<String>,
    pub activation_steps: Option<String>,
    pub vendor_raw_request: Option<String>,
    pub vendor_raw_response: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(input: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            unique_ref: input.unique_ref,
            product_code: input.product_code,
            amount: input.amount,
            currency: input.currency,
            card_no: input.card_no,
            invoice_no: input.invoice_no,
            store_code: input.store_code,
            device_id: input.device_id,
            txn_date: input.txn_date,
            status: TransactionStatus::New,
            activation_code: None,
            void_code: None,
            tnc: None,
            activation_steps: None,
            vendor_raw_request: None,
            vendor_raw_response: None,
            error_code: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: TransactionStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                unique_ref: self.unique_ref.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_activated(
        &mut self,
        activation_code: Option<String>,
        tnc: Option<String>,
        activation_steps: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Activated)?;
        self.activation_code = activation_code;
        self.tnc = tnc;
        self.activation_steps = activation_steps;
        self.error_code = None;
        self.error_message = None;
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        error_code: Option<String>,
        error_message: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Failed)?;
        if error_code.is_some() {
            self.error_code = error_code;
        }
        self.error_message = Some(error_message.into());
        Ok(())
    }

    /// Records a vendor timeout: the outcome is unknown and must be re-driven.
    pub fn mark_pending(
        &mut self,
        error_code: &str,
        error_message: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Pending)?;
        self.error_code = Some(error_code.to_string());
        self.error_message = Some(error_message.into());
        Ok(())
    }

    /// Counts one vendor attempt against the retry budget.
    pub fn record_retry_attempt(&mut self) {
        self.retry_count += 1;
    }

    pub fn mark_voided(&mut self, void_code: Option<String>) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Voided)?;
        self.void_code = void_code;
        Ok(())
    }

    pub fn record_vendor_exchange(&mut self, raw_request: Option<String>, raw_response: Option<String>) {
        if raw_request.is_some() {
            self.vendor_raw_request = raw_request;
        }
        if raw_response.is_some() {
            self.vendor_raw_response = raw_response;
        }
    }
}
