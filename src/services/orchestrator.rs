//! Activation/void state machine.
//!
//! The only cross-request coordination is the unique key on `unique_ref` in the
//! transaction store. No lock is held across a vendor call.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::context::RequestContext;
use crate::domain::{AmountBound, NewTransaction, Product, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::{ProductCatalog, RepositoryError, TransactionRepository};
use crate::schemas::{ActivationRequest, ActivationResponse, VoidRequest, VoidResponse};
use crate::vendor::{VendorAdapter, VendorRegistry, VendorResult};

pub const DEFAULT_MAX_RETRIES: i32 = 3;

const TIMEOUT_CODE: &str = "SA04";
const NO_ADAPTER_CODE: &str = "VND01";
const VENDOR_ERROR_CODE: &str = "VND02";

pub struct ActivationOrchestrator {
    transactions: Arc<dyn TransactionRepository>,
    catalog: Arc<dyn ProductCatalog>,
    vendors: VendorRegistry,
    max_retries: i32,
}

impl ActivationOrchestrator {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        catalog: Arc<dyn ProductCatalog>,
        vendors: VendorRegistry,
    ) -> Self {
        Self {
            transactions,
            catalog,
            vendors,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn process_activation(
        &self,
        ctx: &RequestContext,
        request: ActivationRequest,
    ) -> Result<ActivationResponse, AppError> {
        tracing::info!(
            unique_ref = %request.unique_ref,
            product_ean = %request.product_ean,
            correlation_id = %ctx.correlation_id,
            "Processing activation"
        );

        if let Some(existing) = self
            .transactions
            .find_by_unique_ref(&request.unique_ref)
            .await?
        {
            tracing::info!(
                unique_ref = %existing.unique_ref,
                status = %existing.status,
                "Duplicate request, returning existing result"
            );
            return Ok(ActivationResponse::from(&existing));
        }

        let product = self.resolve_product(&request.product_ean).await?;

        if product.currency != request.currency {
            return Err(AppError::CurrencyMismatch {
                requested: request.currency,
                expected: product.currency,
            });
        }

        product.check_amount(request.amount).map_err(|bound| match bound {
            AmountBound::Below(min) => {
                AppError::AmountOutOfRange(format!("Amount below minimum: {}", min))
            }
            AmountBound::Above(max) => {
                AppError::AmountOutOfRange(format!("Amount above maximum: {}", max))
            }
        })?;

        let unique_ref = request.unique_ref.clone();
        let candidate = Transaction::new(NewTransaction::from(request));
        let mut tx = match self.transactions.insert(&candidate).await {
            Ok(tx) => tx,
            Err(RepositoryError::Duplicate(_)) => {
                tracing::warn!(
                    unique_ref = %unique_ref,
                    "Duplicate key on insert, returning concurrently created transaction"
                );
                let existing = self
                    .transactions
                    .find_by_unique_ref(&unique_ref)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "transaction {} rejected as duplicate but not readable",
                            unique_ref
                        ))
                    })?;
                return Ok(ActivationResponse::from(&existing));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(unique_ref = %tx.unique_ref, "Transaction record created");

        let adapter = match self.vendors.resolve(&product.vendor_code) {
            Some(adapter) => adapter,
            None => {
                let err = AppError::NoAdapterConfigured(product.vendor_code.clone());
                tx.mark_failed(Some(NO_ADAPTER_CODE.to_string()), err.to_string())?;
                self.transactions.update(&tx).await?;
                return Err(err);
            }
        };

        self.drive_activation(ctx, tx, adapter.as_ref()).await
    }

    /// Runs the vendor call for a freshly created transaction and persists the outcome.
    async fn drive_activation(
        &self,
        ctx: &RequestContext,
        mut tx: Transaction,
        adapter: &dyn VendorAdapter,
    ) -> Result<ActivationResponse, AppError> {
        match adapter.activate(ctx, &tx).await {
            Ok(VendorResult::Success(success)) => {
                tx.record_vendor_exchange(success.raw_request, success.raw_response);
                tx.mark_activated(success.code, success.terms_url, success.steps)?;
                let saved = self.transactions.update(&tx).await?;
                tracing::info!(unique_ref = %saved.unique_ref, vendor = adapter.name(), "Activation successful");
                Ok(ActivationResponse::from(&saved))
            }
            Ok(VendorResult::Failure(failure)) => {
                tx.record_vendor_exchange(failure.raw_request, failure.raw_response);
                let message = failure
                    .message
                    .unwrap_or_else(|| "Vendor declined activation".to_string());
                tx.mark_failed(failure.code, message)?;
                let saved = self.transactions.update(&tx).await?;
                tracing::error!(
                    unique_ref = %saved.unique_ref,
                    vendor = adapter.name(),
                    error_code = ?saved.error_code,
                    error_message = ?saved.error_message,
                    "Activation failed"
                );
                Ok(ActivationResponse::from(&saved))
            }
            Ok(VendorResult::Timeout) => {
                let err = AppError::VendorTimeout(adapter.name().to_string());
                tx.record_retry_attempt();
                // With no retry budget left the sweep would never pick the row up.
                if tx.retry_count >= self.max_retries {
                    tx.mark_failed(Some(TIMEOUT_CODE.to_string()), "Max retries exceeded")?;
                } else {
                    tx.mark_pending(TIMEOUT_CODE, err.to_string())?;
                }
                let saved = self.transactions.update(&tx).await?;
                tracing::warn!(
                    unique_ref = %saved.unique_ref,
                    vendor = adapter.name(),
                    retry_count = saved.retry_count,
                    status = %saved.status,
                    "Vendor timeout on activation"
                );
                Err(err)
            }
            Err(e) => {
                let err = AppError::Vendor(e.to_string());
                tx.mark_failed(Some(VENDOR_ERROR_CODE.to_string()), err.to_string())?;
                self.transactions.update(&tx).await?;
                tracing::error!(unique_ref = %tx.unique_ref, error = %e, "Unexpected vendor error");
                Err(err)
            }
        }
    }

    /// Reverses an activated transaction. Vendor declines and unexpected adapter
    /// faults come back as a `"02"` response; only a vendor timeout is an error.
    pub async fn process_void(
        &self,
        ctx: &RequestContext,
        request: VoidRequest,
    ) -> Result<VoidResponse, AppError> {
        tracing::info!(
            unique_ref = %request.unique_ref,
            correlation_id = %ctx.correlation_id,
            "Processing void"
        );

        let mut tx = self
            .transactions
            .find_by_unique_ref(&request.unique_ref)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(request.unique_ref.clone()))?;

        if tx.status == TransactionStatus::Voided {
            tracing::info!(unique_ref = %tx.unique_ref, "Transaction already voided");
            return Ok(VoidResponse::voided(
                &tx.unique_ref,
                "Already voided",
                tx.void_code.clone(),
            ));
        }

        if tx.status != TransactionStatus::Activated {
            return Err(AppError::NotActivated(tx.unique_ref.clone()));
        }

        if tx.invoice_no != request.invoice_no || tx.product_code != request.product_ean {
            return Err(AppError::InvoiceProductMismatch(tx.unique_ref.clone()));
        }

        let product = self.resolve_product(&tx.product_code).await?;
        let adapter = self
            .vendors
            .resolve(&product.vendor_code)
            .ok_or_else(|| AppError::NoAdapterConfigured(product.vendor_code.clone()))?;

        match adapter.void(ctx, &tx).await {
            Ok(VendorResult::Success(success)) => {
                tx.mark_voided(success.code)?;
                let saved = self.transactions.update(&tx).await?;
                tracing::info!(unique_ref = %saved.unique_ref, vendor = adapter.name(), "Void successful");
                Ok(VoidResponse::voided(
                    &saved.unique_ref,
                    "Void successful",
                    saved.void_code.clone(),
                ))
            }
            Ok(VendorResult::Failure(failure)) => {
                tracing::error!(
                    unique_ref = %tx.unique_ref,
                    vendor = adapter.name(),
                    error_code = ?failure.code,
                    error_message = ?failure.message,
                    "Void failed"
                );
                Ok(VoidResponse::failed(
                    &tx.unique_ref,
                    failure
                        .message
                        .unwrap_or_else(|| "Vendor void failed".to_string()),
                ))
            }
            Ok(VendorResult::Timeout) => {
                tracing::warn!(unique_ref = %tx.unique_ref, vendor = adapter.name(), "Vendor timeout during void");
                Err(AppError::VendorTimeout(adapter.name().to_string()))
            }
            Err(e) => {
                tracing::error!(unique_ref = %tx.unique_ref, error = %e, "Unexpected error during void");
                Ok(VoidResponse::failed(
                    &tx.unique_ref,
                    format!("Vendor error: {}", e),
                ))
            }
        }
    }

    pub async fn get_status(&self, unique_ref: &str) -> Result<Transaction, AppError> {
        tracing::debug!(unique_ref = %unique_ref, "Getting transaction status");
        self.transactions
            .find_by_unique_ref(unique_ref)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(unique_ref.to_string()))
    }

    pub async fn pending_for_retry(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self
            .transactions
            .find_pending_for_retry(self.max_retries, cutoff)
            .await?)
    }

    /// Re-drives one PENDING transaction. Every vendor attempt counts against the
    /// retry budget. A success or decline on the last allowed attempt is kept as
    /// the outcome; only a timeout once the budget is spent forces FAILED with
    /// "Max retries exceeded".
    pub async fn retry_pending(
        &self,
        ctx: &RequestContext,
        candidate: &Transaction,
    ) -> Result<Transaction, AppError> {
        // The scan result may be stale by the time this candidate is reached.
        let mut tx = match self
            .transactions
            .find_by_unique_ref(&candidate.unique_ref)
            .await?
        {
            Some(current) if current.status == TransactionStatus::Pending => current,
            Some(current) => {
                tracing::info!(
                    unique_ref = %current.unique_ref,
                    status = %current.status,
                    "Transaction left PENDING before retry, skipping"
                );
                return Ok(current);
            }
            None => return Err(AppError::TransactionNotFound(candidate.unique_ref.clone())),
        };

        tracing::info!(
            unique_ref = %tx.unique_ref,
            retry_count = tx.retry_count,
            correlation_id = %ctx.correlation_id,
            "Retrying transaction"
        );

        let product = match self.catalog.find_active(&tx.product_code).await? {
            Some(product) => product,
            None => {
                tx.mark_failed(None, "Product no longer available")?;
                tracing::warn!(unique_ref = %tx.unique_ref, "Product no longer available, failing");
                return Ok(self.transactions.update(&tx).await?);
            }
        };

        let adapter = match self.vendors.resolve(&product.vendor_code) {
            Some(adapter) => adapter,
            None => {
                tx.mark_failed(
                    Some(NO_ADAPTER_CODE.to_string()),
                    "Vendor adapter not available",
                )?;
                tracing::warn!(
                    unique_ref = %tx.unique_ref,
                    vendor = %product.vendor_code,
                    "Vendor adapter not available, failing"
                );
                return Ok(self.transactions.update(&tx).await?);
            }
        };

        let outcome = adapter.activate(ctx, &tx).await;
        tx.record_retry_attempt();

        match outcome {
            Ok(VendorResult::Success(success)) => {
                tx.record_vendor_exchange(success.raw_request, success.raw_response);
                tx.mark_activated(success.code, success.terms_url, success.steps)?;
                tracing::info!(unique_ref = %tx.unique_ref, "Retry successful");
            }
            Ok(VendorResult::Failure(failure)) => {
                tx.record_vendor_exchange(failure.raw_request, failure.raw_response);
                let message = failure
                    .message
                    .unwrap_or_else(|| "Vendor declined activation".to_string());
                tx.mark_failed(failure.code, message)?;
                tracing::error!(
                    unique_ref = %tx.unique_ref,
                    error_message = ?tx.error_message,
                    "Retry failed"
                );
            }
            Ok(VendorResult::Timeout) if tx.retry_count >= self.max_retries => {
                tx.mark_failed(Some(TIMEOUT_CODE.to_string()), "Max retries exceeded")?;
                tracing::warn!(
                    unique_ref = %tx.unique_ref,
                    retry_count = tx.retry_count,
                    "Max retries exceeded, failing"
                );
            }
            Ok(VendorResult::Timeout) => {
                tx.mark_pending(
                    TIMEOUT_CODE,
                    AppError::VendorTimeout(adapter.name().to_string()).to_string(),
                )?;
                tracing::warn!(
                    unique_ref = %tx.unique_ref,
                    retry_count = tx.retry_count,
                    "Vendor timeout on retry, still pending"
                );
            }
            Err(e) => {
                tx.mark_failed(
                    Some(VENDOR_ERROR_CODE.to_string()),
                    format!("Retry failed: {}", e),
                )?;
                tracing::error!(unique_ref = %tx.unique_ref, error = %e, "Unexpected vendor error on retry");
            }
        }

        Ok(self.transactions.update(&tx).await?)
    }

    async fn resolve_product(&self, product_code: &str) -> Result<Product, AppError> {
        self.catalog
            .find_active(product_code)
            .await?
            .ok_or_else(|| AppError::ProductNotFound(product_code.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::{InMemoryProductCatalog, InMemoryTransactionRepository};
    use crate::vendor::{VendorError, VendorFailure, VendorSuccess};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Vendor double that replays scripted outcomes and counts calls.
    pub(crate) struct ScriptedVendor {
        code: String,
        activations: Mutex<VecDeque<Result<VendorResult, VendorError>>>,
        voids: Mutex<VecDeque<Result<VendorResult, VendorError>>>,
        pub activate_calls: AtomicUsize,
        pub void_calls: AtomicUsize,
    }

    impl ScriptedVendor {
        pub(crate) fn new(code: &str) -> Self {
            Self {
                code: code.to_string(),
                activations: Mutex::new(VecDeque::new()),
                voids: Mutex::new(VecDeque::new()),
                activate_calls: AtomicUsize::new(0),
                void_calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn on_activate(self, outcome: Result<VendorResult, VendorError>) -> Self {
            self.activations.lock().unwrap().push_back(outcome);
            self
        }

        pub(crate) fn on_void(self, outcome: Result<VendorResult, VendorError>) -> Self {
            self.voids.lock().unwrap().push_back(outcome);
            self
        }
    }

    pub(crate) fn success(code: &str) -> Result<VendorResult, VendorError> {
        Ok(VendorResult::Success(VendorSuccess {
            code: Some(code.to_string()),
            terms_url: Some("https://vendor.example.com/tnc".to_string()),
            steps: Some("Redeem in app".to_string()),
            raw_request: Some("{}".to_string()),
            raw_response: Some("{\"status\":\"SUCCESS\"}".to_string()),
        }))
    }

    pub(crate) fn decline(code: &str, message: &str) -> Result<VendorResult, VendorError> {
        Ok(VendorResult::Failure(VendorFailure {
            code: Some(code.to_string()),
            message: Some(message.to_string()),
            ..Default::default()
        }))
    }

    #[async_trait]
    impl VendorAdapter for ScriptedVendor {
        fn name(&self) -> &str {
            &self.code
        }

        async fn activate(
            &self,
            _ctx: &RequestContext,
            _tx: &Transaction,
        ) -> Result<VendorResult, VendorError> {
            self.activate_calls.fetch_add(1, Ordering::SeqCst);
            self.activations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(VendorResult::Timeout))
        }

        async fn void(
            &self,
            _ctx: &RequestContext,
            _tx: &Transaction,
        ) -> Result<VendorResult, VendorError> {
            self.void_calls.fetch_add(1, Ordering::SeqCst);
            self.voids
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(VendorResult::Timeout))
        }
    }

    pub(crate) fn product() -> Product {
        Product {
            product_code: "MCF-AV-12M-001".to_string(),
            currency: "INR".to_string(),
            vendor_code: "ACME".to_string(),
            active: true,
            min_amount: Some(10000),
            max_amount: Some(50000),
        }
    }

    pub(crate) fn request(unique_ref: &str, amount: i64) -> ActivationRequest {
        ActivationRequest {
            product_ean: "MCF-AV-12M-001".to_string(),
            amount,
            currency: "INR".to_string(),
            card_no: Some("1234567890123456".to_string()),
            invoice_no: "INV-2025-001".to_string(),
            unique_ref: unique_ref.to_string(),
            store_code: "STR001".to_string(),
            device_id: "POS-001".to_string(),
            txn_date: Utc::now(),
        }
    }

    fn void_request(unique_ref: &str) -> VoidRequest {
        VoidRequest {
            unique_ref: unique_ref.to_string(),
            invoice_no: "INV-2025-001".to_string(),
            product_ean: "MCF-AV-12M-001".to_string(),
        }
    }

    pub(crate) struct Harness {
        pub orchestrator: ActivationOrchestrator,
        pub store: InMemoryTransactionRepository,
        pub catalog: InMemoryProductCatalog,
        pub vendor: Arc<ScriptedVendor>,
    }

    pub(crate) async fn harness(vendor: ScriptedVendor) -> Harness {
        let store = InMemoryTransactionRepository::new();
        let catalog = InMemoryProductCatalog::new();
        catalog.upsert(product()).await;
        let vendor = Arc::new(vendor);
        let registry = VendorRegistry::new(vec![vendor.clone() as Arc<dyn VendorAdapter>]).unwrap();
        let orchestrator = ActivationOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(catalog.clone()),
            registry,
        );
        Harness {
            orchestrator,
            store,
            catalog,
            vendor,
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::generate()
    }

    #[tokio::test]
    async fn test_successful_activation_is_idempotent() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(success("ABC123"))).await;

        let first = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();
        assert_eq!(first.status, "ACTIVATED");
        assert_eq!(first.activation_code.as_deref(), Some("ABC123"));

        let second = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(h.vendor.activate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_amount_below_minimum_creates_no_row() {
        let h = harness(ScriptedVendor::new("ACME")).await;

        let err = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 5000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SA03");
        assert!(h.store.is_empty().await);
        assert_eq!(h.vendor.activate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_currency_mismatch_creates_no_row() {
        let h = harness(ScriptedVendor::new("ACME")).await;
        let mut req = request("R1", 25000);
        req.currency = "USD".to_string();

        let err = h.orchestrator.process_activation(&ctx(), req).await.unwrap_err();
        assert_eq!(err.code(), "SA02");
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_product() {
        let h = harness(ScriptedVendor::new("ACME")).await;
        h.catalog
            .upsert(Product {
                active: false,
                ..product()
            })
            .await;

        let err = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SA01");
    }

    #[tokio::test]
    async fn test_vendor_decline_is_terminal_failure() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(decline("E42", "Card blocked"))).await;

        let response = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();
        assert_eq!(response.status, "FAILED");

        let stored = h.orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.error_code.as_deref(), Some("E42"));
        assert_eq!(stored.error_message.as_deref(), Some("Card blocked"));
        assert_eq!(stored.retry_count, 0);
    }

    #[tokio::test]
    async fn test_vendor_timeout_leaves_pending_and_propagates() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(Ok(VendorResult::Timeout))).await;

        let err = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SA04");

        let stored = h.orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.error_code.as_deref(), Some("SA04"));

        // A client re-submit resolves to the stored row without another vendor call.
        let again = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();
        assert_eq!(again.status, "PENDING");
        assert_eq!(h.vendor.activate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unexpected_vendor_error_fails_transaction() {
        let h = harness(
            ScriptedVendor::new("ACME")
                .on_activate(Err(VendorError::Unexpected("socket closed".to_string()))),
        )
        .await;

        let err = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VND02");

        let stored = h.orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
        assert_eq!(stored.error_code.as_deref(), Some("VND02"));
    }

    #[tokio::test]
    async fn test_missing_adapter_is_configuration_error() {
        let h = harness(ScriptedVendor::new("OTHER")).await;

        let err = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VND01");

        let stored = h.orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_call_vendor_once() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(success("ABC123"))).await;
        let orchestrator = Arc::new(h.orchestrator);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator
                        .process_activation(&RequestContext::generate(), request("R1", 25000))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.unique_ref, "R1");
        }

        assert_eq!(h.vendor.activate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.store.len().await, 1);
        let stored = orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.activation_code.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn test_void_lifecycle() {
        let h = harness(
            ScriptedVendor::new("ACME")
                .on_activate(success("ABC123"))
                .on_void(success("VOID-1")),
        )
        .await;
        h.orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();

        let mut wrong_invoice = void_request("R1");
        wrong_invoice.invoice_no = "INV-OTHER".to_string();
        let err = h
            .orchestrator
            .process_void(&ctx(), wrong_invoice)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VD03");

        let voided = h.orchestrator.process_void(&ctx(), void_request("R1")).await.unwrap();
        assert_eq!(voided.response_code, "00");
        assert_eq!(voided.void_code.as_deref(), Some("VOID-1"));

        let again = h.orchestrator.process_void(&ctx(), void_request("R1")).await.unwrap();
        assert_eq!(again.response_code, "00");
        assert_eq!(again.void_code.as_deref(), Some("VOID-1"));
        assert_eq!(h.vendor.void_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_void_requires_activated_transaction() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(decline("E1", "nope"))).await;
        h.orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();

        let err = h
            .orchestrator
            .process_void(&ctx(), void_request("R1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VD01");

        let err = h
            .orchestrator
            .process_void(&ctx(), void_request("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TXN01");
    }

    #[tokio::test]
    async fn test_void_decline_is_payload_and_keeps_status() {
        let h = harness(
            ScriptedVendor::new("ACME")
                .on_activate(success("ABC123"))
                .on_void(decline("V9", "Return window closed")),
        )
        .await;
        h.orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();

        let response = h.orchestrator.process_void(&ctx(), void_request("R1")).await.unwrap();
        assert_eq!(response.response_code, "02");
        assert_eq!(response.message, "Return window closed");
        assert_eq!(response.status, "FAILED");

        let stored = h.orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Activated);
    }

    #[tokio::test]
    async fn test_void_timeout_is_error_and_keeps_status() {
        let h = harness(
            ScriptedVendor::new("ACME")
                .on_activate(success("ABC123"))
                .on_void(Ok(VendorResult::Timeout)),
        )
        .await;
        h.orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();

        let err = h
            .orchestrator
            .process_void(&ctx(), void_request("R1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SA04");
        let stored = h.orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Activated);
    }

    #[tokio::test]
    async fn test_unknown_reference_status() {
        let h = harness(ScriptedVendor::new("ACME")).await;
        let err = h.orchestrator.get_status("never-created").await.unwrap_err();
        assert_eq!(err.code(), "TXN01");
    }

    #[tokio::test]
    async fn test_retry_success_activates() {
        let h = harness(
            ScriptedVendor::new("ACME")
                .on_activate(Ok(VendorResult::Timeout))
                .on_activate(success("LATE-1")),
        )
        .await;
        let _ = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await;
        let pending = h.orchestrator.get_status("R1").await.unwrap();

        let retried = h.orchestrator.retry_pending(&ctx(), &pending).await.unwrap();
        assert_eq!(retried.status, TransactionStatus::Activated);
        assert_eq!(retried.activation_code.as_deref(), Some("LATE-1"));
        assert_eq!(retried.retry_count, 2);
        assert!(retried.error_code.is_none());
    }

    #[tokio::test]
    async fn test_retry_fails_when_product_disappears() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(Ok(VendorResult::Timeout))).await;
        let _ = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await;
        let pending = h.orchestrator.get_status("R1").await.unwrap();
        h.catalog.remove("MCF-AV-12M-001").await;

        let retried = h.orchestrator.retry_pending(&ctx(), &pending).await.unwrap();
        assert_eq!(retried.status, TransactionStatus::Failed);
        assert_eq!(retried.error_message.as_deref(), Some("Product no longer available"));
        assert_eq!(h.vendor.activate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_fails_when_adapter_disappears() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(Ok(VendorResult::Timeout))).await;
        let _ = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await;
        let pending = h.orchestrator.get_status("R1").await.unwrap();
        h.catalog
            .upsert(Product {
                vendor_code: "GONE".to_string(),
                ..product()
            })
            .await;

        let retried = h.orchestrator.retry_pending(&ctx(), &pending).await.unwrap();
        assert_eq!(retried.status, TransactionStatus::Failed);
        assert_eq!(retried.error_code.as_deref(), Some("VND01"));
        assert_eq!(retried.error_message.as_deref(), Some("Vendor adapter not available"));
        assert_eq!(h.vendor.activate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_decline_is_terminal() {
        let h = harness(
            ScriptedVendor::new("ACME")
                .on_activate(Ok(VendorResult::Timeout))
                .on_activate(decline("E42", "Card blocked")),
        )
        .await;
        let _ = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await;
        let pending = h.orchestrator.get_status("R1").await.unwrap();

        let retried = h.orchestrator.retry_pending(&ctx(), &pending).await.unwrap();
        assert_eq!(retried.status, TransactionStatus::Failed);
        assert_eq!(retried.error_code.as_deref(), Some("E42"));
        assert_eq!(retried.error_message.as_deref(), Some("Card blocked"));
        assert_eq!(retried.retry_count, 2);

        let due = h
            .orchestrator
            .pending_for_retry(Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_with_single_attempt_budget_fails() {
        let mut h = harness(ScriptedVendor::new("ACME").on_activate(Ok(VendorResult::Timeout))).await;
        h.orchestrator = h.orchestrator.with_max_retries(1);

        let err = h
            .orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SA04");

        let stored = h.orchestrator.get_status("R1").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.error_code.as_deref(), Some("SA04"));
        assert_eq!(stored.error_message.as_deref(), Some("Max retries exceeded"));
    }

    #[tokio::test]
    async fn test_retry_skips_rows_no_longer_pending() {
        let h = harness(ScriptedVendor::new("ACME").on_activate(success("ABC123"))).await;
        h.orchestrator
            .process_activation(&ctx(), request("R1", 25000))
            .await
            .unwrap();
        let activated = h.orchestrator.get_status("R1").await.unwrap();

        let result = h.orchestrator.retry_pending(&ctx(), &activated).await.unwrap();
        assert_eq!(result.status, TransactionStatus::Activated);
        assert_eq!(h.vendor.activate_calls.load(Ordering::SeqCst), 1);
    }
}
