use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;

use crate::adapters::{PostgresProductCatalog, PostgresTransactionRepository};
use crate::config::Config;
use crate::health::{HealthMonitor, PostgresChecker, StellrCircuitChecker};
use crate::secrets::SecretsManager;
use crate::services::{ActivationOrchestrator, RetryScheduler};
use crate::vendor::{StellrAdapter, TestVendorAdapter, VendorAdapter, VendorRegistry};
use crate::AppState;

/// Everything the server and the CLI sweep share.
pub struct Services {
    pub orchestrator: Arc<ActivationOrchestrator>,
    pub health: Arc<HealthMonitor>,
}

impl Services {
    pub async fn build(config: &Config, pool: PgPool) -> Result<Self> {
        let api_key = resolve_stellr_api_key(config).await?;
        let stellr = Arc::new(StellrAdapter::new(
            config.stellr_base_url.clone(),
            api_key,
            config.vendor_timeout,
        ));

        let mut adapters: Vec<Arc<dyn VendorAdapter>> = vec![stellr.clone()];
        if config.enable_test_vendor {
            tracing::warn!("TEST vendor adapter enabled");
            adapters.push(Arc::new(TestVendorAdapter::new()));
        }
        let registry = VendorRegistry::new(adapters)?;
        tracing::info!(vendors = ?registry.vendor_codes(), "Vendor registry initialized");

        let orchestrator = ActivationOrchestrator::new(
            Arc::new(PostgresTransactionRepository::new(pool.clone())),
            Arc::new(PostgresProductCatalog::new(pool.clone())),
            registry,
        )
        .with_max_retries(config.retry_max_attempts);

        let health = HealthMonitor::new()
            .with_check("postgres", true, Arc::new(PostgresChecker::new(pool)))
            .with_check("stellr", false, Arc::new(StellrCircuitChecker::new(stellr)));

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            health: Arc::new(health),
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            orchestrator: self.orchestrator.clone(),
            health: self.health.clone(),
        }
    }

    pub fn retry_scheduler(&self, config: &Config) -> RetryScheduler {
        RetryScheduler::new(self.orchestrator.clone())
            .with_interval(config.retry_interval)
            .with_stale_after(config.retry_stale_after)
    }
}

async fn resolve_stellr_api_key(config: &Config) -> Result<String> {
    if let Some(key) = &config.stellr_api_key {
        return Ok(key.clone());
    }

    tracing::info!("STELLR_API_KEY not set, reading vendor credentials from Vault");
    let secrets = SecretsManager::new()
        .await
        .context("STELLR_API_KEY is unset and Vault is unavailable")?;
    secrets.vendor_api_key("STELLR").await
}

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        errors: Vec::new(),
    };

    if let Err(e) = config.validate() {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {:#}", e));
    }

    report
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}
