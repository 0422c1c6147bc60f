use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::startup::{self, Services};

#[derive(Parser)]
#[command(name = "activation-gateway")]
#[command(about = "Activation Gateway - point-of-sale activation and void orchestration", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and retry scheduler (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Pending-transaction retry commands
    #[command(subcommand)]
    Retry(RetryCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum RetryCommands {
    /// Run a single retry sweep and print the report
    RunOnce,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_retry_run_once(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    let services = Services::build(config, pool).await?;

    let report = services.retry_scheduler(config).run_once().await?;

    println!("✓ Retry sweep completed");
    println!("  Candidates:    {}", report.candidates);
    println!("  Activated:     {}", report.activated);
    println!("  Failed:        {}", report.failed);
    println!("  Still pending: {}", report.still_pending);
    println!("  Errors:        {}", report.errors);

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!("  Stellr Base URL: {}", config.stellr_base_url);
    println!(
        "  Stellr API Key: {}",
        if config.stellr_api_key.is_some() { "****" } else { "(from Vault)" }
    );
    println!("  Vendor Timeout: {} ms", config.vendor_timeout.as_millis());
    println!("  Test Vendor Enabled: {}", config.enable_test_vendor);
    println!("  Retry Interval: {} s", config.retry_interval.as_secs());
    println!("  Retry Stale After: {} s", config.retry_stale_after.as_secs());
    println!("  Retry Max Attempts: {}", config.retry_max_attempts);

    let pool = crate::db::create_pool(config).await?;
    let report = startup::validate_environment(config, &pool).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
