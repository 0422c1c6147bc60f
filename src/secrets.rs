use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use vaultrs::auth::approle;
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;

/// Vendor credentials stored in Vault under `<kv mount>/vendors/<vendor>`.
pub struct SecretsManager {
    client: VaultClient,
    kv_mount: String,
}

impl SecretsManager {
    pub async fn new() -> Result<Self> {
        let vault_addr =
            env::var("VAULT_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8200".to_string());
        let role_id = env::var("VAULT_ROLE_ID").context("VAULT_ROLE_ID is required")?;
        let secret_id = env::var("VAULT_SECRET_ID").context("VAULT_SECRET_ID is required")?;
        let auth_mount = env::var("VAULT_AUTH_MOUNT").unwrap_or_else(|_| "approle".to_string());
        let kv_mount = env::var("VAULT_KV_MOUNT").unwrap_or_else(|_| "secret".to_string());

        let mut client = VaultClient::new(
            VaultClientSettingsBuilder::default()
                .address(&vault_addr)
                .build()
                .context("failed to build Vault client settings")?,
        )
        .context("failed to create Vault client")?;

        let auth = approle::login(&client, &auth_mount, &role_id, &secret_id)
            .await
            .context("failed to authenticate to Vault with AppRole")?;
        client.set_token(&auth.client_token);

        Ok(Self { client, kv_mount })
    }

    pub async fn vendor_api_key(&self, vendor_code: &str) -> Result<String> {
        let path = vendor_secret_path(vendor_code);
        let secret: HashMap<String, String> = kv2::read(&self.client, &self.kv_mount, &path)
            .await
            .with_context(|| format!("failed to read {}/{} from Vault", self.kv_mount, path))?;

        secret
            .get("api_key")
            .cloned()
            .with_context(|| format!("api_key not found in Vault {}/{}", self.kv_mount, path))
    }
}

fn vendor_secret_path(vendor_code: &str) -> String {
    format!("vendors/{}", vendor_code.to_ascii_lowercase())
}
