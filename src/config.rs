use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::account::models::{RegisterRequest, Role};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL (DATABASE_URL overrides)
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mpesa: MpesaConfig,
    /// Lifetime of a password reset code
    #[serde(default = "default_reset_code_ttl")]
    pub reset_code_ttl_minutes: i64,
    /// Admin account created at startup when missing (ADMIN_PASSWORD overrides)
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BootstrapAdmin {
    #[serde(default = "default_admin_name")]
    pub first_name: String,
    #[serde(default = "default_admin_name")]
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(default)]
    pub password: String,
}

fn default_admin_name() -> String {
    "Admin".to_string()
}

impl BootstrapAdmin {
    pub fn registration(&self) -> RegisterRequest {
        RegisterRequest {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            password: self.password.clone(),
            role: Role::Admin,
            address: None,
            city: None,
            postal_code: None,
            location: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Mark the Authorization cookie `Secure` (HTTPS deployments)
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".to_string(),
            token_ttl_hours: 24,
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MpesaConfig {
    /// Use the in-process mock instead of Daraja (local development)
    #[serde(default)]
    pub use_mock: bool,
    pub base_url: String,
    pub short_code: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub callback_url: String,
    pub timeout_secs: u64,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            use_mock: false,
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            short_code: "174379".to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            passkey: String::new(),
            callback_url: "http://localhost:8080/api/v1/callback".to_string(),
            timeout_secs: 30,
        }
    }
}

fn default_reset_code_ttl() -> i64 {
    15
}

impl MpesaConfig {
    /// Every credential the live STK push client needs
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("short_code", &self.short_code),
            ("consumer_key", &self.consumer_key),
            ("consumer_secret", &self.consumer_secret),
            ("passkey", &self.passkey),
            ("callback_url", &self.callback_url),
        ] {
            if value.trim().is_empty() {
                bail!("mpesa.{} is not configured (set it, or mpesa.use_mock for development)", name);
            }
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", config_path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
            .validate()
            .with_context(|| format!("Invalid configuration: {}", config_path))?;
        Ok(config)
    }

    /// Settings that must never fall back to an unsafe value
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret is empty; set JWT_SECRET");
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.password.trim().is_empty() {
                bail!("bootstrap_admin.password is empty; set ADMIN_PASSWORD");
            }
        }
        Ok(())
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Secrets come from the environment when set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.postgres_url = Some(url);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(key) = lookup("MPESA_CONSUMER_KEY") {
            self.mpesa.consumer_key = key;
        }
        if let Some(secret) = lookup("MPESA_CONSUMER_SECRET") {
            self.mpesa.consumer_secret = secret;
        }
        if let Some(passkey) = lookup("MPESA_PASSKEY") {
            self.mpesa.passkey = passkey;
        }
        if let (Some(admin), Some(password)) = (self.bootstrap_admin.as_mut(), lookup("ADMIN_PASSWORD")) {
            admin.password = password;
        }
    }
}
