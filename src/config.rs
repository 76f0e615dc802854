use serde::Deserialize;
use std::env;

use crate::constants::DEV_WALLET_ADDRESS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // JWT
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,

    // Ad network SSV webhook (disabled when unset)
    pub ad_network_secret: Option<String>,

    // Root admin wallet, seeded at startup
    pub dev_wallet_address: String,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,

            ad_network_secret: env::var("AD_NETWORK_SECRET").ok(),

            dev_wallet_address: env::var("DEV_WALLET_ADDRESS")
                .unwrap_or_else(|_| DEV_WALLET_ADDRESS.to_string())
                .to_lowercase(),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET is empty");
        }

        if self.jwt_secret.contains("super_secret") {
            tracing::warn!("Detected dev credentials in JWT_SECRET");
        }
        if self.ad_network_secret.is_none() {
            tracing::warn!(
                "AD_NETWORK_SECRET not configured; ad-reward webhook will reject all calls"
            );
        }
        if !self.dev_wallet_address.starts_with("0x") || self.dev_wallet_address.len() != 42 {
            anyhow::bail!("DEV_WALLET_ADDRESS is not a valid wallet address");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "0.0.0.0".to_string(),
        port: 3000,
        environment: "development".to_string(),
        database_url: "postgres://localhost/cashcow_test".to_string(),
        database_max_connections: 1,
        jwt_secret: "test_secret".to_string(),
        jwt_expiry_hours: 24,
        ad_network_secret: Some("test_ad_secret".to_string()),
        dev_wallet_address: DEV_WALLET_ADDRESS.to_string(),
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_jwt_secret() {
        let mut config = test_config();
        config.jwt_secret = "".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_dev_wallet() {
        let mut config = test_config();
        config.dev_wallet_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }
}
