// src/api/mod.rs

pub mod admin;
pub mod auth;
pub mod farm;
pub mod health;
pub mod market;
pub mod referral;
pub mod webhooks;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use uuid::Uuid;

use crate::config::Config;
use crate::constants::ROLE_ADMIN;
use crate::db::Database;
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

/// Identity claims decoded from a bearer token. Handlers receive this instead
/// of touching the token themselves; the guard never hits storage.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub wallet_address: String,
    pub role: String,
}

/// Validates the `Authorization: Bearer <token>` header.
///
/// Missing or malformed credentials are 401; a present-but-invalid (bad
/// signature, expired) token is 403. The distinction is deliberate.
pub fn require_auth(headers: &HeaderMap, config: &Config) -> Result<AuthContext> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::AuthRequired("Token tidak ditemukan".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::AuthRequired("Format token salah".to_string()))?;

    let parts: Vec<&str> = value.split(' ').collect();
    if parts.len() != 2 || parts[0] != "Bearer" {
        return Err(AppError::AuthRequired("Format token salah".to_string()));
    }

    let claims = auth::decode_token(parts[1], &config.jwt_secret)?;
    Ok(AuthContext {
        user_id: claims.user_id,
        wallet_address: claims.wallet_address,
        role: claims.role,
    })
}

pub fn require_admin(ctx: &AuthContext) -> Result<()> {
    if ctx.role != ROLE_ADMIN {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }
    Ok(())
}
