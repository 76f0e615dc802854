use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    constants::ROLE_F2P,
    crypto::signature::SignatureVerifier,
    error::{AppError, Result},
};

use super::AppState;

// ==================== REQUEST/RESPONSE TYPES ====================

#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub nonce: String,
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub wallet_address: Option<String>,
    pub signature: Option<String>,
    pub message: Option<String>,
    pub referrer_wallet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub wallet_address: String,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

// ==================== HANDLERS ====================

/// GET /api/v1/auth/nonce/{wallet}
///
/// Issues a fresh single-use nonce for the wallet. For a known user the nonce
/// is persisted (overwriting the previous one); for an unknown wallet it is
/// only returned, never stored, so the database is not filled with ghost
/// wallets that never complete a login.
pub async fn get_nonce(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<NonceResponse>> {
    let wallet_address = wallet.to_lowercase().trim().to_string();
    if wallet_address.is_empty() {
        return Err(AppError::Validation(
            "Wallet address is required".to_string(),
        ));
    }

    let user = state.db.get_user_by_wallet(&wallet_address).await?;
    let nonce = Uuid::new_v4().to_string();

    let exists = user.is_some();
    if exists {
        state.db.update_nonce(&wallet_address, &nonce).await?;
    }

    Ok(Json(NonceResponse { nonce, exists }))
}

/// POST /api/v1/auth/login
///
/// Verifies wallet ownership via an EIP-191 signature, then logs in or
/// registers. Registration inserts the user row and the starter inventory as
/// two independent writes; an inventory failure after the user row committed
/// is logged and surfaced, not rolled back (no transaction here on purpose,
/// mirroring the rest of the sequential write design).
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (wallet_address, signature, message) = match (&req.wallet_address, &req.signature, &req.message) {
        (Some(w), Some(s), Some(m)) if !w.is_empty() && !s.is_empty() && !m.is_empty() => {
            (w.to_lowercase().trim().to_string(), s.clone(), m.clone())
        }
        _ => {
            return Err(AppError::Validation(
                "Wallet address, signature, and message are required".to_string(),
            ))
        }
    };

    SignatureVerifier::verify_personal_sign(&message, &signature, &wallet_address)?;

    let new_nonce = Uuid::new_v4().to_string();
    let user = match state.db.get_user_by_wallet(&wallet_address).await? {
        Some(user) => {
            // Returning user: rotate the nonce so the just-signed message can
            // never be replayed.
            state.db.update_nonce(&wallet_address, &new_nonce).await?;
            user
        }
        None => {
            let referrer_id =
                resolve_referrer(&state, req.referrer_wallet.as_deref(), &wallet_address).await?;

            let user = state
                .db
                .create_user(&wallet_address, ROLE_F2P, &new_nonce, referrer_id)
                .await?;

            if let Err(e) = state.db.create_inventory(user.id).await {
                // The user row is already committed at this point; surface the
                // failure so the client retries, and leave a trace for ops.
                tracing::error!("Failed to create inventory for new user {}: {e}", user.id);
                return Err(e);
            }

            tracing::info!("Registered new wallet {wallet_address} ({})", user.id);
            user
        }
    };

    let token = issue_token(user.id, &user.wallet_address, &user.role, &state.config)?;

    Ok(Json(LoginResponse {
        status: "success",
        token,
    }))
}

/// Resolves an optional referrer wallet to an internal id. Unknown referrers
/// and self-referrals are silently ignored; when nothing resolves, new users
/// fall back to the seeded dev wallet.
async fn resolve_referrer(
    state: &AppState,
    referrer_wallet: Option<&str>,
    wallet_address: &str,
) -> Result<Option<Uuid>> {
    if let Some(referrer) = referrer_wallet {
        let referrer = referrer.to_lowercase().trim().to_string();
        if !referrer.is_empty() && referrer != wallet_address {
            if let Some(user) = state.db.get_user_by_wallet(&referrer).await? {
                return Ok(Some(user.id));
            }
        }
    }

    let dev = state
        .db
        .get_user_by_wallet(&state.config.dev_wallet_address)
        .await?;
    Ok(dev.map(|u| u.id))
}

// ==================== TOKEN HELPERS ====================

pub fn issue_token(
    user_id: Uuid,
    wallet_address: &str,
    role: &str,
    config: &Config,
) -> Result<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::hours(config.jwt_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Invalid token expiry".to_string()))?
        .timestamp();

    let claims = Claims {
        user_id,
        wallet_address: wallet_address.to_string(),
        role: role.to_string(),
        iat: now.timestamp() as usize,
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {e}")))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn issued_token_decodes_to_same_claims() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "0xabc", "ADMIN", &config).unwrap();

        let claims = decode_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.wallet_address, "0xabc");
        assert_eq!(claims.role, "ADMIN");
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_secret = "another_secret".to_string();

        let token = issue_token(Uuid::new_v4(), "0xabc", "F2P", &other).unwrap();
        assert!(matches!(
            decode_token(&token, &config.jwt_secret),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            user_id: Uuid::new_v4(),
            wallet_address: "0xabc".to_string(),
            role: "F2P".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            decode_token(&token, &config.jwt_secret),
            Err(AppError::InvalidToken)
        ));
    }
}
