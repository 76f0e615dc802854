use axum::{extract::State, Json};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    constants::{AD_GOLD_REWARD, DAILY_AD_LIMIT},
    error::{AppError, Result},
    models::ApiResponse,
};

use super::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
pub struct AdCompleteRequest {
    pub user_id: Option<Uuid>,
    pub event_id: Option<String>,
    // Raw payload string as signed by the ad network; verified byte-for-byte
    // so reformatting cannot bypass the check.
    pub payload: Option<String>,
    pub signature: Option<String>,
}

/// Verifies the ad network's server-side-verification (SSV) signature:
/// lowercase hex HMAC-SHA256 over the raw payload.
fn verify_ssv_signature(secret: &str, payload: &str, signature_hex: &str) -> bool {
    let signature = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload.as_bytes());
    // verify_slice is constant-time
    mac.verify_slice(&signature).is_ok()
}

/// POST /api/v1/webhooks/ad-complete
///
/// Grants the ad-watch (Care) reward. The user lookup and daily-cap check
/// run before anything is written, so a capped-out or unknown user leaves
/// the event id unspent. The event id then acts as an idempotency key: the
/// AD_REWARD tx log is inserted before any balance is touched, and the
/// unique index on reference_id rejects replays.
pub async fn ad_complete(
    State(state): State<AppState>,
    Json(req): Json<AdCompleteRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let secret = state
        .config
        .ad_network_secret
        .as_deref()
        .ok_or_else(|| AppError::Internal("AD_NETWORK_SECRET not configured".to_string()))?;

    let user_id = req
        .user_id
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;
    let event_id = match req.event_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Err(AppError::Validation(
                "event_id tidak disertakan, ditolak karena tidak ada jaminan idempotensi"
                    .to_string(),
            ))
        }
    };
    let payload = req
        .payload
        .as_deref()
        .ok_or_else(|| AppError::Validation("payload is required".to_string()))?;
    let signature = req
        .signature
        .as_deref()
        .ok_or_else(|| AppError::Validation("signature is required".to_string()))?;

    if !verify_ssv_signature(secret, payload, signature) {
        return Err(AppError::Forbidden(
            "SSV signature tidak valid. Payload dimanipulasi".to_string(),
        ));
    }

    let user = state
        .db
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::BusinessRule("User tidak ditemukan".to_string()))?;

    let now = Utc::now();
    let counted_today = user
        .last_ad_date
        .map_or(false, |last| last.date_naive() == now.date_naive());
    let daily_count = if counted_today { user.daily_ad_count } else { 0 };

    if daily_count >= DAILY_AD_LIMIT {
        return Err(AppError::BusinessRule(
            "Daily ad limit reached (Max 50/day)".to_string(),
        ));
    }

    // Idempotency gate: first writer wins, replays die on the unique index.
    match state
        .db
        .insert_tx_log(
            user.id,
            "AD_REWARD",
            Decimal::from(AD_GOLD_REWARD),
            "GOLD",
            Some(event_id),
        )
        .await
    {
        Err(AppError::Database(e))
            if e.as_database_error()
                .map_or(false, |db_err| db_err.is_unique_violation()) =>
        {
            return Err(AppError::BusinessRule(
                "Webhook sudah pernah diproses".to_string(),
            ));
        }
        other => other?,
    }

    state
        .db
        .update_ad_tracking(user.id, daily_count + 1, now)
        .await?;
    state
        .db
        .add_gold(user.id, Decimal::from(AD_GOLD_REWARD))
        .await?;

    // Boost the oldest standard cow; when none needs it, grass instead so the
    // reward is never silently lost.
    let boosted = state.db.apply_care_boost(user.id).await?;

    tracing::info!(
        "Ad reward granted to {} (event {event_id}, cow_boosted={boosted})",
        user.id
    );

    Ok(Json(ApiResponse::message("Reward iklan berhasil diproses")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_ssv_signature_passes() {
        let payload = r#"{"event":"ad_complete","placement":"barn"}"#;
        let signature = sign("test_ad_secret", payload);
        assert!(verify_ssv_signature("test_ad_secret", payload, &signature));
    }

    #[test]
    fn tampered_payload_fails() {
        let signature = sign("test_ad_secret", r#"{"reward":1}"#);
        assert!(!verify_ssv_signature(
            "test_ad_secret",
            r#"{"reward":9999}"#,
            &signature
        ));
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = "payload";
        let signature = sign("other_secret", payload);
        assert!(!verify_ssv_signature("test_ad_secret", payload, &signature));
    }

    #[test]
    fn non_hex_signature_fails_closed() {
        assert!(!verify_ssv_signature("secret", "payload", "not-hex!!"));
    }

    fn signed_request(user_id: Uuid, event_id: &str) -> AdCompleteRequest {
        let payload = r#"{"event":"ad_complete"}"#;
        AdCompleteRequest {
            user_id: Some(user_id),
            event_id: Some(event_id.to_string()),
            payload: Some(payload.to_string()),
            signature: Some(sign("test_ad_secret", payload)),
        }
    }

    #[tokio::test]
    async fn capped_user_does_not_burn_the_event_id() {
        let Some(db) = crate::db::test_database().await else { return };

        let user = db
            .create_user(&crate::db::test_wallet(), "F2P", "n", None)
            .await
            .unwrap();
        db.create_inventory(user.id).await.unwrap();
        db.update_ad_tracking(user.id, DAILY_AD_LIMIT, Utc::now())
            .await
            .unwrap();

        let state = AppState {
            db: db.clone(),
            config: crate::config::test_config(),
        };
        let event_id = format!("evt-{}", Uuid::new_v4());

        match ad_complete(State(state), Json(signed_request(user.id, &event_id))).await {
            Err(AppError::BusinessRule(msg)) => assert!(msg.contains("limit")),
            other => panic!("expected daily-limit rejection, got {other:?}"),
        }

        // The event id must still be usable once the cap resets.
        db.insert_tx_log(user.id, "AD_REWARD", Decimal::ONE, "GOLD", Some(&event_id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_user_is_rejected_as_business_rule() {
        let Some(db) = crate::db::test_database().await else { return };

        let state = AppState {
            db,
            config: crate::config::test_config(),
        };
        let event_id = format!("evt-{}", Uuid::new_v4());

        match ad_complete(
            State(state),
            Json(signed_request(Uuid::new_v4(), &event_id)),
        )
        .await
        {
            Err(AppError::BusinessRule(msg)) => assert!(msg.contains("tidak ditemukan")),
            other => panic!("expected unknown-user rejection, got {other:?}"),
        }
    }
}
