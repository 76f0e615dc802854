use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::{
    constants::REFERRAL_LINK_BASE,
    error::{AppError, Result},
    models::ApiResponse,
};

use super::{require_auth, AppState};

#[derive(Debug, Serialize)]
pub struct ReferralStats {
    pub total_direct_invites: i64,
    pub is_eligible_for_bonus: bool,
    pub referral_link: String,
}

/// GET /api/v1/referral/stats
///
/// Invite count plus bonus eligibility; a referrer qualifies for bonuses
/// only while owning at least one cow.
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ReferralStats>>> {
    let ctx = require_auth(&headers, &state.config)?;

    let user = state
        .db
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| AppError::Internal("User record missing for valid token".to_string()))?;

    let total_direct_invites = state.db.count_direct_referrals(ctx.user_id).await?;
    let cow_count = state.db.count_cows(ctx.user_id).await?;

    Ok(Json(ApiResponse::success(ReferralStats {
        total_direct_invites,
        is_eligible_for_bonus: cow_count > 0,
        referral_link: format!("{REFERRAL_LINK_BASE}{}", user.wallet_address),
    })))
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn stats_count_invites_and_gate_bonus_on_cows() {
        let Some(db) = crate::db::test_database().await else { return };

        let referrer = db
            .create_user(&crate::db::test_wallet(), "F2P", "n1", None)
            .await
            .unwrap();
        db.create_user(&crate::db::test_wallet(), "F2P", "n2", Some(referrer.id))
            .await
            .unwrap();

        assert_eq!(db.count_direct_referrals(referrer.id).await.unwrap(), 1);
        assert_eq!(db.count_cows(referrer.id).await.unwrap(), 0);

        db.create_cow(referrer.id).await.unwrap();
        assert_eq!(db.count_cows(referrer.id).await.unwrap(), 1);
    }
}
