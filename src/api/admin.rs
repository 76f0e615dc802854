use axum::{extract::State, http::HeaderMap, Json};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{AdminUserRow, PlatformStats},
    error::{AppError, Result},
    models::ApiResponse,
};

use super::{require_admin, require_auth, AppState};

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub target_wallet: Option<String>,
    pub item_type: Option<String>,
    pub amount: Option<Decimal>,
}

/// POST /api/v1/admin/transfer
///
/// Mints an in-game item or balance to a target user. Admin balances are not
/// deducted.
pub async fn transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TransferRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let ctx = require_auth(&headers, &state.config)?;
    require_admin(&ctx)?;

    let target_wallet = req
        .target_wallet
        .as_deref()
        .map(|w| w.to_lowercase().trim().to_string())
        .filter(|w| !w.is_empty())
        .ok_or_else(|| AppError::Validation("Target wallet is required".to_string()))?;
    let item_type = req
        .item_type
        .as_deref()
        .map(str::to_uppercase)
        .ok_or_else(|| AppError::Validation("Item type is required".to_string()))?;
    let amount = req
        .amount
        .ok_or_else(|| AppError::Validation("Amount is required".to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(AppError::BusinessRule(
            "Amount must be greater than 0".to_string(),
        ));
    }

    let target = state
        .db
        .get_user_by_wallet(&target_wallet)
        .await?
        .ok_or_else(|| {
            AppError::BusinessRule(format!("Target user not found: {target_wallet}"))
        })?;

    let whole = amount.trunc().to_i32().unwrap_or(0);
    match item_type.as_str() {
        "GOLD" => state.db.add_gold(target.id, amount).await?,
        "USDT" => state.db.add_usdt(target.id, amount).await?,
        "COW_TOKEN" => state.db.add_points(target.id, amount).await?,
        "GRASS" => state.db.add_grass(target.id, whole).await?,
        "MILK" => state.db.add_milk(target.id, whole).await?,
        "LAND" => state.db.add_land_slots(target.id, whole).await?,
        other => {
            return Err(AppError::BusinessRule(format!(
                "Unknown item type: {other}"
            )))
        }
    }

    let reference = format!("admin-transfer-{}", Uuid::new_v4());
    state
        .db
        .insert_tx_log(
            target.id,
            &format!("ADMIN_TRANSFER_{item_type}"),
            amount,
            &item_type,
            Some(&reference),
        )
        .await?;

    tracing::info!(
        "Admin {} transferred {amount} {item_type} to {target_wallet}",
        ctx.wallet_address
    );

    Ok(Json(ApiResponse::message("Transfer berhasil")))
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<AdminUserRow>>>> {
    let ctx = require_auth(&headers, &state.config)?;
    require_admin(&ctx)?;

    let users = state.db.list_users_with_cow_counts().await?;
    Ok(Json(ApiResponse::success(users)))
}

/// GET /api/v1/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<PlatformStats>>> {
    let ctx = require_auth(&headers, &state.config)?;
    require_admin(&ctx)?;

    let stats = state.db.platform_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
