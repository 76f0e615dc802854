use axum::{extract::State, http::HeaderMap, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    constants::{
        GOLD_PRICE_BABY_COW, GOLD_PRICE_COW, GOLD_PRICE_GRASS, GOLD_PRICE_LAND,
        GOLD_PRICE_VITAMIN, ITEM_GRASS, ITEM_MILK, LISTING_MAX_PRICE_USDT,
        LISTING_MIN_PRICE_USDT, MILK_TO_GOLD_RATE, SWAP_GOLD_PER_COW_TOKEN, SWAP_GOLD_PER_USDT,
    },
    error::{AppError, Result},
    models::{ApiResponse, MarketListing},
};

use super::{require_auth, AppState};

// ==================== REQUEST TYPES ====================

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub listing_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub item_type: Option<String>,
    pub quantity: Option<i32>,
    pub price_usdt: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SellMilkRequest {
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BuyItemRequest {
    pub item_type: Option<String>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SwapRequest {
    pub amount: Option<Decimal>,
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SwapResult {
    pub target: String,
    pub received: Decimal,
}

// ==================== TX LOG REFERENCES ====================

// tx_logs.reference_id carries a global unique index, so the two sides of a
// trade must never share the raw listing id.
fn sell_reference(listing_id: Uuid) -> String {
    format!("sell-{listing_id}")
}

fn buy_reference(listing_id: Uuid) -> String {
    format!("buy-{listing_id}")
}

// ==================== VALIDATION ====================

fn validate_new_listing(item_type: &str, quantity: i32, price_usdt: Decimal) -> Result<()> {
    if item_type != ITEM_GRASS && item_type != ITEM_MILK {
        return Err(AppError::BusinessRule(
            "Tipe item tidak valid, hanya GRASS atau MILK".to_string(),
        ));
    }
    if quantity <= 0 {
        return Err(AppError::BusinessRule(
            "Jumlah item harus lebih dari 0".to_string(),
        ));
    }

    let min = Decimal::from_str(LISTING_MIN_PRICE_USDT).unwrap_or(Decimal::ZERO);
    let max = Decimal::from_str(LISTING_MAX_PRICE_USDT).unwrap_or(Decimal::MAX);
    if price_usdt < min || price_usdt > max {
        return Err(AppError::BusinessRule(
            "Harga harus antara 0.01 dan 10000 USDT".to_string(),
        ));
    }

    Ok(())
}

// ==================== HANDLERS ====================

/// POST /api/v1/market/buy
///
/// Sequential pseudo-transaction: debit buyer, credit seller (re-read before
/// write), close the listing, hand over the item. Each write commits on its
/// own; there is no row lock or compensation if a later step fails. Two
/// concurrent buyers can both pass the OPEN check before either commits.
/// Known race in the current design.
pub async fn buy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BuyRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let ctx = require_auth(&headers, &state.config)?;

    let listing_id = req
        .listing_id
        .ok_or_else(|| AppError::Validation("Listing ID is required".to_string()))?;

    let buyer = state
        .db
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| AppError::Internal("User record missing for valid token".to_string()))?;

    let listing = state.db.get_open_listing(listing_id).await?.ok_or_else(|| {
        AppError::BusinessRule("Listing tidak ditemukan atau sudah ditutup".to_string())
    })?;

    if buyer.usdt_balance < listing.price_usdt {
        return Err(AppError::BusinessRule(
            "Saldo USDT tidak mencukupi".to_string(),
        ));
    }

    if listing.seller_id == ctx.user_id {
        return Err(AppError::BusinessRule(
            "Anda tidak dapat membeli item sendiri".to_string(),
        ));
    }

    // 1. Debit buyer
    state
        .db
        .set_usdt_balance(buyer.id, buyer.usdt_balance - listing.price_usdt)
        .await?;

    // 2. Credit seller (read-then-write; unguarded against concurrent credits)
    if let Some(seller) = state.db.get_user_by_id(listing.seller_id).await? {
        state
            .db
            .set_usdt_balance(seller.id, seller.usdt_balance + listing.price_usdt)
            .await?;
    }

    // 3. Close the listing
    state.db.mark_listing_sold(listing.id).await?;

    // 4. Hand over simple resources; NFT-tier items settle elsewhere
    if listing.item_type == ITEM_GRASS || listing.item_type == ITEM_MILK {
        if let Some(inventory) = state.db.get_inventory_by_user(ctx.user_id).await? {
            if listing.item_type == ITEM_GRASS {
                state
                    .db
                    .set_grass(inventory.id, inventory.grass + listing.quantity)
                    .await?;
            } else {
                state
                    .db
                    .set_milk(inventory.id, inventory.milk + listing.quantity)
                    .await?;
            }
        }
    }

    state
        .db
        .insert_tx_log(
            ctx.user_id,
            "MARKET_BUY",
            listing.price_usdt,
            "USDT",
            Some(&buy_reference(listing.id)),
        )
        .await?;

    Ok(Json(ApiResponse::message("Pembelian berhasil!")))
}

/// POST /api/v1/market/sell
pub async fn sell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SellRequest>,
) -> Result<Json<ApiResponse<MarketListing>>> {
    let ctx = require_auth(&headers, &state.config)?;

    let item_type = req
        .item_type
        .as_deref()
        .map(str::to_uppercase)
        .ok_or_else(|| AppError::Validation("Item type is required".to_string()))?;
    let quantity = req
        .quantity
        .ok_or_else(|| AppError::Validation("Quantity is required".to_string()))?;
    let price_usdt = req
        .price_usdt
        .ok_or_else(|| AppError::Validation("Price is required".to_string()))?;

    validate_new_listing(&item_type, quantity, price_usdt)?;

    let inventory = state
        .db
        .get_inventory_by_user(ctx.user_id)
        .await?
        .ok_or_else(|| AppError::BusinessRule("Inventory tidak ditemukan".to_string()))?;

    if item_type == ITEM_GRASS {
        if inventory.grass < quantity {
            return Err(AppError::BusinessRule(
                "Rumput tidak cukup untuk dijual".to_string(),
            ));
        }
        state
            .db
            .set_grass(inventory.id, inventory.grass - quantity)
            .await?;
    } else {
        if inventory.milk < quantity {
            return Err(AppError::BusinessRule(
                "Susu tidak cukup untuk dijual".to_string(),
            ));
        }
        state
            .db
            .set_milk(inventory.id, inventory.milk - quantity)
            .await?;
    }

    let listing = state
        .db
        .create_listing(ctx.user_id, &item_type, quantity, price_usdt)
        .await?;

    state
        .db
        .insert_tx_log(
            ctx.user_id,
            "MARKET_SELL",
            price_usdt,
            "USDT",
            Some(&sell_reference(listing.id)),
        )
        .await?;

    Ok(Json(ApiResponse::success(listing)))
}

// ==================== GOLD ECONOMY ====================

/// Gold shop unit price for an item, or None for anything not sold in-app.
fn gold_item_price(item_type: &str) -> Option<i64> {
    match item_type {
        "GRASS" => Some(GOLD_PRICE_GRASS),
        "BABY_COW" => Some(GOLD_PRICE_BABY_COW),
        "COW" => Some(GOLD_PRICE_COW),
        "LAND" => Some(GOLD_PRICE_LAND),
        "VITAMIN" => Some(GOLD_PRICE_VITAMIN),
        _ => None,
    }
}

/// Swap output for spending `gold` on the target currency.
/// 100 Gold = 1 COW; 10,000 Gold = 1 USDT.
fn swap_output(gold: Decimal, target: &str) -> Option<Decimal> {
    match target {
        "COW" => Some(gold / Decimal::from(SWAP_GOLD_PER_COW_TOKEN)),
        "USDT" => Some(gold / Decimal::from(SWAP_GOLD_PER_USDT)),
        _ => None,
    }
}

/// POST /api/v1/market/sell-milk
///
/// Sells milk back to the system for Gold at a fixed rate.
pub async fn sell_milk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SellMilkRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let ctx = require_auth(&headers, &state.config)?;

    let quantity = req
        .quantity
        .ok_or_else(|| AppError::Validation("Quantity is required".to_string()))?;
    if quantity <= 0 {
        return Err(AppError::BusinessRule(
            "Quantity must be greater than 0".to_string(),
        ));
    }

    let inventory = state
        .db
        .get_inventory_by_user(ctx.user_id)
        .await?
        .ok_or_else(|| AppError::BusinessRule("Inventory tidak ditemukan".to_string()))?;

    if inventory.milk < quantity {
        return Err(AppError::BusinessRule(
            "Not enough milk to sell".to_string(),
        ));
    }

    state
        .db
        .set_milk(inventory.id, inventory.milk - quantity)
        .await?;

    let reward = Decimal::from(quantity as i64 * MILK_TO_GOLD_RATE);
    state.db.add_gold(ctx.user_id, reward).await?;

    state
        .db
        .insert_tx_log(ctx.user_id, "SELL_MILK_GOLD", reward, "GOLD", None)
        .await?;

    Ok(Json(ApiResponse::message("Susu berhasil dijual untuk Gold!")))
}

/// POST /api/v1/market/buy-item
///
/// Spends Gold on farm essentials. Cow purchases mint standard cows; a
/// vitamin applies the same care boost as a watched ad.
pub async fn buy_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BuyItemRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let ctx = require_auth(&headers, &state.config)?;

    let item_type = req
        .item_type
        .as_deref()
        .map(str::to_uppercase)
        .ok_or_else(|| AppError::Validation("Item type is required".to_string()))?;
    let quantity = req
        .quantity
        .ok_or_else(|| AppError::Validation("Quantity is required".to_string()))?;
    if quantity <= 0 {
        return Err(AppError::BusinessRule(
            "Quantity must be greater than 0".to_string(),
        ));
    }

    let unit_price = gold_item_price(&item_type)
        .ok_or_else(|| AppError::BusinessRule("Invalid item type".to_string()))?;
    let total_price = Decimal::from(unit_price * quantity as i64);

    let user = state
        .db
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| AppError::Internal("User record missing for valid token".to_string()))?;

    if user.gold_balance < total_price {
        return Err(AppError::BusinessRule(
            "Insufficient Gold balance".to_string(),
        ));
    }

    state
        .db
        .set_gold_balance(user.id, user.gold_balance - total_price)
        .await?;

    match item_type.as_str() {
        "GRASS" => state.db.add_grass(user.id, quantity).await?,
        "LAND" => state.db.add_land_slots(user.id, quantity).await?,
        "BABY_COW" | "COW" => {
            for _ in 0..quantity {
                state.db.create_cow(user.id).await?;
            }
        }
        "VITAMIN" => {
            state.db.apply_care_boost(user.id).await?;
        }
        _ => {}
    }

    state
        .db
        .insert_tx_log(user.id, "BUY_ITEM_GOLD", total_price, "GOLD", None)
        .await?;

    Ok(Json(ApiResponse::message("Pembelian item berhasil!")))
}

/// POST /api/v1/market/swap
///
/// Converts Gold into COW points or USDT balance.
pub async fn swap(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SwapRequest>,
) -> Result<Json<ApiResponse<SwapResult>>> {
    let ctx = require_auth(&headers, &state.config)?;

    let amount = req
        .amount
        .ok_or_else(|| AppError::Validation("Amount is required".to_string()))?;
    let target = req
        .target
        .as_deref()
        .map(str::to_uppercase)
        .ok_or_else(|| AppError::Validation("Target currency is required".to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(AppError::BusinessRule("Amount must be positive".to_string()));
    }

    let received = swap_output(amount, &target)
        .ok_or_else(|| AppError::BusinessRule("Invalid target currency".to_string()))?;

    let user = state
        .db
        .get_user_by_id(ctx.user_id)
        .await?
        .ok_or_else(|| AppError::Internal("User record missing for valid token".to_string()))?;

    if user.gold_balance < amount {
        return Err(AppError::BusinessRule(
            "Insufficient Gold balance".to_string(),
        ));
    }

    state
        .db
        .set_gold_balance(user.id, user.gold_balance - amount)
        .await?;
    if target == "COW" {
        state.db.add_points(user.id, received).await?;
    } else {
        state.db.add_usdt(user.id, received).await?;
    }

    state
        .db
        .insert_tx_log(ctx.user_id, "GOLD_SWAP", amount, "GOLD", None)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Swap berhasil",
        SwapResult { target, received },
    )))
}

/// GET /api/v1/market/listings (public)
pub async fn listings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<MarketListing>>>> {
    let listings = state.db.get_open_listings().await?;
    Ok(Json(ApiResponse::success_with_message(
        "Listings berhasil diambil",
        listings,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn listing_validation_accepts_grass_and_milk_only() {
        assert!(validate_new_listing("GRASS", 5, price("1.50")).is_ok());
        assert!(validate_new_listing("MILK", 1, price("0.01")).is_ok());
        assert!(matches!(
            validate_new_listing("COW", 1, price("1")),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn listing_validation_rejects_non_positive_quantity() {
        assert!(validate_new_listing("GRASS", 0, price("1")).is_err());
        assert!(validate_new_listing("GRASS", -3, price("1")).is_err());
    }

    #[test]
    fn listing_validation_enforces_price_bounds() {
        assert!(validate_new_listing("MILK", 1, price("0.009")).is_err());
        assert!(validate_new_listing("MILK", 1, price("10000")).is_ok());
        assert!(validate_new_listing("MILK", 1, price("10000.01")).is_err());
    }

    #[test]
    fn trade_sides_use_distinct_tx_log_references() {
        let listing_id = Uuid::new_v4();
        assert_ne!(sell_reference(listing_id), buy_reference(listing_id));
    }

    // Selling a listing and then buying it writes one tx_log row per side;
    // the unique index on reference_id must accept both.
    #[tokio::test]
    async fn sold_listing_logs_both_sides_of_the_trade() {
        let Some(db) = crate::db::test_database().await else { return };

        let seller = db
            .create_user(&crate::db::test_wallet(), "F2P", "n1", None)
            .await
            .unwrap();
        let buyer = db
            .create_user(&crate::db::test_wallet(), "F2P", "n2", None)
            .await
            .unwrap();
        let listing = db
            .create_listing(seller.id, ITEM_MILK, 1, price("1.50"))
            .await
            .unwrap();

        db.insert_tx_log(
            seller.id,
            "MARKET_SELL",
            listing.price_usdt,
            "USDT",
            Some(&sell_reference(listing.id)),
        )
        .await
        .unwrap();

        db.insert_tx_log(
            buyer.id,
            "MARKET_BUY",
            listing.price_usdt,
            "USDT",
            Some(&buy_reference(listing.id)),
        )
        .await
        .unwrap();
    }

    #[test]
    fn gold_shop_prices_known_items_only() {
        assert_eq!(gold_item_price("GRASS"), Some(10));
        assert_eq!(gold_item_price("BABY_COW"), Some(500));
        assert_eq!(gold_item_price("COW"), Some(2000));
        assert_eq!(gold_item_price("LAND"), Some(1000));
        assert_eq!(gold_item_price("VITAMIN"), Some(50));
        assert_eq!(gold_item_price("MILK"), None);
    }

    #[test]
    fn swap_rates_match_the_gold_pegs() {
        assert_eq!(swap_output(price("100"), "COW"), Some(Decimal::ONE));
        assert_eq!(swap_output(price("10000"), "USDT"), Some(Decimal::ONE));
        assert_eq!(swap_output(price("50"), "COW"), Some(price("0.5")));
        assert_eq!(swap_output(price("100"), "EUR"), None);
    }
}
