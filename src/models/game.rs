use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ==================== USER ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub wallet_address: String,
    pub role: String, // F2P | ADMIN
    pub points: Decimal,
    pub gold_balance: Decimal,
    pub usdt_balance: Decimal,
    pub daily_ad_count: i32,
    pub last_ad_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub nonce: String,
    pub referrer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==================== INVENTORY ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Inventory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub grass: i32,
    pub milk: i32,
    pub land_slots: i32,
    pub has_barn: bool,
}

// ==================== COW ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub cow_type: String, // STANDARD | BABY_GOLDEN | GOLDEN
    pub level: i32,
    pub happiness: i32, // 0..=100
    pub last_fed_at: Option<DateTime<Utc>>,
    pub last_harvested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ==================== MARKET LISTING ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketListing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub item_type: String, // GRASS | MILK | NFT tiers
    pub quantity: i32,
    pub price_usdt: Decimal,
    pub status: String, // OPEN | SOLD
    pub created_at: DateTime<Utc>,
}

// ==================== API RESPONSE ====================
// Every success body carries `status: "success"`; error bodies are produced by
// `AppError::into_response` with `status: "error"`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_success_sets_status() {
        let response = ApiResponse::success("ok");
        assert_eq!(response.status, "success");
        assert_eq!(response.data, Some("ok"));
        assert!(response.message.is_none());
    }

    #[test]
    fn message_only_response_skips_data_field() {
        let response = ApiResponse::message("Sapi berhasil diberi makan!");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn user_nonce_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            wallet_address: "0xabc".into(),
            role: "F2P".into(),
            points: Decimal::ZERO,
            gold_balance: Decimal::ZERO,
            usdt_balance: Decimal::ZERO,
            daily_ad_count: 0,
            last_ad_date: None,
            nonce: "secret-nonce".into(),
            referrer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("nonce").is_none());
    }
}
