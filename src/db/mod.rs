use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{
    config::Config,
    constants::{
        AD_FALLBACK_GRASS, AD_HAPPINESS_BOOST, COW_TYPE_STANDARD, HAPPINESS_MAX, LISTING_OPEN,
        LISTING_SOLD, ROLE_ADMIN, STARTER_GRASS, STARTER_HAS_BARN, STARTER_LAND_SLOTS,
        STARTER_MILK, TX_SUCCESS,
    },
    error::Result,
    models::*,
};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // migrations live at the crate root: ./migrations
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ==================== USER QUERIES ====================
impl Database {
    pub async fn get_user_by_wallet(&self, wallet_address: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE wallet_address = $1")
            .bind(wallet_address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn create_user(
        &self,
        wallet_address: &str,
        role: &str,
        nonce: &str,
        referrer_id: Option<Uuid>,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (wallet_address, role, nonce, referrer_id)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(wallet_address)
        .bind(role)
        .bind(nonce)
        .bind(referrer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update_nonce(&self, wallet_address: &str, nonce: &str) -> Result<()> {
        sqlx::query("UPDATE users SET nonce = $1, updated_at = NOW() WHERE wallet_address = $2")
            .bind(nonce)
            .bind(wallet_address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_role(&self, id: Uuid, role: &str) -> Result<()> {
        sqlx::query("UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Absolute write on purpose: handlers read the current balance first and
    // commit the computed value. See the buy handler for the implications.
    pub async fn set_usdt_balance(&self, id: Uuid, balance: Decimal) -> Result<()> {
        sqlx::query("UPDATE users SET usdt_balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(balance)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_gold_balance(&self, id: Uuid, balance: Decimal) -> Result<()> {
        sqlx::query("UPDATE users SET gold_balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(balance)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_direct_referrals(&self, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE referrer_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn set_daily_ad_count(&self, id: Uuid, count: i32) -> Result<()> {
        sqlx::query("UPDATE users SET daily_ad_count = $1, updated_at = NOW() WHERE id = $2")
            .bind(count)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_ad_tracking(
        &self,
        id: Uuid,
        daily_ad_count: i32,
        last_ad_date: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET daily_ad_count = $1, last_ad_date = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(daily_ad_count)
        .bind(last_ad_date)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_gold(&self, id: Uuid, amount: Decimal) -> Result<()> {
        sqlx::query(
            "UPDATE users SET gold_balance = gold_balance + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(amount)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_usdt(&self, id: Uuid, amount: Decimal) -> Result<()> {
        sqlx::query(
            "UPDATE users SET usdt_balance = usdt_balance + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(amount)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_points(&self, id: Uuid, amount: Decimal) -> Result<()> {
        sqlx::query("UPDATE users SET points = points + $1, updated_at = NOW() WHERE id = $2")
            .bind(amount)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ensures the dev wallet exists as root ADMIN with a starter inventory.
    /// Called once at startup.
    pub async fn seed_dev_wallet(&self, wallet_address: &str) -> Result<()> {
        if let Some(user) = self.get_user_by_wallet(wallet_address).await? {
            if user.role != ROLE_ADMIN {
                self.set_role(user.id, ROLE_ADMIN).await?;
                tracing::info!("Dev wallet role upgraded to ADMIN");
            }
            tracing::info!("Dev wallet already registered: {}", user.id);
            return Ok(());
        }

        let user = self
            .create_user(wallet_address, ROLE_ADMIN, &Uuid::new_v4().to_string(), None)
            .await?;
        self.create_inventory(user.id).await?;
        tracing::info!("Dev wallet created as root ADMIN: {} ({})", wallet_address, user.id);
        Ok(())
    }
}

// ==================== INVENTORY QUERIES ====================
impl Database {
    pub async fn get_inventory_by_user(&self, user_id: Uuid) -> Result<Option<Inventory>> {
        let inventory =
            sqlx::query_as::<_, Inventory>("SELECT * FROM inventories WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(inventory)
    }

    pub async fn create_inventory(&self, user_id: Uuid) -> Result<Inventory> {
        let inventory = sqlx::query_as::<_, Inventory>(
            "INSERT INTO inventories (user_id, grass, milk, land_slots, has_barn)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(user_id)
        .bind(STARTER_GRASS)
        .bind(STARTER_MILK)
        .bind(STARTER_LAND_SLOTS)
        .bind(STARTER_HAS_BARN)
        .fetch_one(&self.pool)
        .await?;
        Ok(inventory)
    }

    pub async fn set_grass(&self, id: Uuid, grass: i32) -> Result<()> {
        sqlx::query("UPDATE inventories SET grass = $1 WHERE id = $2")
            .bind(grass)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_milk(&self, id: Uuid, milk: i32) -> Result<()> {
        sqlx::query("UPDATE inventories SET milk = $1 WHERE id = $2")
            .bind(milk)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_grass(&self, user_id: Uuid, quantity: i32) -> Result<()> {
        sqlx::query("UPDATE inventories SET grass = grass + $1 WHERE user_id = $2")
            .bind(quantity)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_milk(&self, user_id: Uuid, quantity: i32) -> Result<()> {
        sqlx::query("UPDATE inventories SET milk = milk + $1 WHERE user_id = $2")
            .bind(quantity)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_land_slots(&self, user_id: Uuid, quantity: i32) -> Result<()> {
        sqlx::query("UPDATE inventories SET land_slots = land_slots + $1 WHERE user_id = $2")
            .bind(quantity)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ==================== COW QUERIES ====================
impl Database {
    pub async fn get_cow_for_owner(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Cow>> {
        let cow = sqlx::query_as::<_, Cow>("SELECT * FROM cows WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cow)
    }

    pub async fn get_cows_by_owner(&self, owner_id: Uuid) -> Result<Vec<Cow>> {
        let cows =
            sqlx::query_as::<_, Cow>("SELECT * FROM cows WHERE owner_id = $1 ORDER BY created_at ASC")
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(cows)
    }

    pub async fn count_cows(&self, owner_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cows WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn update_cow_feed(
        &self,
        id: Uuid,
        happiness: i32,
        fed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE cows SET happiness = $1, last_fed_at = $2 WHERE id = $3")
            .bind(happiness)
            .bind(fed_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_cow_harvest(
        &self,
        id: Uuid,
        happiness: i32,
        harvested_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE cows SET happiness = $1, last_harvested_at = $2 WHERE id = $3")
            .bind(happiness)
            .bind(harvested_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_cow_happiness(&self, id: Uuid, happiness: i32) -> Result<()> {
        sqlx::query("UPDATE cows SET happiness = $1 WHERE id = $2")
            .bind(happiness)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn oldest_standard_cow(&self, owner_id: Uuid) -> Result<Option<Cow>> {
        let cow = sqlx::query_as::<_, Cow>(
            "SELECT * FROM cows WHERE owner_id = $1 AND cow_type = $2
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(owner_id)
        .bind(COW_TYPE_STANDARD)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cow)
    }

    pub async fn create_cow(&self, owner_id: Uuid) -> Result<Cow> {
        let cow = sqlx::query_as::<_, Cow>(
            "INSERT INTO cows (owner_id, cow_type, level, happiness)
             VALUES ($1, $2, 1, 100)
             RETURNING *",
        )
        .bind(owner_id)
        .bind(COW_TYPE_STANDARD)
        .fetch_one(&self.pool)
        .await?;
        Ok(cow)
    }

    /// Care boost: raise the oldest standard cow's happiness, or hand out
    /// grass when no cow can take the boost. Returns whether a cow was
    /// boosted.
    pub async fn apply_care_boost(&self, user_id: Uuid) -> Result<bool> {
        match self.oldest_standard_cow(user_id).await? {
            Some(cow) if cow.happiness < HAPPINESS_MAX => {
                self.set_cow_happiness(
                    cow.id,
                    (cow.happiness + AD_HAPPINESS_BOOST).min(HAPPINESS_MAX),
                )
                .await?;
                Ok(true)
            }
            _ => {
                self.add_grass(user_id, AD_FALLBACK_GRASS).await?;
                Ok(false)
            }
        }
    }
}

// ==================== MARKET LISTING QUERIES ====================
impl Database {
    pub async fn get_open_listing(&self, id: Uuid) -> Result<Option<MarketListing>> {
        let listing = sqlx::query_as::<_, MarketListing>(
            "SELECT * FROM market_listings WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(LISTING_OPEN)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    pub async fn get_open_listings(&self) -> Result<Vec<MarketListing>> {
        let listings = sqlx::query_as::<_, MarketListing>(
            "SELECT * FROM market_listings WHERE status = $1 ORDER BY created_at DESC",
        )
        .bind(LISTING_OPEN)
        .fetch_all(&self.pool)
        .await?;
        Ok(listings)
    }

    pub async fn create_listing(
        &self,
        seller_id: Uuid,
        item_type: &str,
        quantity: i32,
        price_usdt: Decimal,
    ) -> Result<MarketListing> {
        let listing = sqlx::query_as::<_, MarketListing>(
            "INSERT INTO market_listings (seller_id, item_type, quantity, price_usdt, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(seller_id)
        .bind(item_type)
        .bind(quantity)
        .bind(price_usdt)
        .bind(LISTING_OPEN)
        .fetch_one(&self.pool)
        .await?;
        Ok(listing)
    }

    pub async fn mark_listing_sold(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE market_listings SET status = $1 WHERE id = $2")
            .bind(LISTING_SOLD)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ==================== TX LOG QUERIES ====================
impl Database {
    pub async fn insert_tx_log(
        &self,
        user_id: Uuid,
        tx_type: &str,
        amount: Decimal,
        currency: &str,
        reference_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO tx_logs (user_id, tx_type, amount, currency, status, reference_id)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(tx_type)
        .bind(amount)
        .bind(currency)
        .bind(TX_SUCCESS)
        .bind(reference_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ==================== ADMIN QUERIES ====================

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct AdminUserRow {
    pub id: Uuid,
    pub wallet_address: String,
    pub role: String,
    pub gold_balance: Decimal,
    pub usdt_balance: Decimal,
    pub points: Decimal,
    pub cow_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_cows: i64,
    pub total_gold: Decimal,
    pub total_usdt: Decimal,
    pub total_points: Decimal,
}

impl Database {
    pub async fn list_users_with_cow_counts(&self) -> Result<Vec<AdminUserRow>> {
        let rows = sqlx::query_as::<_, AdminUserRow>(
            r#"
            SELECT u.id, u.wallet_address, u.role,
                   u.gold_balance, u.usdt_balance, u.points,
                   COUNT(c.id) AS cow_count,
                   u.created_at
            FROM users u
            LEFT JOIN cows c ON c.owner_id = u.id
            GROUP BY u.id
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats> {
        let stats = sqlx::query_as::<_, PlatformStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users)                          AS total_users,
                (SELECT COUNT(*) FROM cows)                           AS total_cows,
                (SELECT COALESCE(SUM(gold_balance), 0) FROM users)    AS total_gold,
                (SELECT COALESCE(SUM(usdt_balance), 0) FROM users)    AS total_usdt,
                (SELECT COALESCE(SUM(points), 0) FROM users)          AS total_points
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

/// Connects to the database named by DATABASE_URL and runs migrations.
/// Returns None when the variable is unset so storage-backed tests skip
/// cleanly on machines without Postgres.
#[cfg(test)]
pub(crate) async fn test_database() -> Option<Database> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let mut config = crate::config::test_config();
    config.database_url = url;
    let db = Database::new(&config).await.ok()?;
    db.run_migrations().await.ok()?;
    Some(db)
}

#[cfg(test)]
pub(crate) fn test_wallet() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::constants::ROLE_F2P;

    #[tokio::test]
    async fn database_new_returns_error_on_invalid_url() {
        let mut config = test_config();
        config.database_url = "not-a-url".to_string();
        let result = Database::new(&config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn registration_creates_starter_inventory_and_rotates_nonce() {
        let Some(db) = test_database().await else { return };

        let wallet = test_wallet();
        let user = db
            .create_user(&wallet, ROLE_F2P, "first-nonce", None)
            .await
            .unwrap();
        assert_eq!(user.wallet_address, wallet);
        assert_eq!(user.role, ROLE_F2P);
        assert_eq!(user.daily_ad_count, 0);
        assert_eq!(user.nonce, "first-nonce");

        let inventory = db.create_inventory(user.id).await.unwrap();
        assert_eq!(inventory.user_id, user.id);
        assert_eq!(inventory.grass, STARTER_GRASS);
        assert_eq!(inventory.milk, STARTER_MILK);
        assert_eq!(inventory.land_slots, STARTER_LAND_SLOTS);
        assert_eq!(inventory.has_barn, STARTER_HAS_BARN);

        db.update_nonce(&wallet, "second-nonce").await.unwrap();
        let reloaded = db.get_user_by_wallet(&wallet).await.unwrap().unwrap();
        assert_eq!(reloaded.nonce, "second-nonce");
    }

    #[tokio::test]
    async fn gold_shop_cow_purchase_creates_standard_cows() {
        let Some(db) = test_database().await else { return };

        let user = db
            .create_user(&test_wallet(), ROLE_F2P, "n", None)
            .await
            .unwrap();
        let cow = db.create_cow(user.id).await.unwrap();
        assert_eq!(cow.owner_id, user.id);
        assert_eq!(cow.cow_type, COW_TYPE_STANDARD);
        assert_eq!(cow.level, 1);
        assert_eq!(cow.happiness, 100);
        assert_eq!(db.count_cows(user.id).await.unwrap(), 1);
    }
}
