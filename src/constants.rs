//! Application constants

pub const API_VERSION: &str = "v1";

// Root admin wallet, registered as ADMIN on startup. Lowercase on purpose:
// wallet addresses are normalized to lowercase everywhere in the database.
pub const DEV_WALLET_ADDRESS: &str = "0xbb9468c225c35ba3cbe441660ef9de3a66eb772a";

// Roles
pub const ROLE_F2P: &str = "F2P";
pub const ROLE_ADMIN: &str = "ADMIN";

// Cow types
pub const COW_TYPE_STANDARD: &str = "STANDARD";

// Item types tradeable on the marketplace
pub const ITEM_GRASS: &str = "GRASS";
pub const ITEM_MILK: &str = "MILK";

// Listing lifecycle
pub const LISTING_OPEN: &str = "OPEN";
pub const LISTING_SOLD: &str = "SOLD";

// Tx log statuses
pub const TX_SUCCESS: &str = "SUCCESS";

// Happiness tuning
pub const HAPPINESS_MAX: i32 = 100;
pub const FEED_HAPPINESS_GAIN: i32 = 20;
pub const HARVEST_HAPPINESS_COST: i32 = 30;
pub const HARVEST_HAPPINESS_THRESHOLD: i32 = 50;
pub const MILK_PER_HARVEST: i32 = 1;

// Starter pack granted at registration
pub const STARTER_GRASS: i32 = 0;
pub const STARTER_MILK: i32 = 0;
pub const STARTER_LAND_SLOTS: i32 = 1;
pub const STARTER_HAS_BARN: bool = true;

// Ad-reward (Care) mechanic
pub const DAILY_AD_LIMIT: i32 = 50;
pub const AD_GOLD_REWARD: i64 = 10;
pub const AD_HAPPINESS_BOOST: i32 = 50;
pub const AD_FALLBACK_GRASS: i32 = 5;

// Marketplace listing price bounds, in USDT
pub const LISTING_MIN_PRICE_USDT: &str = "0.01";
pub const LISTING_MAX_PRICE_USDT: &str = "10000";

// Gold economy
pub const MILK_TO_GOLD_RATE: i64 = 5;
pub const SWAP_GOLD_PER_COW_TOKEN: i64 = 100;
pub const SWAP_GOLD_PER_USDT: i64 = 10_000;

// Gold shop unit prices
pub const GOLD_PRICE_GRASS: i64 = 10;
pub const GOLD_PRICE_BABY_COW: i64 = 500;
pub const GOLD_PRICE_COW: i64 = 2_000;
pub const GOLD_PRICE_LAND: i64 = 1_000;
pub const GOLD_PRICE_VITAMIN: i64 = 50;

// Referral
pub const REFERRAL_LINK_BASE: &str = "https://cashcowvalley.com?ref=";
