// src/models/mod.rs
pub mod game;

pub use game::{ApiResponse, Cow, Inventory, MarketListing, User};
