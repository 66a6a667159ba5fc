//! Nutrilog
//!
//! Local nutrition diary: food catalog search, denormalized diary logging and
//! live per-date diary queries over SQLite.

pub mod config;
pub mod db;
pub mod diary;
pub mod error;
pub mod live;
pub mod models;
pub mod search;

pub use config::{Config, ConfigError, ConfigSource, ConfigValue};
pub use diary::NutritionDiary;
pub use error::DiaryError;
pub use live::{DiaryChange, DiaryHub, DiarySnapshot, DiarySubscription};
pub use models::{
    parse_diary_date, DailySummary, DiaryEntry, FoodRecord, MealSummary, MealType,
    NutrientTotals,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
