mod diary_repo;
mod food_repo;

pub use diary_repo::DiaryRepository;
pub use food_repo::FoodRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::DiaryError;

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, DiaryError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DiaryError::StoreUnavailable(format!(
                "Failed to create database directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(DiaryError::read)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(DiaryError::read)?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DiaryError::StoreUnavailable(format!("Migration failed: {}", e)))?;

    Ok(pool)
}
