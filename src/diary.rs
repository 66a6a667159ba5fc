//! The diary service: food search, logging and live diary queries.

use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{init_db, DiaryRepository, FoodRepository};
use crate::error::DiaryError;
use crate::live::{DiaryHub, DiarySubscription};
use crate::models::{parse_diary_date, DailySummary, DiaryEntry, FoodRecord, MealType};
use crate::search;

/// Entry point for presentation code. Owns the catalog and diary stores and
/// the hub that connects diary writes to live queries.
pub struct NutritionDiary {
    foods: FoodRepository,
    entries: DiaryRepository,
}

impl NutritionDiary {
    pub fn new(pool: SqlitePool) -> Self {
        let hub = Arc::new(DiaryHub::new());
        Self {
            foods: FoodRepository::new(pool.clone()),
            entries: DiaryRepository::new(pool, hub),
        }
    }

    /// Opens (creating if needed) the database named by the config.
    pub async fn open(config: &Config) -> Result<Self, DiaryError> {
        let pool = init_db(&config.database_path.value).await?;
        Ok(Self::new(pool))
    }

    /// The catalog store, for whoever maintains the catalog.
    pub fn catalog(&self) -> &FoodRepository {
        &self.foods
    }

    /// Foods whose name contains every word of `query`, in catalog order.
    pub async fn search_foods(&self, query: &str) -> Result<Vec<FoodRecord>, DiaryError> {
        search::search_foods(&self.foods, query).await
    }

    pub async fn food_by_id(&self, id: &str) -> Result<Option<FoodRecord>, DiaryError> {
        self.foods.get_by_id(id).await
    }

    /// Logs `servings` of `food`. Totals are computed from `food` as given and
    /// never change afterwards.
    pub async fn log_food_to_diary(
        &self,
        user_id: &str,
        food: &FoodRecord,
        date: &str,
        meal_type: MealType,
        servings: f64,
    ) -> Result<DiaryEntry, DiaryError> {
        validate_user(user_id)?;
        let date = parse_diary_date(date)?;
        validate_servings(servings)?;

        let entry = DiaryEntry::new(user_id, food, date, meal_type, servings);
        let entry = self.entries.create(&entry).await?;

        tracing::info!(
            "Logged {} x{} of '{}' for {} on {} ({:.0} kcal)",
            entry.meal_type,
            entry.servings,
            food.name,
            entry.user_id,
            entry.date,
            entry.calories
        );
        Ok(entry)
    }

    /// Logs several foods for one meal. Either every entry is written or none.
    pub async fn log_meal_to_diary(
        &self,
        user_id: &str,
        items: &[(FoodRecord, f64)],
        date: &str,
        meal_type: MealType,
    ) -> Result<Vec<DiaryEntry>, DiaryError> {
        validate_user(user_id)?;
        let date = parse_diary_date(date)?;
        if items.is_empty() {
            return Err(DiaryError::invalid("A meal needs at least one food"));
        }
        for (_, servings) in items {
            validate_servings(*servings)?;
        }

        let entries: Vec<DiaryEntry> = items
            .iter()
            .map(|(food, servings)| DiaryEntry::new(user_id, food, date, meal_type, *servings))
            .collect();
        self.entries.create_all(&entries).await?;

        tracing::info!(
            "Logged {} food(s) for {} of {} on {}",
            entries.len(),
            meal_type,
            user_id,
            date
        );
        Ok(entries)
    }

    pub async fn diary_entry(&self, id: Uuid) -> Result<Option<DiaryEntry>, DiaryError> {
        self.entries.get_by_id(id).await
    }

    /// Deletes an entry. Returns false when there was nothing to delete.
    pub async fn delete_diary_entry(&self, id: Uuid) -> Result<bool, DiaryError> {
        let deleted = self.entries.delete(id).await?;
        if deleted {
            tracing::info!("Deleted diary entry {}", id);
        }
        Ok(deleted)
    }

    pub async fn diary_entries_for_date(&self, date: &str) -> Result<Vec<DiaryEntry>, DiaryError> {
        let date = parse_diary_date(date)?;
        self.entries.list_for_date(date).await
    }

    pub async fn daily_summary(&self, date: &str) -> Result<DailySummary, DiaryError> {
        let date = parse_diary_date(date)?;
        let entries = self.entries.list_for_date(date).await?;
        Ok(DailySummary::from_entries(date, entries))
    }

    /// Live view of the entries for `date`. The subscription yields the
    /// current entries first, then the full set again after each change to
    /// that date.
    pub async fn observe_diary_entries_for_date(
        &self,
        date: &str,
    ) -> Result<DiarySubscription, DiaryError> {
        let date = parse_diary_date(date)?;
        Ok(DiarySubscription::start(self.entries.clone(), date).await)
    }
}

fn validate_user(user_id: &str) -> Result<(), DiaryError> {
    if user_id.trim().is_empty() {
        return Err(DiaryError::invalid("User id must not be empty"));
    }
    Ok(())
}

fn validate_servings(servings: f64) -> Result<(), DiaryError> {
    if !servings.is_finite() || servings <= 0.0 {
        return Err(DiaryError::invalid(format!(
            "Servings must be a positive number, got {}",
            servings
        )));
    }
    Ok(())
}
