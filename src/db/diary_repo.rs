use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::DiaryError;
use crate::live::{DiaryChange, DiaryHub};
use crate::models::{parse_diary_date, DiaryEntry, MealType};

/// Diary entries. Every committed write is published to the hub so live
/// queries for the affected dates refresh without waiting for the hub's
/// commit polling.
#[derive(Clone)]
pub struct DiaryRepository {
    pool: SqlitePool,
    hub: Arc<DiaryHub>,
}

#[derive(sqlx::FromRow)]
struct DiaryEntryRow {
    id: String,
    user_id: String,
    food_id: String,
    date: String,
    meal_type: String,
    servings: f64,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fat_g: f64,
    created_at: String,
}

impl TryFrom<DiaryEntryRow> for DiaryEntry {
    type Error = DiaryError;

    fn try_from(row: DiaryEntryRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str| {
            DiaryError::StoreUnavailable(format!("Corrupt {} in entry {}", field, row.id))
        };

        Ok(DiaryEntry {
            id: Uuid::parse_str(&row.id).map_err(|_| corrupt("id"))?,
            date: parse_diary_date(&row.date).map_err(|_| corrupt("date"))?,
            meal_type: row
                .meal_type
                .parse::<MealType>()
                .map_err(|_| corrupt("meal_type"))?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| corrupt("created_at"))?,
            user_id: row.user_id,
            food_id: row.food_id,
            servings: row.servings,
            calories: row.calories,
            protein_g: row.protein_g,
            carbs_g: row.carbs_g,
            fat_g: row.fat_g,
        })
    }
}

impl DiaryRepository {
    pub fn new(pool: SqlitePool, hub: Arc<DiaryHub>) -> Self {
        Self { pool, hub }
    }

    pub fn hub(&self) -> &Arc<DiaryHub> {
        &self.hub
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create(&self, entry: &DiaryEntry) -> Result<DiaryEntry, DiaryError> {
        self.create_all(std::slice::from_ref(entry)).await?;
        Ok(entry.clone())
    }

    /// Writes all entries in one transaction: either every row commits or
    /// none does.
    pub async fn create_all(&self, entries: &[DiaryEntry]) -> Result<(), DiaryError> {
        let mut tx = self.pool.begin().await.map_err(DiaryError::write)?;

        for entry in entries {
            insert_entry(&mut tx, entry)
                .await
                .map_err(DiaryError::write)?;
        }

        tx.commit().await.map_err(DiaryError::write)?;

        let dates: BTreeSet<NaiveDate> = entries.iter().map(|e| e.date).collect();
        for date in dates {
            self.hub.publish(date, DiaryChange::Created).await;
        }

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<DiaryEntry>, DiaryError> {
        let row: Option<DiaryEntryRow> = sqlx::query_as("SELECT * FROM diary_entries WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DiaryError::read)?;

        row.map(DiaryEntry::try_from).transpose()
    }

    /// Entries whose date equals `date` exactly, oldest first.
    pub async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>, DiaryError> {
        let rows: Vec<DiaryEntryRow> = sqlx::query_as(
            "SELECT * FROM diary_entries WHERE date = ? ORDER BY created_at, rowid",
        )
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DiaryError::read)?;

        rows.into_iter().map(DiaryEntry::try_from).collect()
    }

    /// Deletes an entry. Returns false when no entry had that id.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DiaryError> {
        let deleted: Vec<(String,)> =
            sqlx::query_as("DELETE FROM diary_entries WHERE id = ? RETURNING date")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(DiaryError::write)?;

        match deleted.into_iter().next() {
            Some((date,)) => {
                if let Ok(date) = parse_diary_date(&date) {
                    self.hub.publish(date, DiaryChange::Deleted).await;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

async fn insert_entry(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &DiaryEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO diary_entries
            (id, user_id, food_id, date, meal_type, servings, calories, protein_g, carbs_g, fat_g, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(&entry.user_id)
    .bind(&entry.food_id)
    .bind(entry.date.to_string())
    .bind(entry.meal_type.as_str())
    .bind(entry.servings)
    .bind(entry.calories)
    .bind(entry.protein_g)
    .bind(entry.carbs_g)
    .bind(entry.fat_g)
    .bind(entry.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::FoodRecord;
    use tempfile::TempDir;

    struct TestContext {
        repo: DiaryRepository,
        pool: SqlitePool,
        _temp_dir: TempDir,
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(&db_path).await.unwrap();
        TestContext {
            repo: DiaryRepository::new(pool.clone(), Arc::new(DiaryHub::new())),
            pool,
            _temp_dir: temp_dir,
        }
    }

    fn oats() -> FoodRecord {
        FoodRecord::new("oats", "Rolled Oats").with_nutrients(150.0, 5.0, 27.0, 2.5)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn row_count(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM diary_entries")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_create_and_get_entry() {
        let ctx = setup().await;
        let entry = DiaryEntry::new("user1", &oats(), day(15), MealType::Breakfast, 1.5);

        let created = ctx.repo.create(&entry).await.unwrap();
        assert_eq!(created.id, entry.id);

        let fetched = ctx.repo.get_by_id(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "user1");
        assert_eq!(fetched.food_id, "oats");
        assert_eq!(fetched.date, day(15));
        assert_eq!(fetched.meal_type, MealType::Breakfast);
        assert_eq!(fetched.servings, 1.5);
        assert_eq!(fetched.calories, 225.0);
        assert_eq!(fetched.carbs_g, 40.5);
    }

    #[tokio::test]
    async fn test_list_for_date_is_exact() {
        let ctx = setup().await;
        for d in [14, 15, 15, 16] {
            let entry = DiaryEntry::new("user1", &oats(), day(d), MealType::Lunch, 1.0);
            ctx.repo.create(&entry).await.unwrap();
        }

        let entries = ctx.repo.list_for_date(day(15)).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.date == day(15)));

        assert!(ctx.repo.list_for_date(day(20)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_for_date_in_creation_order() {
        let ctx = setup().await;
        let first = DiaryEntry::new("user1", &oats(), day(15), MealType::Dinner, 1.0);
        let second = DiaryEntry::new("user1", &oats(), day(15), MealType::Breakfast, 2.0);
        ctx.repo.create(&first).await.unwrap();
        ctx.repo.create(&second).await.unwrap();

        let ids: Vec<Uuid> = ctx
            .repo
            .list_for_date(day(15))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_create_all_rolls_back_on_failure() {
        let ctx = setup().await;
        let good = DiaryEntry::new("user1", &oats(), day(15), MealType::Lunch, 1.0);
        // Violates the servings CHECK constraint after the first row went in
        let mut bad = DiaryEntry::new("user1", &oats(), day(15), MealType::Lunch, 1.0);
        bad.servings = 0.0;

        let result = ctx.repo.create_all(&[good, bad]).await;

        assert!(matches!(result, Err(DiaryError::WriteFailed(_))));
        assert_eq!(row_count(&ctx.pool).await, 0);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_fails() {
        let ctx = setup().await;
        let entry = DiaryEntry::new("user1", &oats(), day(15), MealType::Lunch, 1.0);
        ctx.repo.create(&entry).await.unwrap();

        let result = ctx.repo.create(&entry).await;
        assert!(matches!(result, Err(DiaryError::WriteFailed(_))));
        assert_eq!(row_count(&ctx.pool).await, 1);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let ctx = setup().await;
        let entry = DiaryEntry::new("user1", &oats(), day(15), MealType::Dinner, 1.0);
        ctx.repo.create(&entry).await.unwrap();

        assert!(ctx.repo.delete(entry.id).await.unwrap());
        assert!(ctx.repo.get_by_id(entry.id).await.unwrap().is_none());
        assert!(!ctx.repo.delete(entry.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_writes_publish_to_hub() {
        let ctx = setup().await;
        let mut rx = ctx.repo.hub().subscribe(day(15)).await;
        let mut other = ctx.repo.hub().subscribe(day(16)).await;

        let entry = DiaryEntry::new("user1", &oats(), day(15), MealType::Dinner, 1.0);
        ctx.repo.create(&entry).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), DiaryChange::Created);

        ctx.repo.delete(entry.id).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), DiaryChange::Deleted);

        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_write_publishes_nothing() {
        let ctx = setup().await;
        let mut rx = ctx.repo.hub().subscribe(day(15)).await;

        let mut bad = DiaryEntry::new("user1", &oats(), day(15), MealType::Lunch, 1.0);
        bad.servings = -1.0;
        assert!(ctx.repo.create(&bad).await.is_err());

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let ctx = setup().await;
        ctx.pool.close().await;

        let entry = DiaryEntry::new("user1", &oats(), day(15), MealType::Lunch, 1.0);
        let result = ctx.repo.create(&entry).await;
        assert!(matches!(result, Err(DiaryError::StoreUnavailable(_))));

        let result = ctx.repo.list_for_date(day(15)).await;
        assert!(matches!(result, Err(DiaryError::StoreUnavailable(_))));
    }
}
