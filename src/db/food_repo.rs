use sqlx::SqlitePool;

use crate::error::DiaryError;
use crate::models::FoodRecord;

/// The food catalog. Seeded from outside; the diary only reads it.
#[derive(Clone)]
pub struct FoodRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct FoodRow {
    id: String,
    name: String,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fat_g: f64,
}

impl From<FoodRow> for FoodRecord {
    fn from(row: FoodRow) -> Self {
        FoodRecord {
            id: row.id,
            name: row.name,
            calories: row.calories,
            protein_g: row.protein_g,
            carbs_g: row.carbs_g,
            fat_g: row.fat_g,
        }
    }
}

const SELECT_FOODS: &str = "SELECT id, name, calories, protein_g, carbs_g, fat_g FROM foods";

/// Lowercased name kept alongside each food and matched by search.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

impl FoodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, food: &FoodRecord) -> Result<FoodRecord, DiaryError> {
        sqlx::query(
            r#"
            INSERT INTO foods (id, name, name_key, calories, protein_g, carbs_g, fat_g)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&food.id)
        .bind(&food.name)
        .bind(name_key(&food.name))
        .bind(food.calories)
        .bind(food.protein_g)
        .bind(food.carbs_g)
        .bind(food.fat_g)
        .execute(&self.pool)
        .await
        .map_err(DiaryError::write)?;

        Ok(food.clone())
    }

    /// Inserts the food or replaces the catalog values of an existing id.
    /// Diary entries already logged against it keep their totals.
    pub async fn upsert(&self, food: &FoodRecord) -> Result<FoodRecord, DiaryError> {
        sqlx::query(
            r#"
            INSERT INTO foods (id, name, name_key, calories, protein_g, carbs_g, fat_g)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                name_key = excluded.name_key,
                calories = excluded.calories,
                protein_g = excluded.protein_g,
                carbs_g = excluded.carbs_g,
                fat_g = excluded.fat_g
            "#,
        )
        .bind(&food.id)
        .bind(&food.name)
        .bind(name_key(&food.name))
        .bind(food.calories)
        .bind(food.protein_g)
        .bind(food.carbs_g)
        .bind(food.fat_g)
        .execute(&self.pool)
        .await
        .map_err(DiaryError::write)?;

        Ok(food.clone())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<FoodRecord>, DiaryError> {
        let row: Option<FoodRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_FOODS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DiaryError::read)?;

        Ok(row.map(FoodRecord::from))
    }

    pub async fn list(&self) -> Result<Vec<FoodRecord>, DiaryError> {
        let rows: Vec<FoodRow> = sqlx::query_as(&format!("{} ORDER BY rowid", SELECT_FOODS))
            .fetch_all(&self.pool)
            .await
            .map_err(DiaryError::read)?;

        Ok(rows.into_iter().map(FoodRecord::from).collect())
    }

    /// Foods whose lowercased name contains every token, in catalog order.
    /// Tokens must already be lowercased. No tokens matches every food.
    pub async fn search(&self, tokens: &[String]) -> Result<Vec<FoodRecord>, DiaryError> {
        let mut sql = String::from(SELECT_FOODS);
        for (i, _) in tokens.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str("instr(name_key, ?) > 0");
        }
        sql.push_str(" ORDER BY rowid");

        let mut query = sqlx::query_as::<_, FoodRow>(&sql);
        for token in tokens {
            query = query.bind(token.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DiaryError::read)?;

        Ok(rows.into_iter().map(FoodRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    struct TestContext {
        repo: FoodRepository,
        _temp_dir: TempDir,
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = init_db(&db_path).await.unwrap();
        TestContext {
            repo: FoodRepository::new(pool),
            _temp_dir: temp_dir,
        }
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let ctx = setup().await;
        let food = FoodRecord::new("oats", "Rolled Oats").with_nutrients(150.0, 5.0, 27.0, 2.5);

        ctx.repo.insert(&food).await.unwrap();

        let fetched = ctx.repo.get_by_id("oats").await.unwrap().unwrap();
        assert_eq!(fetched, food);
        assert!(ctx.repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_fails() {
        let ctx = setup().await;
        let food = FoodRecord::new("oats", "Rolled Oats");

        ctx.repo.insert(&food).await.unwrap();
        let result = ctx.repo.insert(&food).await;
        assert!(matches!(result, Err(DiaryError::WriteFailed(_))));
    }

    #[tokio::test]
    async fn test_upsert_replaces_values() {
        let ctx = setup().await;
        let food = FoodRecord::new("oats", "Rolled Oats").with_nutrients(150.0, 5.0, 27.0, 2.5);
        ctx.repo.upsert(&food).await.unwrap();

        let changed = FoodRecord::new("oats", "Steel Cut Oats").with_nutrients(170.0, 6.0, 29.0, 3.0);
        ctx.repo.upsert(&changed).await.unwrap();

        let fetched = ctx.repo.get_by_id("oats").await.unwrap().unwrap();
        assert_eq!(fetched, changed);
        assert_eq!(ctx.repo.list().await.unwrap().len(), 1);

        // The search key follows the new name
        assert_eq!(ctx.repo.search(&tokens(&["steel"])).await.unwrap().len(), 1);
        assert!(ctx.repo.search(&tokens(&["rolled"])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let ctx = setup().await;
        for (id, name) in [("b", "Banana"), ("a", "Apple"), ("c", "Cherry")] {
            ctx.repo.insert(&FoodRecord::new(id, name)).await.unwrap();
        }

        let ids: Vec<String> = ctx.repo.list().await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_search_requires_every_token() {
        let ctx = setup().await;
        ctx.repo
            .insert(&FoodRecord::new("1", "Grilled Chicken Breast"))
            .await
            .unwrap();
        ctx.repo
            .insert(&FoodRecord::new("2", "Chicken Thigh"))
            .await
            .unwrap();
        ctx.repo
            .insert(&FoodRecord::new("3", "Baked Fish"))
            .await
            .unwrap();

        let found = ctx.repo.search(&tokens(&["chicken"])).await.unwrap();
        assert_eq!(found.len(), 2);

        let found = ctx.repo.search(&tokens(&["chicken", "breast"])).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");

        let found = ctx.repo.search(&tokens(&["chicken", "fish"])).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_beyond_ascii() {
        let ctx = setup().await;
        ctx.repo
            .insert(&FoodRecord::new("1", "ÉCLAIR au Chocolat"))
            .await
            .unwrap();

        let found = ctx.repo.search(&tokens(&["éclair"])).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let ctx = setup().await;
        ctx.repo
            .insert(&FoodRecord::new("1", "Milk 2% fat"))
            .await
            .unwrap();
        ctx.repo
            .insert(&FoodRecord::new("2", "Skim Milk"))
            .await
            .unwrap();

        let found = ctx.repo.search(&tokens(&["2%"])).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(ctx.repo.search(&tokens(&["%"])).await.unwrap().len() == 1);
        assert!(ctx.repo.search(&tokens(&["_"])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_without_tokens_lists_all() {
        let ctx = setup().await;
        ctx.repo.insert(&FoodRecord::new("1", "Apple")).await.unwrap();
        ctx.repo.insert(&FoodRecord::new("2", "Pear")).await.unwrap();

        assert_eq!(ctx.repo.search(&[]).await.unwrap().len(), 2);
    }
}
