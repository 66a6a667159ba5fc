use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::food::FoodRecord;
use super::meal_type::MealType;
use super::nutrients::NutrientTotals;
use crate::error::DiaryError;

/// Storage and wire format of diary dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a diary date. Only the exact zero-padded `YYYY-MM-DD` form of a real
/// calendar date is accepted, so every stored date has one spelling.
pub fn parse_diary_date(s: &str) -> Result<NaiveDate, DiaryError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == s)
        .ok_or_else(|| DiaryError::invalid(format!("Invalid date '{}'. Use YYYY-MM-DD", s)))
}

/// One logged food. Nutrient fields hold totals for all servings, frozen when
/// the entry was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub food_id: String,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub servings: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub created_at: DateTime<Utc>,
}

impl DiaryEntry {
    pub fn new(
        user_id: impl Into<String>,
        food: &FoodRecord,
        date: NaiveDate,
        meal_type: MealType,
        servings: f64,
    ) -> Self {
        let totals = NutrientTotals::for_servings(food, servings);
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            food_id: food.id.clone(),
            date,
            meal_type,
            servings,
            calories: totals.calories,
            protein_g: totals.protein_g,
            carbs_g: totals.carbs_g,
            fat_g: totals.fat_g,
            created_at: Utc::now(),
        }
    }

    pub fn totals(&self) -> NutrientTotals {
        NutrientTotals::new(self.calories, self.protein_g, self.carbs_g, self.fat_g)
    }
}

impl fmt::Display for DiaryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} x{} of {} - {}",
            self.meal_type,
            self.date,
            self.servings,
            self.food_id,
            self.totals()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chicken() -> FoodRecord {
        FoodRecord::new("chicken", "Grilled Chicken Breast").with_nutrients(165.0, 31.0, 0.0, 3.6)
    }

    #[test]
    fn test_parse_diary_date() {
        let date = parse_diary_date("2024-01-15").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_diary_date_rejects_unpadded() {
        assert!(matches!(
            parse_diary_date("2024-01-5"),
            Err(DiaryError::InvalidInput(_))
        ));
        assert!(parse_diary_date("2024-1-15").is_err());
    }

    #[test]
    fn test_parse_diary_date_rejects_impossible_dates() {
        assert!(parse_diary_date("2024-02-30").is_err());
        assert!(parse_diary_date("2024-13-01").is_err());
    }

    #[test]
    fn test_parse_diary_date_rejects_other_shapes() {
        assert!(parse_diary_date("").is_err());
        assert!(parse_diary_date(" 2024-01-15").is_err());
        assert!(parse_diary_date("2024/01/15").is_err());
        assert!(parse_diary_date("15-01-2024").is_err());
    }

    #[test]
    fn test_entry_new_computes_totals() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let entry = DiaryEntry::new("user1", &chicken(), date, MealType::Lunch, 2.0);

        assert_eq!(entry.user_id, "user1");
        assert_eq!(entry.food_id, "chicken");
        assert_eq!(entry.servings, 2.0);
        assert_eq!(entry.calories, 330.0);
        assert_eq!(entry.protein_g, 62.0);
        assert_eq!(entry.carbs_g, 0.0);
        assert_eq!(entry.fat_g, 7.2);
    }

    #[test]
    fn test_entry_ignores_later_food_changes() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut food = chicken();
        let entry = DiaryEntry::new("user1", &food, date, MealType::Lunch, 1.0);

        food.calories = 999.0;
        assert_eq!(entry.calories, 165.0);
    }

    #[test]
    fn test_entry_json_uses_plain_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let entry = DiaryEntry::new("user1", &chicken(), date, MealType::Snacks, 1.0);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["date"], "2024-01-15");
        assert_eq!(json["meal_type"], "snacks");
    }
}
