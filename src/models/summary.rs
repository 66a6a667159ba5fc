use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::diary_entry::DiaryEntry;
use super::meal_type::MealType;
use super::nutrients::NutrientTotals;

/// Totals for one meal of a day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealSummary {
    pub meal_type: MealType,
    pub entries: usize,
    pub totals: NutrientTotals,
}

/// A day of diary entries with the day total and per-meal breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub entries: Vec<DiaryEntry>,
    pub total: NutrientTotals,
    pub meals: Vec<MealSummary>,
}

impl DailySummary {
    /// Builds a summary from already-stored totals. Meals without entries are
    /// still listed so every day has the same shape.
    pub fn from_entries(date: NaiveDate, entries: Vec<DiaryEntry>) -> Self {
        let meals = MealType::ALL
            .iter()
            .map(|&meal_type| {
                let in_meal: Vec<&DiaryEntry> =
                    entries.iter().filter(|e| e.meal_type == meal_type).collect();
                MealSummary {
                    meal_type,
                    entries: in_meal.len(),
                    totals: in_meal.iter().map(|e| e.totals()).sum(),
                }
            })
            .collect();

        Self {
            date,
            total: entries.iter().map(DiaryEntry::totals).sum(),
            entries,
            meals,
        }
    }

    pub fn meal(&self, meal_type: MealType) -> Option<&MealSummary> {
        self.meals.iter().find(|m| m.meal_type == meal_type)
    }
}

impl fmt::Display for DailySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diary: {}", self.date)?;
        writeln!(f, "{}", "=".repeat(30))?;

        for meal in &self.meals {
            if meal.entries == 0 {
                continue;
            }
            writeln!(f, "\n{} ({}):", meal.meal_type, meal.totals)?;
            for entry in self.entries.iter().filter(|e| e.meal_type == meal.meal_type) {
                writeln!(
                    f,
                    "  - {} x{} ({:.0} kcal) [{}]",
                    entry.food_id, entry.servings, entry.calories, entry.id
                )?;
            }
        }

        writeln!(f, "\nTotal: {}", self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FoodRecord;

    #[test]
    fn test_summary_groups_by_meal() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let oats = FoodRecord::new("oats", "Oats").with_nutrients(150.0, 5.0, 27.0, 2.5);
        let egg = FoodRecord::new("egg", "Egg").with_nutrients(70.0, 6.0, 0.0, 5.0);

        let entries = vec![
            DiaryEntry::new("user1", &oats, date, MealType::Breakfast, 1.0),
            DiaryEntry::new("user1", &egg, date, MealType::Breakfast, 2.0),
            DiaryEntry::new("user1", &oats, date, MealType::Snacks, 0.5),
        ];

        let summary = DailySummary::from_entries(date, entries);

        assert_eq!(summary.entries.len(), 3);
        assert_eq!(summary.total.calories, 365.0);

        let breakfast = summary.meal(MealType::Breakfast).unwrap();
        assert_eq!(breakfast.entries, 2);
        assert_eq!(breakfast.totals.calories, 290.0);
        assert_eq!(breakfast.totals.protein_g, 17.0);

        let lunch = summary.meal(MealType::Lunch).unwrap();
        assert_eq!(lunch.entries, 0);
        assert_eq!(lunch.totals, NutrientTotals::default());
    }

    #[test]
    fn test_empty_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let summary = DailySummary::from_entries(date, Vec::new());

        assert_eq!(summary.meals.len(), 4);
        assert_eq!(summary.total, NutrientTotals::default());
        assert!(summary.to_string().contains("2024-01-15"));
    }
}
