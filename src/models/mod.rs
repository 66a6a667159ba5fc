mod diary_entry;
mod food;
mod meal_type;
mod nutrients;
mod summary;

pub use diary_entry::{parse_diary_date, DiaryEntry, DATE_FORMAT};
pub use food::FoodRecord;
pub use meal_type::MealType;
pub use nutrients::NutrientTotals;
pub use summary::{DailySummary, MealSummary};
