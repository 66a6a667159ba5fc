use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use super::food::FoodRecord;

/// Calories and macronutrients, either per serving or as a logged total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl NutrientTotals {
    pub fn new(calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            calories,
            protein_g,
            carbs_g,
            fat_g,
        }
    }

    /// Totals for `servings` of `food`. Evaluated once when an entry is
    /// created; the result is stored as-is and never recomputed.
    pub fn for_servings(food: &FoodRecord, servings: f64) -> Self {
        Self {
            calories: food.calories * servings,
            protein_g: food.protein_g * servings,
            carbs_g: food.carbs_g * servings,
            fat_g: food.fat_g * servings,
        }
    }
}

impl Add for NutrientTotals {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            calories: self.calories + other.calories,
            protein_g: self.protein_g + other.protein_g,
            carbs_g: self.carbs_g + other.carbs_g,
            fat_g: self.fat_g + other.fat_g,
        }
    }
}

impl AddAssign for NutrientTotals {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sum for NutrientTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl fmt::Display for NutrientTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0} kcal, protein {:.1} g, carbs {:.1} g, fat {:.1} g",
            self.calories, self.protein_g, self.carbs_g, self.fat_g
        )
    }
}
