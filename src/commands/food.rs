use clap::{Args, Subcommand};
use uuid::Uuid;

use nutrilog::{FoodRecord, NutritionDiary};

use super::OutputFormat;

#[derive(Args)]
pub struct FoodCommand {
    #[command(subcommand)]
    pub command: FoodSubcommand,
}

#[derive(Subcommand)]
pub enum FoodSubcommand {
    /// Search the catalog by name (every word must match)
    Search {
        /// Search words
        #[arg(required = true)]
        query: Vec<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a food's nutrients
    Show {
        /// Food ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a custom food to the catalog
    Add {
        /// Name of the food
        name: String,

        /// Food ID (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Calories per serving
        #[arg(long, default_value_t = 0.0)]
        calories: f64,

        /// Protein per serving, in grams
        #[arg(long, default_value_t = 0.0)]
        protein: f64,

        /// Carbohydrates per serving, in grams
        #[arg(long, default_value_t = 0.0)]
        carbs: f64,

        /// Fat per serving, in grams
        #[arg(long, default_value_t = 0.0)]
        fat: f64,
    },
}

impl FoodCommand {
    pub async fn run(&self, diary: &NutritionDiary) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            FoodSubcommand::Search { query, format } => {
                let foods = diary.search_foods(&query.join(" ")).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&foods)?);
                    }
                    OutputFormat::Text => {
                        if foods.is_empty() {
                            println!("No foods found.");
                            return Ok(());
                        }
                        println!(
                            "{:<36}  {:<30}  {:>6}  {:>6}  {:>6}  {:>6}",
                            "ID", "NAME", "KCAL", "PROT", "CARB", "FAT"
                        );
                        println!("{}", "-".repeat(100));
                        for food in &foods {
                            println!(
                                "{:<36}  {:<30}  {:>6.0}  {:>6.1}  {:>6.1}  {:>6.1}",
                                food.id,
                                food.name,
                                food.calories,
                                food.protein_g,
                                food.carbs_g,
                                food.fat_g
                            );
                        }
                    }
                }
                Ok(())
            }

            FoodSubcommand::Show { id, format } => {
                let food = diary
                    .food_by_id(id)
                    .await?
                    .ok_or_else(|| format!("Food not found: {}", id))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&food)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", food);
                    }
                }
                Ok(())
            }

            FoodSubcommand::Add {
                name,
                id,
                calories,
                protein,
                carbs,
                fat,
            } => {
                if name.trim().is_empty() {
                    return Err("Food name cannot be empty".into());
                }
                let id = id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

                let food = FoodRecord::new(id, name.trim())
                    .with_nutrients(*calories, *protein, *carbs, *fat);
                let created = diary.catalog().insert(&food).await?;

                println!("Added food:");
                println!("{}", created);
                Ok(())
            }
        }
    }
}
