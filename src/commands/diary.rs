use chrono::NaiveDate;
use clap::{Args, Subcommand};
use std::io::{self, Write};
use uuid::Uuid;

use nutrilog::{Config, DiaryEntry, FoodRecord, MealType, NutrientTotals, NutritionDiary};

use super::{date_or_today, OutputFormat};

#[derive(Args)]
pub struct DiaryCommand {
    #[command(subcommand)]
    pub command: DiarySubcommand,
}

#[derive(Subcommand)]
pub enum DiarySubcommand {
    /// Log foods to the diary
    Log {
        /// Food ID, optionally with servings as ID@SERVINGS (can be repeated)
        #[arg(required = true, value_name = "FOOD")]
        foods: Vec<String>,

        /// Meal type (breakfast, lunch, dinner, snacks)
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: String,

        /// Servings for foods given without @SERVINGS
        #[arg(long, short, default_value_t = 1.0)]
        servings: f64,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,
    },

    /// Show a day's entries and totals
    Show {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a diary entry
    Delete {
        /// Entry ID (UUID)
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Print a day's entries again every time they change, including writes
    /// from other nutrilog processes (Ctrl-C to stop)
    Watch {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl DiaryCommand {
    pub async fn run(
        &self,
        diary: &NutritionDiary,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            DiarySubcommand::Log {
                foods,
                meal_type,
                servings,
                date,
            } => {
                let meal_type: MealType = meal_type.parse()?;
                let date = date_or_today(date);
                let user_id = &config.user_id.value;

                let mut items: Vec<(FoodRecord, f64)> = Vec::with_capacity(foods.len());
                for arg in foods {
                    let (id, item_servings) = parse_food_arg(arg, *servings)?;
                    let food = diary
                        .food_by_id(id)
                        .await?
                        .ok_or_else(|| format!("Food not found: {}", id))?;
                    items.push((food, item_servings));
                }

                let logged = if let [(food, item_servings)] = items.as_slice() {
                    vec![
                        diary
                            .log_food_to_diary(user_id, food, &date, meal_type, *item_servings)
                            .await?,
                    ]
                } else {
                    diary
                        .log_meal_to_diary(user_id, &items, &date, meal_type)
                        .await?
                };

                println!("Logged:");
                for entry in &logged {
                    println!("  {} ({})", entry, entry.id);
                }
                Ok(())
            }

            DiarySubcommand::Show { date, format } => {
                let summary = diary.daily_summary(&date_or_today(date)).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&summary)?);
                    }
                    OutputFormat::Text => {
                        print!("{}", summary);
                    }
                }
                Ok(())
            }

            DiarySubcommand::Delete { id, force } => {
                let uuid = Uuid::parse_str(id).map_err(|_| format!("Invalid entry ID: {}", id))?;
                let entry = diary
                    .diary_entry(uuid)
                    .await?
                    .ok_or_else(|| format!("Diary entry not found: {}", id))?;

                if !force {
                    print!("Delete entry '{}'? [y/N] ", entry);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                diary.delete_diary_entry(uuid).await?;
                println!("Deleted entry: {}", entry.id);
                Ok(())
            }

            DiarySubcommand::Watch { date, format } => {
                let mut subscription = diary
                    .observe_diary_entries_for_date(&date_or_today(date))
                    .await?;
                let watched = subscription.date();

                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        snapshot = subscription.next() => match snapshot {
                            Some(Ok(entries)) => print_snapshot(watched, &entries, format)?,
                            Some(Err(e)) => eprintln!("Error: {}", e),
                            None => break,
                        },
                    }
                }

                subscription.cancel().await;
                Ok(())
            }
        }
    }
}

/// Splits `ID@SERVINGS`. A bare ID uses `default_servings`.
fn parse_food_arg(arg: &str, default_servings: f64) -> Result<(&str, f64), String> {
    match arg.rsplit_once('@') {
        Some((id, servings)) => {
            let servings = servings
                .parse::<f64>()
                .map_err(|_| format!("Invalid servings in '{}'", arg))?;
            Ok((id, servings))
        }
        None => Ok((arg, default_servings)),
    }
}

fn print_snapshot(
    date: NaiveDate,
    entries: &[DiaryEntry],
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(entries)?);
        }
        OutputFormat::Text => {
            let total: NutrientTotals = entries.iter().map(DiaryEntry::totals).sum();
            println!("{} - {} entries - {}", date, entries.len(), total);
            for entry in entries {
                println!("  {}", entry);
            }
        }
    }
    Ok(())
}
