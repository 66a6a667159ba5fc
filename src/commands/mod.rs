mod config_cmd;
mod diary;
mod food;

pub use config_cmd::ConfigCommand;
pub use diary::DiaryCommand;
pub use food::FoodCommand;

use chrono::Local;
use clap::ValueEnum;

use nutrilog::models::DATE_FORMAT;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// The given date, or today in local time.
fn date_or_today(date: &Option<String>) -> String {
    date.clone()
        .unwrap_or_else(|| Local::now().date_naive().format(DATE_FORMAT).to_string())
}
