//! Free-text food search over the catalog.

use crate::db::FoodRepository;
use crate::error::DiaryError;
use crate::models::FoodRecord;

/// Splits a query into lowercased whitespace-separated tokens, dropping
/// repeats and keeping first-seen order.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in query.to_lowercase().split_whitespace() {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// True when `name` contains every token, ignoring case.
pub fn matches_all(name: &str, tokens: &[String]) -> bool {
    let name = name.to_lowercase();
    tokens.iter().all(|token| name.contains(token.as_str()))
}

/// Foods whose name contains every word of `query`. A blank query finds
/// nothing.
pub async fn search_foods(
    catalog: &FoodRepository,
    query: &str,
) -> Result<Vec<FoodRecord>, DiaryError> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let foods = catalog.search(&tokens).await?;
    tracing::debug!("Search {:?} matched {} food(s)", tokens, foods.len());
    Ok(foods)
}
