//! Row slices returned by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use chrono::{DateTime, Utc};

/// Recipe row without its relations, as returned by list queries. The REST
/// layer paginates over these; `repo::get_recipe` resolves the full entity.
#[derive(Debug, Clone)]
pub struct RecipeRow {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i64,
    pub created_at: DateTime<Utc>,
}

/// One (ingredient name, quantity) pair from a user's shopping cart, fed to
/// the shopping-list aggregator. Fetched in a single batched join so the
/// aggregator never queries per ingredient.
#[derive(Debug, Clone)]
pub struct IngredientQuantityRow {
    pub name: String,
    pub quantity: f64,
}
