//! Recipe Composer: creates and updates a recipe together with its tag set
//! and quantified ingredient lines.
//!
//! All writes for one recipe happen inside a single transaction, so a
//! mid-way failure (e.g. an unknown ingredient id) leaves no partial recipe
//! behind. Concurrent edits of the same recipe serialize on that
//! transaction; last committed wins.

use crate::db::{self, Pool};
use crate::error::{Error, Result};
use crate::model::{IngredientInput, NewRecipe, Recipe, RecipeUpdate};
use sqlx::{Row, Sqlite, Transaction};
use std::collections::HashSet;
use tracing::{info, instrument};

#[instrument(skip_all)]
pub async fn create_recipe(pool: &Pool, author_id: i64, input: &NewRecipe) -> Result<Recipe> {
    validate_cooking_time(input.cooking_time)?;
    validate_tags(&input.tags)?;
    validate_ingredients(&input.ingredients)?;

    let mut tx = pool.begin().await?;

    let author: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(author_id)
        .fetch_optional(&mut *tx)
        .await?;
    if author.is_none() {
        return Err(Error::not_found("user", author_id));
    }

    let recipe_id: i64 = sqlx::query(
        "INSERT INTO recipes (author_id, name, image, text, cooking_time) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(author_id)
    .bind(&input.name)
    .bind(&input.image)
    .bind(&input.text)
    .bind(input.cooking_time)
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    attach_tags_tx(&mut tx, recipe_id, &input.tags).await?;
    insert_ingredients_tx(&mut tx, recipe_id, &input.ingredients).await?;

    tx.commit().await?;
    info!(recipe_id, author_id, "recipe created");
    db::get_recipe(pool, recipe_id).await
}

/// Partial update. Omitted fields are untouched; a supplied tag or
/// ingredient set replaces the old set entirely (set semantics, so applying
/// the same update twice yields the same state). An explicitly empty set is
/// rejected, matching create.
#[instrument(skip_all)]
pub async fn update_recipe(pool: &Pool, recipe_id: i64, update: &RecipeUpdate) -> Result<Recipe> {
    if let Some(cooking_time) = update.cooking_time {
        validate_cooking_time(cooking_time)?;
    }
    if let Some(tags) = &update.tags {
        validate_tags(tags)?;
    }
    if let Some(ingredients) = &update.ingredients {
        validate_ingredients(ingredients)?;
    }

    let mut tx = pool.begin().await?;

    if !db::recipe_exists_tx(&mut tx, recipe_id).await? {
        return Err(Error::not_found("recipe", recipe_id));
    }

    sqlx::query(
        "UPDATE recipes SET name = COALESCE(?, name), text = COALESCE(?, text), \
         image = COALESCE(?, image), cooking_time = COALESCE(?, cooking_time) WHERE id = ?",
    )
    .bind(&update.name)
    .bind(&update.text)
    .bind(&update.image)
    .bind(update.cooking_time)
    .bind(recipe_id)
    .execute(&mut *tx)
    .await?;

    if let Some(tags) = &update.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        attach_tags_tx(&mut tx, recipe_id, tags).await?;
    }

    if let Some(ingredients) = &update.ingredients {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        insert_ingredients_tx(&mut tx, recipe_id, ingredients).await?;
    }

    tx.commit().await?;
    info!(recipe_id, "recipe updated");
    db::get_recipe(pool, recipe_id).await
}

async fn attach_tags_tx(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    for &tag_id in tag_ids {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ?")
            .bind(tag_id)
            .fetch_optional(&mut **tx)
            .await?;
        if found.is_none() {
            return Err(Error::not_found("tag", tag_id));
        }
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?, ?)")
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_ingredients_tx(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    items: &[IngredientInput],
) -> Result<()> {
    for (idx, item) in items.iter().enumerate() {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM ingredients WHERE id = ?")
            .bind(item.ingredient_id)
            .fetch_optional(&mut **tx)
            .await?;
        if found.is_none() {
            return Err(Error::not_found("ingredient", item.ingredient_id));
        }
        // position is 1..N in submitted order.
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, position) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(recipe_id)
        .bind(item.ingredient_id)
        .bind(item.quantity)
        .bind(idx as i64 + 1)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn validate_cooking_time(cooking_time: i64) -> Result<()> {
    if cooking_time < 1 {
        return Err(Error::Validation("cooking time must be at least 1 minute"));
    }
    Ok(())
}

fn validate_tags(tag_ids: &[i64]) -> Result<()> {
    if tag_ids.is_empty() {
        return Err(Error::Validation("specify at least one tag"));
    }
    let unique: HashSet<i64> = tag_ids.iter().copied().collect();
    if unique.len() != tag_ids.len() {
        return Err(Error::Validation("tags must not repeat"));
    }
    Ok(())
}

fn validate_ingredients(items: &[IngredientInput]) -> Result<()> {
    if items.is_empty() {
        return Err(Error::Validation("specify at least one ingredient"));
    }
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.ingredient_id) {
            return Err(Error::Validation("ingredients must not repeat"));
        }
        // NaN must fail here, not later at the store as a NOT NULL trip.
        if item.quantity.is_nan() || item.quantity < 1.0 {
            return Err(Error::Validation(
                "ingredient quantity must be at least 1",
            ));
        }
    }
    Ok(())
}
