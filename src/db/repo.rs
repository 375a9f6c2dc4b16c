use super::model::{IngredientQuantityRow, RecipeRow};
use crate::error::{Error, Result};
use crate::model::{Ingredient, Recipe, RecipeIngredient, Tag, User};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{expanded_path}");
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(sqlx::Error::from)?;
    Ok(())
}

// ---- users ----

#[instrument(skip_all)]
pub async fn create_user(
    pool: &Pool,
    email: &str,
    username: &str,
    first_name: &str,
    last_name: &str,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO users (email, username, first_name, last_name) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(email)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::on_unique(e, "email or username already taken"))?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn get_user(pool: &Pool, id: i64) -> Result<User> {
    let row = sqlx::query(
        "SELECT id, email, username, first_name, last_name, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Err(Error::not_found("user", id));
    };
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: row.get("created_at"),
    })
}

// ---- tags ----

#[instrument(skip_all)]
pub async fn create_tag(pool: &Pool, name: &str, color: &str, slug: &str) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO tags (name, color, slug) VALUES (?, ?, ?) RETURNING id")
        .bind(name)
        .bind(color)
        .bind(slug)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::on_unique(e, "tag name, color pair or slug already taken"))?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn get_tag(pool: &Pool, id: i64) -> Result<Tag> {
    sqlx::query("SELECT id, name, color, slug FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(|row| tag_from_row(&row))
        .ok_or_else(|| Error::not_found("tag", id))
}

#[instrument(skip_all)]
pub async fn list_tags(pool: &Pool) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, name, color, slug FROM tags ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(tag_from_row).collect())
}

fn tag_from_row(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        color: row.get("color"),
        slug: row.get("slug"),
    }
}

// ---- ingredients ----

#[instrument(skip_all)]
pub async fn create_ingredient(pool: &Pool, name: &str, measurement_unit: &str) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO ingredients (name, measurement_unit) VALUES (?, ?) RETURNING id",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::on_unique(e, "ingredient with this measurement unit already exists"))?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn get_ingredient(pool: &Pool, id: i64) -> Result<Ingredient> {
    sqlx::query("SELECT id, name, measurement_unit FROM ingredients WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(|row| ingredient_from_row(&row))
        .ok_or_else(|| Error::not_found("ingredient", id))
}

#[instrument(skip_all)]
pub async fn list_ingredients(pool: &Pool) -> Result<Vec<Ingredient>> {
    let rows = sqlx::query("SELECT id, name, measurement_unit FROM ingredients ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(ingredient_from_row).collect())
}

/// Name-prefix search backing the ingredient lookup box. The search term is
/// literal: `%` and `_` match themselves, not LIKE wildcards.
#[instrument(skip_all)]
pub async fn search_ingredients(pool: &Pool, prefix: &str) -> Result<Vec<Ingredient>> {
    let rows = sqlx::query(
        "SELECT id, name, measurement_unit FROM ingredients \
         WHERE name LIKE ? || '%' ESCAPE '\\' ORDER BY name",
    )
    .bind(escape_like(prefix))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(ingredient_from_row).collect())
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn ingredient_from_row(row: &sqlx::sqlite::SqliteRow) -> Ingredient {
    Ingredient {
        id: row.get("id"),
        name: row.get("name"),
        measurement_unit: row.get("measurement_unit"),
    }
}

// ---- recipes (reads; writes live in the composer) ----

/// Fetch a recipe with its tags (attach order) and ingredient lines
/// (submitted order) resolved.
#[instrument(skip_all)]
pub async fn get_recipe(pool: &Pool, id: i64) -> Result<Recipe> {
    let row = sqlx::query(
        "SELECT id, author_id, name, image, text, cooking_time, created_at FROM recipes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Err(Error::not_found("recipe", id));
    };

    let tags = sqlx::query(
        "SELECT t.id, t.name, t.color, t.slug FROM recipe_tags rt \
         JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = ? ORDER BY rt.rowid",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(tag_from_row)
    .collect();

    let ingredients = sqlx::query(
        "SELECT ri.ingredient_id, i.name, i.measurement_unit, ri.quantity \
         FROM recipe_ingredients ri \
         JOIN ingredients i ON i.id = ri.ingredient_id \
         WHERE ri.recipe_id = ? ORDER BY ri.position",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| RecipeIngredient {
        ingredient_id: r.get("ingredient_id"),
        name: r.get("name"),
        measurement_unit: r.get("measurement_unit"),
        quantity: r.get("quantity"),
    })
    .collect();

    Ok(Recipe {
        id: row.get("id"),
        author_id: row.get("author_id"),
        name: row.get("name"),
        image: row.get("image"),
        text: row.get("text"),
        cooking_time: row.get("cooking_time"),
        tags,
        ingredients,
        created_at: row.get("created_at"),
    })
}

/// Recipe rows newest-first, relations unresolved. Pagination is the REST
/// layer's concern.
#[instrument(skip_all)]
pub async fn list_recipes(pool: &Pool) -> Result<Vec<RecipeRow>> {
    let rows = sqlx::query(
        "SELECT id, author_id, name, image, text, cooking_time, created_at \
         FROM recipes ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| RecipeRow {
            id: row.get("id"),
            author_id: row.get("author_id"),
            name: row.get("name"),
            image: row.get("image"),
            text: row.get("text"),
            cooking_time: row.get("cooking_time"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        })
        .collect())
}

/// Delete a recipe together with its join and toggle rows. SQLite leaves
/// foreign-key enforcement off per connection, so the cleanup is explicit
/// rather than cascade-driven.
#[instrument(skip_all)]
pub async fn delete_recipe(pool: &Pool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let res = sqlx::query("DELETE FROM recipes WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found("recipe", id));
    }
    for sql in [
        "DELETE FROM recipe_ingredients WHERE recipe_id = ?",
        "DELETE FROM recipe_tags WHERE recipe_id = ?",
        "DELETE FROM favorites WHERE recipe_id = ?",
        "DELETE FROM shopping_list WHERE recipe_id = ?",
    ] {
        sqlx::query(sql).bind(id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub(crate) async fn recipe_exists_tx(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM recipes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(found.is_some())
}

async fn ensure_recipe(pool: &Pool, id: i64) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM recipes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    if found.is_none() {
        return Err(Error::not_found("recipe", id));
    }
    Ok(())
}

// ---- favorites ----

/// Insert-or-fail: the UNIQUE (user, recipe) constraint guards against a
/// duplicate, so there is no check-then-insert race.
#[instrument(skip_all)]
pub async fn add_favorite(pool: &Pool, user_id: i64, recipe_id: i64) -> Result<()> {
    ensure_recipe(pool, recipe_id).await?;
    sqlx::query("INSERT INTO favorites (user_id, recipe_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| Error::on_unique(e, "recipe already in favorites"))?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn remove_favorite(pool: &Pool, user_id: i64, recipe_id: i64) -> Result<()> {
    let res = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND recipe_id = ?")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found("favorite for recipe", recipe_id));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn is_favorited(pool: &Pool, user_id: i64, recipe_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = ? AND recipe_id = ?")
            .bind(user_id)
            .bind(recipe_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

// ---- shopping list entries ----

#[instrument(skip_all)]
pub async fn add_to_shopping_list(pool: &Pool, user_id: i64, recipe_id: i64) -> Result<()> {
    ensure_recipe(pool, recipe_id).await?;
    sqlx::query("INSERT INTO shopping_list (user_id, recipe_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| Error::on_unique(e, "recipe already in shopping list"))?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn remove_from_shopping_list(pool: &Pool, user_id: i64, recipe_id: i64) -> Result<()> {
    let res = sqlx::query("DELETE FROM shopping_list WHERE user_id = ? AND recipe_id = ?")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found("shopping list entry for recipe", recipe_id));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn is_in_shopping_list(pool: &Pool, user_id: i64, recipe_id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM shopping_list WHERE user_id = ? AND recipe_id = ?",
    )
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Every (ingredient name, quantity) pair across all recipes in the user's
/// cart, in one batched join. The aggregator sums these in memory.
#[instrument(skip_all)]
pub async fn shopping_cart_quantities(
    pool: &Pool,
    user_id: i64,
) -> Result<Vec<IngredientQuantityRow>> {
    let rows = sqlx::query(
        "SELECT i.name AS name, ri.quantity AS quantity \
         FROM shopping_list s \
         JOIN recipe_ingredients ri ON ri.recipe_id = s.recipe_id \
         JOIN ingredients i ON i.id = ri.ingredient_id \
         WHERE s.user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| IngredientQuantityRow {
            name: row.get("name"),
            quantity: row.get("quantity"),
        })
        .collect())
}

// ---- follows ----

#[instrument(skip_all)]
pub async fn follow(pool: &Pool, user_id: i64, following_id: i64) -> Result<()> {
    if user_id == following_id {
        return Err(Error::Conflict("cannot follow yourself"));
    }
    get_user(pool, following_id).await?;
    sqlx::query("INSERT INTO follows (user_id, following_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(following_id)
        .execute(pool)
        .await
        .map_err(|e| Error::on_unique(e, "already following this user"))?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn unfollow(pool: &Pool, user_id: i64, following_id: i64) -> Result<()> {
    let res = sqlx::query("DELETE FROM follows WHERE user_id = ? AND following_id = ?")
        .bind(user_id)
        .bind(following_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found("follow of user", following_id));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn is_following(pool: &Pool, user_id: i64, following_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ? AND following_id = ?")
            .bind(user_id)
            .bind(following_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Ids of the users somebody subscribes to, oldest subscription first.
#[instrument(skip_all)]
pub async fn list_following(pool: &Pool, user_id: i64) -> Result<Vec<i64>> {
    let ids =
        sqlx::query_scalar("SELECT following_id FROM follows WHERE user_id = ? ORDER BY rowid")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(ids)
}
