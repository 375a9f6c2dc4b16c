use foodgram_core::model::{IngredientInput, NewRecipe, RecipeUpdate};
use foodgram_core::{db, recipe, Error};

async fn setup_pool() -> sqlx::SqlitePool {
    // A single long-lived connection: each pooled connection would otherwise
    // get its own empty in-memory database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

struct Fixture {
    author: i64,
    tags: Vec<i64>,
    ingredients: Vec<i64>,
}

async fn seed(pool: &sqlx::SqlitePool) -> Fixture {
    let author = db::create_user(pool, "chef@example.com", "chef", "Carla", "Cook")
        .await
        .unwrap();
    let mut tags = Vec::new();
    for (name, color, slug) in [
        ("breakfast", "#ff0000", "breakfast"),
        ("dinner", "#00ff00", "dinner"),
        ("vegan", "#0000ff", "vegan"),
    ] {
        tags.push(db::create_tag(pool, name, color, slug).await.unwrap());
    }
    let mut ingredients = Vec::new();
    for (name, unit) in [("flour", "g"), ("egg", "pcs"), ("milk", "ml")] {
        ingredients.push(db::create_ingredient(pool, name, unit).await.unwrap());
    }
    Fixture {
        author,
        tags,
        ingredients,
    }
}

fn new_recipe(fx: &Fixture) -> NewRecipe {
    NewRecipe {
        name: "Pancakes".into(),
        text: "Mix and fry.".into(),
        cooking_time: 20,
        image: None,
        tags: vec![fx.tags[0], fx.tags[1]],
        ingredients: vec![
            IngredientInput {
                ingredient_id: fx.ingredients[0],
                quantity: 200.0,
            },
            IngredientInput {
                ingredient_id: fx.ingredients[1],
                quantity: 2.0,
            },
        ],
    }
}

#[tokio::test]
async fn create_returns_submitted_sets_in_order() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;

    let created = recipe::create_recipe(&pool, fx.author, &new_recipe(&fx))
        .await
        .unwrap();

    assert_eq!(created.author_id, fx.author);
    assert_eq!(created.cooking_time, 20);
    let tag_ids: Vec<i64> = created.tags.iter().map(|t| t.id).collect();
    assert_eq!(tag_ids, vec![fx.tags[0], fx.tags[1]]);

    let lines: Vec<(i64, f64)> = created
        .ingredients
        .iter()
        .map(|i| (i.ingredient_id, i.quantity))
        .collect();
    assert_eq!(
        lines,
        vec![(fx.ingredients[0], 200.0), (fx.ingredients[1], 2.0)]
    );
    assert_eq!(created.ingredients[0].name, "flour");
    assert_eq!(created.ingredients[0].measurement_unit, "g");
}

#[tokio::test]
async fn create_rejects_each_invalid_input_independently() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;

    let mut r = new_recipe(&fx);
    r.tags.clear();
    assert!(matches!(
        recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err(),
        Error::Validation(_)
    ));

    let mut r = new_recipe(&fx);
    r.tags = vec![fx.tags[0], fx.tags[0]];
    assert!(matches!(
        recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err(),
        Error::Validation(_)
    ));

    let mut r = new_recipe(&fx);
    r.ingredients.clear();
    assert!(matches!(
        recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err(),
        Error::Validation(_)
    ));

    let mut r = new_recipe(&fx);
    r.ingredients[1].ingredient_id = r.ingredients[0].ingredient_id;
    assert!(matches!(
        recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err(),
        Error::Validation(_)
    ));

    let mut r = new_recipe(&fx);
    r.ingredients[0].quantity = 0.0;
    assert!(matches!(
        recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err(),
        Error::Validation(_)
    ));

    let mut r = new_recipe(&fx);
    r.cooking_time = 0;
    assert!(matches!(
        recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err(),
        Error::Validation(_)
    ));
}

#[tokio::test]
async fn unknown_ingredient_rolls_back_whole_recipe() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;

    let mut r = new_recipe(&fx);
    r.ingredients.push(IngredientInput {
        ingredient_id: 9999,
        quantity: 3.0,
    });
    let err = recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    // Nothing of the half-built recipe is visible.
    let recipes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
        .fetch_one(&pool)
        .await
        .unwrap();
    let joins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipe_ingredients")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(recipes, 0);
    assert_eq!(joins, 0);
}

#[tokio::test]
async fn unknown_tag_is_not_found() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;

    let mut r = new_recipe(&fx);
    r.tags = vec![9999];
    assert!(matches!(
        recipe::create_recipe(&pool, fx.author, &r).await.unwrap_err(),
        Error::NotFound { .. }
    ));
}

#[tokio::test]
async fn update_replaces_tag_set_entirely() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;
    let created = recipe::create_recipe(&pool, fx.author, &new_recipe(&fx))
        .await
        .unwrap();

    // New set shares nothing with the old one.
    let update = RecipeUpdate {
        tags: Some(vec![fx.tags[2]]),
        ..RecipeUpdate::default()
    };
    let updated = recipe::update_recipe(&pool, created.id, &update)
        .await
        .unwrap();

    let tag_ids: Vec<i64> = updated.tags.iter().map(|t| t.id).collect();
    assert_eq!(tag_ids, vec![fx.tags[2]]);

    // No residual membership rows for the old tags.
    let residual: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM recipe_tags WHERE recipe_id = ? AND tag_id != ?",
    )
    .bind(created.id)
    .bind(fx.tags[2])
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(residual, 0);
}

#[tokio::test]
async fn update_with_omitted_ingredients_leaves_them_unchanged() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;
    let created = recipe::create_recipe(&pool, fx.author, &new_recipe(&fx))
        .await
        .unwrap();

    let update = RecipeUpdate {
        name: Some("Thick pancakes".into()),
        ..RecipeUpdate::default()
    };
    let updated = recipe::update_recipe(&pool, created.id, &update)
        .await
        .unwrap();

    assert_eq!(updated.name, "Thick pancakes");
    assert_eq!(updated.text, created.text);
    let before: Vec<(i64, f64)> = created
        .ingredients
        .iter()
        .map(|i| (i.ingredient_id, i.quantity))
        .collect();
    let after: Vec<(i64, f64)> = updated
        .ingredients
        .iter()
        .map(|i| (i.ingredient_id, i.quantity))
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn update_rejects_explicitly_empty_sets() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;
    let created = recipe::create_recipe(&pool, fx.author, &new_recipe(&fx))
        .await
        .unwrap();

    let update = RecipeUpdate {
        ingredients: Some(vec![]),
        ..RecipeUpdate::default()
    };
    assert!(matches!(
        recipe::update_recipe(&pool, created.id, &update).await.unwrap_err(),
        Error::Validation(_)
    ));

    let update = RecipeUpdate {
        tags: Some(vec![]),
        ..RecipeUpdate::default()
    };
    assert!(matches!(
        recipe::update_recipe(&pool, created.id, &update).await.unwrap_err(),
        Error::Validation(_)
    ));
}

#[tokio::test]
async fn update_replaces_ingredient_set_when_supplied() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;
    let created = recipe::create_recipe(&pool, fx.author, &new_recipe(&fx))
        .await
        .unwrap();

    let update = RecipeUpdate {
        ingredients: Some(vec![IngredientInput {
            ingredient_id: fx.ingredients[2],
            quantity: 500.0,
        }]),
        ..RecipeUpdate::default()
    };
    let updated = recipe::update_recipe(&pool, created.id, &update)
        .await
        .unwrap();

    assert_eq!(updated.ingredients.len(), 1);
    assert_eq!(updated.ingredients[0].ingredient_id, fx.ingredients[2]);
    assert_eq!(updated.ingredients[0].quantity, 500.0);

    // Applying the same update again yields the same final state.
    let again = recipe::update_recipe(&pool, created.id, &update)
        .await
        .unwrap();
    assert_eq!(again.ingredients.len(), 1);
    assert_eq!(again.ingredients[0].ingredient_id, fx.ingredients[2]);
}

#[tokio::test]
async fn list_recipes_is_newest_first() {
    let pool = setup_pool().await;
    let fx = seed(&pool).await;

    let first = recipe::create_recipe(&pool, fx.author, &new_recipe(&fx))
        .await
        .unwrap();
    let mut second_input = new_recipe(&fx);
    second_input.name = "Waffles".into();
    let second = recipe::create_recipe(&pool, fx.author, &second_input)
        .await
        .unwrap();

    // Both may share a CURRENT_TIMESTAMP second; id breaks the tie.
    let ids: Vec<i64> = db::list_recipes(&pool)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn update_of_missing_recipe_is_not_found() {
    let pool = setup_pool().await;
    seed(&pool).await;

    let update = RecipeUpdate {
        name: Some("ghost".into()),
        ..RecipeUpdate::default()
    };
    assert!(matches!(
        recipe::update_recipe(&pool, 4242, &update).await.unwrap_err(),
        Error::NotFound { .. }
    ));
}
