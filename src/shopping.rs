//! Shopping List Aggregator: sums ingredient quantities across every recipe
//! in a user's cart and renders a plain-text report.
//!
//! All (name, quantity) pairs are fetched in one batched join, then summed
//! in memory, so the cost is one query regardless of cart size. Totals are
//! keyed by ingredient NAME only: two ingredients sharing a name under
//! different measurement units merge into one line. That mirrors the
//! upstream product behavior.

use crate::db::{self, model::IngredientQuantityRow, Pool};
use crate::error::Result;
use std::collections::BTreeMap;
use tracing::instrument;

/// Attachment name the REST layer serves the report under.
pub const SHOPPING_CART_FILENAME: &str = "foodgram_shopping_cart.txt";
/// Media type of the served report.
pub const SHOPPING_CART_MEDIA_TYPE: &str = "text/plain";

/// Build the shopping-list report for a user. Returns the empty string when
/// the cart is empty. Unknown users are the caller's concern; an id with no
/// cart rows simply yields an empty report.
#[instrument(skip_all)]
pub async fn generate_shopping_list(pool: &Pool, user_id: i64) -> Result<String> {
    let rows = db::shopping_cart_quantities(pool, user_id).await?;
    Ok(render_report(&rows))
}

/// One `"{name}: {total}\n"` line per distinct ingredient name, in name
/// order so the report is deterministic.
fn render_report(rows: &[IngredientQuantityRow]) -> String {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.name.as_str()).or_insert(0.0) += row.quantity;
    }

    let mut report = String::new();
    for (name, total) in totals {
        report.push_str(&format!("{name}: {total}\n"));
    }
    report
}
