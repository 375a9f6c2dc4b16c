//! Database module: entity models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: row slices returned by list queries.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `foodgram_core::db` — we re-export the
//! repository API and commonly used models for convenience.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{IngredientQuantityRow, RecipeRow};
