//! Domain core of the foodgram recipe-sharing backend.
//!
//! Two pieces of logic over a SQLite store: the Recipe Composer
//! ([`recipe`]), which creates and updates recipes together with their tag
//! and quantified-ingredient relations, and the Shopping List Aggregator
//! ([`shopping`]), which sums ingredient quantities across a user's cart
//! into a plain-text report. Everything HTTP-shaped (routing, auth,
//! pagination, JSON) belongs to the embedding REST layer.

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod recipe;
pub mod shopping;

pub use error::{Error, Result};
