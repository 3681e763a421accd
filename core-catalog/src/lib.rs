//! # Local Catalog Store
//!
//! Owns the local product database and the repository used to read and write it.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and migrations for `products`
//! - The [`Product`](models::Product) model and its sync bookkeeping invariants
//! - Uniqueness of `external_id` and `sku`, reported as
//!   [`CatalogError::Conflict`](error::CatalogError::Conflict)
//! - Filtered, paginated listing with substring search over name or sku

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{CatalogError, Result};
pub use models::{CategoryRef, NewProduct, Product, ProductChanges, ProductId, SyncStatus};
pub use repositories::{
    Page, PageRequest, ProductFilter, ProductRepository, SqliteProductRepository,
};
