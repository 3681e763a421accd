//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for the local catalog store.
//!
//! ## Architecture
//!
//! - Traits define the interface consumed by the sync core and the service
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//! - Pagination is supported via the `Page<T>` wrapper

pub mod pagination;
pub mod product;

pub use pagination::{Page, PageRequest, MAX_PAGE_SIZE};
pub use product::{ProductFilter, ProductRepository, SqliteProductRepository};
