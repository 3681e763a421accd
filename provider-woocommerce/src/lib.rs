//! WooCommerce Provider
//!
//! `RemoteCatalog` implementations for a WooCommerce storefront:
//!
//! - [`WooCommerceConnector`] talks to the `wc/v3` REST API through an
//!   injected `HttpClient`.
//! - [`InMemoryCatalog`] is a deterministic stand-in used in mock mode and in
//!   tests, with call counters and failure injection.
//!
//! Both decode through [`convert`], the only place where WooCommerce's empty
//! strings, zero prices and empty category lists are turned into `None`.

pub mod connector;
pub mod convert;
pub mod error;
pub mod memory;
pub mod types;

pub use connector::WooCommerceConnector;
pub use error::{Result, WooCommerceError};
pub use memory::{CatalogOperation, InMemoryCatalog, FIRST_ASSIGNED_ID};
pub use types::{WooCategory, WooCategoryRef, WooProduct};
