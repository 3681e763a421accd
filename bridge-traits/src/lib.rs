//! # Host Bridge Traits
//!
//! Capability contracts between the catalog sync core and its collaborators.
//!
//! ## Overview
//!
//! This crate defines the seams the core depends on but does not implement
//! itself. Each trait can be satisfied by a production adapter or by a
//! deterministic stand-in for tests and offline development.
//!
//! ## Traits
//!
//! ### Remote storefront
//! - [`RemoteCatalog`](catalog::RemoteCatalog) - List, fetch, create, update and delete remote products
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry policies
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Implementations
//!
//! | Capability | Production | Stand-in |
//! |------------|------------|----------|
//! | `RemoteCatalog` | `provider-woocommerce::WooCommerceConnector` | `provider-woocommerce::InMemoryCatalog` |
//! | `HttpClient` | `bridge-desktop::ReqwestHttpClient` | mockall mocks |
//! | `Clock` | [`SystemClock`](time::SystemClock) | [`ManualClock`](time::ManualClock) |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations should:
//!
//! - Report a missing remote resource as `BridgeError::NotFound`
//! - Report network and remote-server failures with a retryable variant
//! - Include error context (status code, endpoint, API message)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single adapter can be
//! shared across the worker pool behind an `Arc`.

pub mod catalog;
pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{
    BatchRequest, BatchResult, CategoryId, CategoryQuery, DeleteAck, ProductPayload,
    ProductQuery, ProductUpdate, RemoteCatalog, RemoteCategory, RemoteCategoryRef,
    RemoteProduct,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, ManualClock, SystemClock};
