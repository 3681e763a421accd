//! Core service façade and bootstrap helpers.
//!
//! This crate wires the local catalog store, the propagation queue and
//! workers, the reconciler and a remote catalog implementation into a single
//! [`CatalogService`]. Hosts with network access enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) so [`bootstrap`] can build the
//! WooCommerce connector; otherwise a [`RemoteCatalog`] is injected through
//! [`CatalogDependencies`].
//!
//! [`RemoteCatalog`]: bridge_traits::catalog::RemoteCatalog

pub mod bootstrap;
pub mod error;
pub mod service;

pub use bootstrap::{bootstrap, select_remote};
pub use error::{CoreError, Result};
pub use service::{
    CatalogDependencies, CatalogService, DeleteReceipt, ListRequest, MutationReceipt,
    ProductKey, ProductListing, ProductView, Source, DEFAULT_PER_PAGE,
};
