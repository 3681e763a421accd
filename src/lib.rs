//! Workspace facade crate.
//!
//! Re-exports the catalog service so host applications can depend on
//! `catalog-sync-workspace` and pick the bridge feature they need instead of
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
