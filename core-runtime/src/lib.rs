//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the catalog sync core:
//! - Logging and tracing infrastructure
//! - Configuration management (builder and environment loading)
//! - Event bus system
//!
//! ## Overview
//!
//! Every other crate in the workspace depends on this one for its
//! configuration types, its logging conventions, and the broadcast channel
//! used to report catalog, propagation, and reconcile activity.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
