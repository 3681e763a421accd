//! Domain models for the local product catalog
//!
//! [`Product`] is the local source of truth for what the storefront should
//! contain, plus the bookkeeping that records whether the storefront agrees.

use crate::error::{CatalogError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Types
// =============================================================================

/// Locally assigned product identifier. Stable and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ProductId(pub i64);

impl ProductId {
    /// Placeholder carried by a product that has not been persisted yet.
    pub const UNASSIGNED: ProductId = ProductId(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Local belief about whether the remote catalog agrees with this product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local change not yet confirmed remotely
    #[default]
    Pending,
    /// Last propagation or reconcile succeeded
    Synced,
    /// Last propagation attempt failed
    Failed,
}

impl SyncStatus {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(CatalogError::InvalidInput {
                field: "sync_status".to_string(),
                message: format!("unknown status '{}'", s),
            }),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to a remote category by its external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
}

// =============================================================================
// Product
// =============================================================================

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Identifier assigned by the remote catalog, once known
    pub external_id: Option<i64>,
    pub name: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    /// Stock level
    pub quantity: Option<i64>,
    pub weight: Option<Decimal>,
    pub categories: Option<Vec<CategoryRef>>,

    // Sync bookkeeping
    pub sync_status: SyncStatus,
    /// Message of the most recent failure
    pub sync_error: Option<String>,
    /// Unix seconds of the last successful exchange with the remote
    pub last_synced_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// Build an unsaved, pending product from creation input.
    pub fn draft(new: NewProduct, now: i64) -> Self {
        Self {
            id: ProductId::UNASSIGNED,
            external_id: new.external_id,
            name: new.name,
            sku: new.sku,
            price: new.price,
            description: new.description,
            short_description: new.short_description,
            quantity: new.quantity,
            weight: new.weight,
            categories: new.categories,
            sync_status: SyncStatus::Pending,
            sync_error: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the sync bookkeeping invariants.
    ///
    /// - `synced` requires `last_synced_at` and no `sync_error`
    /// - `failed` requires a `sync_error`
    pub fn check_sync_invariants(&self) -> std::result::Result<(), String> {
        match self.sync_status {
            SyncStatus::Synced => {
                if self.last_synced_at.is_none() {
                    return Err("synced product must carry last_synced_at".to_string());
                }
                if self.sync_error.is_some() {
                    return Err("synced product must not carry a sync error".to_string());
                }
            }
            SyncStatus::Failed => {
                if self.sync_error.is_none() {
                    return Err("failed product must carry a sync error".to_string());
                }
            }
            SyncStatus::Pending => {}
        }

        Ok(())
    }

    /// Record a successful exchange with the remote catalog.
    pub fn mark_synced(&mut self, now: i64) {
        self.sync_status = SyncStatus::Synced;
        self.sync_error = None;
        self.last_synced_at = Some(now);
        self.updated_at = now;
    }

    /// Record a failed attempt. `last_synced_at` keeps its previous value.
    pub fn mark_failed(&mut self, message: impl Into<String>, now: i64) {
        self.sync_status = SyncStatus::Failed;
        self.sync_error = Some(message.into());
        self.updated_at = now;
    }

    /// Flag a local edit awaiting propagation.
    pub fn mark_pending(&mut self, now: i64) {
        self.sync_status = SyncStatus::Pending;
        self.sync_error = None;
        self.updated_at = now;
    }

    /// Apply a local edit. Fields left `None` in `changes` are kept.
    pub fn apply_changes(&mut self, changes: ProductChanges, now: i64) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(sku) = changes.sku {
            self.sku = Some(sku);
        }
        if let Some(price) = changes.price {
            self.price = Some(price);
        }
        if let Some(description) = changes.description {
            self.description = Some(description);
        }
        if let Some(short_description) = changes.short_description {
            self.short_description = Some(short_description);
        }
        if let Some(quantity) = changes.quantity {
            self.quantity = Some(quantity);
        }
        if let Some(weight) = changes.weight {
            self.weight = Some(weight);
        }
        if let Some(categories) = changes.categories {
            self.categories = Some(categories);
        }
        self.updated_at = now;
    }

    pub fn category_ids(&self) -> Vec<i64> {
        self.categories
            .as_ref()
            .map(|refs| refs.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }
}

/// Input for creating a product locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub quantity: Option<i64>,
    pub weight: Option<Decimal>,
    pub categories: Option<Vec<CategoryRef>>,
    /// Set when the product already exists remotely
    pub external_id: Option<i64>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_categories(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.categories = Some(ids.into_iter().map(|id| CategoryRef { id }).collect());
        self
    }

    /// Validate user-supplied fields.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_optional_text("sku", self.sku.as_deref())?;
        validate_non_negative("price", self.price)?;
        validate_non_negative("weight", self.weight)?;
        validate_quantity(self.quantity)
    }
}

/// Partial local edit. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub quantity: Option<i64>,
    pub weight: Option<Decimal>,
    pub categories: Option<Vec<CategoryRef>>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        *self == ProductChanges::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_optional_text("sku", self.sku.as_deref())?;
        validate_non_negative("price", self.price)?;
        validate_non_negative("weight", self.weight)?;
        validate_quantity(self.quantity)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CatalogError::InvalidInput {
            field: "name".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_optional_text(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(CatalogError::InvalidInput {
            field: field.to_string(),
            message: "must not be blank when provided".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_non_negative(field: &str, value: Option<Decimal>) -> Result<()> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(CatalogError::InvalidInput {
            field: field.to_string(),
            message: "must not be negative".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_quantity(quantity: Option<i64>) -> Result<()> {
    match quantity {
        Some(q) if q < 0 => Err(CatalogError::InvalidInput {
            field: "quantity".to_string(),
            message: "must not be negative".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Database Mapping
// =============================================================================

/// Raw `products` row. Decimals and categories are stored as text.
#[derive(Debug, FromRow)]
pub(crate) struct ProductRow {
    pub id: i64,
    pub external_id: Option<i64>,
    pub name: String,
    pub sku: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub quantity: Option<i64>,
    pub weight: Option<String>,
    pub categories: Option<String>,
    pub sync_status: String,
    pub sync_error: Option<String>,
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn decode_decimal(field: &str, value: Option<String>) -> Result<Option<Decimal>> {
    value
        .map(|raw| {
            Decimal::from_str(&raw).map_err(|e| {
                CatalogError::Serialization(format!("{} '{}': {}", field, raw, e))
            })
        })
        .transpose()
}

impl TryFrom<ProductRow> for Product {
    type Error = CatalogError;

    fn try_from(row: ProductRow) -> Result<Self> {
        let categories = row
            .categories
            .map(|raw| {
                serde_json::from_str::<Vec<CategoryRef>>(&raw)
                    .map_err(|e| CatalogError::Serialization(format!("categories: {}", e)))
            })
            .transpose()?;

        Ok(Product {
            id: ProductId(row.id),
            external_id: row.external_id,
            name: row.name,
            sku: row.sku,
            price: decode_decimal("price", row.price)?,
            description: row.description,
            short_description: row.short_description,
            quantity: row.quantity,
            weight: decode_decimal("weight", row.weight)?,
            categories,
            sync_status: SyncStatus::from_str(&row.sync_status)?,
            sync_error: row.sync_error,
            last_synced_at: row.last_synced_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn encode_categories(categories: &Option<Vec<CategoryRef>>) -> Result<Option<String>> {
    categories
        .as_ref()
        .map(|refs| {
            serde_json::to_string(refs)
                .map_err(|e| CatalogError::Serialization(format!("categories: {}", e)))
        })
        .transpose()
}
