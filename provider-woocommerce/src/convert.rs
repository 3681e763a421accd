//! Mapping between WooCommerce wire types and bridge types
//!
//! This is the one place where "empty means absent" is applied: blank strings,
//! zero prices, weights and stock levels, and empty category lists all become
//! `None` on the way in.

use bridge_traits::catalog::{ProductPayload, RemoteCategory, RemoteCategoryRef, RemoteProduct};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use crate::types::{WooCategory, WooCategoryRef, WooProduct};

fn present_text(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn present_decimal(field: &str, value: Option<String>) -> Option<Decimal> {
    let raw = present_text(value)?;
    match Decimal::from_str(raw.trim()) {
        Ok(d) if d.is_zero() => None,
        Ok(d) => Some(d),
        Err(e) => {
            debug!(field, raw = %raw, error = %e, "Ignoring unparseable decimal");
            None
        }
    }
}

/// Convert a wire product into the normalized bridge shape.
pub fn to_remote_product(product: WooProduct) -> RemoteProduct {
    let categories: Vec<RemoteCategoryRef> = product
        .categories
        .into_iter()
        .map(|c| RemoteCategoryRef {
            id: c.id,
            name: present_text(c.name),
            slug: present_text(c.slug),
        })
        .collect();

    RemoteProduct {
        id: product.id,
        name: present_text(product.name),
        sku: present_text(product.sku),
        price: present_decimal("price", product.price),
        regular_price: present_decimal("regular_price", product.regular_price),
        description: present_text(product.description),
        short_description: present_text(product.short_description),
        stock_quantity: product.stock_quantity.filter(|q| *q != 0),
        weight: present_decimal("weight", product.weight),
        categories: if categories.is_empty() {
            None
        } else {
            Some(categories)
        },
        status: present_text(product.status),
    }
}

pub fn to_remote_category(category: WooCategory) -> RemoteCategory {
    RemoteCategory {
        id: category.id,
        name: category.name,
        slug: present_text(category.slug),
        parent: category.parent.filter(|p| *p != 0),
        count: category.count,
    }
}

/// Decode one entry of a batch response section.
///
/// Entries that carry an `error` object were rejected by the store and are
/// skipped.
pub fn batch_entry_to_remote(entry: Value) -> Option<RemoteProduct> {
    if entry.get("error").is_some() {
        debug!(entry = %entry, "Skipping rejected batch entry");
        return None;
    }

    serde_json::from_value::<WooProduct>(entry)
        .ok()
        .map(to_remote_product)
}

/// Build the stored wire record for a payload, as the store would.
pub fn payload_to_wire(id: i64, payload: &ProductPayload) -> WooProduct {
    let mut product = WooProduct {
        id,
        status: Some("publish".to_string()),
        ..Default::default()
    };
    apply_payload(&mut product, payload);
    product
}

/// Apply the fields present in `payload` onto a stored record.
pub fn apply_payload(product: &mut WooProduct, payload: &ProductPayload) {
    if let Some(name) = &payload.name {
        product.name = Some(name.clone());
    }
    if let Some(sku) = &payload.sku {
        product.sku = Some(sku.clone());
    }
    if let Some(price) = &payload.regular_price {
        product.regular_price = Some(price.clone());
        product.price = Some(price.clone());
    }
    if let Some(description) = &payload.description {
        product.description = Some(description.clone());
    }
    if let Some(short_description) = &payload.short_description {
        product.short_description = Some(short_description.clone());
    }
    if let Some(manage_stock) = payload.manage_stock {
        product.manage_stock = Some(manage_stock);
    }
    if let Some(quantity) = payload.stock_quantity {
        product.stock_quantity = Some(quantity);
    }
    if let Some(weight) = &payload.weight {
        product.weight = Some(weight.clone());
    }
    if let Some(categories) = &payload.categories {
        product.categories = categories
            .iter()
            .map(|c| WooCategoryRef {
                id: c.id,
                name: None,
                slug: None,
            })
            .collect();
    }
}
