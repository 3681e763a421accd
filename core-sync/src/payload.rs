//! Local product to remote payload mapping

use bridge_traits::catalog::{CategoryId, ProductPayload};
use core_catalog::Product;

/// Map a local product onto the payload sent to the remote catalog.
///
/// Absent fields are omitted. Price is sent as a two-decimal string in
/// `regular_price`, and a known quantity turns on stock management.
pub fn build_payload(product: &Product) -> ProductPayload {
    let name = Some(product.name.clone()).filter(|n| !n.trim().is_empty());

    ProductPayload {
        name,
        sku: product.sku.clone(),
        regular_price: product.price.map(|p| format!("{:.2}", p)),
        description: product.description.clone(),
        short_description: product.short_description.clone(),
        manage_stock: product.quantity.map(|_| true),
        stock_quantity: product.quantity,
        weight: product.weight.map(|w| w.normalize().to_string()),
        categories: product
            .categories
            .as_ref()
            .map(|refs| refs.iter().map(|c| CategoryId { id: c.id }).collect()),
    }
}
