//! Product repository trait and implementation

use crate::error::{CatalogError, Result};
use crate::models::{encode_categories, Product, ProductId, ProductRow, SyncStatus};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

/// Listing filter. All conditions are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Substring match on name OR sku
    pub search: Option<String>,
    /// Substring match on sku
    pub sku: Option<String>,
    pub sync_status: Option<SyncStatus>,
}

impl ProductFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn status(status: SyncStatus) -> Self {
        Self {
            sync_status: Some(status),
            ..Default::default()
        }
    }
}

/// Product repository interface for data access operations
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Find a product by its local ID
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>>;

    /// Find the product mirroring a remote product
    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Product>>;

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>>;

    /// Insert a product and return it with its assigned ID
    ///
    /// # Errors
    /// - `Conflict` if the external id or sku belongs to another product
    /// - `InvalidInput` if the sync bookkeeping is inconsistent
    async fn insert(&self, product: &Product) -> Result<Product>;

    /// Replace every stored column of an existing product
    ///
    /// # Errors
    /// - `NotFound` if the product does not exist
    /// - `Conflict` if the external id or sku belongs to another product
    async fn update(&self, product: &Product) -> Result<()>;

    /// Delete a product by ID
    ///
    /// # Returns
    /// - `Ok(true)` if the product was deleted
    /// - `Ok(false)` if it was not found
    async fn delete(&self, id: ProductId) -> Result<bool>;

    /// Query products newest first
    async fn query(&self, filter: &ProductFilter, page_request: PageRequest)
        -> Result<Page<Product>>;

    /// Substring search over name or sku
    async fn search(&self, term: &str, page_request: PageRequest) -> Result<Page<Product>> {
        self.query(&ProductFilter::search(term), page_request).await
    }

    async fn count(&self) -> Result<i64>;

    async fn count_by_status(&self, status: SyncStatus) -> Result<i64>;
}

/// SQLite implementation of ProductRepository
pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn check_invariants(product: &Product) -> Result<()> {
        if product.name.is_empty() && product.external_id.is_none() {
            return Err(CatalogError::InvalidInput {
                field: "name".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        product
            .check_sync_invariants()
            .map_err(|message| CatalogError::InvalidInput {
                field: "sync_status".to_string(),
                message,
            })
    }

    /// Reject writes that would take a unique value held by another product.
    async fn ensure_unique(&self, product: &Product) -> Result<()> {
        if let Some(external_id) = product.external_id {
            if let Some(holder) = self.find_by_external_id(external_id).await? {
                if holder.id != product.id {
                    return Err(CatalogError::conflict("external_id", external_id));
                }
            }
        }

        if let Some(sku) = product.sku.as_deref() {
            if let Some(holder) = self.find_by_sku(sku).await? {
                if holder.id != product.id {
                    return Err(CatalogError::conflict("sku", sku));
                }
            }
        }

        Ok(())
    }

    /// Map a UNIQUE violation that slipped past [`Self::ensure_unique`] (a
    /// concurrent writer) onto `Conflict`.
    fn map_write_error(error: sqlx::Error, product: &Product) -> CatalogError {
        let unique_column = error
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.message().to_string());

        match unique_column {
            Some(message) if message.contains("products.sku") => {
                CatalogError::conflict("sku", product.sku.as_deref().unwrap_or_default())
            }
            Some(message) if message.contains("products.external_id") => CatalogError::conflict(
                "external_id",
                product.external_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
            Some(message) => CatalogError::conflict("product", message),
            None => CatalogError::Database(error),
        }
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
        builder.push(" WHERE 1 = 1");

        if let Some(term) = filter.search.as_deref().filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term);
            builder
                .push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR sku LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(sku) = filter.sku.as_deref().filter(|s| !s.is_empty()) {
            builder.push(" AND sku LIKE ").push_bind(format!("%{}%", sku));
        }

        if let Some(status) = filter.sync_status {
            builder.push(" AND sync_status = ").push_bind(status.as_str());
        }
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE sku = ?")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn insert(&self, product: &Product) -> Result<Product> {
        Self::check_invariants(product)?;
        self.ensure_unique(product).await?;

        let categories = encode_categories(&product.categories)?;

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                external_id, name, sku, price, description, short_description,
                quantity, weight, categories,
                sync_status, sync_error, last_synced_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product.external_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price.map(|p| p.to_string()))
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(product.quantity)
        .bind(product.weight.map(|w| w.to_string()))
        .bind(categories)
        .bind(product.sync_status.as_str())
        .bind(&product.sync_error)
        .bind(product.last_synced_at)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, product))?;

        let id = ProductId(result.last_insert_rowid());
        debug!(product_id = %id, sku = ?product.sku, "Inserted product");

        Ok(Product {
            id,
            ..product.clone()
        })
    }

    async fn update(&self, product: &Product) -> Result<()> {
        Self::check_invariants(product)?;
        self.ensure_unique(product).await?;

        let categories = encode_categories(&product.categories)?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                external_id = ?, name = ?, sku = ?, price = ?,
                description = ?, short_description = ?,
                quantity = ?, weight = ?, categories = ?,
                sync_status = ?, sync_error = ?, last_synced_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(product.external_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price.map(|p| p.to_string()))
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(product.quantity)
        .bind(product.weight.map(|w| w.to_string()))
        .bind(categories)
        .bind(product.sync_status.as_str())
        .bind(&product.sync_error)
        .bind(product.last_synced_at)
        .bind(product.updated_at)
        .bind(product.id)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, product))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::product_not_found(product.id));
        }

        Ok(())
    }

    async fn delete(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(
        &self,
        filter: &ProductFilter,
        page_request: PageRequest,
    ) -> Result<Page<Product>> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products");
        Self::push_filter(&mut count_query, filter);
        let total = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM products");
        Self::push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page_request.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page_request.offset() as i64);

        let rows = select.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total.0 as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn count_by_status(&self, status: SyncStatus) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE sync_status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::NewProduct;
    use rust_decimal::Decimal;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn draft(name: &str, sku: &str, created_at: i64) -> Product {
        Product::draft(
            NewProduct::new(name).with_sku(sku).with_price(dec("19.99")),
            created_at,
        )
    }

    async fn repo() -> SqliteProductRepository {
        SqliteProductRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_find_product() {
        let repo = repo().await;

        let saved = repo.insert(&draft("Desk Lamp", "LAMP-01", 100)).await.unwrap();
        assert!(saved.id.is_assigned());

        let found = repo.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Desk Lamp");
        assert_eq!(found.price, Some(dec("19.99")));
        assert_eq!(found.sync_status, SyncStatus::Pending);

        let by_sku = repo.find_by_sku("LAMP-01").await.unwrap().unwrap();
        assert_eq!(by_sku.id, saved.id);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let repo = repo().await;

        let first = repo.insert(&draft("A", "A-1", 1)).await.unwrap();
        assert!(repo.delete(first.id).await.unwrap());

        let second = repo.insert(&draft("B", "B-1", 2)).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let repo = repo().await;
        repo.insert(&draft("A", "SAME", 1)).await.unwrap();

        let result = repo.insert(&draft("B", "SAME", 2)).await;
        match result {
            Err(CatalogError::Conflict { field, value }) => {
                assert_eq!(field, "sku");
                assert_eq!(value, "SAME");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_external_id_conflicts_on_update() {
        let repo = repo().await;

        let mut first = draft("A", "A-1", 1);
        first.external_id = Some(101);
        first.mark_synced(1);
        repo.insert(&first).await.unwrap();

        let mut second = repo.insert(&draft("B", "B-1", 2)).await.unwrap();
        second.external_id = Some(101);

        let result = repo.update(&second).await;
        assert!(matches!(
            result,
            Err(CatalogError::Conflict { ref field, .. }) if field == "external_id"
        ));
    }

    #[tokio::test]
    async fn test_missing_sku_does_not_conflict() {
        let repo = repo().await;
        repo.insert(&Product::draft(NewProduct::new("No sku 1"), 1))
            .await
            .unwrap();
        repo.insert(&Product::draft(NewProduct::new("No sku 2"), 2))
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_product() {
        let repo = repo().await;
        let mut product = repo.insert(&draft("Mug", "MUG-1", 1)).await.unwrap();

        product.external_id = Some(500);
        product.mark_synced(10);
        repo.update(&product).await.unwrap();

        let found = repo.find_by_external_id(500).await.unwrap().unwrap();
        assert_eq!(found.id, product.id);
        assert_eq!(found.sync_status, SyncStatus::Synced);
        assert_eq!(found.last_synced_at, Some(10));
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let repo = repo().await;
        let mut ghost = draft("Ghost", "GHOST", 1);
        ghost.id = ProductId(999);

        let result = repo.update(&ghost).await;
        assert!(matches!(result, Err(CatalogError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_invariant_violation_rejected() {
        let repo = repo().await;
        let mut product = draft("Bad", "BAD", 1);
        product.sync_status = SyncStatus::Failed;

        let result = repo.insert(&product).await;
        assert!(matches!(result, Err(CatalogError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_search_matches_name_or_sku() {
        let repo = repo().await;
        repo.insert(&draft("Blue Shirt", "SH-100", 1)).await.unwrap();
        repo.insert(&draft("Red Scarf", "BLUE-7", 2)).await.unwrap();
        repo.insert(&draft("Green Hat", "HAT-1", 3)).await.unwrap();

        let results = repo.search("blue", PageRequest::new(0, 10)).await.unwrap();
        assert_eq!(results.total, 2);
        // Newest first
        assert_eq!(results.items[0].name, "Red Scarf");
        assert_eq!(results.items[1].name, "Blue Shirt");
    }

    #[tokio::test]
    async fn test_query_with_pagination_and_filters() {
        let repo = repo().await;
        for i in 1..=5 {
            repo.insert(&draft(&format!("Item {}", i), &format!("SKU-{}", i), i))
                .await
                .unwrap();
        }

        let page = repo
            .query(&ProductFilter::default(), PageRequest::new(0, 2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items[0].name, "Item 5");

        let filter = ProductFilter {
            sku: Some("SKU-3".to_string()),
            ..Default::default()
        };
        let page = repo.query(&filter, PageRequest::new(0, 10)).await.unwrap();
        assert_eq!(page.total, 1);

        let pending = repo
            .query(&ProductFilter::status(SyncStatus::Pending), PageRequest::new(0, 10))
            .await
            .unwrap();
        assert_eq!(pending.total, 5);
        assert_eq!(repo.count_by_status(SyncStatus::Synced).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_categories_persist() {
        let repo = repo().await;
        let product = Product::draft(NewProduct::new("Tagged").with_categories([15, 22]), 1);

        let saved = repo.insert(&product).await.unwrap();
        let found = repo.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found.category_ids(), vec![15, 22]);
    }
}
