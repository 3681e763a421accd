use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique attribute is already held by another product.
    #[error("Conflict: {field} '{value}' is already in use")]
    Conflict { field: String, value: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Stored value could not be decoded: {0}")]
    Serialization(String),
}

impl CatalogError {
    pub fn conflict(field: impl Into<String>, value: impl ToString) -> Self {
        CatalogError::Conflict {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn product_not_found(id: impl ToString) -> Self {
        CatalogError::NotFound {
            entity_type: "Product".to_string(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
