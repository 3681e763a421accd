//! Service bootstrap
//!
//! Turns a validated [`CatalogConfig`] into a running [`CatalogService`]:
//! opens the database, picks the remote catalog implementation, and starts
//! the propagation workers.

use bridge_traits::catalog::RemoteCatalog;
use bridge_traits::time::SystemClock;
use core_catalog::db::{create_pool, DatabaseConfig};
use core_runtime::config::{CatalogConfig, DatabaseLocation, RemoteConfig};
use core_runtime::events::EventBus;
use core_runtime::logging::strip_path;
use provider_woocommerce::InMemoryCatalog;
use std::sync::Arc;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::service::{CatalogDependencies, CatalogService};

/// Build and start a catalog service.
///
/// Must be called from within a tokio runtime.
///
/// ```ignore
/// use core_runtime::config::CatalogConfig;
///
/// let config = CatalogConfig::from_env()?;
/// let service = core_service::bootstrap(config).await?;
/// let stats = service.reconcile().await?;
/// service.shutdown().await;
/// ```
pub async fn bootstrap(config: CatalogConfig) -> Result<CatalogService> {
    config.validate()?;

    let database = match &config.database {
        DatabaseLocation::File(path) => {
            info!(
                database = strip_path(&path.to_string_lossy()),
                "Opening catalog database"
            );
            DatabaseConfig::new(path)
        }
        DatabaseLocation::InMemory => {
            info!("Opening in-memory catalog database");
            DatabaseConfig::in_memory()
        }
    };
    let pool = create_pool(database)
        .await
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

    let remote = select_remote(&config.remote)?;
    let deps = CatalogDependencies {
        pool,
        remote,
        clock: Arc::new(SystemClock),
        event_bus: EventBus::new(config.event_buffer_size),
    };

    let service = CatalogService::new(deps, &config.sync).await?;
    service.start();

    info!(
        mock_mode = config.remote.mock_mode,
        workers = config.sync.worker_count,
        "Catalog service ready"
    );
    Ok(service)
}

/// Pick the remote catalog implementation named by the configuration.
pub fn select_remote(config: &RemoteConfig) -> Result<Arc<dyn RemoteCatalog>> {
    if config.mock_mode {
        info!("Using in-memory remote catalog");
        return Ok(Arc::new(InMemoryCatalog::with_sample_products()));
    }

    connect_remote(config)
}

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
fn connect_remote(config: &RemoteConfig) -> Result<Arc<dyn RemoteCatalog>> {
    use bridge_desktop::ReqwestHttpClient;
    use provider_woocommerce::WooCommerceConnector;

    let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
    let connector = WooCommerceConnector::from_config(Arc::new(http_client), config)
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

    info!(api_base = connector.api_base(), "Using WooCommerce remote catalog");
    Ok(Arc::new(connector))
}

#[cfg(not(all(feature = "desktop-shims", not(target_arch = "wasm32"))))]
fn connect_remote(_config: &RemoteConfig) -> Result<Arc<dyn RemoteCatalog>> {
    Err(CoreError::CapabilityMissing {
        capability: "http_client".to_string(),
        message: "enable the desktop-shims feature or build CatalogService with a RemoteCatalog"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::config::SyncSettings;

    #[test]
    fn test_mock_mode_selects_in_memory_catalog() {
        let config = RemoteConfig {
            mock_mode: true,
            ..RemoteConfig::default()
        };
        assert!(select_remote(&config).is_ok());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_blank_credentials_fail_initialization() {
        let config = RemoteConfig {
            store_url: "https://shop.example.com".to_string(),
            ..RemoteConfig::default()
        };
        assert!(matches!(
            select_remote(&config),
            Err(CoreError::InitializationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_in_memory() {
        let config = CatalogConfig::builder()
            .in_memory_database()
            .mock_mode(true)
            .build()
            .unwrap();

        let service = bootstrap(config).await.unwrap();
        let stats = service.reconcile().await.unwrap();
        assert_eq!(stats.new_count, 2);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_missing_credentials() {
        let config = CatalogConfig {
            database: DatabaseLocation::InMemory,
            remote: RemoteConfig {
                store_url: "https://shop.example.com".to_string(),
                ..RemoteConfig::default()
            },
            sync: SyncSettings::default(),
            event_buffer_size: 16,
        };

        assert!(matches!(
            bootstrap(config).await,
            Err(CoreError::Config(_))
        ));
    }
}
