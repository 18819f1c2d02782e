pub mod carts;
pub mod categories;
pub mod checkout;
pub mod common;
pub mod earnings;
pub mod history;
pub mod products;
pub mod users;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        cart::CartService,
        catalog::{CatalogService, CatalogStore, DbCatalogStore, FileCatalogStore},
        checkout::{CheckoutService, CheckoutSettings},
        discounts::{DbDiscountStore, DiscountService, DiscountStore, FileDiscountStore},
        earnings::{DbEarningsStore, EarningsService, EarningsStore, FileEarningsStore},
        history::SaleHistoryService,
        payment_provider::PaymentProvider,
        users::UserService,
    },
};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Which storage implementation backs catalog, discounts and earnings.
/// Chosen once at startup by the database connectivity probe; the services
/// never learn which one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Database,
    LocalFile,
}

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub discounts: Arc<DiscountService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub history: Arc<SaleHistoryService>,
    pub earnings: Arc<EarningsService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    /// Builds the service container on the selected storage backend.
    ///
    /// Cart lines and sales always live in the database; only catalog,
    /// discounts and earnings have a local-file fallback, mirroring what
    /// the store actually tolerates losing when the database is away.
    pub async fn build(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
        config: &AppConfig,
        backend: StorageBackend,
    ) -> Result<Self, ServiceError> {
        let (catalog_store, discount_store, earnings_store): (
            Arc<dyn CatalogStore>,
            Arc<dyn DiscountStore>,
            Arc<dyn EarningsStore>,
        ) = match backend {
            StorageBackend::Database => (
                Arc::new(DbCatalogStore::new(db.clone())),
                Arc::new(DbDiscountStore::new(db.clone())),
                Arc::new(DbEarningsStore::new(db.clone())),
            ),
            StorageBackend::LocalFile => {
                warn!(
                    data_dir = %config.data_dir,
                    "Database unavailable; serving catalog, discounts and earnings from local files"
                );
                let dir = Path::new(&config.data_dir);
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    ServiceError::InternalError(format!(
                        "Failed to create data dir {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
                (
                    Arc::new(FileCatalogStore::load(dir).await?),
                    Arc::new(FileDiscountStore::load(dir).await?),
                    Arc::new(FileEarningsStore::load(dir).await?),
                )
            }
        };

        let catalog = Arc::new(CatalogService::new(catalog_store, event_sender.clone()));
        let discounts = Arc::new(DiscountService::new(discount_store, event_sender.clone()));
        let earnings = Arc::new(EarningsService::new(earnings_store, event_sender.clone()));
        let cart = Arc::new(CartService::new(
            db.clone(),
            catalog.clone(),
            discounts.clone(),
            event_sender.clone(),
        ));
        let history = Arc::new(SaleHistoryService::new(db.clone(), event_sender.clone()));
        let users = Arc::new(UserService::new(db.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            cart.clone(),
            catalog.clone(),
            history.clone(),
            earnings.clone(),
            users.clone(),
            provider,
            event_sender,
            CheckoutSettings::from_config(config),
        ));

        Ok(Self {
            catalog,
            discounts,
            cart,
            checkout,
            history,
            earnings,
            users,
        })
    }
}
