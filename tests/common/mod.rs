use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm_migration::MigratorTrait;
use storefront_api::{
    db,
    entities::{ProductModel, UserModel},
    errors::ServiceError,
    events::EventSender,
    migrator::Migrator,
    services::{
        cart::CartService,
        catalog::{CatalogService, CreateProductInput, DbCatalogStore},
        checkout::{CheckoutService, CheckoutSettings},
        discounts::{DbDiscountStore, DiscountService},
        earnings::{DbEarningsStore, EarningsService},
        history::SaleHistoryService,
        payment_provider::{CreatedPreference, PaymentProvider, PreferenceRequest},
        users::{CreateUserInput, UserService},
    },
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Payment provider stub: accepts every preference, records it for
/// inspection and hands back a fixed redirect, mirroring the sandbox
/// behavior of the real provider.
#[derive(Default)]
pub struct StubPaymentProvider {
    pub requests: std::sync::Mutex<Vec<PreferenceRequest>>,
}

#[async_trait]
impl PaymentProvider for StubPaymentProvider {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<CreatedPreference, ServiceError> {
        let id = format!("pref-{}", request.external_reference);
        self.requests
            .lock()
            .expect("stub lock")
            .push(request.clone());
        Ok(CreatedPreference {
            init_point: format!("https://provider.test/init/{}", id),
            id,
        })
    }
}

/// Service harness backed by a throwaway SQLite database.
#[allow(dead_code)]
pub struct TestApp {
    pub catalog: Arc<CatalogService>,
    pub discounts: Arc<DiscountService>,
    pub cart: Arc<CartService>,
    pub history: Arc<SaleHistoryService>,
    pub earnings: Arc<EarningsService>,
    pub users: Arc<UserService>,
    pub checkout: Arc<CheckoutService>,
    pub provider: Arc<StubPaymentProvider>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}/test.db?mode=rwc", tmp.path().display());

        let pool = db::establish_connection(&url)
            .await
            .expect("connect test database");
        Migrator::up(&pool, None).await.expect("run migrations");
        let pool = Arc::new(pool);

        let (tx, mut rx) = mpsc::channel(256);
        // Drain events so senders never block.
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let event_sender = Arc::new(EventSender::new(tx));

        let catalog = Arc::new(CatalogService::new(
            Arc::new(DbCatalogStore::new(pool.clone())),
            event_sender.clone(),
        ));
        let discounts = Arc::new(DiscountService::new(
            Arc::new(DbDiscountStore::new(pool.clone())),
            event_sender.clone(),
        ));
        let earnings = Arc::new(EarningsService::new(
            Arc::new(DbEarningsStore::new(pool.clone())),
            event_sender.clone(),
        ));
        let cart = Arc::new(CartService::new(
            pool.clone(),
            catalog.clone(),
            discounts.clone(),
            event_sender.clone(),
        ));
        let history = Arc::new(SaleHistoryService::new(pool.clone(), event_sender.clone()));
        let users = Arc::new(UserService::new(pool.clone(), event_sender.clone()));
        let provider = Arc::new(StubPaymentProvider::default());
        let checkout = Arc::new(CheckoutService::new(
            cart.clone(),
            catalog.clone(),
            history.clone(),
            earnings.clone(),
            users.clone(),
            provider.clone(),
            event_sender,
            test_settings(),
        ));

        Self {
            catalog,
            discounts,
            cart,
            history,
            earnings,
            users,
            checkout,
            provider,
            _tmp: tmp,
        }
    }

    pub async fn seed_user(&self, username: &str) -> UserModel {
        self.users
            .create_user(CreateUserInput {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password: "contrasena-larga".to_string(),
                phone: "+56 9 5555 0101".to_string(),
                address: "Av. Siempre Viva 742".to_string(),
                city: "Santiago".to_string(),
                region: "RM".to_string(),
                role: None,
            })
            .await
            .expect("seed user")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductModel {
        self.catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: None,
                price,
                stock,
                image_url: None,
                categories: Vec::new(),
            })
            .await
            .expect("seed product")
    }

    /// Seeds the canonical tier table used across checkout scenarios:
    /// min 3 → 5%, min 5 → 10%, min 10 → 15%.
    pub async fn seed_standard_tiers(&self, product_id: Uuid) {
        for (min_quantity, percentage) in [(3, 5), (5, 10), (10, 15)] {
            self.discounts
                .upsert_tier(product_id, min_quantity, Decimal::from(percentage))
                .await
                .expect("seed tier");
        }
    }
}

pub fn test_settings() -> CheckoutSettings {
    CheckoutSettings {
        public_url: "http://localhost:3000".to_string(),
        currency: "CLP".to_string(),
        price_decimal_places: 0,
        success_view: "/payments/payment-success.html".to_string(),
        failure_view: "/payments/payment-failed.html".to_string(),
        pending_view: "/payments/payment-pending.html".to_string(),
    }
}
