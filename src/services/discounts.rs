use crate::{
    entities::{discount_tier, DiscountTier, DiscountTierModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

const DISCOUNTS_FILE: &str = "discounts.json";

/// Storage backend for discount tiers. Implemented by the database store
/// and the local-file fallback; selected once at startup.
#[async_trait]
pub trait DiscountStore: Send + Sync {
    /// Returns every tier for a product, including inactive ones.
    async fn tiers_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<DiscountTierModel>, ServiceError>;

    /// Creates the (product, min_quantity) tier or, when it already exists,
    /// overwrites its percentage and reactivates it.
    async fn upsert_tier(
        &self,
        product_id: Uuid,
        min_quantity: i32,
        percentage: Decimal,
    ) -> Result<DiscountTierModel, ServiceError>;

    /// Soft-deletes a tier. Rows are kept for auditability.
    async fn deactivate_tier(&self, id: Uuid) -> Result<(), ServiceError>;
}

/// Selects the applicable percentage among a product's tiers.
///
/// The rule is: among active tiers whose minimum quantity is satisfied,
/// take the one with the **largest minimum quantity** — not the largest
/// percentage. With a non-monotonic tier table this can pick a smaller
/// percentage than a lower tier offers; that is the store's long-standing
/// pricing rule and is kept as-is.
pub fn select_percentage(tiers: &[DiscountTierModel], quantity: i32) -> Decimal {
    tiers
        .iter()
        .filter(|t| t.active && t.min_quantity <= quantity)
        .max_by_key(|t| t.min_quantity)
        .map(|t| t.percentage)
        .unwrap_or(Decimal::ZERO)
}

/// Quantity-tier discount engine.
#[derive(Clone)]
pub struct DiscountService {
    store: Arc<dyn DiscountStore>,
    event_sender: Arc<EventSender>,
}

impl DiscountService {
    pub fn new(store: Arc<dyn DiscountStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Resolves the discount percentage for a product at a given quantity.
    /// Returns a value in [0, 100]; 0 when no tier qualifies.
    #[instrument(skip(self))]
    pub async fn resolve_discount(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Decimal, ServiceError> {
        let tiers = self.store.tiers_for_product(product_id).await?;
        Ok(select_percentage(&tiers, quantity))
    }

    /// Lists a product's tiers, ordered by minimum quantity.
    pub async fn list_tiers(
        &self,
        product_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<DiscountTierModel>, ServiceError> {
        let mut tiers = self.store.tiers_for_product(product_id).await?;
        if !include_inactive {
            tiers.retain(|t| t.active);
        }
        tiers.sort_by_key(|t| t.min_quantity);
        Ok(tiers)
    }

    /// Creates or updates a tier (idempotent upsert that reactivates).
    #[instrument(skip(self))]
    pub async fn upsert_tier(
        &self,
        product_id: Uuid,
        min_quantity: i32,
        percentage: Decimal,
    ) -> Result<DiscountTierModel, ServiceError> {
        if min_quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Minimum quantity must be at least 1".to_string(),
            ));
        }
        if percentage < Decimal::ZERO || percentage > Decimal::from(100) {
            return Err(ServiceError::ValidationError(
                "Percentage must be between 0 and 100".to_string(),
            ));
        }

        let tier = self
            .store
            .upsert_tier(product_id, min_quantity, percentage)
            .await?;

        self.event_sender
            .send_or_log(Event::DiscountTierUpserted {
                product_id,
                min_quantity,
            })
            .await;

        info!(%product_id, min_quantity, %percentage, "Discount tier upserted");
        Ok(tier)
    }

    /// Soft-deletes a tier.
    #[instrument(skip(self))]
    pub async fn deactivate_tier(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.deactivate_tier(id).await?;
        self.event_sender
            .send_or_log(Event::DiscountTierDeactivated(id))
            .await;
        Ok(())
    }
}

/// Database-backed tier store.
pub struct DbDiscountStore {
    db: Arc<DatabaseConnection>,
}

impl DbDiscountStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DiscountStore for DbDiscountStore {
    async fn tiers_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<DiscountTierModel>, ServiceError> {
        Ok(DiscountTier::find()
            .filter(discount_tier::Column::ProductId.eq(product_id))
            .order_by_asc(discount_tier::Column::MinQuantity)
            .all(&*self.db)
            .await?)
    }

    async fn upsert_tier(
        &self,
        product_id: Uuid,
        min_quantity: i32,
        percentage: Decimal,
    ) -> Result<DiscountTierModel, ServiceError> {
        let existing = DiscountTier::find()
            .filter(discount_tier::Column::ProductId.eq(product_id))
            .filter(discount_tier::Column::MinQuantity.eq(min_quantity))
            .one(&*self.db)
            .await?;

        if let Some(tier) = existing {
            let mut active: discount_tier::ActiveModel = tier.into();
            active.percentage = Set(percentage);
            active.active = Set(true);
            Ok(active.update(&*self.db).await?)
        } else {
            let tier = discount_tier::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                min_quantity: Set(min_quantity),
                percentage: Set(percentage),
                active: Set(true),
                created_at: Set(Utc::now()),
            };
            Ok(tier.insert(&*self.db).await?)
        }
    }

    async fn deactivate_tier(&self, id: Uuid) -> Result<(), ServiceError> {
        let tier = DiscountTier::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Discount tier {} not found", id)))?;

        let mut active: discount_tier::ActiveModel = tier.into();
        active.active = Set(false);
        active.update(&*self.db).await?;
        Ok(())
    }
}

/// Local-file tier store used when the database probe fails at startup.
/// The whole table lives in one JSON document, rewritten on every mutation.
pub struct FileDiscountStore {
    path: PathBuf,
    state: RwLock<Vec<DiscountTierModel>>,
}

impl FileDiscountStore {
    pub async fn load(data_dir: &Path) -> Result<Self, ServiceError> {
        let path = data_dir.join(DISCOUNTS_FILE);
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(ServiceError::InternalError(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    async fn persist(&self, tiers: &[DiscountTierModel]) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec_pretty(tiers)?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            ServiceError::InternalError(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl DiscountStore for FileDiscountStore {
    async fn tiers_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<DiscountTierModel>, ServiceError> {
        let state = self.state.read().await;
        Ok(state
            .iter()
            .filter(|t| t.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn upsert_tier(
        &self,
        product_id: Uuid,
        min_quantity: i32,
        percentage: Decimal,
    ) -> Result<DiscountTierModel, ServiceError> {
        let mut state = self.state.write().await;

        let tier = if let Some(tier) = state
            .iter_mut()
            .find(|t| t.product_id == product_id && t.min_quantity == min_quantity)
        {
            tier.percentage = percentage;
            tier.active = true;
            tier.clone()
        } else {
            let tier = DiscountTierModel {
                id: Uuid::new_v4(),
                product_id,
                min_quantity,
                percentage,
                active: true,
                created_at: Utc::now(),
            };
            state.push(tier.clone());
            tier
        };

        self.persist(&state).await?;
        Ok(tier)
    }

    async fn deactivate_tier(&self, id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        let tier = state
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Discount tier {} not found", id)))?;
        tier.active = false;
        self.persist(&state).await
    }
}
