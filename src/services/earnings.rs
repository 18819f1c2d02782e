use crate::{
    entities::{earnings_config, earnings_entry, EarningsConfig, EarningsEntry, EarningsEntryModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, DatabaseConnection, EntityTrait, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

const EARNINGS_FILE: &str = "earnings.json";
const CONFIG_ROW_ID: i32 = 1;

/// Percentage applied until an admin configures another one.
pub const DEFAULT_PERCENTAGE: Decimal = dec!(15);

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct EarningsSnapshot {
    pub total: Decimal,
    pub percentage: Decimal,
    pub history: Vec<EarningsEntryModel>,
}

/// Storage backend for the earnings ledger. The running total update and
/// the entry append happen atomically inside the store so concurrent sales
/// cannot lose increments.
#[async_trait]
pub trait EarningsStore: Send + Sync {
    async fn snapshot(&self) -> Result<EarningsSnapshot, ServiceError>;

    /// Appends one entry computed from the current percentage and returns it.
    async fn append(
        &self,
        sale_subtotal: Decimal,
        payment_id: &str,
        user_id: Uuid,
    ) -> Result<EarningsEntryModel, ServiceError>;

    /// Replaces the percentage, returning the previous value.
    async fn set_percentage(&self, percentage: Decimal) -> Result<Decimal, ServiceError>;
}

/// Earnings ledger service.
///
/// `add_earning` has no idempotence of its own: the checkout service is
/// responsible for calling it at most once per payment id.
#[derive(Clone)]
pub struct EarningsService {
    store: Arc<dyn EarningsStore>,
    event_sender: Arc<EventSender>,
}

impl EarningsService {
    pub fn new(store: Arc<dyn EarningsStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn add_earning(
        &self,
        sale_subtotal: Decimal,
        payment_id: &str,
        user_id: Uuid,
    ) -> Result<EarningsEntryModel, ServiceError> {
        let entry = self.store.append(sale_subtotal, payment_id, user_id).await?;

        self.event_sender
            .send_or_log(Event::EarningsAccrued {
                payment_id: payment_id.to_string(),
                amount: entry.amount,
            })
            .await;

        info!(
            %payment_id,
            amount = %entry.amount,
            total = %entry.total_after,
            "Earning recorded"
        );
        Ok(entry)
    }

    pub async fn get_earnings(&self) -> Result<EarningsSnapshot, ServiceError> {
        self.store.snapshot().await
    }

    #[instrument(skip(self))]
    pub async fn set_percentage(&self, percentage: Decimal) -> Result<(), ServiceError> {
        if percentage < Decimal::ZERO || percentage > Decimal::from(100) {
            return Err(ServiceError::ValidationError(
                "Percentage must be between 0 and 100".to_string(),
            ));
        }

        let old = self.store.set_percentage(percentage).await?;
        self.event_sender
            .send_or_log(Event::EarningsPercentageChanged {
                old_percentage: old,
                new_percentage: percentage,
            })
            .await;
        Ok(())
    }
}

fn compute_earning(sale_subtotal: Decimal, percentage: Decimal) -> Decimal {
    sale_subtotal * percentage / Decimal::from(100)
}

// ==================== Database store ====================

pub struct DbEarningsStore {
    db: Arc<DatabaseConnection>,
}

impl DbEarningsStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads the single config row inside the given transaction, creating
    /// it with defaults on first use.
    async fn config_row(
        conn: &impl sea_orm::ConnectionTrait,
    ) -> Result<earnings_config::Model, ServiceError> {
        if let Some(config) = EarningsConfig::find_by_id(CONFIG_ROW_ID).one(conn).await? {
            return Ok(config);
        }

        let config = earnings_config::ActiveModel {
            id: Set(CONFIG_ROW_ID),
            accumulated_total: Set(Decimal::ZERO),
            percentage: Set(DEFAULT_PERCENTAGE),
            updated_at: Set(Utc::now()),
        };
        Ok(config.insert(conn).await?)
    }
}

#[async_trait]
impl EarningsStore for DbEarningsStore {
    async fn snapshot(&self) -> Result<EarningsSnapshot, ServiceError> {
        let config = Self::config_row(&*self.db).await?;
        let history = EarningsEntry::find()
            .order_by_asc(earnings_entry::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(EarningsSnapshot {
            total: config.accumulated_total,
            percentage: config.percentage,
            history,
        })
    }

    async fn append(
        &self,
        sale_subtotal: Decimal,
        payment_id: &str,
        user_id: Uuid,
    ) -> Result<EarningsEntryModel, ServiceError> {
        let txn = self.db.begin().await?;

        let config = Self::config_row(&txn).await?;
        let amount = compute_earning(sale_subtotal, config.percentage);
        let total_after = config.accumulated_total + amount;

        let entry = earnings_entry::ActiveModel {
            id: NotSet,
            amount: Set(amount),
            percentage: Set(config.percentage),
            sale_subtotal: Set(sale_subtotal),
            payment_id: Set(payment_id.to_string()),
            user_id: Set(user_id),
            total_after: Set(total_after),
            created_at: Set(Utc::now()),
        };
        let entry = entry.insert(&txn).await?;

        let mut config: earnings_config::ActiveModel = config.into();
        config.accumulated_total = Set(total_after);
        config.updated_at = Set(Utc::now());
        config.update(&txn).await?;

        txn.commit().await?;
        Ok(entry)
    }

    async fn set_percentage(&self, percentage: Decimal) -> Result<Decimal, ServiceError> {
        let txn = self.db.begin().await?;

        let config = Self::config_row(&txn).await?;
        let old = config.percentage;

        let mut config: earnings_config::ActiveModel = config.into();
        config.percentage = Set(percentage);
        config.updated_at = Set(Utc::now());
        config.update(&txn).await?;

        txn.commit().await?;
        Ok(old)
    }
}

// ==================== Local-file store ====================

#[derive(Debug, Serialize, Deserialize)]
struct FileEarningsState {
    accumulated_total: Decimal,
    percentage: Decimal,
    entries: Vec<EarningsEntryModel>,
}

impl Default for FileEarningsState {
    fn default() -> Self {
        Self {
            accumulated_total: Decimal::ZERO,
            percentage: DEFAULT_PERCENTAGE,
            entries: Vec::new(),
        }
    }
}

/// Local-file ledger used when the database probe fails at startup.
pub struct FileEarningsStore {
    path: PathBuf,
    state: RwLock<FileEarningsState>,
}

impl FileEarningsStore {
    pub async fn load(data_dir: &Path) -> Result<Self, ServiceError> {
        let path = data_dir.join(EARNINGS_FILE);
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileEarningsState::default(),
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

    async fn persist(&self, state: &FileEarningsState) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            ServiceError::InternalError(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl EarningsStore for FileEarningsStore {
    async fn snapshot(&self) -> Result<EarningsSnapshot, ServiceError> {
        let state = self.state.read().await;
        Ok(EarningsSnapshot {
            total: state.accumulated_total,
            percentage: state.percentage,
            history: state.entries.clone(),
        })
    }

    async fn append(
        &self,
        sale_subtotal: Decimal,
        payment_id: &str,
        user_id: Uuid,
    ) -> Result<EarningsEntryModel, ServiceError> {
        let mut state = self.state.write().await;

        let amount = compute_earning(sale_subtotal, state.percentage);
        let total_after = state.accumulated_total + amount;
        let entry = EarningsEntryModel {
            id: state.entries.len() as i64 + 1,
            amount,
            percentage: state.percentage,
            sale_subtotal,
            payment_id: payment_id.to_string(),
            user_id,
            total_after,
            created_at: Utc::now(),
        };

        state.accumulated_total = total_after;
        state.entries.push(entry.clone());

        self.persist(&state).await?;
        Ok(entry)
    }

    async fn set_percentage(&self, percentage: Decimal) -> Result<Decimal, ServiceError> {
        let mut state = self.state.write().await;
        let old = state.percentage;
        state.percentage = percentage;
        self.persist(&state).await?;
        Ok(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn event_sender() -> Arc<EventSender> {
        let (tx, _rx) = mpsc::channel(16);
        Arc::new(EventSender::new(tx))
    }

    async fn file_service(dir: &Path) -> EarningsService {
        let store = Arc::new(FileEarningsStore::load(dir).await.expect("load"));
        EarningsService::new(store, event_sender())
    }

    #[test]
    fn earning_is_percentage_of_subtotal() {
        assert_eq!(compute_earning(dec!(1000), dec!(15)), dec!(150));
        assert_eq!(compute_earning(dec!(999), dec!(0)), Decimal::ZERO);
        assert_eq!(compute_earning(dec!(200), dec!(100)), dec!(200));
    }

    #[tokio::test]
    async fn running_total_accumulates_per_sale_percentage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;
        let user = Uuid::new_v4();

        // Default 15%.
        let first = service
            .add_earning(dec!(1000), "pay-1", user)
            .await
            .expect("first");
        assert_eq!(first.amount, dec!(150));
        assert_eq!(first.total_after, dec!(150));

        // Percentage change applies only to later sales.
        service.set_percentage(dec!(10)).await.expect("set");
        let second = service
            .add_earning(dec!(500), "pay-2", user)
            .await
            .expect("second");
        assert_eq!(second.amount, dec!(50));
        assert_eq!(second.total_after, dec!(200));

        let snapshot = service.get_earnings().await.expect("snapshot");
        assert_eq!(snapshot.total, dec!(200));
        assert_eq!(snapshot.percentage, dec!(10));
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.history[0].percentage, dec!(15));
        assert_eq!(snapshot.history[1].percentage, dec!(10));
    }

    #[tokio::test]
    async fn percentage_bounds_are_enforced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;

        assert!(matches!(
            service.set_percentage(dec!(-1)).await,
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.set_percentage(dec!(101)).await,
            Err(ServiceError::ValidationError(_))
        ));
        assert!(service.set_percentage(dec!(0)).await.is_ok());
        assert!(service.set_percentage(dec!(100)).await.is_ok());
    }

    #[tokio::test]
    async fn ledger_survives_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let user = Uuid::new_v4();

        {
            let service = file_service(dir.path()).await;
            service
                .add_earning(dec!(300), "pay-9", user)
                .await
                .expect("append");
        }

        let service = file_service(dir.path()).await;
        let snapshot = service.get_earnings().await.expect("snapshot");
        assert_eq!(snapshot.total, dec!(45));
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].payment_id, "pay-9");
    }
}
