use crate::{
    entities::{sale, sale_item, Sale, SaleItem, SaleItemModel, SaleModel, SaleStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Line snapshot captured when a sale is recorded.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    pub subtotal: Decimal,
}

/// A sale together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct SaleWithItems {
    pub sale: SaleModel,
    pub items: Vec<SaleItemModel>,
}

/// Durable record of completed sales.
///
/// The one structural guarantee this service provides is that at most one
/// sale exists per external payment id, enforced by the unique index on
/// `sales.payment_id` rather than any in-process lock: the provider may
/// retry a callback from another process or after a crash.
#[derive(Clone)]
pub struct SaleHistoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl SaleHistoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records a completed sale keyed by the provider's payment id.
    ///
    /// Sale and items are inserted in one transaction; a duplicate payment
    /// id surfaces as `Conflict` so the caller can fall back to the sale
    /// that won the race.
    #[instrument(skip(self, items))]
    pub async fn record_sale(
        &self,
        user_id: Uuid,
        items: Vec<SaleLineInput>,
        payment_id: &str,
        subtotal: Decimal,
    ) -> Result<SaleWithItems, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "A sale needs at least one line item".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let sale_id = Uuid::new_v4();
        let sale = sale::ActiveModel {
            id: Set(sale_id),
            user_id: Set(user_id),
            status: Set(SaleStatus::Completada),
            subtotal: Set(subtotal),
            payment_id: Set(payment_id.to_string()),
            created_at: Set(Utc::now()),
        };

        let sale = match sale.insert(&txn).await {
            Ok(sale) => sale,
            Err(err) => {
                return if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Err(ServiceError::Conflict(format!(
                        "Sale already recorded for payment {}",
                        payment_id
                    )))
                } else {
                    Err(err.into())
                };
            }
        };

        let mut persisted = Vec::with_capacity(items.len());
        for item in items {
            let row = sale_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale_id),
                product_id: Set(item.product_id),
                name: Set(item.name),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                discount_percentage: Set(item.discount_percentage),
                subtotal: Set(item.subtotal),
            };
            persisted.push(row.insert(&txn).await?);
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::SaleRecorded {
                sale_id,
                payment_id: payment_id.to_string(),
            })
            .await;

        info!(%sale_id, %payment_id, %subtotal, "Sale recorded");
        Ok(SaleWithItems {
            sale,
            items: persisted,
        })
    }

    /// Looks up a sale by the provider's payment id.
    pub async fn find_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<SaleWithItems>, ServiceError> {
        let sale = Sale::find()
            .filter(sale::Column::PaymentId.eq(payment_id))
            .one(&*self.db)
            .await?;

        match sale {
            Some(sale) => Ok(Some(self.with_items(sale).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_sale(&self, sale_id: Uuid) -> Result<SaleWithItems, ServiceError> {
        let sale = Sale::find_by_id(sale_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;
        self.with_items(sale).await
    }

    /// A user's purchase history, newest first.
    pub async fn history_for_user(&self, user_id: Uuid) -> Result<Vec<SaleWithItems>, ServiceError> {
        let sales = Sale::find()
            .filter(sale::Column::UserId.eq(user_id))
            .order_by_desc(sale::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.attach_items(sales).await
    }

    /// Full sales history, newest first (admin view).
    pub async fn all_history(&self) -> Result<Vec<SaleWithItems>, ServiceError> {
        let sales = Sale::find()
            .order_by_desc(sale::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.attach_items(sales).await
    }

    /// Admin status transition. Sales are never deleted.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        sale_id: Uuid,
        status: SaleStatus,
    ) -> Result<SaleModel, ServiceError> {
        let sale = Sale::find_by_id(sale_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;

        let old_status = sale.status;
        let mut active: sale::ActiveModel = sale.into();
        active.status = Set(status);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::SaleStatusChanged {
                sale_id,
                old_status: old_status.as_str().to_string(),
                new_status: status.as_str().to_string(),
            })
            .await;
        Ok(updated)
    }

    async fn with_items(&self, sale: SaleModel) -> Result<SaleWithItems, ServiceError> {
        let items = SaleItem::find()
            .filter(sale_item::Column::SaleId.eq(sale.id))
            .all(&*self.db)
            .await?;
        Ok(SaleWithItems { sale, items })
    }

    async fn attach_items(
        &self,
        sales: Vec<SaleModel>,
    ) -> Result<Vec<SaleWithItems>, ServiceError> {
        let mut out = Vec::with_capacity(sales.len());
        for sale in sales {
            out.push(self.with_items(sale).await?);
        }
        Ok(out)
    }
}
