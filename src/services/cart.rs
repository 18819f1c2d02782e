use crate::{
    entities::{cart_item, CartItem, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{catalog::CatalogService, discounts::DiscountService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Pricing applied to one cart line at read time.
///
/// A line either carries the plain catalog price or a discounted one; the
/// two cases are distinct variants rather than optional fields so callers
/// cannot misread a missing discount.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinePricing {
    Undiscounted {
        unit_price: Decimal,
    },
    Discounted {
        original_price: Decimal,
        final_price: Decimal,
        percentage: Decimal,
    },
}

impl LinePricing {
    /// Unit price the customer actually pays.
    pub fn final_unit_price(&self) -> Decimal {
        match self {
            Self::Undiscounted { unit_price } => *unit_price,
            Self::Discounted { final_price, .. } => *final_price,
        }
    }

    /// Discount percentage applied (zero for undiscounted lines).
    pub fn percentage(&self) -> Decimal {
        match self {
            Self::Undiscounted { .. } => Decimal::ZERO,
            Self::Discounted { percentage, .. } => *percentage,
        }
    }
}

/// One cart line with its read-time pricing.
#[derive(Debug, Clone, Serialize)]
pub struct PricedCartLine {
    pub product_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub pricing: LinePricing,
    pub subtotal: Decimal,
}

/// A user's cart, fully priced.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub user_id: Uuid,
    pub lines: Vec<PricedCartLine>,
    pub total: Decimal,
}

/// Computes a line's pricing from the catalog price and the resolved
/// discount percentage.
pub fn price_line(product: &ProductModel, quantity: i32, percentage: Decimal) -> PricedCartLine {
    let pricing = if percentage > Decimal::ZERO {
        let final_price =
            product.price * (Decimal::ONE - percentage / Decimal::from(100));
        LinePricing::Discounted {
            original_price: product.price,
            final_price,
            percentage,
        }
    } else {
        LinePricing::Undiscounted {
            unit_price: product.price,
        }
    };

    let subtotal = pricing.final_unit_price() * Decimal::from(quantity);
    PricedCartLine {
        product_id: product.id,
        name: product.name.clone(),
        image_url: product.image_url.clone(),
        quantity,
        pricing,
        subtotal,
    }
}

/// Per-user shopping cart.
///
/// Lines store only (user, product, quantity); prices and discounts are
/// recomputed on every read with the line's current total quantity, so a
/// later add can retroactively change the discount applied to units added
/// earlier. Checkout reads the cart through this same path and therefore
/// settles at the values in effect the moment it runs.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<CatalogService>,
    discounts: Arc<DiscountService>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<CatalogService>,
        discounts: Arc<DiscountService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            catalog,
            discounts,
            event_sender,
        }
    }

    /// Returns the user's cart with per-line pricing recomputed now.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let Some(product) = self.catalog.get_product(item.product_id).await? else {
                // Product removed from the catalog while sitting in a cart.
                warn!(product_id = %item.product_id, "Cart line references missing product; skipping");
                continue;
            };

            let percentage = self
                .discounts
                .resolve_discount(item.product_id, item.quantity)
                .await?;
            lines.push(price_line(&product, item.quantity, percentage));
        }

        let total = lines.iter().map(|l| l.subtotal).sum();
        Ok(CartView {
            user_id,
            lines,
            total,
        })
    }

    /// Adds a product to the cart; an existing line accumulates quantity.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        self.catalog.require_product(product_id).await?;

        let existing = self.find_line(user_id, product_id).await?;
        if let Some(item) = existing {
            let current = item.quantity;
            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(current + quantity);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&*self.db).await?;
        }

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_id,
            })
            .await;

        info!(%user_id, %product_id, quantity, "Added to cart");
        Ok(())
    }

    /// Replaces a line's quantity (unlike `add`, which accumulates).
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1; use remove to drop the line".to_string(),
            ));
        }

        let item = self.find_line(user_id, product_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Product {} is not in the cart of user {}",
                product_id, user_id
            ))
        })?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                user_id,
                product_id,
            })
            .await;
        Ok(())
    }

    /// Removes one product from the cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let result = CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} is not in the cart of user {}",
                product_id, user_id
            )));
        }

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                user_id,
                product_id,
            })
            .await;
        Ok(())
    }

    /// Empties the user's cart. Idempotent.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        self.event_sender.send_or_log(Event::CartCleared(user_id)).await;
        info!(%user_id, "Cart cleared");
        Ok(())
    }

    async fn find_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        Ok(CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal) -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            name: "Cafe de grano".to_string(),
            description: String::new(),
            price,
            stock: 10,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn undiscounted_line_keeps_catalog_price() {
        let line = price_line(&product(dec!(4500)), 3, Decimal::ZERO);

        assert_eq!(line.pricing, LinePricing::Undiscounted { unit_price: dec!(4500) });
        assert_eq!(line.subtotal, dec!(13500));
        assert_eq!(line.pricing.percentage(), Decimal::ZERO);
    }

    #[test]
    fn discounted_line_reduces_unit_price() {
        let line = price_line(&product(dec!(1000)), 7, dec!(10));

        assert_eq!(
            line.pricing,
            LinePricing::Discounted {
                original_price: dec!(1000),
                final_price: dec!(900),
                percentage: dec!(10),
            }
        );
        assert_eq!(line.subtotal, dec!(6300));
        assert_eq!(line.pricing.final_unit_price(), dec!(900));
    }

    #[test]
    fn full_discount_prices_line_at_zero() {
        let line = price_line(&product(dec!(250)), 2, dec!(100));
        assert_eq!(line.pricing.final_unit_price(), Decimal::ZERO);
        assert_eq!(line.subtotal, Decimal::ZERO);
    }
}
