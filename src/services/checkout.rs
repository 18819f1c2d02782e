use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::CartService,
        catalog::CatalogService,
        earnings::EarningsService,
        history::{SaleHistoryService, SaleLineInput, SaleWithItems},
        payment_provider::{BackUrls, CreatedPreference, PaymentProvider, PreferenceItem, PreferenceRequest},
        users::UserService,
    },
};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::form_urlencoded;
use uuid::Uuid;

/// Checkout behavior taken from the application configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Publicly reachable base URL for the provider's back URLs.
    pub public_url: String,
    /// Currency code submitted with every preference line.
    pub currency: String,
    /// Decimal places preference prices are rounded to. The provider's
    /// line-item schema does not accept more precision than the currency's
    /// minor unit, so this is configuration rather than a constant.
    pub price_decimal_places: u32,
    pub success_view: String,
    pub failure_view: String,
    pub pending_view: String,
}

impl CheckoutSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
            currency: cfg.currency.clone(),
            price_decimal_places: cfg.price_decimal_places,
            success_view: cfg.success_view.clone(),
            failure_view: cfg.failure_view.clone(),
            pending_view: cfg.pending_view.clone(),
        }
    }
}

/// Query parameters the provider appends when redirecting back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub external_reference: Option<String>,
    pub payment_id: Option<String>,
    pub collection_id: Option<String>,
}

/// Display-only line carried to the success view.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayItem {
    pub name: String,
    pub quantity: i32,
    pub price: String,
}

#[derive(Debug, Clone)]
pub struct SuccessView {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub payment_id: String,
    pub subtotal: Decimal,
    pub items: Vec<DisplayItem>,
    /// True when the callback hit the idempotence gate and the stored sale
    /// was replayed instead of reconciling again.
    pub already_reconciled: bool,
}

#[derive(Debug, Clone)]
pub struct FailureView {
    pub order_id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PendingView {
    pub order_id: String,
    pub amount: Decimal,
    pub payment_id: String,
}

/// Where a provider callback sends the customer next. Callbacks never
/// surface raw errors: the customer left the application to pay, so every
/// outcome ends in a human-readable view.
#[derive(Debug, Clone)]
pub enum CallbackRedirect {
    Success(SuccessView),
    Failure(FailureView),
    Pending(PendingView),
}

impl CallbackRedirect {
    /// Builds the redirect URL with the view's query-string contract.
    pub fn redirect_url(&self, settings: &CheckoutSettings) -> String {
        match self {
            Self::Success(view) => {
                let items = serde_json::to_string(&view.items).unwrap_or_else(|_| "[]".to_string());
                let query: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("order_id", &view.order_id.to_string())
                    .append_pair("user_id", &view.user_id.to_string())
                    .append_pair("payment_id", &view.payment_id)
                    .append_pair("subtotal", &format_amount(view.subtotal))
                    .append_pair("items", &items)
                    .finish();
                format!("{}?{}", settings.success_view, query)
            }
            Self::Failure(view) => {
                let query: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("order_id", &view.order_id)
                    .append_pair("reason", &view.reason)
                    .finish();
                format!("{}?{}", settings.failure_view, query)
            }
            Self::Pending(view) => {
                let query: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("status", "pending")
                    .append_pair("order_id", &view.order_id)
                    .append_pair("amount", &format_amount(view.amount))
                    .append_pair("payment_id", &view.payment_id)
                    .finish();
                format!("{}?{}", settings.pending_view, query)
            }
        }
    }
}

/// Rounds a unit price for submission to the provider.
pub fn round_price(price: Decimal, decimal_places: u32) -> Decimal {
    price.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
}

fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Turns a user's cart into a payment preference and later reconciles the
/// provider's asynchronous callback into exactly one sale, one earnings
/// entry and an emptied cart.
///
/// Stock is checked, not reserved, when the preference is created; nothing
/// holds it until the success callback arrives, so concurrent checkouts
/// can oversell in that window (stock then bottoms out at zero during
/// reconciliation). Closing that window needs a hold/expire mechanism and
/// is deliberately out of scope.
#[derive(Clone)]
pub struct CheckoutService {
    cart: Arc<CartService>,
    catalog: Arc<CatalogService>,
    history: Arc<SaleHistoryService>,
    earnings: Arc<EarningsService>,
    users: Arc<UserService>,
    provider: Arc<dyn PaymentProvider>,
    event_sender: Arc<EventSender>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cart: Arc<CartService>,
        catalog: Arc<CatalogService>,
        history: Arc<SaleHistoryService>,
        earnings: Arc<EarningsService>,
        users: Arc<UserService>,
        provider: Arc<dyn PaymentProvider>,
        event_sender: Arc<EventSender>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            cart,
            catalog,
            history,
            earnings,
            users,
            provider,
            event_sender,
            settings,
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Starts a checkout attempt: validates the cart, checks stock for
    /// every line, and submits a preference to the provider.
    ///
    /// The stock check is all-or-nothing: a single short line aborts the
    /// whole attempt and nothing is submitted. No durable store is mutated
    /// here; an abandoned attempt leaves the cart untouched.
    #[instrument(skip(self))]
    pub async fn begin_checkout(&self, user_id: Uuid) -> Result<CreatedPreference, ServiceError> {
        self.event_sender
            .send_or_log(Event::CheckoutStarted(user_id))
            .await;

        let cart = self.cart.get(user_id).await?;
        if cart.lines.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let mut items = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = self.catalog.require_product(line.product_id).await?;
            if product.stock < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for {}: available {}, requested {}",
                    product.name, product.stock, line.quantity
                )));
            }

            items.push(PreferenceItem {
                title: line.name.clone(),
                quantity: line.quantity,
                unit_price: round_price(
                    line.pricing.final_unit_price(),
                    self.settings.price_decimal_places,
                ),
                currency_id: self.settings.currency.clone(),
            });
        }

        let request = PreferenceRequest {
            items,
            back_urls: BackUrls {
                success: format!("{}/api/v1/checkout/success", self.settings.public_url),
                failure: format!("{}/api/v1/checkout/failure", self.settings.public_url),
                pending: format!("{}/api/v1/checkout/pending", self.settings.public_url),
            },
            external_reference: user_id.to_string(),
            auto_return: "approved".to_string(),
        };

        let created = self.provider.create_preference(&request).await?;

        self.event_sender
            .send_or_log(Event::PreferenceCreated {
                user_id,
                preference_id: created.id.clone(),
            })
            .await;

        info!(%user_id, preference_id = %created.id, "Checkout preference created");
        Ok(created)
    }

    /// Handles the provider's success callback.
    ///
    /// Reconciliation must happen exactly once per payment id. The gate is
    /// checked up front, and the sales table's unique index backs it up
    /// when the same callback is delivered concurrently: the losing insert
    /// is answered with the winning sale's data.
    #[instrument(skip(self))]
    pub async fn reconcile_success(&self, params: CallbackParams) -> CallbackRedirect {
        match self.try_reconcile_success(&params).await {
            Ok(redirect) => redirect,
            Err(err) => {
                error!("Reconciliation failed: {}", err);
                CallbackRedirect::Failure(FailureView {
                    order_id: fallback_order_id(&params),
                    reason: "Internal server error".to_string(),
                })
            }
        }
    }

    async fn try_reconcile_success(
        &self,
        params: &CallbackParams,
    ) -> Result<CallbackRedirect, ServiceError> {
        let Some(user_id) = params
            .external_reference
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            return Ok(CallbackRedirect::Failure(FailureView {
                order_id: fallback_order_id(params),
                reason: "User could not be identified".to_string(),
            }));
        };

        let Some(payment_id) = params.payment_id.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(CallbackRedirect::Failure(FailureView {
                order_id: fallback_order_id(params),
                reason: "Payment id missing".to_string(),
            }));
        };

        // Idempotence gate: a payment id that already produced a sale is
        // replayed from the stored record, with no further mutation.
        if let Some(existing) = self.history.find_by_payment_id(payment_id).await? {
            return Ok(self.replay_existing_sale(existing, payment_id).await);
        }

        if self.users.get_user(user_id).await?.is_none() {
            return Ok(CallbackRedirect::Failure(FailureView {
                order_id: payment_id.to_string(),
                reason: "Purchase data not found".to_string(),
            }));
        }

        // Reprice from the current cart, not the preference's stale
        // snapshot: the amounts recorded are the ones in effect now.
        let cart = self.cart.get(user_id).await?;
        if cart.lines.is_empty() {
            return Ok(CallbackRedirect::Failure(FailureView {
                order_id: payment_id.to_string(),
                reason: "Purchase data not found".to_string(),
            }));
        }

        let subtotal = cart.total;
        let line_inputs: Vec<SaleLineInput> = cart
            .lines
            .iter()
            .map(|line| SaleLineInput {
                product_id: line.product_id,
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.pricing.final_unit_price(),
                discount_percentage: line.pricing.percentage(),
                subtotal: line.subtotal,
            })
            .collect();

        let recorded = match self
            .history
            .record_sale(user_id, line_inputs, payment_id, subtotal)
            .await
        {
            Ok(recorded) => recorded,
            // Lost the insert race to a concurrent delivery of the same
            // callback; answer with the sale that won.
            Err(ServiceError::Conflict(_)) => {
                let existing = self
                    .history
                    .find_by_payment_id(payment_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "Sale for payment {} vanished after duplicate insert",
                            payment_id
                        ))
                    })?;
                return Ok(self.replay_existing_sale(existing, payment_id).await);
            }
            Err(err) => return Err(err),
        };

        // The sale is committed; the steps below must not fail the
        // callback, and a retried callback will not re-run them.
        for line in &cart.lines {
            if let Err(err) = self
                .catalog
                .decrement_stock(line.product_id, line.quantity)
                .await
            {
                error!(product_id = %line.product_id, "Stock decrement failed: {}", err);
            }
        }

        if let Err(err) = self.earnings.add_earning(subtotal, payment_id, user_id).await {
            error!(%payment_id, "Earnings entry failed: {}", err);
        }

        if let Err(err) = self.cart.clear(user_id).await {
            error!(%user_id, "Cart clear failed: {}", err);
        }

        Ok(CallbackRedirect::Success(SuccessView {
            order_id: recorded.sale.id,
            user_id,
            payment_id: payment_id.to_string(),
            subtotal,
            items: display_items(&recorded),
            already_reconciled: false,
        }))
    }

    async fn replay_existing_sale(
        &self,
        existing: SaleWithItems,
        payment_id: &str,
    ) -> CallbackRedirect {
        info!(%payment_id, sale_id = %existing.sale.id, "Payment already reconciled");
        self.event_sender
            .send_or_log(Event::SaleAlreadyRecorded {
                sale_id: existing.sale.id,
                payment_id: payment_id.to_string(),
            })
            .await;

        CallbackRedirect::Success(SuccessView {
            order_id: existing.sale.id,
            user_id: existing.sale.user_id,
            payment_id: payment_id.to_string(),
            subtotal: existing.sale.subtotal,
            items: display_items(&existing),
            already_reconciled: true,
        })
    }

    /// Handles the provider's failure callback. Nothing was reserved, so
    /// there is nothing to undo; the customer just gets the failure view.
    #[instrument(skip(self))]
    pub async fn reconcile_failure(&self, params: CallbackParams) -> CallbackRedirect {
        let order_id = params
            .payment_id
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("ORD-FAIL-{}", Utc::now().timestamp_millis()));

        CallbackRedirect::Failure(FailureView {
            order_id,
            reason: "Payment rejected by the financial entity".to_string(),
        })
    }

    /// Handles the provider's pending callback: best-effort display of the
    /// cart's current total. The payment has not settled, so sales,
    /// earnings and the cart are all left untouched.
    #[instrument(skip(self))]
    pub async fn reconcile_pending(&self, params: CallbackParams) -> CallbackRedirect {
        let amount = match params
            .external_reference
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(user_id) => match self.cart.get(user_id).await {
                Ok(cart) => cart.total,
                Err(err) => {
                    warn!("Pending callback could not read cart: {}", err);
                    Decimal::ZERO
                }
            },
            None => Decimal::ZERO,
        };

        CallbackRedirect::Pending(PendingView {
            order_id: format!("ORD-{}", Utc::now().timestamp_millis()),
            amount,
            payment_id: params
                .payment_id
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
        })
    }
}

fn fallback_order_id(params: &CallbackParams) -> String {
    params
        .payment_id
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| format!("ORD-FAIL-{}", Utc::now().timestamp_millis()))
}

fn display_items(sale: &SaleWithItems) -> Vec<DisplayItem> {
    sale.items
        .iter()
        .map(|item| DisplayItem {
            name: item.name.clone(),
            quantity: item.quantity,
            price: format_amount(item.unit_price),
        })
        .collect()
}
