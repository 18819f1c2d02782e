use crate::{config::AppConfig, errors::ServiceError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// One line of a payment preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub currency_id: String,
}

/// Return URLs the provider redirects to after the customer pays,
/// abandons, or the payment stays under review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Preference document submitted to the provider. Built fresh for every
/// checkout attempt and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub back_urls: BackUrls,
    /// Opaque passthrough; carries the user id across the redirect.
    pub external_reference: String,
    pub auto_return: String,
}

/// Provider's answer: the id of the preference and the URL to send the
/// customer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPreference {
    pub id: String,
    pub init_point: String,
}

/// Redirect-based payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<CreatedPreference, ServiceError>;
}

/// HTTP client for the real provider API.
#[derive(Clone)]
pub struct HttpPaymentProvider {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl HttpPaymentProvider {
    pub fn new(base_url: String, access_token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.payment_provider_url.clone(),
            cfg.payment_access_token.clone(),
        )
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    #[instrument(skip(self, request))]
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<CreatedPreference, ServiceError> {
        let url = format!("{}/checkout/preferences", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!("Payment provider unreachable: {}", e);
                ServiceError::ExternalServiceError(format!("Provider unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "Payment provider rejected preference");
            return Err(ServiceError::ExternalServiceError(format!(
                "Provider rejected preference with status {}",
                status
            )));
        }

        let created: CreatedPreference = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Malformed provider response: {}", e))
        })?;

        info!(preference_id = %created.id, "Payment preference created");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn preference_request_serializes_with_provider_field_names() {
        let request = PreferenceRequest {
            items: vec![PreferenceItem {
                title: "Yerba mate".to_string(),
                quantity: 2,
                unit_price: dec!(4500),
                currency_id: "CLP".to_string(),
            }],
            back_urls: BackUrls {
                success: "https://shop.example/api/v1/checkout/success".to_string(),
                failure: "https://shop.example/api/v1/checkout/failure".to_string(),
                pending: "https://shop.example/api/v1/checkout/pending".to_string(),
            },
            external_reference: "user-42".to_string(),
            auto_return: "approved".to_string(),
        };

        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["items"][0]["title"], "Yerba mate");
        assert_eq!(json["items"][0]["currency_id"], "CLP");
        assert_eq!(json["external_reference"], "user-42");
        assert_eq!(json["auto_return"], "approved");
        assert!(json["back_urls"]["pending"]
            .as_str()
            .expect("pending url")
            .ends_with("/checkout/pending"));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let provider =
            HttpPaymentProvider::new("https://api.provider.test/".to_string(), "tok".to_string());
        assert_eq!(provider.base_url, "https://api.provider.test");
    }
}
