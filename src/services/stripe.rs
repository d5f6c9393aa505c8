// Stripe API client and webhook signature verification
// Form-encoded calls against the REST API with the secret key; only the
// fields this service reads are deserialized. The api_base is configurable so
// tests can point the client at a local stub.

use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StripeError {
    #[error("Stripe request failed: {0}")]
    Request(String),

    #[error("Stripe rejected the request: {status} {body}")]
    Api { status: u16, body: String },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
    /// Amount in the smallest currency unit
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    pub recurring: Option<Recurring>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recurring {
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItems {
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    /// Epoch seconds
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub items: SubscriptionItems,
}

impl Subscription {
    /// Only status `active` grants coverage; trials have not paid yet
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn first_price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub status: Option<String>,
    pub total: Option<i64>,
    pub currency: Option<String>,
    /// Epoch seconds
    pub created: Option<i64>,
    pub hosted_invoice_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// A parsed webhook event; `object` is the event payload object
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

/// How far a webhook timestamp may drift from now before being rejected
const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            api_base,
        }
    }

    /// Create a Stripe client from centralized app configuration
    pub fn from_env() -> Self {
        let settings = &crate::app_config::config().stripe;
        Self::new(
            settings.secret_key.clone(),
            settings.webhook_secret.clone(),
            settings.api_base.clone(),
        )
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        Self::read_response(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(query)
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        Self::read_response(response).await
    }

    async fn read_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StripeError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut form = vec![("email", email)];
        if let Some(name) = name {
            form.push(("name", name));
        }
        self.post("/customers", &form).await
    }

    pub async fn update_customer(
        &self,
        customer_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut form = Vec::new();
        if let Some(email) = email {
            form.push(("email", email));
        }
        if let Some(name) = name {
            form.push(("name", name));
        }
        self.post(&format!("/customers/{}", customer_id), &form)
            .await
    }

    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        self.get(&format!("/subscriptions/{}", subscription_id), &[])
            .await
    }

    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        self.post(
            "/checkout/sessions",
            &[
                ("customer", customer_id),
                ("mode", "subscription"),
                ("line_items[0][price]", price_id),
                ("line_items[0][quantity]", "1"),
                ("success_url", success_url),
                ("cancel_url", cancel_url),
            ],
        )
        .await
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        configuration_id: Option<&str>,
        return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        let mut form = vec![("customer", customer_id), ("return_url", return_url)];
        if let Some(configuration_id) = configuration_id {
            form.push(("configuration", configuration_id));
        }
        self.post("/billing_portal/sessions", &form).await
    }

    pub async fn list_invoices(&self, customer_id: &str) -> Result<Vec<Invoice>, StripeError> {
        let list: ListResponse<Invoice> = self
            .get("/invoices", &[("customer", customer_id), ("limit", "100")])
            .await?;
        Ok(list.data)
    }

    pub async fn list_active_products(&self) -> Result<Vec<Product>, StripeError> {
        let list: ListResponse<Product> = self
            .get("/products", &[("active", "true"), ("limit", "100")])
            .await?;
        Ok(list.data)
    }

    pub async fn list_prices_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<Price>, StripeError> {
        let list: ListResponse<Price> = self
            .get(
                "/prices",
                &[("product", product_id), ("active", "true"), ("limit", "100")],
            )
            .await?;
        Ok(list.data)
    }

    /// Verify a `Stripe-Signature` header against the raw request body and
    /// parse the event. Rejects stale timestamps and bad signatures.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now_epoch_seconds: i64,
    ) -> Result<WebhookEvent, StripeError> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            now_epoch_seconds,
        )?;
        serde_json::from_slice(payload).map_err(|e| StripeError::MalformedPayload(e.to_string()))
    }
}

fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now_epoch_seconds: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {},
        }
    }

    let timestamp = timestamp.ok_or(StripeError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature);
    }
    if (now_epoch_seconds - timestamp).abs() > SIGNATURE_TOLERANCE_SECONDS {
        return Err(StripeError::InvalidSignature);
    }

    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed_payload = Vec::with_capacity(payload.len() + 16);
    signed_payload.extend_from_slice(timestamp.to_string().as_bytes());
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(payload);
    let expected = hex_encode(ring::hmac::sign(&key, &signed_payload).as_ref());

    for candidate in signatures {
        if expected
            .as_bytes()
            .ct_eq(candidate.as_bytes())
            .unwrap_u8()
            == 1
        {
            return Ok(());
        }
    }

    Err(StripeError::InvalidSignature)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
