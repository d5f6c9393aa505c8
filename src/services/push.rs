// Push delivery via FCM HTTP v1
// The sender sits behind a trait so broadcast and webhook flows can be tested
// without network access. Delivery is always best-effort; callers count
// failures but never fail their own operation on one.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("Push request failed: {0}")]
    Request(String),

    #[error("Push rejected by FCM: {status} {body}")]
    Rejected { status: u16, body: String },
}

/// A notification to deliver to one device
#[derive(Debug, Clone)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    /// String-valued payload delivered alongside the notification
    pub data: HashMap<String, String>,
}

impl PushNotification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Delivery backend for push notifications
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, device_token: &str, notification: &PushNotification)
        -> Result<(), PushError>;
}

#[derive(Debug, Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// FCM HTTP v1 client authenticated with a Google service account
pub struct FcmClient {
    http: reqwest::Client,
    project_id: String,
    service_account_email: String,
    signing_key: EncodingKey,
    android_channel_id: String,
    token_endpoint: String,
    fcm_endpoint: String,
    cached_token: RwLock<Option<CachedToken>>,
}

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

impl FcmClient {
    pub fn new(
        project_id: String,
        service_account_email: String,
        private_key_pem: &str,
        android_channel_id: String,
    ) -> Result<Self, PushError> {
        let signing_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| PushError::Auth(format!("invalid service account key: {}", e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            fcm_endpoint: format!(
                "https://fcm.googleapis.com/v1/projects/{}/messages:send",
                project_id
            ),
            project_id,
            service_account_email,
            signing_key,
            android_channel_id,
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            cached_token: RwLock::new(None),
        })
    }

    /// Create an FCM client from centralized app configuration
    pub fn from_env() -> Result<Self, PushError> {
        let settings = &crate::app_config::config().push;
        Self::new(
            settings.fcm_project_id.clone(),
            settings.service_account_email.clone(),
            &settings.service_account_private_key,
            settings.android_channel_id.clone(),
        )
    }

    fn assertion(&self) -> Result<String, PushError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let claims = ServiceAccountClaims {
            iss: &self.service_account_email,
            scope: FCM_SCOPE,
            aud: &self.token_endpoint,
            iat,
            exp: iat + 3600,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| PushError::Auth(e.to_string()))
    }

    async fn access_token(&self) -> Result<String, PushError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Instant::now() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let assertion = self.assertion()?;
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PushError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Auth(format!(
                "token exchange failed: {} {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PushError::Auth(e.to_string()))?;

        // Refresh a minute before actual expiry
        let expires_at =
            Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60));
        let access_token = token.access_token.clone();
        *self.cached_token.write().await = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access_token)
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> Result<(), PushError> {
        let access_token = self.access_token().await?;

        let payload = json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": notification.title,
                    "body": notification.body,
                },
                "data": notification.data,
                "android": {
                    "notification": {
                        "channel_id": self.android_channel_id,
                    }
                },
            }
        });

        let response = self
            .http
            .post(&self.fcm_endpoint)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PushError::Request(e.to_string()))?;

        if response.status().is_success() {
            tracing::debug!(project = %self.project_id, "push delivered");
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(PushError::Rejected { status, body })
        }
    }
}
