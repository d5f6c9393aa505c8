// Stripe webhook endpoint
// Signature verification runs over the raw body before any JSON parsing; a
// bad or missing signature is a 400 and the event is never processed.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::services::subscription::{handle_webhook_event, WebhookOutcome};
use crate::utils::api_error::ApiError;

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe-Signature header"))?;

    let now = chrono::Utc::now().timestamp();
    let event = state
        .stripe
        .verify_webhook(&body, signature, now)
        .map_err(|e| {
            tracing::warn!(error = %e, "webhook rejected");
            ApiError::bad_request("Invalid webhook signature")
        })?;

    let outcome =
        handle_webhook_event(&state.diesel_pool, state.push.as_ref(), &state.stripe, event)
            .await?;

    let processed = matches!(outcome, WebhookOutcome::Processed { .. });
    Ok(Json(json!({ "received": true, "processed": processed })))
}
