// Message endpoints: history, recent window, broadcast, device unregistration

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::app::AppState;
use crate::middleware::auth_middleware::{RequireAdmin, RequireMember};
use crate::models::client::Client;
use crate::models::message::Message;
use crate::services::broadcast::{broadcast, BroadcastInput};
use crate::utils::api_error::ApiError;
use crate::utils::time::now_epoch_ms;

/// Full message history addressed to the signed-in account
pub async fn list_messages(
    State(state): State<AppState>,
    principal: RequireMember,
) -> Result<Json<Vec<Message>>, ApiError> {
    let user_id = principal.user_id()?;
    let mut conn = state.diesel_pool.get().await?;
    let messages = Message::list_for_receiver(&mut conn, user_id).await?;
    Ok(Json(messages))
}

/// Messages from the last 24 hours
pub async fn list_latest_messages(
    State(state): State<AppState>,
    principal: RequireMember,
) -> Result<Json<Vec<Message>>, ApiError> {
    let user_id = principal.user_id()?;
    let mut conn = state.diesel_pool.get().await?;
    let messages = Message::list_recent_for_receiver(&mut conn, user_id, now_epoch_ms()).await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BroadcastRequest {
    #[validate(length(max = 2))]
    pub kind: Option<String>,
    #[validate(length(max = 6))]
    pub code: Option<String>,
    pub body: Option<String>,
}

/// Persist a broadcast and fan it out to every eligible account
pub async fn broadcast_message(
    State(state): State<AppState>,
    principal: RequireAdmin,
    Json(payload): Json<BroadcastRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;
    let sender_id = principal.user_id()?;

    let outcome = broadcast(
        &state.diesel_pool,
        state.push.as_ref(),
        sender_id,
        BroadcastInput {
            kind: payload.kind,
            code: payload.code,
            body: payload.body,
        },
        chrono::Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "message": outcome.message,
        "receivers": outcome.receiver_count,
        "pushes_attempted": outcome.pushes_attempted,
        "pushes_failed": outcome.pushes_failed,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UnregisterClientRequest {
    #[validate(length(min = 1))]
    pub device_token: String,
}

/// Remove a device token on logout
pub async fn unregister_client(
    State(state): State<AppState>,
    principal: RequireMember,
    Json(payload): Json<UnregisterClientRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;
    let user_id = principal.user_id()?;
    let mut conn = state.diesel_pool.get().await?;
    let removed = Client::unregister(&mut conn, user_id, &payload.device_token).await?;
    Ok(Json(json!({ "removed": removed > 0 })))
}
