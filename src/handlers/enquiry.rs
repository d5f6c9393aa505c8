// Support enquiry endpoints
// Creation confirms to the user and alerts the operations inbox; both emails
// are best-effort and never fail the request once the row is written.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::app::AppState;
use crate::middleware::auth_middleware::{RequireAdmin, RequireUser};
use crate::models::enquiry::{Enquiry, NewEnquiry};
use crate::models::user::User;
use crate::utils::api_error::ApiError;
use crate::utils::time::now_epoch_ms;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEnquiryRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub message: String,
}

pub async fn create_enquiry(
    State(state): State<AppState>,
    principal: RequireUser,
    Json(payload): Json<CreateEnquiryRequest>,
) -> Result<Json<Enquiry>, ApiError> {
    payload.validate()?;
    let user_id = principal.user_id()?;

    let mut conn = state.diesel_pool.get().await?;
    let enquiry = NewEnquiry {
        user_id,
        name: &payload.name,
        email: &payload.email,
        message: &payload.message,
    }
    .insert(&mut conn)
    .await?;
    drop(conn);

    if let Err(e) = state
        .email
        .send_enquiry_received(&enquiry.email, &enquiry.name, &enquiry.message)
        .await
    {
        tracing::warn!(enquiry_id = enquiry.id, error = %e, "confirmation email failed");
    }
    if let Err(e) = state
        .email
        .send_enquiry_alert(enquiry.id, &enquiry.name, &enquiry.email, &enquiry.message)
        .await
    {
        tracing::warn!(enquiry_id = enquiry.id, error = %e, "alert email failed");
    }

    Ok(Json(enquiry))
}

pub async fn list_own_enquiries(
    State(state): State<AppState>,
    principal: RequireUser,
) -> Result<Json<Vec<Enquiry>>, ApiError> {
    let user_id = principal.user_id()?;
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(Enquiry::list_for_user(&mut conn, user_id).await?))
}

pub async fn list_all_enquiries(
    State(state): State<AppState>,
    _principal: RequireAdmin,
) -> Result<Json<Vec<Enquiry>>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(Enquiry::list_all(&mut conn).await?))
}

pub async fn resolve_enquiry(
    State(state): State<AppState>,
    _principal: RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;

    let enquiry = Enquiry::find(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Enquiry not found".to_string()))?;

    let resolved = Enquiry::mark_resolved(&mut conn, enquiry.id, now_epoch_ms()).await?;

    // Tell the user their enquiry was handled; look up their preferred address
    let recipient = User::find_by_id(&mut conn, resolved.user_id)
        .await?
        .map(|u| u.email)
        .unwrap_or_else(|| resolved.email.clone());
    drop(conn);

    if let Err(e) = state
        .email
        .send_enquiry_resolved(&recipient, &resolved.name, &resolved.message)
        .await
    {
        tracing::warn!(enquiry_id = resolved.id, error = %e, "resolution email failed");
    }

    Ok(Json(json!({ "enquiry": resolved })))
}
