// Profile endpoints

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::app::AppState;
use crate::middleware::auth_middleware::RequireMember;
use crate::models::content::News;
use crate::models::plan::Plan;
use crate::models::user::{User, UserProfileUpdate};
use crate::models::user_log::UserLog;
use crate::utils::api_error::ApiError;

/// The signed-in account with its subscription state, the plan catalog and
/// the latest news; the same bundle login returns
pub async fn me(
    State(state): State<AppState>,
    principal: RequireMember,
) -> Result<Json<Value>, ApiError> {
    let user_id = principal.user_id()?;
    let mut conn = state.diesel_pool.get().await?;

    let user = User::find_by_id(&mut conn, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let subscription = UserLog::find_by_user(&mut conn, user_id).await?;
    let plans = Plan::list_all(&mut conn).await?;
    let news = News::list_latest(&mut conn, 5).await?;

    Ok(Json(json!({
        "user": user,
        "subscription": subscription,
        "plans": plans,
        "news": news,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    principal: RequireMember,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;
    let user_id = principal.user_id()?;

    let update = UserProfileUpdate {
        first_name: payload.first_name,
        last_name: payload.last_name,
        dob: payload.dob,
        phone: payload.phone,
        country: payload.country,
        state: payload.state,
        city: payload.city,
    };
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let mut conn = state.diesel_pool.get().await?;
    let user = update.apply(&mut conn, user_id).await?;
    drop(conn);

    // Keep the Stripe customer's display name in sync; billing still works if
    // this fails, so a failure only gets logged
    if let Some(customer_id) = &user.stripe_customer_id {
        let name = full_name(&user);
        if let Err(e) = state
            .stripe
            .update_customer(customer_id, None, name.as_deref())
            .await
        {
            tracing::warn!(user_id, error = %e, "stripe customer update failed");
        }
    }

    Ok(Json(json!({ "user": user })))
}

fn full_name(user: &User) -> Option<String> {
    match (&user.first_name, &user.last_name) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (Some(first), None) => Some(first.clone()),
        (None, Some(last)) => Some(last.clone()),
        (None, None) => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct SetLanguageRequest {
    pub is_japanese: bool,
}

pub async fn set_language(
    State(state): State<AppState>,
    principal: RequireMember,
    Json(payload): Json<SetLanguageRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = principal.user_id()?;
    let mut conn = state.diesel_pool.get().await?;
    User::set_language(&mut conn, user_id, payload.is_japanese).await?;
    Ok(Json(json!({ "updated": true })))
}
