// Operator endpoints: account administration, coverage overrides, catalog sync

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::app::AppState;
use crate::middleware::auth::Role;
use crate::middleware::auth_middleware::RequireSuperAdmin;
use crate::models::user::User;
use crate::models::user_log::{UserLog, UserLogUpdate};
use crate::services::catalog::sync_plan_catalog;
use crate::utils::api_error::ApiError;

/// Admin accounts, active and pending
pub async fn list_admins(
    State(state): State<AppState>,
    _principal: RequireSuperAdmin,
) -> Result<Json<Vec<User>>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    let admins = User::list_by_roles(&mut conn, &[Role::Admin, Role::PendingAdmin]).await?;
    Ok(Json(admins))
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRoleRequest {
    /// true activates a pending admin, false demotes back to pending
    pub active: bool,
}

pub async fn set_admin_role(
    State(state): State<AppState>,
    _principal: RequireSuperAdmin,
    Path(id): Path<i32>,
    Json(payload): Json<SetAdminRoleRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;

    let user = User::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

    match user.role() {
        Some(Role::Admin) | Some(Role::PendingAdmin) => {},
        _ => return Err(ApiError::bad_request("Account is not an admin")),
    }

    let role = if payload.active {
        Role::Admin
    } else {
        Role::PendingAdmin
    };
    User::set_role(&mut conn, user.id, role).await?;

    tracing::info!(user_id = user.id, role = role.as_str(), "admin role changed");

    Ok(Json(json!({ "id": user.id, "role": role })))
}

pub async fn list_users(
    State(state): State<AppState>,
    _principal: RequireSuperAdmin,
) -> Result<Json<Vec<User>>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    let users = User::list_by_roles(&mut conn, &[Role::User]).await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CoverageOverrideRequest {
    #[validate(email)]
    pub email: String,
    /// Epoch milliseconds
    pub start_date: i64,
    pub end_date: i64,
}

/// Manually grant or adjust a coverage interval, bypassing billing
pub async fn override_coverage(
    State(state): State<AppState>,
    _principal: RequireSuperAdmin,
    Json(payload): Json<CoverageOverrideRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;
    if payload.end_date < payload.start_date {
        return Err(ApiError::bad_request("end_date precedes start_date"));
    }

    let mut conn = state.diesel_pool.get().await?;

    let user = User::find_by_email(&mut conn, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

    UserLog::create_empty(&mut conn, user.id).await?;
    UserLogUpdate {
        payment_id: None,
        subscription_id: None,
        start_date: Some(payload.start_date),
        end_date: Some(payload.end_date),
        plan: None,
    }
    .apply(&mut conn, user.id)
    .await?;

    let subscription = UserLog::find_by_user(&mut conn, user.id).await?;

    tracing::info!(user_id = user.id, "coverage override applied");

    Ok(Json(json!({ "subscription": subscription })))
}

/// Re-mirror the plan catalog from Stripe
pub async fn sync_plans(
    State(state): State<AppState>,
    _principal: RequireSuperAdmin,
) -> Result<Json<Value>, ApiError> {
    let count = sync_plan_catalog(&state.diesel_pool, &state.stripe).await?;
    Ok(Json(json!({ "plans": count })))
}
