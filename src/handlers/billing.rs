// Billing endpoints: plan listing, checkout, customer portal, order history
// The Stripe customer is created lazily the first time an account reaches a
// billing flow and remembered on the user row.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::app::AppState;
use crate::app_config::config;
use crate::middleware::auth_middleware::RequireUser;
use crate::models::plan::Plan;
use crate::models::user::User;
use crate::utils::api_error::ApiError;

/// Public plan catalog
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(Plan::list_all(&mut conn).await?))
}

async fn ensure_stripe_customer(state: &AppState, user: &User) -> Result<String, ApiError> {
    if let Some(customer_id) = &user.stripe_customer_id {
        return Ok(customer_id.clone());
    }

    let name = match (&user.first_name, &user.last_name) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (Some(first), None) => Some(first.clone()),
        _ => None,
    };
    let customer = state
        .stripe
        .create_customer(&user.email, name.as_deref())
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let mut conn = state.diesel_pool.get().await?;
    User::set_stripe_customer(&mut conn, user.id, &customer.id).await?;

    tracing::info!(user_id = user.id, "stripe customer created");
    Ok(customer.id)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1))]
    pub price_id: String,
}

pub async fn checkout(
    State(state): State<AppState>,
    principal: RequireUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;
    let user_id = principal.user_id()?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Only known catalog prices are purchasable
    if Plan::find_by_price_id(&mut conn, &payload.price_id)
        .await?
        .is_none()
    {
        return Err(ApiError::bad_request("Unknown price"));
    }
    drop(conn);

    let customer_id = ensure_stripe_customer(&state, &user).await?;

    let redirect = &config().stripe.checkout_redirect_url;
    let session = state
        .stripe
        .create_checkout_session(&customer_id, &payload.price_id, redirect, redirect)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({ "url": session.url, "session_id": session.id })))
}

#[derive(Debug, Deserialize)]
pub struct PortalRequest {
    pub return_url: Option<String>,
}

pub async fn portal(
    State(state): State<AppState>,
    principal: RequireUser,
    Json(payload): Json<PortalRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = principal.user_id()?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    drop(conn);

    let customer_id = ensure_stripe_customer(&state, &user).await?;

    let stripe_config = &config().stripe;
    let return_url = payload
        .return_url
        .unwrap_or_else(|| stripe_config.checkout_redirect_url.clone());

    let session = state
        .stripe
        .create_portal_session(
            &customer_id,
            stripe_config.portal_configuration_id.as_deref(),
            &return_url,
        )
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({ "url": session.url })))
}

/// Invoice history for the signed-in account, straight from Stripe
pub async fn list_orders(
    State(state): State<AppState>,
    principal: RequireUser,
) -> Result<Json<Value>, ApiError> {
    let user_id = principal.user_id()?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    drop(conn);

    let Some(customer_id) = &user.stripe_customer_id else {
        // Never purchased anything
        return Ok(Json(json!({ "orders": [] })));
    };

    let invoices = state
        .stripe
        .list_invoices(customer_id)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let orders: Vec<Value> = invoices
        .into_iter()
        .map(|invoice| {
            json!({
                "id": invoice.id,
                "subscription": invoice.subscription,
                "status": invoice.status,
                "total": invoice.total,
                "currency": invoice.currency,
                "created": invoice.created,
                "url": invoice.hosted_invoice_url,
            })
        })
        .collect();

    Ok(Json(json!({ "orders": orders })))
}
