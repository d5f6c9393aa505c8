pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::app::AppState;
use crate::services::email::EmailSender;
use crate::services::jwt::JwtService;
use crate::services::push::FcmClient;
use crate::services::stripe::StripeClient;

/// Boxed error for the startup path; `Send + Sync` so it crosses task
/// boundaries and absorbs the migration runner's errors
pub type BootError = Box<dyn std::error::Error + Send + Sync>;

/// Build the shared application state from configuration: database pool,
/// token service and the outbound clients
pub async fn initialize_app_state() -> Result<AppState, BootError> {
    let diesel_pool = db::create_pool().await?;

    let push = FcmClient::from_env().map_err(|e| format!("push client: {}", e))?;
    let email = EmailSender::from_env().map_err(|e| format!("email sender: {}", e))?;

    Ok(AppState {
        diesel_pool,
        jwt_service: Arc::new(JwtService::from_env()),
        push: Arc::new(push),
        stripe: Arc::new(StripeClient::from_env()),
        email: Arc::new(email),
    })
}
