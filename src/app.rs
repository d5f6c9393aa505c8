// Application state and router assembly

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::DieselPool;
use crate::handlers;
use crate::middleware::auth_middleware::auth_middleware;
use crate::services::email::EmailSender;
use crate::services::jwt::JwtService;
use crate::services::push::PushSender;
use crate::services::stripe::StripeClient;

#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub jwt_service: Arc<JwtService>,
    pub push: Arc<dyn PushSender>,
    pub stripe: Arc<StripeClient>,
    pub email: Arc<EmailSender>,
}

/// Assemble the full application router.
///
/// Everything under /api except the auth endpoints, the public plan listing
/// and the Stripe webhook sits behind the bearer-token middleware; role
/// enforcement happens per handler through extractor guards.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/register", post(handlers::auth::register))
        .route(
            "/api/auth/register-admin",
            post(handlers::auth::register_admin),
        )
        .route("/api/auth/otp", post(handlers::auth::send_otp))
        .route(
            "/api/auth/reset-password",
            post(handlers::auth::reset_password),
        )
        .route("/api/plans", get(handlers::billing::list_plans))
        .route("/api/webhook", post(handlers::webhook::stripe_webhook));

    let protected = Router::new()
        // Shared by users and admins
        .route("/api/me", get(handlers::profile::me))
        .route("/api/profile", put(handlers::profile::update_profile))
        .route("/api/language", put(handlers::profile::set_language))
        .route("/api/password", put(handlers::auth::change_password))
        .route("/api/messages", get(handlers::messages::list_messages))
        .route(
            "/api/messages/latest",
            get(handlers::messages::list_latest_messages),
        )
        .route("/api/clients", delete(handlers::messages::unregister_client))
        .route("/api/news", get(handlers::content::list_news))
        .route("/api/news/latest", get(handlers::content::list_latest_news))
        .route("/api/ads", get(handlers::content::list_ads))
        .route("/api/ads/frequency", get(handlers::content::get_frequency))
        // Subscribers
        .route("/api/enquiries", post(handlers::enquiry::create_enquiry))
        .route("/api/enquiries", get(handlers::enquiry::list_own_enquiries))
        .route("/api/billing/checkout", post(handlers::billing::checkout))
        .route("/api/billing/portal", post(handlers::billing::portal))
        .route("/api/billing/orders", get(handlers::billing::list_orders))
        // Admins
        .route("/api/messages", post(handlers::messages::broadcast_message))
        .route("/api/news", post(handlers::content::create_news))
        .route("/api/news/{id}", delete(handlers::content::delete_news))
        .route("/api/ads", post(handlers::content::create_ad))
        .route("/api/ads/{id}", delete(handlers::content::delete_ad))
        .route("/api/ads/frequency", put(handlers::content::set_frequency))
        .route(
            "/api/enquiries/all",
            get(handlers::enquiry::list_all_enquiries),
        )
        .route(
            "/api/enquiries/{id}/resolve",
            put(handlers::enquiry::resolve_enquiry),
        )
        // Operator
        .route("/api/admin/admins", get(handlers::admin::list_admins))
        .route(
            "/api/admin/admins/{id}/role",
            put(handlers::admin::set_admin_role),
        )
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route(
            "/api/admin/coverage",
            put(handlers::admin::override_coverage),
        )
        .route("/api/admin/plans/sync", post(handlers::admin::sync_plans))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    use axum::http::{HeaderValue, Method};
    use tower_http::cors::AllowOrigin;

    let config = crate::app_config::config();
    let origin = if config.cors_allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
}
