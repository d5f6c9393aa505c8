// Bearer-token authentication middleware and per-route guards
// The middleware resolves the principal once per request; each handler names
// its access level with an extractor guard.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use crate::app::AppState;
use crate::middleware::auth::{AuthenticatedUser, Role, RoleSet};
use crate::models::user::User;
use crate::utils::api_error::ApiError;

fn bearer_token(parts_value: Option<&axum::http::HeaderValue>) -> Option<&str> {
    let raw = parts_value?.to_str().ok()?;
    raw.strip_prefix("Bearer ")
}

/// Resolve the Authorization header into an [`AuthenticatedUser`] extension.
///
/// Registered users are re-read from the database on every request so role
/// changes (admin activation, demotion) take effect without reissuing tokens.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers().get(AUTHORIZATION))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let claims = state
        .jwt_service
        .validate(&token)
        .map_err(|_| ApiError::Unauthorized)?;

    let principal = if claims.is_super_admin() {
        AuthenticatedUser::SuperAdmin
    } else {
        let user_id: i32 = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized)?;

        let mut conn = state.diesel_pool.get().await?;
        let user = User::find_by_id(&mut conn, user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let role = Role::parse(&user.role).ok_or(ApiError::Unauthorized)?;
        AuthenticatedUser::Registered {
            user_id: user.id,
            role,
        }
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn extract_principal(parts: &Parts) -> Result<AuthenticatedUser, ApiError> {
    parts
        .extensions
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(ApiError::Unauthorized)
}

fn guard(parts: &Parts, allowed: RoleSet) -> Result<AuthenticatedUser, ApiError> {
    let principal = extract_principal(parts)?;
    if allowed.allows(principal.role()) {
        Ok(principal)
    } else {
        Err(ApiError::Forbidden)
    }
}

macro_rules! role_guard {
    ($(#[$doc:meta])* $name:ident, $set:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(pub AuthenticatedUser);

        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
        {
            type Rejection = ApiError;

            async fn from_request_parts(
                parts: &mut Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                guard(parts, $set).map($name)
            }
        }
    };
}

role_guard!(
    /// Routes for subscribers only (billing, enquiries)
    RequireUser,
    RoleSet::USER_ONLY
);
role_guard!(
    /// Routes shared by users and admins (profile, messages, content)
    RequireMember,
    RoleSet::MEMBERS
);
role_guard!(
    /// Admin-only routes (broadcast, content management)
    RequireAdmin,
    RoleSet::ADMIN_ONLY
);
role_guard!(
    /// Operator routes (account administration)
    RequireSuperAdmin,
    RoleSet::SUPER_ADMIN_ONLY
);

impl RequireUser {
    /// Registered user id; user-only routes never see the super-admin
    pub fn user_id(&self) -> Result<i32, ApiError> {
        self.0.user_id().ok_or(ApiError::Forbidden)
    }
}

impl RequireMember {
    pub fn user_id(&self) -> Result<i32, ApiError> {
        self.0.user_id().ok_or(ApiError::Forbidden)
    }
}

impl RequireAdmin {
    pub fn user_id(&self) -> Result<i32, ApiError> {
        self.0.user_id().ok_or(ApiError::Forbidden)
    }
}
