// Authentication endpoints: login, registration, OTP and password management

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::app::AppState;
use crate::app_config::config;
use crate::middleware::auth::Role;
use crate::middleware::auth_middleware::RequireMember;
use crate::models::client::Client;
use crate::models::content::News;
use crate::models::plan::Plan;
use crate::models::user::{NewUser, User};
use crate::models::user_log::UserLog;
use crate::utils::api_error::ApiError;
use crate::utils::otp::{generate_otp, otp_digest};
use crate::utils::password::{hash_password, verify_password};

/// Client-facing validation codes kept stable for the mobile apps
pub const CODE_EMAIL_EXISTS: u32 = 1001;
pub const CODE_BAD_CREDENTIALS: u32 = 1002;
pub const CODE_AWAITING_APPROVAL: u32 = 1003;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    /// Optional push registration performed atomically with login
    pub device_token: Option<String>,
    pub platform: Option<String>,
}

/// Everything the app needs to render its home screen after login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub user: Option<User>,
    pub subscription: Option<UserLog>,
    pub plans: Vec<Plan>,
    pub news: Vec<News>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate()?;

    // The super-admin is defined by configuration, not by a user row, and is
    // checked before any database lookup
    let super_admin = &config().super_admin;
    if payload.email == super_admin.email {
        if verify_password(&payload.password, &super_admin.password_hash)? {
            let token = state
                .jwt_service
                .issue_super_admin()
                .map_err(|_| ApiError::Internal)?;
            return Ok(Json(LoginResponse {
                token,
                role: Role::SuperAdmin,
                user: None,
                subscription: None,
                plans: Vec::new(),
                news: Vec::new(),
            }));
        }
        return Err(ApiError::validation(CODE_BAD_CREDENTIALS, "Invalid credentials"));
    }

    let mut conn = state.diesel_pool.get().await?;

    let user = User::find_by_email(&mut conn, &payload.email)
        .await?
        .ok_or_else(|| ApiError::validation(CODE_BAD_CREDENTIALS, "Invalid credentials"))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(ApiError::validation(CODE_BAD_CREDENTIALS, "Invalid credentials"));
    }

    let role = user.role().ok_or(ApiError::Internal)?;
    if role == Role::PendingAdmin {
        return Err(ApiError::validation(
            CODE_AWAITING_APPROVAL,
            "Account awaiting approval",
        ));
    }

    if let (Some(token), Some(platform)) = (&payload.device_token, &payload.platform) {
        Client::register(&mut conn, user.id, token, platform).await?;
    }

    let subscription = UserLog::find_by_user(&mut conn, user.id).await?;
    let plans = Plan::list_all(&mut conn).await?;
    let news = News::list_latest(&mut conn, 5).await?;

    let token = state
        .jwt_service
        .issue_for_user(user.id, role)
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(user_id = user.id, role = role.as_str(), "login");

    Ok(Json(LoginResponse {
        token,
        role,
        user: Some(user),
        subscription,
        plans,
        news,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    #[serde(default = "default_is_japanese")]
    pub is_japanese: bool,
    pub device_token: Option<String>,
    pub platform: Option<String>,
}

fn default_is_japanese() -> bool {
    true
}

async fn register_with_role(
    state: &AppState,
    payload: RegisterRequest,
    role: Role,
) -> Result<(User, Option<String>), ApiError> {
    payload.validate()?;

    let mut conn = state.diesel_pool.get().await?;

    if User::find_by_email(&mut conn, &payload.email).await?.is_some() {
        return Err(ApiError::validation(CODE_EMAIL_EXISTS, "Email already registered"));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = NewUser {
        first_name: payload.first_name.as_deref(),
        last_name: payload.last_name.as_deref(),
        dob: payload.dob,
        phone: payload.phone.as_deref(),
        email: &payload.email,
        country: payload.country.as_deref(),
        state: payload.state.as_deref(),
        city: payload.city.as_deref(),
        password_hash: &password_hash,
        role: role.as_str(),
        is_japanese: payload.is_japanese,
    }
    .insert(&mut conn)
    .await?;

    UserLog::create_empty(&mut conn, user.id).await?;

    // Pending admins get no session until activated
    let token = if role == Role::PendingAdmin {
        None
    } else {
        if let (Some(device), Some(platform)) = (&payload.device_token, &payload.platform) {
            Client::register(&mut conn, user.id, device, platform).await?;
        }
        Some(
            state
                .jwt_service
                .issue_for_user(user.id, role)
                .map_err(|_| ApiError::Internal)?,
        )
    };

    tracing::info!(user_id = user.id, role = role.as_str(), "account registered");

    Ok((user, token))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let (user, token) = register_with_role(&state, payload, Role::User).await?;
    Ok(Json(json!({
        "token": token,
        "user": user,
    })))
}

/// Admin self-registration lands in the pending state until the operator
/// activates the account
pub async fn register_admin(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let (user, _) = register_with_role(&state, payload, Role::PendingAdmin).await?;
    Ok(Json(json!({
        "user": user,
        "message": "Registration received, awaiting approval",
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email)]
    pub email: String,
}

/// Email a one-time code and return its digest; the client proves possession
/// by recomputing the digest from the code the user types in
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;

    let mut conn = state.diesel_pool.get().await?;
    let name = User::find_by_email(&mut conn, &payload.email)
        .await?
        .and_then(|u| u.first_name)
        .unwrap_or_else(|| "there".to_string());
    drop(conn);

    let otp = generate_otp();
    let digest = otp_digest(&otp, &payload.email);

    state
        .email
        .send_otp(&payload.email, &name, &otp)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({ "digest": digest })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Final step of the forgot-password flow, after the client has verified the
/// emailed code against its digest
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_email(&mut conn, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

    let password_hash = hash_password(&payload.password)?;
    User::set_password_hash(&mut conn, user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "password reset");

    Ok(Json(json!({ "updated": true })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    principal: RequireMember,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;
    if payload.new_password == payload.current_password {
        return Err(ApiError::bad_request(
            "New password must differ from the current one",
        ));
    }
    let user_id = principal.user_id()?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(ApiError::validation(
            CODE_BAD_CREDENTIALS,
            "Current password is incorrect",
        ));
    }

    let password_hash = hash_password(&payload.new_password)?;
    User::set_password_hash(&mut conn, user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "password changed");

    Ok(Json(json!({ "updated": true })))
}
