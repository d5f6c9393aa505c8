// In-app content endpoints: news, ads, ad frequency

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::auth_middleware::{RequireAdmin, RequireMember};
use crate::models::content::{self, Ad, NewAd, NewNews, News};
use crate::utils::api_error::ApiError;

pub async fn list_news(
    State(state): State<AppState>,
    _principal: RequireMember,
) -> Result<Json<Vec<News>>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(News::list_all(&mut conn).await?))
}

/// The five most recent news posts, shown on the app home screen
pub async fn list_latest_news(
    State(state): State<AppState>,
    _principal: RequireMember,
) -> Result<Json<Vec<News>>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(News::list_latest(&mut conn, 5).await?))
}

pub async fn create_news(
    State(state): State<AppState>,
    _principal: RequireAdmin,
    Json(payload): Json<NewNews>,
) -> Result<Json<News>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(News::create(&mut conn, &payload).await?))
}

pub async fn delete_news(
    State(state): State<AppState>,
    _principal: RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    let removed = News::delete(&mut conn, id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound("News item not found".to_string()));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn list_ads(
    State(state): State<AppState>,
    _principal: RequireMember,
) -> Result<Json<Vec<Ad>>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(Ad::list_all(&mut conn).await?))
}

pub async fn create_ad(
    State(state): State<AppState>,
    _principal: RequireAdmin,
    Json(payload): Json<NewAd>,
) -> Result<Json<Ad>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    Ok(Json(Ad::create(&mut conn, &payload).await?))
}

pub async fn delete_ad(
    State(state): State<AppState>,
    _principal: RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    let removed = Ad::delete(&mut conn, id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound("Ad not found".to_string()));
    }
    Ok(Json(json!({ "deleted": true })))
}

pub async fn get_frequency(
    State(state): State<AppState>,
    _principal: RequireMember,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.diesel_pool.get().await?;
    let frequency = content::get_ad_frequency(&mut conn).await?;
    Ok(Json(json!({ "frequency": frequency })))
}

#[derive(Debug, Deserialize)]
pub struct SetFrequencyRequest {
    pub frequency: i32,
}

pub async fn set_frequency(
    State(state): State<AppState>,
    _principal: RequireAdmin,
    Json(payload): Json<SetFrequencyRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.frequency < 1 {
        return Err(ApiError::bad_request("Frequency must be at least 1"));
    }
    let mut conn = state.diesel_pool.get().await?;
    content::set_ad_frequency(&mut conn, payload.frequency).await?;
    Ok(Json(json!({ "frequency": payload.frequency })))
}
