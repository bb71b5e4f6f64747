use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, instrument};

use super::{
    dto::{
        CheckInRequest, CheckInResponse, LogNutritionRequest, LogNutritionResponse,
        LogWaterRequest, LogWaterResponse,
    },
    services::{self, ServiceError},
};
use crate::{
    auth::jwt::AuthUser,
    day::parse_day_key,
    model::{check_in_error, quantity_error, water_amount_error, DailyAggregate, InventoryItem},
    state::AppState,
};

type Rejection = (StatusCode, String);

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/water", post(log_water))
        .route("/nutrition", post(log_nutrition))
        .route("/check-in", put(check_in))
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/days/:date", get(get_day))
        .route("/inventory", get(list_inventory))
}

#[instrument(skip(state))]
pub async fn log_water(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<LogWaterRequest>,
) -> Result<Json<LogWaterResponse>, Rejection> {
    if let Some(msg) = water_amount_error(body.amount_ml) {
        return Err(bad_request(msg));
    }
    let total = services::log_water(&state, user_id, body.amount_ml)
        .await
        .map_err(reject)?;
    Ok(Json(LogWaterResponse {
        success: true,
        updated_water_total: total,
    }))
}

#[instrument(skip(state))]
pub async fn log_nutrition(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<LogNutritionRequest>,
) -> Result<Json<LogNutritionResponse>, Rejection> {
    if body.item_id.trim().is_empty() {
        return Err(bad_request("itemId is required"));
    }
    if let Some(msg) = quantity_error(body.quantity) {
        return Err(bad_request(msg));
    }
    let totals = services::log_nutrition(&state, user_id, &body.item_id, body.quantity)
        .await
        .map_err(reject)?;
    Ok(Json(LogNutritionResponse {
        success: true,
        daily_totals: totals,
    }))
}

#[instrument(skip(state))]
pub async fn check_in(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, Rejection> {
    if body.weight.is_none() && body.sleep_hours.is_none() && body.bloated.is_none() {
        return Err(bad_request("check-in needs at least one field"));
    }
    if let Some(msg) = check_in_error(body.weight, body.sleep_hours) {
        return Err(bad_request(msg));
    }
    let reply = services::check_in(&state, user_id, &body)
        .await
        .map_err(reject)?;
    Ok(Json(reply))
}

#[instrument(skip(state))]
pub async fn get_day(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> Result<Json<DailyAggregate>, Rejection> {
    if parse_day_key(&date).is_err() {
        return Err(bad_request(format!("invalid date: {date}")));
    }
    let day = services::get_day(&state, user_id, &date)
        .await
        .map_err(reject)?;
    Ok(Json(day))
}

#[instrument(skip(state))]
pub async fn list_inventory(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<InventoryItem>>, Rejection> {
    let items = services::list_inventory(&state).await.map_err(reject)?;
    Ok(Json(items))
}

fn bad_request(msg: impl Into<String>) -> Rejection {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn reject(e: ServiceError) -> Rejection {
    match e {
        ServiceError::Invalid(_) | ServiceError::Inactive(_) => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        ServiceError::Db(err) => {
            error!(error = ?err, "tracking request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
        }
    }
}
