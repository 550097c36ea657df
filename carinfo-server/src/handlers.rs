//! HTTP request handlers
//!
//! Every handler checks its syntactic input first (identifier format, JSON
//! body), then asks the authorizer, and only then touches the store. A
//! malformed request therefore gets a 400 without a policy query, and a
//! denied one gets a 403 without revealing whether the car exists.

use crate::api::{HealthResponse, HealthStatus};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{MatchedPath, Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use carinfo_core::{
    validate_car_payload, validate_identifier, validate_status_payload, Car, CarInfoError,
    DecisionInput, Status,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// Header carrying the caller identity. It is trusted as-is.
pub const USER_HEADER: &str = "user";

/// Caller identity from the `user` header, decoded as UTF-8
///
/// Invalid sequences become U+FFFD rather than dropping the whole header.
fn subject(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

fn parse_json(body: &Bytes) -> ApiResult<Value> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("request body is not valid JSON: {}", e)))
}

async fn authorize(
    state: &AppState,
    resource: &[&str],
    headers: &HeaderMap,
    action: &str,
) -> ApiResult<()> {
    let subject = subject(headers);
    let input = DecisionInput::new(resource, subject.as_deref(), action);
    let start = Instant::now();
    let allowed = state.authorizer.decide(&input).await;
    crate::metrics::record_decision(allowed, start.elapsed().as_secs_f64());

    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// GET /cars
pub async fn list_cars(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<BTreeMap<String, Car>>> {
    authorize(&state, &["cars"], &headers, "GET").await?;

    let cars = state.with_inventory("list_cars", |inv| inv.list_cars()).await?;
    Ok(Json(cars))
}

/// POST /cars
pub async fn create_car(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<String>> {
    let car = validate_car_payload(&parse_json(&body)?).map_err(CarInfoError::from)?;
    authorize(&state, &["cars"], &headers, "POST").await?;

    let id = state
        .with_inventory("create_car", move |inv| inv.create_car(car))
        .await?;
    Ok(Json(id))
}

/// GET /cars/:id
pub async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Car>> {
    authorize(&state, &["cars", id.as_str()], &headers, "GET").await?;

    let lookup = id.clone();
    state
        .with_inventory("get_car", move |inv| inv.get_car(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| CarInfoError::CarNotFound(id).into())
}

/// PUT /cars/:id
///
/// 201 when the car is new, 200 when it replaced an existing one.
pub async fn put_car(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    if !validate_identifier(&id) {
        return Err(CarInfoError::InvalidIdentifier(id).into());
    }
    let car = validate_car_payload(&parse_json(&body)?).map_err(CarInfoError::from)?;
    authorize(&state, &["cars", id.as_str()], &headers, "PUT").await?;

    let existed = state
        .with_inventory("upsert_car", move |inv| inv.upsert_car(&id, car))
        .await?;
    Ok(if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    })
}

/// DELETE /cars/:id
///
/// Always 200 once authorized, whether or not the car existed.
pub async fn delete_car(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    authorize(&state, &["cars", id.as_str()], &headers, "DELETE").await?;

    state
        .with_inventory("delete_car", move |inv| inv.delete_car(&id))
        .await?;
    Ok(StatusCode::OK)
}

/// GET /cars/:id/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Status>> {
    authorize(&state, &["cars", id.as_str(), "status"], &headers, "GET").await?;

    let status = state
        .with_inventory("get_status", move |inv| inv.get_status(&id))
        .await?;
    Ok(Json(status))
}

/// PUT /cars/:id/status
///
/// Always 200 on success, including when the status is new.
pub async fn put_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let status = validate_status_payload(&parse_json(&body)?).map_err(CarInfoError::from)?;
    authorize(&state, &["cars", id.as_str(), "status"], &headers, "PUT").await?;

    let existed = state
        .with_inventory("upsert_status", move |inv| inv.upsert_status(&id, status))
        .await?;
    debug!(existed, "status upserted");
    Ok(StatusCode::OK)
}

/// Health check - liveness probe
pub async fn health_live(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        policy_mode: state.authorizer.mode_name().to_string(),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics() -> String {
    crate::metrics::render()
}

/// Middleware counting requests by method, matched route and status
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    crate::metrics::record_request(&method, &route, response.status().as_u16());
    response
}
