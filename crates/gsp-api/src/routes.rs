//! Route handlers: a thin boundary translating HTTP calls into
//! `Orchestrator`/`Store` calls (spec.md §4.7, surface in §6).

use std::str::FromStr;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use gsp_core::{Batch, BatchId, OrderId, OrderStatus};
use gsp_store::{NewOrder, NewProduct};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/batches/upload", post(upload_batch))
        .route("/batches", post(create_batch).get(list_batches))
        .route("/batches/{id}", get(get_batch))
        .route("/batches/{id}/stats", get(get_batch_stats))
        .route("/batches/{id}/orders", get(get_batch_orders))
        .route("/batches/{id}/start", post(start_batch))
        .route("/batches/{id}/pause", post(pause_batch))
        .route("/batches/{id}/cancel", post(cancel_batch))
        .route("/batches/{id}/retry", post(retry_batch))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/retry", post(retry_order))
        .route("/orders/{id}/logs", get(get_order_logs))
        .route("/screenshots/{filename}", get(get_screenshot))
        .route("/stats", get(system_stats))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct NewProductRequest {
    product_code: String,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct NewOrderRequest {
    consultora_code: String,
    #[serde(default)]
    consultora_name: Option<String>,
    #[serde(default = "default_max_retries")]
    max_retries: i32,
    products: Vec<NewProductRequest>,
}

fn default_max_retries() -> i32 {
    3
}

impl From<NewOrderRequest> for NewOrder {
    fn from(req: NewOrderRequest) -> Self {
        NewOrder {
            consultora_code: req.consultora_code,
            consultora_name: req.consultora_name,
            max_retries: req.max_retries,
            products: req
                .products
                .into_iter()
                .map(|p| NewProduct {
                    product_code: p.product_code,
                    quantity: p.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateBatchRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    orders: Vec<NewOrderRequest>,
}

async fn create_batch(
    State(state): State<AppState>,
    Json(req): Json<CreateBatchRequest>,
) -> ApiResult<Json<Batch>> {
    let orders = req.orders.into_iter().map(NewOrder::from).collect();
    let batch_id = state
        .store
        .create_batch(&req.name, req.description.as_deref(), None, orders)
        .await?;
    gsp_telemetry::Metrics::batch_created("api");
    let batch = state
        .store
        .get_batch(batch_id)
        .await?
        .ok_or(ApiError::BatchNotFound(batch_id))?;
    Ok(Json(batch))
}

async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Batch>> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut source_file: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                source_file = field.file_name().map(str::to_string);
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?
                        .to_vec(),
                );
            }
            "name" => {
                name = Some(field.text().await.map_err(|e| ApiError::Validation(e.to_string()))?)
            }
            "description" => {
                description =
                    Some(field.text().await.map_err(|e| ApiError::Validation(e.to_string()))?)
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::Validation("missing `file` field".into()))?;
    let name = name.unwrap_or_else(|| "uploaded batch".to_string());
    let orders = crate::loader::parse_orders_csv(&bytes)?;
    if orders.is_empty() {
        return Err(ApiError::Validation("upload contained no orders".into()));
    }

    let batch_id = state
        .store
        .create_batch(&name, description.as_deref(), source_file.as_deref(), orders)
        .await?;
    gsp_telemetry::Metrics::batch_created("upload");
    let batch = state
        .store
        .get_batch(batch_id)
        .await?
        .ok_or(ApiError::BatchNotFound(batch_id))?;
    Ok(Json(batch))
}

async fn list_batches(State(state): State<AppState>) -> ApiResult<Json<Vec<Batch>>> {
    Ok(Json(state.store.list_batches().await?))
}

async fn get_batch(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Batch>> {
    let batch_id = BatchId::new(id);
    let batch = state
        .store
        .get_batch(batch_id)
        .await?
        .ok_or(ApiError::BatchNotFound(batch_id))?;
    Ok(Json(batch))
}

async fn get_batch_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<gsp_core::BatchStats>> {
    Ok(Json(state.orchestrator.batch_stats(BatchId::new(id)).await?))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

async fn get_batch_orders(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Vec<gsp_core::Order>>> {
    let status_filter = query
        .status
        .as_deref()
        .map(OrderStatus::from_str)
        .transpose()
        .map_err(|_| ApiError::Validation("invalid status filter".into()))?;
    Ok(Json(
        state.store.get_batch_orders(BatchId::new(id), status_filter).await?,
    ))
}

async fn start_batch(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.orchestrator.start_batch(BatchId::new(id)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn pause_batch(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.orchestrator.pause_batch(BatchId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_batch(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.orchestrator.cancel_batch(BatchId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn retry_batch(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.orchestrator.retry_batch_failures(BatchId::new(id)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn get_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<gsp_core::Order>> {
    let order_id = OrderId::new(id);
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or(ApiError::OrderNotFound(order_id))?;
    Ok(Json(order))
}

async fn retry_order(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.orchestrator.retry_single_order(OrderId::new(id)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn get_order_logs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<gsp_core::OrderLog>>> {
    Ok(Json(state.store.get_order_logs(OrderId::new(id)).await?))
}

async fn get_screenshot(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if filename.contains('/') || filename.contains("..") {
        return Err(ApiError::Validation("invalid screenshot filename".into()));
    }
    let path = std::path::Path::new(&state.config.screenshot_dir).join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::ScreenshotNotFound(filename))?;
    Ok((
        [(header::CONTENT_TYPE, "image/png")],
        bytes,
    )
        .into_response())
}

async fn system_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<gsp_orchestrator::SystemStats>> {
    Ok(Json(state.orchestrator.system_stats().await?))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics() -> ApiResult<Response> {
    let body = gsp_telemetry::gather_text()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
