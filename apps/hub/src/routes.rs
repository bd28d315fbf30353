use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use model::{validate_batch, ProcessedReadingPayload, StoredRecord};

use crate::{error::ApiError, state::AppState, ws::ws_handler};

pub const RECORDS_PATH: &str = "/processed-agent-data";
/// Path used by older clients; also served with a trailing slash.
pub const LEGACY_RECORDS_PATH: &str = "/processed_agent_data";

#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
    pub ids: Vec<i64>,
}

pub fn router(state: AppState) -> Router {
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/", get(ws_handler));
    let app = record_routes(app, RECORDS_PATH);
    let app = record_routes(app, LEGACY_RECORDS_PATH).route(
        &format!("{LEGACY_RECORDS_PATH}/"),
        get(list_records).post(create_records),
    );
    app.layer(TraceLayer::new_for_http()).with_state(state)
}

fn record_routes(app: Router<AppState>, base: &str) -> Router<AppState> {
    app.route(base, get(list_records).post(create_records)).route(
        &format!("{base}/{{id}}"),
        get(get_record).put(update_record).delete(delete_record),
    )
}

async fn create_records(
    State(state): State<AppState>,
    payload: Result<Json<Vec<ProcessedReadingPayload>>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Json(items) = payload?;
    let readings = validate_batch(items)?;
    let records = state.store.create_batch(readings).await?;
    info!(rows = records.len(), "batch stored");

    if state.broadcast_inserts && !records.is_empty() {
        match state.subscriptions.broadcast(&records).await {
            Ok(r) => debug!(delivered = r.delivered, failed = r.failed, "inserts pushed"),
            Err(e) => warn!(error = %e, "could not push inserts"),
        }
    }

    Ok(Json(Ack {
        message: "Data processed and inserted into the database successfully".into(),
        ids: records.iter().map(|r| r.id).collect(),
    }))
}

async fn get_record(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<StoredRecord>, ApiError> {
    Ok(Json(state.store.get_by_id(id).await?))
}

async fn list_records(State(state): State<AppState>) -> Result<Json<Vec<StoredRecord>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ProcessedReadingPayload>, JsonRejection>,
) -> Result<Json<StoredRecord>, ApiError> {
    let Json(item) = payload?;
    let reading = item.validate()?;
    let rec = state.store.update_by_id(id, reading).await?;
    info!(id, "record updated");
    Ok(Json(rec))
}

async fn delete_record(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<StoredRecord>, ApiError> {
    let rec = state.store.delete_by_id(id).await?;
    info!(id, "record deleted");
    Ok(Json(rec))
}
