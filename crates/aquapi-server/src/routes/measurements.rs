use aquapi_core::error::AquapiError;
use aquapi_core::store::MeasurementStore;
use aquapi_core::types::{parse_id, Measurement};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// POST /measurements: append a sensor reading. A missing `timestamp` is
/// stamped with the server's clock.
pub async fn create_measurement(
    State(app): State<AppState>,
    payload: Result<Json<Measurement>, JsonRejection>,
) -> Result<(StatusCode, Json<Measurement>), AppError> {
    let Json(body) = payload?;
    let store = app.store.clone();
    let stored = blocking(move || {
        store.append(&body)?;
        Ok(body)
    })
    .await?;

    tracing::debug!(
        sensor_id = stored.sensor_id,
        value = stored.value,
        "measurement recorded"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /sensors/{sensor_id}/measurements/last: newest reading of a sensor.
pub async fn get_last(
    State(app): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Measurement>, AppError> {
    let sensor_id = parse_id(&raw_id)?;
    let store = app.store.clone();
    let last = blocking(move || {
        store
            .get_last(sensor_id)?
            .ok_or(AquapiError::MeasurementNotFound(sensor_id))
    })
    .await?;
    Ok(Json(last))
}
