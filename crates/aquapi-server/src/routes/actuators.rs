use aquapi_core::decision::{decide, ActivationDecision};
use aquapi_core::error::AquapiError;
use aquapi_core::store::ActuatorRegistry;
use aquapi_core::types::{parse_id, ActuatorConfig};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// GET /actuators/{actuator_id}/state: current activation decision.
///
/// The config and the sensor's latest reading are read as one snapshot, then
/// handed to the decision engine with the server's clock.
pub async fn get_state(
    State(app): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ActivationDecision>, AppError> {
    let actuator_id = parse_id(&raw_id)?;
    let store = app.store.clone();
    let decision = blocking(move || {
        let (config, last) = store
            .decision_snapshot(actuator_id)?
            .ok_or(AquapiError::ActuatorNotFound(actuator_id))?;
        Ok(decide(&config, last.as_ref(), Utc::now()))
    })
    .await?;

    tracing::debug!(
        actuator_id,
        activate = decision.activate,
        status = %decision.status,
        "served decision"
    );
    Ok(Json(decision))
}

/// PATCH /actuators/{actuator_id}/last_activated: record a completed
/// activation. Called by the execution loop after the output is back off.
pub async fn update_last_activated(
    State(app): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ActuatorConfig>, AppError> {
    let actuator_id = parse_id(&raw_id)?;
    let store = app.store.clone();
    let updated = blocking(move || store.update_last_activated(actuator_id, Utc::now())).await?;

    tracing::info!(
        actuator_id,
        last_activated = %updated.last_activated,
        "activation recorded"
    );
    Ok(Json(updated))
}

/// GET /actuators/{actuator_id}: the stored actuator record.
pub async fn get_actuator(
    State(app): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ActuatorConfig>, AppError> {
    let actuator_id = parse_id(&raw_id)?;
    let store = app.store.clone();
    let actuator = blocking(move || {
        store
            .get(actuator_id)?
            .ok_or(AquapiError::ActuatorNotFound(actuator_id))
    })
    .await?;
    Ok(Json(actuator))
}

/// POST /actuators: register a new actuator.
pub async fn create_actuator(
    State(app): State<AppState>,
    payload: Result<Json<ActuatorConfig>, JsonRejection>,
) -> Result<(StatusCode, Json<ActuatorConfig>), AppError> {
    let Json(body) = payload?;
    let store = app.store.clone();
    let created = blocking(move || store.insert(&body)).await?;

    tracing::info!(
        actuator_id = created.actuator_id,
        sensor_id = created.sensor_id,
        condition = %created.activation_condition,
        "actuator created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /actuators: replace several actuator records at once.
///
/// Every id must already exist; nothing is written if one is unknown.
pub async fn update_actuators(
    State(app): State<AppState>,
    payload: Result<Json<Vec<ActuatorConfig>>, JsonRejection>,
) -> Result<Json<Vec<ActuatorConfig>>, AppError> {
    let Json(body) = payload?;
    if body.is_empty() {
        return Err(AppError::unprocessable("no actuators to update"));
    }
    let store = app.store.clone();
    let updated = blocking(move || {
        for actuator in &body {
            if store.get(actuator.actuator_id)?.is_none() {
                return Err(AquapiError::ActuatorNotFound(actuator.actuator_id));
            }
        }
        body.iter().map(|a| store.update(a)).collect()
    })
    .await?;
    Ok(Json(updated))
}

/// GET /sensors/{sensor_id}/actuators: every actuator fed by a sensor.
pub async fn list_for_sensor(
    State(app): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<ActuatorConfig>>, AppError> {
    let sensor_id = parse_id(&raw_id)?;
    let store = app.store.clone();
    let actuators = blocking(move || store.list_by_sensor(sensor_id)).await?;
    Ok(Json(actuators))
}
