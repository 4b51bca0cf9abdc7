//! Collaborator contracts consumed by the decision path, plus an in-memory
//! implementation used by tests and `aquapi serve --memory`.
//!
//! The persistent implementation lives in [`crate::db`].

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::{AquapiError, Result};
use crate::types::{ActuatorConfig, Measurement};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Append-only store of sensor readings.
pub trait MeasurementStore {
    /// Newest reading for `sensor_id`, if any.
    fn get_last(&self, sensor_id: i64) -> Result<Option<Measurement>>;

    fn append(&self, measurement: &Measurement) -> Result<()>;
}

/// Actuator configuration and the last-activated timestamp.
pub trait ActuatorRegistry {
    fn get(&self, actuator_id: i64) -> Result<Option<ActuatorConfig>>;

    /// Stamp `last_activated = now`. Fails with `ActuatorNotFound` for an
    /// unknown id.
    fn update_last_activated(&self, actuator_id: i64, now: DateTime<Utc>)
        -> Result<ActuatorConfig>;

    /// Fails with `ActuatorExists` if the id is taken.
    fn insert(&self, actuator: &ActuatorConfig) -> Result<ActuatorConfig>;

    /// Replace an existing actuator. Fails with `ActuatorNotFound`.
    fn update(&self, actuator: &ActuatorConfig) -> Result<ActuatorConfig>;

    fn list_by_sensor(&self, sensor_id: i64) -> Result<Vec<ActuatorConfig>>;
}

/// Both collaborators behind one handle, able to read a consistent
/// `(config, latest reading)` pair for the decision engine.
pub trait Store: MeasurementStore + ActuatorRegistry + Send + Sync {
    /// `None` when the actuator is unknown.
    fn decision_snapshot(
        &self,
        actuator_id: i64,
    ) -> Result<Option<(ActuatorConfig, Option<Measurement>)>>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    actuators: BTreeMap<i64, ActuatorConfig>,
    measurements: HashMap<i64, Vec<Measurement>>,
}

impl Inner {
    fn last_for(&self, sensor_id: i64) -> Option<Measurement> {
        self.measurements
            .get(&sensor_id)?
            .iter()
            .max_by_key(|m| m.timestamp)
            .cloned()
    }
}

/// Process-local store; everything is lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| AquapiError::Db("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| AquapiError::Db("memory store lock poisoned".into()))
    }
}

impl MeasurementStore for MemoryStore {
    fn get_last(&self, sensor_id: i64) -> Result<Option<Measurement>> {
        Ok(self.read()?.last_for(sensor_id))
    }

    fn append(&self, measurement: &Measurement) -> Result<()> {
        self.write()?
            .measurements
            .entry(measurement.sensor_id)
            .or_default()
            .push(measurement.clone());
        Ok(())
    }
}

impl ActuatorRegistry for MemoryStore {
    fn get(&self, actuator_id: i64) -> Result<Option<ActuatorConfig>> {
        Ok(self.read()?.actuators.get(&actuator_id).cloned())
    }

    fn update_last_activated(
        &self,
        actuator_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ActuatorConfig> {
        let mut inner = self.write()?;
        let actuator = inner
            .actuators
            .get_mut(&actuator_id)
            .ok_or(AquapiError::ActuatorNotFound(actuator_id))?;
        actuator.last_activated = now;
        Ok(actuator.clone())
    }

    fn insert(&self, actuator: &ActuatorConfig) -> Result<ActuatorConfig> {
        let mut inner = self.write()?;
        if inner.actuators.contains_key(&actuator.actuator_id) {
            return Err(AquapiError::ActuatorExists(actuator.actuator_id));
        }
        inner
            .actuators
            .insert(actuator.actuator_id, actuator.clone());
        Ok(actuator.clone())
    }

    fn update(&self, actuator: &ActuatorConfig) -> Result<ActuatorConfig> {
        let mut inner = self.write()?;
        let slot = inner
            .actuators
            .get_mut(&actuator.actuator_id)
            .ok_or(AquapiError::ActuatorNotFound(actuator.actuator_id))?;
        *slot = actuator.clone();
        Ok(actuator.clone())
    }

    fn list_by_sensor(&self, sensor_id: i64) -> Result<Vec<ActuatorConfig>> {
        Ok(self
            .read()?
            .actuators
            .values()
            .filter(|a| a.sensor_id == sensor_id)
            .cloned()
            .collect())
    }
}

impl Store for MemoryStore {
    fn decision_snapshot(
        &self,
        actuator_id: i64,
    ) -> Result<Option<(ActuatorConfig, Option<Measurement>)>> {
        let inner = self.read()?;
        Ok(inner.actuators.get(&actuator_id).map(|a| {
            let last = inner.last_for(a.sensor_id);
            (a.clone(), last)
        }))
    }
}
