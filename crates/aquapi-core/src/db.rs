//! Persistent actuator registry and measurement store using redb.
//!
//! # Table design
//!
//! `ACTUATORS` is keyed by `actuator_id` and holds JSON-encoded
//! [`ActuatorConfig`] records.
//!
//! `MEASUREMENTS` uses a 20-byte composite key:
//! ```text
//! [ sensor_id: i64 order-preserving BE (8) | timestamp_us: i64 order-preserving BE (8) | seq: u32 BE (4) ]
//! ```
//! and stores the raw `f64` value, so NaN readings survive storage. Byte
//! order equals `(sensor, time, arrival)` order: the newest reading of a
//! sensor is the last entry of that sensor's key range. `seq` separates
//! readings that share a microsecond, so appends never overwrite.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadTransaction, ReadableTable, TableDefinition};

use crate::error::{AquapiError, Result};
use crate::store::{ActuatorRegistry, MeasurementStore, Store};
use crate::types::{ActuatorConfig, Measurement};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const ACTUATORS: TableDefinition<i64, &[u8]> = TableDefinition::new("actuators");

const MEASUREMENTS: TableDefinition<&[u8], f64> = TableDefinition::new("measurements");

fn db_err(e: impl std::fmt::Display) -> AquapiError {
    AquapiError::Db(e.to_string())
}

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

/// Map an `i64` onto bytes whose lexicographic order matches numeric order.
fn ordered(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1 << 63)).to_be_bytes()
}

fn unordered(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    (u64::from_be_bytes(buf) ^ (1 << 63)) as i64
}

const KEY_LEN: usize = 20;

fn measurement_key(sensor_id: i64, ts: DateTime<Utc>, seq: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[..8].copy_from_slice(&ordered(sensor_id));
    key[8..16].copy_from_slice(&ordered(ts.timestamp_micros()));
    key[16..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Inclusive key bounds covering every reading of `sensor_id`.
fn sensor_bounds(sensor_id: i64) -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
    let mut lo = [0u8; KEY_LEN];
    let mut hi = [0xffu8; KEY_LEN];
    lo[..8].copy_from_slice(&ordered(sensor_id));
    hi[..8].copy_from_slice(&ordered(sensor_id));
    (lo, hi)
}

fn decode_measurement(key: &[u8], value: f64) -> Result<Measurement> {
    if key.len() != KEY_LEN {
        return Err(AquapiError::Integrity(format!(
            "measurement key has {} bytes, expected {KEY_LEN}",
            key.len()
        )));
    }
    let sensor_id = unordered(&key[..8]);
    let micros = unordered(&key[8..16]);
    let timestamp = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| AquapiError::Integrity(format!("bad timestamp {micros}")))?;
    Ok(Measurement::new(sensor_id, value, timestamp))
}

// ---------------------------------------------------------------------------
// StoreDb
// ---------------------------------------------------------------------------

/// redb-backed [`Store`].
pub struct StoreDb {
    db: Database,
}

impl StoreDb {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(ACTUATORS).map_err(db_err)?;
        wt.open_table(MEASUREMENTS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        tracing::debug!(path = %path.display(), "opened store");
        Ok(Self { db })
    }

    fn read_actuator(rt: &ReadTransaction, actuator_id: i64) -> Result<Option<ActuatorConfig>> {
        let table = rt.open_table(ACTUATORS).map_err(db_err)?;
        match table.get(actuator_id).map_err(db_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    fn read_last(rt: &ReadTransaction, sensor_id: i64) -> Result<Option<Measurement>> {
        let table = rt.open_table(MEASUREMENTS).map_err(db_err)?;
        let (lo, hi) = sensor_bounds(sensor_id);
        let mut range = table
            .range(lo.as_slice()..=hi.as_slice())
            .map_err(db_err)?;
        match range.next_back() {
            Some(entry) => {
                let (k, v) = entry.map_err(db_err)?;
                Ok(Some(decode_measurement(k.value(), v.value())?))
            }
            None => Ok(None),
        }
    }

    /// Write `actuator` under its id. The write only proceeds if the id's
    /// presence matches `must_exist`.
    fn put_actuator(&self, actuator: &ActuatorConfig, must_exist: bool) -> Result<()> {
        let value = serde_json::to_vec(actuator)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(ACTUATORS).map_err(db_err)?;
            let exists = table.get(actuator.actuator_id).map_err(db_err)?.is_some();
            match (must_exist, exists) {
                (true, false) => return Err(AquapiError::ActuatorNotFound(actuator.actuator_id)),
                (false, true) => return Err(AquapiError::ActuatorExists(actuator.actuator_id)),
                _ => {}
            }
            table
                .insert(actuator.actuator_id, value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }
}

impl MeasurementStore for StoreDb {
    fn get_last(&self, sensor_id: i64) -> Result<Option<Measurement>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        Self::read_last(&rt, sensor_id)
    }

    fn append(&self, measurement: &Measurement) -> Result<()> {
        let (sensor_id, ts) = (measurement.sensor_id, measurement.timestamp);
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(MEASUREMENTS).map_err(db_err)?;
            let lo = measurement_key(sensor_id, ts, 0);
            let hi = measurement_key(sensor_id, ts, u32::MAX);
            let seq = match table
                .range(lo.as_slice()..=hi.as_slice())
                .map_err(db_err)?
                .next_back()
            {
                Some(entry) => {
                    let (k, _) = entry.map_err(db_err)?;
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(&k.value()[16..KEY_LEN]);
                    u32::from_be_bytes(buf).checked_add(1).ok_or_else(|| {
                        AquapiError::Integrity(format!(
                            "too many readings for sensor {sensor_id} at {ts}"
                        ))
                    })?
                }
                None => 0,
            };
            let key = measurement_key(sensor_id, ts, seq);
            table
                .insert(key.as_slice(), measurement.value)
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }
}

impl ActuatorRegistry for StoreDb {
    fn get(&self, actuator_id: i64) -> Result<Option<ActuatorConfig>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        Self::read_actuator(&rt, actuator_id)
    }

    fn update_last_activated(
        &self,
        actuator_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ActuatorConfig> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let updated = {
            let mut table = wt.open_table(ACTUATORS).map_err(db_err)?;
            let mut actuator: ActuatorConfig = match table.get(actuator_id).map_err(db_err)? {
                Some(v) => serde_json::from_slice(v.value())?,
                None => return Err(AquapiError::ActuatorNotFound(actuator_id)),
            };
            actuator.last_activated = now;
            let value = serde_json::to_vec(&actuator)?;
            table
                .insert(actuator_id, value.as_slice())
                .map_err(db_err)?;
            actuator
        };
        wt.commit().map_err(db_err)?;
        Ok(updated)
    }

    fn insert(&self, actuator: &ActuatorConfig) -> Result<ActuatorConfig> {
        self.put_actuator(actuator, false)?;
        Ok(actuator.clone())
    }

    fn update(&self, actuator: &ActuatorConfig) -> Result<ActuatorConfig> {
        self.put_actuator(actuator, true)?;
        Ok(actuator.clone())
    }

    fn list_by_sensor(&self, sensor_id: i64) -> Result<Vec<ActuatorConfig>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(ACTUATORS).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let actuator: ActuatorConfig = serde_json::from_slice(v.value())?;
            if actuator.sensor_id == sensor_id {
                result.push(actuator);
            }
        }
        Ok(result)
    }
}

impl Store for StoreDb {
    fn decision_snapshot(
        &self,
        actuator_id: i64,
    ) -> Result<Option<(ActuatorConfig, Option<Measurement>)>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let Some(actuator) = Self::read_actuator(&rt, actuator_id)? else {
            return Ok(None);
        };
        let last = Self::read_last(&rt, actuator.sensor_id)?;
        Ok(Some((actuator, last)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivationCondition, ActuatorType};
    use chrono::Duration;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, StoreDb) {
        let dir = TempDir::new().unwrap();
        let db = StoreDb::open(&dir.path().join("aquapi.redb")).unwrap();
        (dir, db)
    }

    fn pump(id: i64, sensor_id: i64) -> ActuatorConfig {
        ActuatorConfig {
            actuator_id: id,
            actuator_type: ActuatorType::NutrientsAPump,
            sensor_id,
            condition_value: 1.2,
            activation_condition: ActivationCondition::Low,
            activation_period: 300.0,
            activation_duration: 4.0,
            enabled: true,
            last_activated: Utc::now() - Duration::hours(2),
        }
    }

    #[test]
    fn ordered_keys_sort_numerically() {
        let values = [i64::MIN, -5, -1, 0, 1, 7, i64::MAX];
        for pair in values.windows(2) {
            assert!(ordered(pair[0]) < ordered(pair[1]), "{pair:?}");
            assert_eq!(unordered(&ordered(pair[0])), pair[0]);
        }
    }

    #[test]
    fn get_last_returns_newest_reading_of_that_sensor() {
        let (_dir, db) = open_tmp();
        let now = Utc::now();
        db.append(&Measurement::new(1, 5.0, now - Duration::minutes(5)))
            .unwrap();
        db.append(&Measurement::new(1, 6.0, now)).unwrap();
        db.append(&Measurement::new(1, 5.5, now - Duration::minutes(1)))
            .unwrap();
        db.append(&Measurement::new(2, 9.0, now + Duration::minutes(1)))
            .unwrap();
        db.append(&Measurement::new(0, 3.0, now + Duration::minutes(1)))
            .unwrap();

        let last = db.get_last(1).unwrap().unwrap();
        assert_eq!(last.sensor_id, 1);
        assert_eq!(last.value, 6.0);
        assert_eq!(last.timestamp.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn readings_sharing_a_timestamp_are_all_kept() {
        let (_dir, db) = open_tmp();
        let ts = Utc::now();
        db.append(&Measurement::new(1, 5.0, ts)).unwrap();
        db.append(&Measurement::new(1, 6.0, ts)).unwrap();
        db.append(&Measurement::new(1, 7.0, ts)).unwrap();

        let rt = db.db.begin_read().unwrap();
        let table = rt.open_table(MEASUREMENTS).unwrap();
        let (lo, hi) = sensor_bounds(1);
        let values: Vec<f64> = table
            .range(lo.as_slice()..=hi.as_slice())
            .unwrap()
            .map(|entry| entry.unwrap().1.value())
            .collect();
        assert_eq!(values, vec![5.0, 6.0, 7.0]);
        assert_eq!(db.get_last(1).unwrap().unwrap().value, 7.0);
    }

    #[test]
    fn get_last_for_unknown_sensor_is_none() {
        let (_dir, db) = open_tmp();
        db.append(&Measurement::new(3, 1.0, Utc::now())).unwrap();
        assert!(db.get_last(4).unwrap().is_none());
    }

    #[test]
    fn nan_reading_survives_storage() {
        let (_dir, db) = open_tmp();
        db.append(&Measurement::new(1, f64::NAN, Utc::now())).unwrap();
        assert!(db.get_last(1).unwrap().unwrap().value.is_nan());
    }

    #[test]
    fn insert_get_and_duplicate() {
        let (_dir, db) = open_tmp();
        let original = pump(1, 1);
        db.insert(&original).unwrap();
        assert_eq!(db.get(1).unwrap().unwrap(), original);
        let err = db.insert(&pump(1, 2)).unwrap_err();
        assert!(matches!(err, AquapiError::ActuatorExists(1)));
        assert!(db.get(2).unwrap().is_none());
    }

    #[test]
    fn update_requires_existing_actuator() {
        let (_dir, db) = open_tmp();
        let err = db.update(&pump(5, 1)).unwrap_err();
        assert!(matches!(err, AquapiError::ActuatorNotFound(5)));

        db.insert(&pump(5, 1)).unwrap();
        let mut changed = pump(5, 1);
        changed.condition_value = 2.0;
        db.update(&changed).unwrap();
        assert_eq!(db.get(5).unwrap().unwrap().condition_value, 2.0);
    }

    #[test]
    fn update_last_activated_persists() {
        let (dir, db) = open_tmp();
        db.insert(&pump(1, 1)).unwrap();
        let now = Utc::now();
        let updated = db.update_last_activated(1, now).unwrap();
        assert_eq!(updated.last_activated, now);
        drop(db);

        let reopened = StoreDb::open(&dir.path().join("aquapi.redb")).unwrap();
        assert_eq!(reopened.get(1).unwrap().unwrap().last_activated, now);
    }

    #[test]
    fn update_last_activated_unknown_is_not_found() {
        let (_dir, db) = open_tmp();
        let err = db.update_last_activated(9, Utc::now()).unwrap_err();
        assert!(matches!(err, AquapiError::ActuatorNotFound(9)));
    }

    #[test]
    fn list_by_sensor_filters() {
        let (_dir, db) = open_tmp();
        db.insert(&pump(1, 1)).unwrap();
        db.insert(&pump(2, 2)).unwrap();
        db.insert(&pump(3, 1)).unwrap();
        let ids: Vec<i64> = db
            .list_by_sensor(1)
            .unwrap()
            .into_iter()
            .map(|a| a.actuator_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn snapshot_reads_config_and_reading_together() {
        let (_dir, db) = open_tmp();
        assert!(db.decision_snapshot(1).unwrap().is_none());
        db.insert(&pump(1, 7)).unwrap();
        db.append(&Measurement::new(7, 0.8, Utc::now())).unwrap();
        let (cfg, last) = db.decision_snapshot(1).unwrap().unwrap();
        assert_eq!(cfg.sensor_id, 7);
        assert_eq!(last.unwrap().value, 0.8);
    }
}
