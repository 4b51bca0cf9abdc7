use thiserror::Error;

#[derive(Debug, Error)]
pub enum AquapiError {
    #[error("config not found: {0} (run with --config or set AQUAPI_CONFIG)")]
    NotConfigured(String),

    #[error("actuator not found: {0}")]
    ActuatorNotFound(i64),

    #[error("actuator already exists: {0}")]
    ActuatorExists(i64),

    #[error("no measurement recorded for sensor {0}")]
    MeasurementNotFound(i64),

    #[error("invalid id '{0}': must be an integer")]
    InvalidId(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("storage error: {0}")]
    Db(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AquapiError>;
