pub mod condition;
pub mod config;
pub mod db;
pub mod decision;
pub mod error;
pub mod store;
pub mod types;

pub use error::{AquapiError, Result};
