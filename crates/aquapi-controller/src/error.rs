#[cfg(target_os = "linux")]
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode server response: {0}")]
    Decode(#[source] reqwest::Error),

    #[cfg(target_os = "linux")]
    #[error("GPIO line {offset} on {} failed: {source}", chip.display())]
    Gpio {
        chip: PathBuf,
        offset: u32,
        #[source]
        source: gpio_cdev::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
