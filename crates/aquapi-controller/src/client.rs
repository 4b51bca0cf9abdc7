use std::sync::Arc;
use std::time::Duration;

use aquapi_core::decision::ActivationDecision;
use reqwest::blocking::{Client, Response};

use crate::{ControllerError, Result};

// ─── ActuatorApi ──────────────────────────────────────────────────────────

/// The two calls the execution loop makes against the decision server.
pub trait ActuatorApi {
    /// `GET /actuators/{id}/state`
    fn poll_state(&self, actuator_id: i64) -> Result<ActivationDecision>;

    /// `PATCH /actuators/{id}/last_activated`
    fn report_activated(&self, actuator_id: i64) -> Result<()>;
}

impl<T: ActuatorApi + ?Sized> ActuatorApi for Arc<T> {
    fn poll_state(&self, actuator_id: i64) -> Result<ActivationDecision> {
        (**self).poll_state(actuator_id)
    }

    fn report_activated(&self, actuator_id: i64) -> Result<()> {
        (**self).report_activated(actuator_id)
    }
}

// ─── HttpClient ───────────────────────────────────────────────────────────

/// Blocking HTTP implementation of [`ActuatorApi`].
///
/// Every request carries the configured timeout so a stalled server turns
/// into a poll failure instead of a stuck loop.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn actuator_url(&self, actuator_id: i64, suffix: &str) -> String {
        format!("{}/actuators/{actuator_id}/{suffix}", self.base_url)
    }
}

impl ActuatorApi for HttpClient {
    fn poll_state(&self, actuator_id: i64) -> Result<ActivationDecision> {
        let url = self.actuator_url(actuator_id, "state");
        tracing::debug!(%url, "polling decision");
        let response = check_status(self.client.get(&url).send()?)?;
        response.json().map_err(ControllerError::Decode)
    }

    fn report_activated(&self, actuator_id: i64) -> Result<()> {
        let url = self.actuator_url(actuator_id, "last_activated");
        tracing::debug!(%url, "reporting activation");
        check_status(self.client.patch(&url).send()?)?;
        Ok(())
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ControllerError::Status {
        status: status.as_u16(),
        body,
    })
}
