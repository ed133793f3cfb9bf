//! Blocking HTTP client for the oracle endpoint.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::OracleConfig;

use super::protocol::{OracleReply, OracleRequest};
use super::OracleError;

/// Environment override for the endpoint URL.
pub const SERVICE_URL_VAR: &str = "SERVICE_URL";
/// Environment override for the request timeout, in seconds.
pub const TIMEOUT_SECONDS_VAR: &str = "TIMEOUT_SECONDS";

/// One oracle endpoint with a bounded request timeout.
#[derive(Clone)]
pub struct OracleClient {
    url: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OracleClient {
    /// Build a client from configuration, applying the `SERVICE_URL` and
    /// `TIMEOUT_SECONDS` environment overrides.
    pub fn from_config(config: &OracleConfig) -> Self {
        let url = std::env::var(SERVICE_URL_VAR).unwrap_or_else(|_| config.url.clone());
        let timeout_secs = std::env::var(TIMEOUT_SECONDS_VAR)
            .ok()
            .and_then(|raw| match raw.parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!(raw = %raw, "ignoring unparsable {}", TIMEOUT_SECONDS_VAR);
                    None
                }
            })
            .unwrap_or(config.timeout_secs);
        OracleClient::new(url, Duration::from_secs(timeout_secs))
    }

    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        OracleClient {
            url: url.into(),
            timeout,
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST the query and parse the reply. Every transport, status, and
    /// body failure maps to an [`OracleError`]; the caller decides how to
    /// degrade.
    pub fn query(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        debug!(
            url = %self.url,
            constraints = request.constraints.len(),
            has_heap = request.heap_state.is_some(),
            has_source = request.source_context.is_some(),
            "querying oracle"
        );
        let response = self
            .agent
            .post(&self.url)
            .send_json(request)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => OracleError::Status(code),
                ureq::Error::Transport(t) => OracleError::Transport(t.to_string()),
            })?;
        response
            .into_json::<OracleReply>()
            .map_err(|e| OracleError::MalformedReply(e.to_string()))
    }
}
