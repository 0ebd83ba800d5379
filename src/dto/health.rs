use serde::Serialize;
use utoipa::ToSchema;

/// Whether the service can currently reach a game store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A store is installed and answered its probe.
    Ok,
    /// No store is installed, or the probe failed or timed out. Store-backed
    /// routes answer 503 until a store is back.
    Degraded,
}

/// Body of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current status.
    pub status: HealthStatus,
}

impl HealthResponse {
    /// Store reachable.
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    /// Store missing or failing.
    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}
