use tracing::warn;

use crate::{dto::health::HealthResponse, error::ServiceError, state::SharedState};

/// Probe the installed game store. A missing or failing store reports `degraded`.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.game_store().await else {
        warn!("no game store installed (degraded mode)");
        return HealthResponse::degraded();
    };

    match state
        .with_store_timeout(async { Ok::<_, ServiceError>(store.health_check().await?) })
        .await
    {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "game store health check failed");
            HealthResponse::degraded()
        }
    }
}
