/// Pure aggregation over rosters: completion, progress and story assembly.
pub mod aggregation;
/// OpenAPI documentation generation.
pub mod documentation;
/// Event names and room fan-out helpers.
pub mod events;
/// Game lifecycle, roster and result reads.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Admission and storage of name and story submissions.
pub mod submission_service;
#[cfg(test)]
pub(crate) mod test_support;
/// WebSocket connection and message handling service.
pub mod websocket_service;
