//! Library crate for parlor-back, exposing modules for binaries and tests.

/// Credential issuing, verification and request extractors.
pub mod auth;
/// Runtime configuration and the story hint table.
pub mod config;
/// Storage contract and bundled store implementations.
pub mod dao;
mod dto;
mod error;
/// HTTP and WebSocket route trees.
pub mod routes;
/// Business logic invoked by the routes.
pub mod services;
/// Shared application state, domain types and the phase state machine.
pub mod state;
