/// Game session storage contract and bundled implementations.
pub mod game_store;
/// Storage row definitions.
pub mod models;
/// Storage error type shared by every backend.
pub mod storage;
