//! In-process store: a per-game `tokio` mutex is the serialisation point, so every
//! transaction on one game runs strictly after the previous one committed or rolled back.

mod record;
/// [`GameStore`](crate::dao::game_store::GameStore) implementation.
pub mod store;

pub use store::MemoryGameStore;
