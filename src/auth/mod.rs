//! Identity gate: issues and verifies the bearer credentials held by game creators
//! and players.

/// Axum extractors resolving the bearer credential.
pub mod extractor;
/// HS256 token minting and verification.
pub mod jwt;

use uuid::Uuid;

use crate::{error::ServiceError, state::game::HOST_ROLE};

pub use self::jwt::IdentityGate;

/// What a credential is allowed to act as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Issued to whoever created the game; not tied to a player yet.
    Game,
    /// Issued when joining; acts as one player.
    Player(Uuid),
}

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Game the credential was issued for.
    pub game_id: Uuid,
    /// Capability tier.
    pub capability: Capability,
    /// Roles granted with the credential.
    pub roles: Vec<String>,
}

impl Identity {
    /// Whether the credential carries the host role.
    pub fn is_host(&self) -> bool {
        self.roles.iter().any(|role| role == HOST_ROLE)
    }

    /// Player behind the credential, or `Forbidden` for game-level credentials.
    pub fn player_id(&self) -> Result<Uuid, ServiceError> {
        match self.capability {
            Capability::Player(id) => Ok(id),
            Capability::Game => Err(ServiceError::Forbidden(
                "a player credential is required".into(),
            )),
        }
    }

    /// Ensure the credential was issued for `game_id`.
    pub fn require_game(&self, game_id: Uuid) -> Result<(), ServiceError> {
        if self.game_id != game_id {
            return Err(ServiceError::Forbidden(format!(
                "credential does not belong to game `{game_id}`"
            )));
        }
        Ok(())
    }

    /// Ensure the credential is a player of `game_id` holding the host role.
    pub fn require_host(&self, game_id: Uuid) -> Result<(), ServiceError> {
        self.require_game(game_id)?;
        self.player_id()?;
        if !self.is_host() {
            return Err(ServiceError::Forbidden(
                "only the host may do this".into(),
            ));
        }
        Ok(())
    }
}
