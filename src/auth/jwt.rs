use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{Capability, Identity},
    error::ServiceError,
    state::game::HOST_ROLE,
};

/// Claims carried by every credential the backend issues.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Player identifier; absent for game-level credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Uuid>,
    /// Game the credential belongs to.
    pub game: Uuid,
    /// Roles granted with the credential.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued-at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

/// Mints and verifies HS256 credentials.
#[derive(Clone)]
pub struct IdentityGate {
    secret: Vec<u8>,
    algorithm: Algorithm,
    ttl: Duration,
}

impl IdentityGate {
    /// Create a gate signing with `secret`, issuing tokens valid for `ttl`.
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            ttl,
        }
    }

    /// Credential handed to the creator of a game. The first join made with it takes
    /// the host role.
    pub fn issue_game_token(&self, game_id: Uuid, now: SystemTime) -> Result<String, ServiceError> {
        self.mint(None, game_id, vec![HOST_ROLE.to_string()], now)
    }

    /// Credential handed to a player when they join.
    pub fn issue_player_token(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        roles: Vec<String>,
        now: SystemTime,
    ) -> Result<String, ServiceError> {
        self.mint(Some(player_id), game_id, roles, now)
    }

    /// Verify a credential and return the identity it carries.
    pub fn authenticate(&self, token: &str) -> Result<Identity, ServiceError> {
        let validation = Validation::new(self.algorithm);
        let claims = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(error = %err, "rejected credential");
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        ServiceError::Unauthorized("credential expired".into())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        ServiceError::Unauthorized("invalid credential signature".into())
                    }
                    _ => ServiceError::Unauthorized("invalid credential".into()),
                }
            })?;

        let capability = match claims.sub {
            Some(player_id) => Capability::Player(player_id),
            None => Capability::Game,
        };

        Ok(Identity {
            game_id: claims.game,
            capability,
            roles: claims.roles,
        })
    }

    fn mint(
        &self,
        sub: Option<Uuid>,
        game: Uuid,
        roles: Vec<String>,
        now: SystemTime,
    ) -> Result<String, ServiceError> {
        let iat = now
            .duration_since(UNIX_EPOCH)
            .map_err(|_| ServiceError::Internal("clock is before the unix epoch".into()))?
            .as_secs() as i64;
        let exp = iat + self.ttl.as_secs() as i64;

        let claims = Claims {
            sub,
            game,
            roles,
            iat,
            exp,
        };

        encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|err| ServiceError::Internal(format!("failed to encode credential: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(secret: &str) -> IdentityGate {
        IdentityGate::new(secret.as_bytes(), Duration::from_secs(15 * 60))
    }

    #[test]
    fn player_token_roundtrip() {
        let gate = gate("test_secret_key_for_testing_purposes_only");
        let game_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();

        let token = gate
            .issue_player_token(game_id, player_id, vec![], SystemTime::now())
            .unwrap();
        let identity = gate.authenticate(&token).unwrap();

        assert_eq!(identity.game_id, game_id);
        assert_eq!(identity.capability, Capability::Player(player_id));
        assert!(!identity.is_host());
    }

    #[test]
    fn game_token_is_game_level_host() {
        let gate = gate("test_secret_key_for_testing_purposes_only");
        let game_id = Uuid::new_v4();

        let token = gate.issue_game_token(game_id, SystemTime::now()).unwrap();
        let identity = gate.authenticate(&token).unwrap();

        assert_eq!(identity.capability, Capability::Game);
        assert!(identity.is_host());
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let gate = gate("test_secret_key_for_testing_purposes_only");
        let issued = SystemTime::now() - Duration::from_secs(20 * 60);
        let token = gate.issue_game_token(Uuid::new_v4(), issued).unwrap();

        match gate.authenticate(&token) {
            Err(ServiceError::Unauthorized(message)) => assert!(message.contains("expired")),
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn foreign_signature_is_unauthorized() {
        let token = gate("secret-A")
            .issue_game_token(Uuid::new_v4(), SystemTime::now())
            .unwrap();
        assert!(matches!(
            gate("secret-B").authenticate(&token),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_is_unauthorized() {
        assert!(matches!(
            gate("secret").authenticate("not-a-token"),
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
