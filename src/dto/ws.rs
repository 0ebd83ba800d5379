use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema, PartialEq, Eq)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first frame; carries the player credential.
    Identification { token: String },
    /// Nudge another player of the same game.
    Poke { to: Uuid },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse one text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_frames() {
        let ident = ClientMessage::from_json_str(r#"{"type":"identification","token":"abc"}"#)
            .unwrap();
        assert_eq!(
            ident,
            ClientMessage::Identification {
                token: "abc".into()
            }
        );

        let target = Uuid::new_v4();
        let poke =
            ClientMessage::from_json_str(&format!(r#"{{"type":"poke","to":"{target}"}}"#)).unwrap();
        assert_eq!(poke, ClientMessage::Poke { to: target });
    }

    #[test]
    fn unknown_types_do_not_fail_parsing() {
        let msg = ClientMessage::from_json_str(r#"{"type":"dance"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
        assert!(ClientMessage::from_json_str("not json").is_err());
    }
}
