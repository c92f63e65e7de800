//! Status messages carried across the redirect boundary, round-tripped as a
//! JSON-encoded object in the `message` query parameter.

use serde::{Deserialize, Serialize};

pub const CREATED_MESSAGE: &str = "Created successfully";
pub const UPDATED_MESSAGE: &str = "Updated successfully";
pub const DELETED_MESSAGE: &str = "Deleted successfully";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlashMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

impl FlashMessage {
    pub fn success(content: impl Into<String>) -> Self {
        FlashMessage {
            kind: MessageKind::Success,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        FlashMessage {
            kind: MessageKind::Error,
            content: content.into(),
        }
    }

    /// JSON form appended to redirect destinations as `?message=...`.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a `message` query parameter. Malformed input yields None; a
    /// stale or tampered parameter must not fail the request.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_type_key() {
        let msg = FlashMessage::success(CREATED_MESSAGE);
        assert_eq!(
            msg.encode(),
            r#"{"type":"success","content":"Created successfully"}"#
        );
    }

    #[test]
    fn round_trips() {
        let msg = FlashMessage::error("nope");
        assert_eq!(FlashMessage::decode(&msg.encode()), Some(msg));
    }

    #[test]
    fn malformed_input_is_none() {
        assert_eq!(FlashMessage::decode("not json"), None);
        assert_eq!(FlashMessage::decode(r#"{"type":"warn","content":"x"}"#), None);
    }
}
