use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a conversation. `content` is mutable while the turn is in
/// flight: it may be a prefix of the final text and may contain embedded
/// tool-call markers at any point. All mutation goes through
/// [`crate::conversation::Conversation::update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_streaming: bool,
}

impl Message {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Message {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp(),
            is_streaming: false,
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::new(Role::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message::new(Role::Assistant, content)
    }

    /// An empty assistant message awaiting content from the pipeline.
    pub fn pending_assistant() -> Self {
        let mut message = Message::new(Role::Assistant, "");
        message.is_streaming = true;
        message
    }
}

/// A shallow field merge applied to an existing message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub is_streaming: Option<bool>,
}

impl MessagePatch {
    pub fn content<S: Into<String>>(content: S) -> Self {
        MessagePatch {
            content: Some(content.into()),
            is_streaming: None,
        }
    }

    /// Final content plus `is_streaming = false` in one patch.
    pub fn settle<S: Into<String>>(content: S) -> Self {
        MessagePatch {
            content: Some(content.into()),
            is_streaming: Some(false),
        }
    }

    pub fn streaming(value: bool) -> Self {
        MessagePatch {
            content: None,
            is_streaming: Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_assistant_is_streaming() {
        let message = Message::pending_assistant();
        assert_eq!(message.role, Role::Assistant);
        assert!(message.is_streaming);
        assert!(message.content.is_empty());
    }

    #[test]
    fn test_settle_patch_clears_streaming() {
        let patch = MessagePatch::settle("done");
        assert_eq!(patch.content.as_deref(), Some("done"));
        assert_eq!(patch.is_streaming, Some(false));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let message = Message::user("hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");
    }
}
