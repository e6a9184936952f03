use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque chat identifier supplied by the transport (a Telegram chat id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        ChatId(id)
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// Author of a transcript turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The persona's seed prompt.
    System,
    /// Text sent (or spoken) by the person chatting.
    User,
    /// Reply produced by the text-generation service.
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged entry in a conversation transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// =============================================================================
// Persona
// =============================================================================

/// A character a chat can bind to.
///
/// Fully specified: optional fields of the on-disk schema are resolved by the
/// catalog loader before a `Persona` is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Unique display name, also the selection key.
    pub name: String,
    /// Seeded as turn 0 of every transcript bound to this persona.
    pub system_prompt: String,
    /// Text-generation model identifier.
    pub chat_model: String,
    /// Speech-synthesis voice identifier.
    pub voice: String,
    /// Speech-synthesis model identifier.
    pub tts_model: String,
    /// Display rank; lower sorts first.
    pub sort_order: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");

        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn test_turn_shape() {
        let turn = Turn::user("hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "user", "content": "hello" }));
    }

    #[test]
    fn test_chat_id_is_transparent() {
        let id = ChatId(-100123);
        assert_eq!(serde_json::to_string(&id).unwrap(), "-100123");
        assert_eq!(id.to_string(), "-100123");
        assert_eq!(ChatId::from(7), ChatId(7));
    }

    #[test]
    fn test_turn_constructors() {
        assert_eq!(Turn::system("s").role, Role::System);
        assert_eq!(Turn::assistant("a").role, Role::Assistant);
        assert_eq!(Turn::new(Role::User, "u").content, "u");
    }
}
