use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    User,
    Ai,
}

/// One entry in a conversation transcript.
///
/// For `User` entries `text` is the display text that was submitted. For `Ai`
/// entries `text` is the raw model payload, normally JSON matching
/// [`crate::schema::StructuredResponse`] but kept verbatim so unparseable
/// replies can still be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub origin: MessageOrigin,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: MessageOrigin::User,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            origin: MessageOrigin::Ai,
            text: text.into(),
        }
    }
}
