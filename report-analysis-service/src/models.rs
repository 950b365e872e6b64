use chat_flow::{
    AudienceMode, MessageOrigin, RenderedReply, SessionSnapshot, UserRole, render_reply,
};
use serde::{Deserialize, Serialize};

use crate::prompts::{self, WelcomeCopy};
use crate::samples::SampleKind;

#[derive(Debug, Deserialize)]
pub struct SelectRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct ChangeModeRequest {
    pub mode: AudienceMode,
}

#[derive(Debug, Deserialize)]
pub struct PrivacyRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub kind: SampleKind,
}

/// One transcript entry as served to clients. AI entries carry the raw
/// payload plus its projection into display sections.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub origin: MessageOrigin,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<RenderedReply>,
}

/// The whole user-facing session: state flags, transient notice, welcome copy
/// for an empty transcript, and the rendered transcript itself.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub role: Option<UserRole>,
    pub mode: AudienceMode,
    pub privacy: bool,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome: Option<WelcomeCopy>,
    pub messages: Vec<MessageView>,
}

impl SessionView {
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let welcome = (snapshot.role.is_some() && snapshot.messages.is_empty())
            .then(|| prompts::welcome_copy(snapshot.mode));

        let messages = snapshot
            .messages
            .into_iter()
            .map(|message| {
                let reply = match message.origin {
                    MessageOrigin::Ai => Some(render_reply(&message.text)),
                    MessageOrigin::User => None,
                };
                MessageView {
                    origin: message.origin,
                    text: message.text,
                    reply,
                }
            })
            .collect();

        Self {
            role: snapshot.role,
            mode: snapshot.mode,
            privacy: snapshot.privacy,
            loading: snapshot.loading,
            notice: snapshot.notice,
            welcome,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_flow::Message;

    fn snapshot(messages: Vec<Message>) -> SessionSnapshot {
        SessionSnapshot {
            role: Some(UserRole::Patient),
            mode: AudienceMode::Patient,
            privacy: false,
            loading: false,
            notice: None,
            messages,
        }
    }

    #[test]
    fn welcome_copy_appears_only_for_an_empty_transcript() {
        let view = SessionView::from_snapshot(snapshot(Vec::new()));
        assert!(view.welcome.is_some());

        let view = SessionView::from_snapshot(snapshot(vec![Message::user("hi")]));
        assert!(view.welcome.is_none());
    }

    #[test]
    fn only_ai_entries_are_projected() {
        let view = SessionView::from_snapshot(snapshot(vec![
            Message::user("hi"),
            Message::ai(r#"{"summary": "ok", "keyFindings": []}"#),
        ]));
        assert!(view.messages[0].reply.is_none());
        assert!(matches!(
            view.messages[1].reply,
            Some(RenderedReply::Structured(_))
        ));
    }
}
