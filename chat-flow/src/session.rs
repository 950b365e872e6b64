//! The session/conversation state machine.
//!
//! A session is either `NoRoleSelected` or `Active(role, mode)`. One
//! [`ChatState`] owns the live session; every transcript mutation and every
//! role/mode/privacy transition routes through it, persists through the
//! configured [`KeyValueStore`], and resets the [`ModelGateway`] continuation
//! where the transition demands it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::gateway::ModelGateway;
use crate::message::Message;
use crate::schema::StructuredResponse;
use crate::store::KeyValueStore;

/// Who is using the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Doctor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "patient" => Some(Self::Patient),
            "doctor" => Some(Self::Doctor),
            _ => None,
        }
    }

    /// Patients are pinned to patient mode; doctors start in doctor mode.
    pub fn default_mode(&self) -> AudienceMode {
        match self {
            Self::Patient => AudienceMode::Patient,
            Self::Doctor => AudienceMode::Doctor,
        }
    }
}

/// Which of the two tailored prompt/response styles is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceMode {
    Patient,
    Doctor,
}

impl AudienceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "patient" => Some(Self::Patient),
            "doctor" => Some(Self::Doctor),
            _ => None,
        }
    }
}

/// Persistence keys. Transcripts are scoped per (role, mode) pair; the role
/// and mode keys remember the last active session across restarts.
pub mod keys {
    use super::{AudienceMode, UserRole};

    pub const ROLE: &str = "report-chat:role";
    pub const MODE: &str = "report-chat:mode";

    pub fn transcript(role: UserRole, mode: AudienceMode) -> String {
        format!("report-chat:messages:{}:{}", role.as_str(), mode.as_str())
    }
}

const NOTICE_TTL_SECONDS: i64 = 3;

const PRIVACY_ENABLED_NOTICE: &str = "Privacy Mode enabled. Chat has been cleared.";
const PRIVACY_DISABLED_NOTICE: &str = "Privacy Mode disabled.";

const GATEWAY_FAILURE_SUMMARY: &str =
    "An unexpected error occurred. Could not get a response from the AI.";
const GATEWAY_FAILURE_EXPLANATION: &str =
    "There was a problem processing the request with the AI model. Please try again.";

/// A transient user-facing notification. Reads as absent once its window has
/// passed.
#[derive(Debug, Clone)]
struct Notice {
    text: String,
    raised_at: DateTime<Utc>,
}

impl Notice {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raised_at: Utc::now(),
        }
    }

    fn is_active(&self) -> bool {
        Utc::now().signed_duration_since(self.raised_at) < Duration::seconds(NOTICE_TTL_SECONDS)
    }
}

struct SessionInner {
    role: Option<UserRole>,
    mode: AudienceMode,
    messages: Vec<Message>,
    privacy: bool,
    notice: Option<Notice>,
}

/// Point-in-time view of the session, for presentation layers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub role: Option<UserRole>,
    pub mode: AudienceMode,
    pub privacy: bool,
    pub loading: bool,
    pub notice: Option<String>,
    pub messages: Vec<Message>,
}

/// The live chat session.
pub struct ChatState {
    store: Arc<dyn KeyValueStore>,
    gateway: Arc<dyn ModelGateway>,
    inner: Mutex<SessionInner>,
    /// Cooperative single-flight: at most one outstanding model call.
    in_flight: AtomicBool,
    /// Bumped on every role/mode/privacy transition. Dispatches capture the
    /// value at send time; a reply whose epoch no longer matches is stale
    /// and gets dropped instead of landing in the wrong transcript.
    epoch: AtomicU64,
}

impl ChatState {
    pub fn new(store: Arc<dyn KeyValueStore>, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            store,
            gateway,
            inner: Mutex::new(SessionInner {
                role: None,
                mode: AudienceMode::Patient,
                messages: Vec::new(),
                privacy: false,
                notice: None,
            }),
            in_flight: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    /// Re-enter the last persisted session, if any. Unrecognized or corrupt
    /// persisted state starts fresh rather than failing.
    pub async fn restore(&self) -> Result<()> {
        let Some(saved_role) = self.store.get(keys::ROLE).await? else {
            return Ok(());
        };
        let Some(role) = UserRole::parse(&saved_role) else {
            warn!(%saved_role, "persisted role is not recognized, starting fresh");
            return Ok(());
        };

        let mode = match role {
            UserRole::Patient => AudienceMode::Patient,
            UserRole::Doctor => match self.store.get(keys::MODE).await? {
                Some(saved_mode) => {
                    AudienceMode::parse(&saved_mode).unwrap_or_else(|| role.default_mode())
                }
                None => role.default_mode(),
            },
        };

        let messages = self.load_transcript(role, mode).await?;
        let mut inner = self.inner.lock().await;
        inner.role = Some(role);
        inner.mode = mode;
        inner.messages = messages;
        info!(role = role.as_str(), mode = mode.as_str(), "restored persisted session");
        Ok(())
    }

    /// NoRoleSelected -> Active(role, default mode for the role). Loads that
    /// pair's persisted transcript and restarts the model conversation.
    pub async fn select_role(&self, role: UserRole) -> Result<()> {
        let mode = role.default_mode();
        let messages = self.load_transcript(role, mode).await?;

        {
            let mut inner = self.inner.lock().await;
            inner.role = Some(role);
            inner.mode = mode;
            inner.messages = messages;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.store.put(keys::ROLE, role.as_str().to_string()).await?;
            self.store.put(keys::MODE, mode.as_str().to_string()).await?;
        }

        self.gateway.reset().await;
        info!(role = role.as_str(), mode = mode.as_str(), "role selected");
        Ok(())
    }

    /// Switch the audience mode. Doctor-only; a no-op for patients, for an
    /// unselected role, and when the mode is already active.
    pub async fn change_mode(&self, new_mode: AudienceMode) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            match inner.role {
                Some(UserRole::Doctor) => {}
                _ => {
                    debug!(mode = new_mode.as_str(), "mode change ignored: not a doctor session");
                    return Ok(());
                }
            }
            if inner.mode == new_mode {
                return Ok(());
            }

            let role = UserRole::Doctor;
            inner.mode = new_mode;
            inner.messages = self.load_transcript(role, new_mode).await?;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.store.put(keys::MODE, new_mode.as_str().to_string()).await?;
        }

        self.gateway.reset().await;
        info!(mode = new_mode.as_str(), "audience mode changed");
        Ok(())
    }

    /// Enable: delete the persisted transcript for the active pair, clear the
    /// in-memory transcript, restart the model conversation and raise a
    /// notice. Disable: raise a notice only, no data change.
    pub async fn set_privacy(&self, enabled: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.privacy = enabled;

        if !enabled {
            inner.notice = Some(Notice::new(PRIVACY_DISABLED_NOTICE));
            return Ok(());
        }

        if let Some(role) = inner.role {
            self.store.delete(&keys::transcript(role, inner.mode)).await?;
        }
        inner.messages.clear();
        inner.notice = Some(Notice::new(PRIVACY_ENABLED_NOTICE));
        self.epoch.fetch_add(1, Ordering::SeqCst);
        drop(inner);

        self.gateway.reset().await;
        info!("privacy mode enabled, transcript cleared");
        Ok(())
    }

    /// Raise a transient notice without touching chat data.
    pub async fn notify(&self, text: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.notice = Some(Notice::new(text));
    }

    /// Clear the transcript ahead of a sample exchange and, for doctors,
    /// switch to the sample's intended audience. Patients stay pinned to
    /// patient mode. Always restarts the model conversation.
    pub async fn begin_sample(&self, target: AudienceMode) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            let Some(role) = inner.role else {
                return Err(ChatError::NoActiveSession);
            };

            inner.messages.clear();
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if role == UserRole::Doctor && inner.mode != target {
                inner.mode = target;
                self.store.put(keys::MODE, target.as_str().to_string()).await?;
            }
            self.persist_transcript(&inner).await?;
        }

        self.gateway.reset().await;
        Ok(())
    }

    /// Send a typed message: the text is both the transcript entry and the
    /// prompt. No-op for whitespace-only text and while a request is already
    /// in flight.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        self.dispatch(Some(trimmed.to_string()), trimmed.to_string(), None)
            .await
    }

    /// Dispatch one exchange with the model gateway.
    ///
    /// `display` is appended as the user transcript entry when present
    /// (uploads append their own entry before extraction and pass `None`).
    /// `gateway_mode` overrides the audience the prompt is generated under
    /// without moving the transcript off the active pair (sample runs under a
    /// pinned patient role use this).
    ///
    /// A gateway failure appends a structured error payload instead of the
    /// reply, so failures render through the normal path. A reply that
    /// arrives after the session has switched away is discarded.
    pub async fn dispatch(
        &self,
        display: Option<String>,
        prompt: String,
        gateway_mode: Option<AudienceMode>,
    ) -> Result<()> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("request already in flight, ignoring dispatch");
            return Ok(());
        }

        let result = self.exchange(display, prompt, gateway_mode).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn exchange(
        &self,
        display: Option<String>,
        prompt: String,
        gateway_mode: Option<AudienceMode>,
    ) -> Result<()> {
        let request_id = Uuid::new_v4();

        let (mode, epoch) = {
            let mut inner = self.inner.lock().await;
            if inner.role.is_none() {
                return Err(ChatError::NoActiveSession);
            }
            if let Some(display) = display {
                inner.messages.push(Message::user(display));
                self.persist_transcript(&inner).await?;
            }
            (
                gateway_mode.unwrap_or(inner.mode),
                self.epoch.load(Ordering::SeqCst),
            )
        };

        info!(
            request_id = %request_id,
            mode = mode.as_str(),
            "dispatching prompt to the model gateway"
        );

        let reply = match self.gateway.generate(mode, &prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(request_id = %request_id, "model gateway call failed: {}", err);
                StructuredResponse::failure(
                    GATEWAY_FAILURE_SUMMARY,
                    "Analysis Error",
                    GATEWAY_FAILURE_EXPLANATION,
                )
                .to_json()
            }
        };

        let mut inner = self.inner.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            warn!(
                request_id = %request_id,
                "session switched mid-request, discarding stale reply"
            );
            return Ok(());
        }
        inner.messages.push(Message::ai(reply));
        self.persist_transcript(&inner).await
    }

    /// Append a user transcript entry without prompting the model.
    pub async fn append_user(&self, text: impl Into<String>) -> Result<()> {
        self.append(Message::user(text)).await
    }

    /// Append a raw AI payload without prompting the model. Used for
    /// synthesized error payloads.
    pub async fn append_ai(&self, payload: impl Into<String>) -> Result<()> {
        self.append(Message::ai(payload)).await
    }

    async fn append(&self, message: Message) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.role.is_none() {
            return Err(ChatError::NoActiveSession);
        }
        inner.messages.push(message);
        self.persist_transcript(&inner).await
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            role: inner.role,
            mode: inner.mode,
            privacy: inner.privacy,
            loading: self.is_loading(),
            notice: inner
                .notice
                .as_ref()
                .filter(|notice| notice.is_active())
                .map(|notice| notice.text.clone()),
            messages: inner.messages.clone(),
        }
    }

    /// Load a persisted transcript; a corrupt record reads as empty.
    async fn load_transcript(&self, role: UserRole, mode: AudienceMode) -> Result<Vec<Message>> {
        let Some(raw) = self.store.get(&keys::transcript(role, mode)).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(messages) => Ok(messages),
            Err(err) => {
                warn!(
                    role = role.as_str(),
                    mode = mode.as_str(),
                    "persisted transcript is corrupt, starting empty: {}",
                    err
                );
                Ok(Vec::new())
            }
        }
    }

    /// Rewrite the whole transcript for the active pair. One write per
    /// mutation, so the store never sees a partial message list.
    async fn persist_transcript(&self, inner: &SessionInner) -> Result<()> {
        let Some(role) = inner.role else {
            return Ok(());
        };
        let serialized = serde_json::to_string(&inner.messages)?;
        self.store
            .put(&keys::transcript(role, inner.mode), serialized)
            .await
    }
}
