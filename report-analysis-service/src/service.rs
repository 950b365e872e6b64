use axum::{
    Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chat_flow::{
    ChatError, ChatState, InMemoryStore, KeyValueStore, PostgresStore, StructuredResponse,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::gateway::OpenRouterGateway;
use crate::ingest::{self, IngestError};
use crate::models::{
    ChangeModeRequest, PrivacyRequest, SampleRequest, SelectRoleRequest, SendMessageRequest,
    SessionView,
};
use crate::prompts;
use crate::samples::SampleKind;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn chat_error(context: &str, err: ChatError) -> ApiError {
    match err {
        ChatError::NoActiveSession => bad_request_error("Select a role before chatting"),
        other => {
            error!("{}: {}", context, other);
            internal_error(context, &other.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatState>,
}

pub async fn create_app() -> Router {
    let app_state = create_app_state().await;
    build_router(app_state)
}

async fn create_app_state() -> AppState {
    let store = create_store().await;
    let gateway = Arc::new(OpenRouterGateway::from_env());
    let chat = Arc::new(ChatState::new(store, gateway));

    if let Err(err) = chat.restore().await {
        error!("Failed to restore persisted session: {}", err);
    }

    AppState { chat }
}

async fn create_store() -> Arc<dyn KeyValueStore> {
    match std::env::var("DATABASE_URL") {
        Ok(database_url) => match PostgresStore::connect(&database_url).await {
            Ok(store) => {
                info!("Using PostgreSQL persistence");
                Arc::new(store)
            }
            Err(err) => {
                error!("Failed to connect to PostgreSQL: {}", err);
                std::process::exit(1);
            }
        },
        Err(_) => {
            info!("DATABASE_URL not set, using in-memory persistence");
            Arc::new(InMemoryStore::new())
        }
    }
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/chat", get(get_chat))
        .route("/chat/message", post(send_message))
        .route("/chat/upload", post(upload_report))
        .route("/chat/sample", post(run_sample))
        .route("/session/role", post(select_role))
        .route("/session/mode", post(change_mode))
        .route("/session/privacy", post(set_privacy))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Medical Report Chat Service",
        "version": "1.0.0",
        "description": "Audience-tailored structured analysis of medical reports",
        "endpoints": {
            "GET /chat": "Session state and rendered transcript",
            "POST /chat/message": "Send a typed message",
            "POST /chat/upload": "Upload a PDF report for analysis",
            "POST /chat/sample": "Analyze a built-in sample report",
            "POST /session/role": "Select the patient or doctor role",
            "POST /session/mode": "Switch the audience mode (doctors only)",
            "POST /session/privacy": "Toggle privacy mode",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn session_view(state: &AppState) -> SessionView {
    SessionView::from_snapshot(state.chat.snapshot().await)
}

async fn get_chat(State(state): State<AppState>) -> Json<SessionView> {
    Json(session_view(&state).await)
}

async fn select_role(
    State(state): State<AppState>,
    Json(request): Json<SelectRoleRequest>,
) -> ApiResult<SessionView> {
    state
        .chat
        .select_role(request.role)
        .await
        .map_err(|err| chat_error("Failed to select role", err))?;
    Ok(Json(session_view(&state).await))
}

async fn change_mode(
    State(state): State<AppState>,
    Json(request): Json<ChangeModeRequest>,
) -> ApiResult<SessionView> {
    state
        .chat
        .change_mode(request.mode)
        .await
        .map_err(|err| chat_error("Failed to change mode", err))?;
    Ok(Json(session_view(&state).await))
}

async fn set_privacy(
    State(state): State<AppState>,
    Json(request): Json<PrivacyRequest>,
) -> ApiResult<SessionView> {
    state
        .chat
        .set_privacy(request.enabled)
        .await
        .map_err(|err| chat_error("Failed to toggle privacy mode", err))?;
    Ok(Json(session_view(&state).await))
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<SessionView> {
    state
        .chat
        .send_text(&request.text)
        .await
        .map_err(|err| chat_error("Failed to send message", err))?;
    Ok(Json(session_view(&state).await))
}

async fn upload_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<SessionView> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request_error(&format!("Malformed upload: {err}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("report.pdf").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| bad_request_error(&format!("Malformed upload: {err}")))?
                .to_vec();
            upload = Some((file_name, bytes));
            break;
        }
    }

    let Some((file_name, bytes)) = upload else {
        return Err(bad_request_error("A 'file' field is required"));
    };

    analyze_upload(&state.chat, &file_name, bytes)
        .await
        .map_err(|err| chat_error("Failed to analyze upload", err))?;
    Ok(Json(session_view(&state).await))
}

async fn run_sample(
    State(state): State<AppState>,
    Json(request): Json<SampleRequest>,
) -> ApiResult<SessionView> {
    analyze_sample(&state.chat, request.kind)
        .await
        .map_err(|err| chat_error("Failed to run sample analysis", err))?;
    Ok(Json(session_view(&state).await))
}

/// The upload flow. An unsupported format is rejected pre-flight with a
/// notice and no state change; an extraction failure lands in the transcript
/// as a structured error payload; extracted text dispatches like a typed
/// message under the fixed analysis template.
pub(crate) async fn analyze_upload(
    chat: &ChatState,
    file_name: &str,
    bytes: Vec<u8>,
) -> chat_flow::Result<()> {
    if chat.is_loading() {
        return Ok(());
    }

    if !ingest::looks_like_pdf(&bytes) {
        chat.notify(IngestError::UnsupportedFormat.to_string()).await;
        return Ok(());
    }

    chat.append_user(format!("Analyzing report: {}", file_name))
        .await?;

    match ingest::extract_report_text(bytes).await {
        Ok(text) => {
            chat.dispatch(None, prompts::report_analysis_prompt(&text), None)
                .await
        }
        Err(err) => {
            warn!(file_name, "report extraction failed: {}", err);
            let payload = StructuredResponse::failure(
                &err.to_string(),
                "PDF Error",
                "Please try a different file.",
            )
            .to_json();
            chat.append_ai(payload).await
        }
    }
}

/// The sample flow: clear first, then dispatch, so the replaced transcript is
/// observable before the new exchange begins. The prompt always runs under
/// the sample's audience even when the role pins the visible mode.
pub(crate) async fn analyze_sample(chat: &ChatState, kind: SampleKind) -> chat_flow::Result<()> {
    let mode = kind.audience();
    chat.begin_sample(mode).await?;
    chat.dispatch(
        Some(kind.display_line()),
        prompts::sample_analysis_prompt(kind.report_text()),
        Some(mode),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_flow::{AudienceMode, MessageOrigin, ModelGateway, UserRole};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingGateway {
        calls: AtomicUsize,
        modes: tokio::sync::Mutex<Vec<AudienceMode>>,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                modes: tokio::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelGateway for RecordingGateway {
        async fn generate(&self, mode: AudienceMode, _prompt: &str) -> chat_flow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.modes.lock().await.push(mode);
            Ok(r#"{"summary": "Parsed fine.", "keyFindings": []}"#.to_string())
        }

        async fn reset(&self) {}
    }

    fn test_chat() -> (Arc<ChatState>, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::new());
        let chat = Arc::new(ChatState::new(
            Arc::new(InMemoryStore::new()),
            gateway.clone(),
        ));
        (chat, gateway)
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_without_touching_the_session() {
        let (chat, gateway) = test_chat();
        chat.select_role(UserRole::Patient).await.unwrap();
        chat.send_text("before").await.unwrap();
        let before = chat.snapshot().await.messages;

        analyze_upload(&chat, "notes.txt", b"plain text file".to_vec())
            .await
            .unwrap();

        let snapshot = chat.snapshot().await;
        assert_eq!(snapshot.messages, before, "transcript unchanged");
        assert_eq!(
            snapshot.notice.as_deref(),
            Some("Invalid file format. Please upload a PDF file.")
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1, "no extra gateway call");
    }

    #[tokio::test]
    async fn unreadable_pdf_appends_a_structured_error_exchange() {
        let (chat, gateway) = test_chat();
        chat.select_role(UserRole::Patient).await.unwrap();

        analyze_upload(&chat, "scan.pdf", b"%PDF-1.4 truncated".to_vec())
            .await
            .unwrap();

        let snapshot = chat.snapshot().await;
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].origin, MessageOrigin::User);
        assert_eq!(snapshot.messages[0].text, "Analyzing report: scan.pdf");
        assert_eq!(snapshot.messages[1].origin, MessageOrigin::Ai);

        let payload: StructuredResponse =
            serde_json::from_str(&snapshot.messages[1].text).unwrap();
        assert_eq!(payload.key_findings[0].title, "PDF Error");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0, "no gateway call");
    }

    #[tokio::test]
    async fn doctor_sample_under_a_patient_role_keeps_the_mode_pinned() {
        let (chat, gateway) = test_chat();
        chat.select_role(UserRole::Patient).await.unwrap();
        chat.send_text("old conversation").await.unwrap();

        analyze_sample(&chat, SampleKind::Doctor).await.unwrap();

        let snapshot = chat.snapshot().await;
        assert_eq!(snapshot.mode, AudienceMode::Patient);
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].text, "Analyzing sample doctor report...");
        assert_eq!(snapshot.messages[1].origin, MessageOrigin::Ai);

        // The prompt itself still ran under the sample's audience.
        assert_eq!(
            gateway.modes.lock().await.last(),
            Some(&AudienceMode::Doctor)
        );
    }

    #[tokio::test]
    async fn doctor_sample_switches_a_doctor_session_to_doctor_mode() {
        let (chat, _) = test_chat();
        chat.select_role(UserRole::Doctor).await.unwrap();
        chat.change_mode(AudienceMode::Patient).await.unwrap();

        analyze_sample(&chat, SampleKind::Doctor).await.unwrap();

        assert_eq!(chat.snapshot().await.mode, AudienceMode::Doctor);
    }
}
