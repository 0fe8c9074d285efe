use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Response,
        sse::{KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::auth::Identity;
use crate::backend::HttpChatBackend;
use crate::config::AppConfig;
use crate::controller::{Controller, SendOutcome, SessionView, WorkspaceSnapshot};
use crate::error::AppError;
use crate::events::to_sse;
use crate::persona::{Persona, PersonaInfo};
use crate::render;
use crate::session::ChatMessage;
use crate::usage::UsageSnapshot;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let backend = Arc::new(HttpChatBackend::new(&config.chat.base_url)?);
    info!(
        name: "chat.config.loaded",
        endpoint = %backend.endpoint(),
        free_limit = config.usage.free_limit,
        auth_enabled = config.auth.jwt_secret.is_some(),
        "Chat backend configured"
    );

    let state = AppState::new(Arc::clone(&config), backend);
    let sweeper = state
        .workspaces
        .spawn_sweeper(config.sweep_interval(), config.idle_timeout());

    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // HTML
        .route("/", get(index_handler))
        // API
        .route("/api/personas", get(api_personas))
        .route("/api/workspaces", post(api_create_workspace))
        .route("/api/workspaces/{wid}", get(api_get_workspace))
        .route("/api/workspaces/{wid}/view", get(api_workspace_view))
        .route("/api/workspaces/{wid}/events", get(api_workspace_events))
        .route("/api/workspaces/{wid}/sessions", post(api_select_persona))
        .route(
            "/api/workspaces/{wid}/sessions/{sid}",
            axum::routing::delete(api_delete_session),
        )
        .route(
            "/api/workspaces/{wid}/sessions/{sid}/activate",
            post(api_activate_session),
        )
        .route(
            "/api/workspaces/{wid}/sessions/{sid}/messages",
            get(api_get_messages),
        )
        .route("/api/workspaces/{wid}/messages", post(api_send_message))
        .route("/api/workspaces/{wid}/popup/dismiss", post(api_dismiss_popup))
        .route("/api/workspaces/{wid}/banner/dismiss", post(api_dismiss_banner))
        // Static assets
        .nest_service("/static", ServeDir::new("static"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create a workspace for a new page load.
fn open_workspace(state: &AppState, identity: &Identity) -> Controller {
    let controller = state.workspaces.create();
    controller.observe_auth(identity.is_signed_in());
    if !identity.is_signed_in() {
        // fire-and-forget; the prompt re-checks auth when it fires
        drop(controller.schedule_login_prompt(state.config.popup_delay()));
    }
    controller
}

/// Look up a workspace and record the caller's auth status on it.
fn workspace(state: &AppState, wid: &str, identity: &Identity) -> Result<Controller, AppError> {
    let controller = state.workspaces.require(wid)?;
    controller.observe_auth(identity.is_signed_in());
    Ok(controller)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Index page handler. Every load starts a fresh workspace.
async fn index_handler(State(state): State<AppState>, identity: Identity) -> impl IntoResponse {
    let controller = open_workspace(&state, &identity);
    Html(render::render_page(
        &controller.snapshot(),
        identity.profile(),
        &state.config.auth,
    ))
}

/// GET /api/workspaces/:wid/view - Re-rendered `#workspace` fragment.
async fn api_workspace_view(
    State(state): State<AppState>,
    Path(wid): Path<String>,
    identity: Identity,
) -> Result<Html<String>, AppError> {
    let controller = workspace(&state, &wid, &identity)?;
    Ok(Html(render::render_workspace(
        &controller.snapshot(),
        identity.profile(),
        &state.config.auth,
    )))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/personas - The persona catalog.
async fn api_personas() -> Json<Vec<PersonaInfo>> {
    Json(Persona::ALL.into_iter().map(Persona::info).collect())
}

/// POST /api/workspaces - Open a workspace without rendering the page.
async fn api_create_workspace(
    State(state): State<AppState>,
    identity: Identity,
) -> (StatusCode, Json<WorkspaceSnapshot>) {
    let controller = open_workspace(&state, &identity);
    (StatusCode::CREATED, Json(controller.snapshot()))
}

/// GET /api/workspaces/:wid - Workspace snapshot.
async fn api_get_workspace(
    State(state): State<AppState>,
    Path(wid): Path<String>,
    identity: Identity,
) -> Result<Json<WorkspaceSnapshot>, AppError> {
    Ok(Json(workspace(&state, &wid, &identity)?.snapshot()))
}

/// Request body for persona selection.
#[derive(Debug, Deserialize)]
struct SelectPersonaRequest {
    /// Persona tag, e.g. `skill_builder`.
    persona: String,
}

/// POST /api/workspaces/:wid/sessions - Select a persona.
async fn api_select_persona(
    State(state): State<AppState>,
    Path(wid): Path<String>,
    identity: Identity,
    Json(req): Json<SelectPersonaRequest>,
) -> Result<Json<SessionView>, AppError> {
    let persona: Persona = req.persona.parse()?;
    let controller = workspace(&state, &wid, &identity)?;
    Ok(Json(controller.select_persona(persona)))
}

/// POST /api/workspaces/:wid/sessions/:sid/activate - Switch sessions.
async fn api_activate_session(
    State(state): State<AppState>,
    Path((wid, sid)): Path<(String, String)>,
    identity: Identity,
) -> Result<Json<SessionView>, AppError> {
    let controller = workspace(&state, &wid, &identity)?;
    Ok(Json(controller.activate_session(&sid)?))
}

/// Response from session deletion.
#[derive(Debug, Serialize)]
struct DeleteSessionResponse {
    deleted: String,
    active_session_id: String,
}

/// DELETE /api/workspaces/:wid/sessions/:sid - Delete a session.
async fn api_delete_session(
    State(state): State<AppState>,
    Path((wid, sid)): Path<(String, String)>,
    identity: Identity,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    let controller = workspace(&state, &wid, &identity)?;
    let active_session_id = controller.delete_session(&sid)?;
    Ok(Json(DeleteSessionResponse {
        deleted: sid,
        active_session_id,
    }))
}

/// GET /api/workspaces/:wid/sessions/:sid/messages - Session transcript.
async fn api_get_messages(
    State(state): State<AppState>,
    Path((wid, sid)): Path<(String, String)>,
    identity: Identity,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let controller = workspace(&state, &wid, &identity)?;
    let session = controller
        .session(&sid)
        .ok_or_else(|| AppError::SessionNotFound(sid))?;
    Ok(Json(session.messages))
}

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    /// User message content.
    message: String,
}

/// Response from the send API.
#[derive(Debug, Serialize)]
struct SendMessageResponse {
    outcome: SendOutcome,
    usage: UsageSnapshot,
}

/// POST /api/workspaces/:wid/messages - Send to the active session.
///
/// Returns as soon as the user message is appended; the reply arrives over
/// the event stream. Guard rejections are reported in `outcome`, not as
/// HTTP errors.
async fn api_send_message(
    State(state): State<AppState>,
    Path(wid): Path<String>,
    identity: Identity,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let controller = workspace(&state, &wid, &identity)?;
    let outcome = controller.spawn_user_message(&req.message, identity.is_signed_in());
    let status = if outcome == SendOutcome::Accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    let body = SendMessageResponse {
        outcome,
        usage: controller.usage(),
    };
    Ok((status, Json(body)).into_response())
}

/// POST /api/workspaces/:wid/popup/dismiss
async fn api_dismiss_popup(
    State(state): State<AppState>,
    Path(wid): Path<String>,
    identity: Identity,
) -> Result<Json<UsageSnapshot>, AppError> {
    let controller = workspace(&state, &wid, &identity)?;
    controller.dismiss_popup();
    Ok(Json(controller.usage()))
}

#[derive(Debug, Serialize)]
struct DismissBannerResponse {
    dismissed: bool,
    usage: UsageSnapshot,
}

/// POST /api/workspaces/:wid/banner/dismiss
async fn api_dismiss_banner(
    State(state): State<AppState>,
    Path(wid): Path<String>,
    identity: Identity,
) -> Result<Json<DismissBannerResponse>, AppError> {
    let controller = workspace(&state, &wid, &identity)?;
    let dismissed = controller.dismiss_banner();
    Ok(Json(DismissBannerResponse {
        dismissed,
        usage: controller.usage(),
    }))
}

/// GET /api/workspaces/:wid/events - Live controller events (SSE).
async fn api_workspace_events(
    State(state): State<AppState>,
    Path(wid): Path<String>,
    identity: Identity,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>> + Send>, AppError>
{
    let controller = workspace(&state, &wid, &identity)?;
    tracing::debug!(workspace_id = %wid, "Event stream opened");

    let mut events = BroadcastStream::new(controller.subscribe());
    let stream = async_stream::stream! {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    yield Ok::<_, Infallible>(to_sse(&event));
                }
                // the page resyncs on its next fragment fetch
                Err(e) => {
                    tracing::warn!(workspace_id = %wid, error = %e, "Event stream lagged");
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
