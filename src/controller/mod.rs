//! Session & streaming controller.
//!
//! A [`Controller`] owns everything one open chat page sees: the persona
//! sessions, which one is active, the in-flight latch, and the usage gate.
//! It forwards visitor input to the [`ChatBackend`] and plays the reply back
//! as a simulated stream, emitting a [`ControllerEvent`] for every mutation.
//!
//! # Sequencing
//!
//! - At most one session per persona; selecting a persona again reactivates
//!   its session.
//! - One latch (`is_loading`) covers the external call *and* the playback.
//!   While it is set, further submissions are no-ops, in any session.
//! - The latch is released by a drop guard, so it is cleared on success,
//!   failure, and task cancellation alike.
//! - State sits behind a single mutex that is never held across an `.await`.

mod playback;

pub use playback::{PlaybackSettings, word_prefixes};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::{ChatBackend, ChatRequest, HistoryEntry};
use crate::error::AppError;
use crate::events::ControllerEvent;
use crate::persona::Persona;
use crate::session::{ChatMessage, Session};
use crate::usage::{DEFAULT_FREE_LIMIT, UsageGate, UsageSnapshot};

/// Assistant message substituted for a failed chat call.
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Capacity of the per-controller event channel.
const EVENT_CAPACITY: usize = 256;

/// Tunables for a controller.
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    /// Free interactions for unauthenticated visitors.
    pub free_limit: u32,
    pub playback: PlaybackSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            free_limit: DEFAULT_FREE_LIMIT,
            playback: PlaybackSettings::default(),
        }
    }
}

/// Result of a submission attempt.
///
/// Only `Accepted` dispatches anything; the other variants are guards that
/// silently block the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    Accepted,
    /// Empty or whitespace-only input.
    EmptyInput,
    /// A call or playback is still in flight.
    Busy,
    NoActiveSession,
    /// The unauthenticated free interactions are used up.
    LimitReached,
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub persona: Persona,
    pub persona_name: &'static str,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

/// Everything the page renders from.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub workspace_id: String,
    pub sessions: Vec<SessionView>,
    pub active_session_id: Option<String>,
    pub is_loading: bool,
    pub signed_in: bool,
    pub usage: UsageSnapshot,
}

/// Per-page session and streaming controller. Cheap to clone.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    id: String,
    state: Mutex<ControllerState>,
    backend: Arc<dyn ChatBackend>,
    playback: PlaybackSettings,
    events: broadcast::Sender<ControllerEvent>,
}

#[derive(Debug)]
struct ControllerState {
    sessions: Vec<Session>,
    active: Option<String>,
    is_loading: bool,
    usage: UsageGate,
    signed_in: bool,
    last_activity: Instant,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.inner.id)
            .field("playback", &self.inner.playback)
            .finish()
    }
}

impl ControllerState {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    fn view(&self, session: &Session) -> SessionView {
        SessionView {
            id: session.id().to_string(),
            persona: session.persona(),
            persona_name: session.persona().name(),
            is_active: self.active.as_deref() == Some(session.id()),
            created_at: session.created_at(),
            messages: session.messages().to_vec(),
        }
    }

    fn usage_event(&self) -> ControllerEvent {
        ControllerEvent::UsageChanged(self.usage.snapshot(self.signed_in))
    }
}

impl Controller {
    /// Create a controller opened on the default persona's session.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, settings: ControllerSettings) -> Self {
        let session = Session::new(Persona::default());
        let active = Some(session.id().to_string());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(ControllerInner {
                id: Uuid::new_v4().to_string(),
                state: Mutex::new(ControllerState {
                    sessions: vec![session],
                    active,
                    is_loading: false,
                    usage: UsageGate::new(settings.free_limit),
                    signed_in: false,
                    last_activity: Instant::now(),
                }),
                backend,
                playback: settings.playback,
                events,
            }),
        }
    }

    /// Workspace identifier of this controller.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Subscribe to state-change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    /// Time since the last operation on this controller.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.inner.state.lock().last_activity.elapsed()
    }

    fn emit(&self, event: ControllerEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let state = self.inner.state.lock();
        WorkspaceSnapshot {
            workspace_id: self.inner.id.clone(),
            sessions: state.sessions.iter().map(|s| state.view(s)).collect(),
            active_session_id: state.active.clone(),
            is_loading: state.is_loading,
            signed_in: state.signed_in,
            usage: state.usage.snapshot(state.signed_in),
        }
    }

    #[must_use]
    pub fn session(&self, id: &str) -> Option<SessionView> {
        let state = self.inner.state.lock();
        state.sessions.iter().find(|s| s.id() == id).map(|s| state.view(s))
    }

    #[must_use]
    pub fn active_session(&self) -> Option<SessionView> {
        let state = self.inner.state.lock();
        let active = state.active.as_deref()?;
        state
            .sessions
            .iter()
            .find(|s| s.id() == active)
            .map(|s| state.view(s))
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.state.lock().sessions.len()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading
    }

    #[must_use]
    pub fn interaction_count(&self) -> u32 {
        self.inner.state.lock().usage.count()
    }

    #[must_use]
    pub fn usage(&self) -> UsageSnapshot {
        let state = self.inner.state.lock();
        state.usage.snapshot(state.signed_in)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Record the visitor's current auth status.
    pub fn observe_auth(&self, signed_in: bool) {
        let mut state = self.inner.state.lock();
        state.touch();
        if state.signed_in != signed_in {
            state.signed_in = signed_in;
            let event = state.usage_event();
            self.emit(event);
        }
    }

    /// Activate the persona's session, creating it on first selection.
    pub fn select_persona(&self, persona: Persona) -> SessionView {
        let mut state = self.inner.state.lock();
        state.touch();

        let existing = state.sessions.iter().position(|s| s.persona() == persona);
        let created = existing.is_none();
        let pos = existing.unwrap_or_else(|| {
            state.sessions.push(Session::new(persona));
            state.sessions.len() - 1
        });

        state.active = Some(state.sessions[pos].id().to_string());
        let view = state.view(&state.sessions[pos]);

        tracing::info!(
            workspace_id = %self.inner.id,
            session_id = %view.id,
            persona = %persona,
            created,
            "Session selected"
        );

        self.emit(ControllerEvent::SessionSelected {
            session: view.clone(),
            created,
        });
        view
    }

    /// Make an existing session the active one.
    pub fn activate_session(&self, id: &str) -> Result<SessionView, AppError> {
        let mut state = self.inner.state.lock();
        state.touch();

        let pos = state
            .sessions
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        state.active = Some(id.to_string());
        let view = state.view(&state.sessions[pos]);

        tracing::debug!(workspace_id = %self.inner.id, session_id = %id, "Session activated");
        self.emit(ControllerEvent::SessionSelected {
            session: view.clone(),
            created: false,
        });
        Ok(view)
    }

    /// Remove a session.
    ///
    /// Returns the session active afterwards. Deleting the active session
    /// hands activity to the first remaining session; deleting the last one
    /// reseeds a fresh default session.
    pub fn delete_session(&self, id: &str) -> Result<String, AppError> {
        let mut state = self.inner.state.lock();
        state.touch();

        let pos = state
            .sessions
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        state.sessions.remove(pos);

        let reseeded = if state.sessions.is_empty() {
            let session = Session::new(Persona::default());
            state.active = Some(session.id().to_string());
            state.sessions.push(session);
            Some(state.view(&state.sessions[0]))
        } else {
            if state.active.as_deref() == Some(id) {
                state.active = state.sessions.first().map(|s| s.id().to_string());
            }
            None
        };
        let active = state.active.clone().unwrap_or_default();

        tracing::info!(
            workspace_id = %self.inner.id,
            session_id = %id,
            active_session_id = %active,
            remaining = state.sessions.len(),
            reseeded = reseeded.is_some(),
            "Session deleted"
        );

        self.emit(ControllerEvent::SessionDeleted {
            session_id: id.to_string(),
            active_session_id: active.clone(),
        });
        if let Some(session) = reseeded {
            self.emit(ControllerEvent::SessionSelected {
                session,
                created: true,
            });
        }
        Ok(active)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────

    /// Run the guards and, if they pass, append the user message and take
    /// the latch.
    ///
    /// The returned [`Turn`] performs the external call and the playback; the
    /// latch is held until it finishes or is dropped.
    pub fn admit(&self, text: &str, signed_in: bool) -> Result<Turn, SendOutcome> {
        if text.trim().is_empty() {
            return Err(SendOutcome::EmptyInput);
        }

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        state.touch();
        state.signed_in = signed_in;

        if state.is_loading {
            tracing::debug!(workspace_id = %self.inner.id, "Send ignored, request in flight");
            return Err(SendOutcome::Busy);
        }

        if !state.usage.allows(signed_in) {
            state.usage.force_banner();
            tracing::info!(
                workspace_id = %self.inner.id,
                count = state.usage.count(),
                limit = state.usage.limit(),
                "Send rejected, free interactions exhausted"
            );
            let event = state.usage_event();
            self.emit(event);
            return Err(SendOutcome::LimitReached);
        }

        let Some(active) = state.active.clone() else {
            return Err(SendOutcome::NoActiveSession);
        };
        let Some(session) = state.session_mut(&active) else {
            return Err(SendOutcome::NoActiveSession);
        };

        let persona = session.persona();
        let conversation_history = session.messages().iter().map(HistoryEntry::from).collect();
        let message = ChatMessage::user(text);
        let index = session.add_message(message.clone());

        self.emit(ControllerEvent::MessageAppended {
            session_id: active.clone(),
            index,
            message,
        });

        state.is_loading = true;
        self.emit(ControllerEvent::LoadingChanged { is_loading: true });

        if !signed_in {
            state.usage.record(signed_in);
            let event = state.usage_event();
            self.emit(event);
        }

        tracing::info!(
            workspace_id = %self.inner.id,
            session_id = %active,
            persona = %persona,
            interaction_count = state.usage.count(),
            "User message accepted"
        );

        Ok(Turn {
            controller: self.clone(),
            session_id: active,
            persona,
            request: ChatRequest {
                message: text.to_string(),
                conversation_history,
                current_agent: persona,
            },
            latch: LoadingLatch {
                controller: self.clone(),
            },
        })
    }

    /// Submit a message and wait until the reply has been fully played back.
    pub async fn send_user_message(&self, text: &str, signed_in: bool) -> SendOutcome {
        match self.admit(text, signed_in) {
            Ok(turn) => {
                turn.run().await;
                SendOutcome::Accepted
            }
            Err(outcome) => outcome,
        }
    }

    /// Submit a message and run the reply on a background task.
    ///
    /// The user message is appended before this returns.
    pub fn spawn_user_message(&self, text: &str, signed_in: bool) -> SendOutcome {
        match self.admit(text, signed_in) {
            Ok(turn) => {
                tokio::spawn(turn.run());
                SendOutcome::Accepted
            }
            Err(outcome) => outcome,
        }
    }

    fn append(&self, session_id: &str, message: ChatMessage) -> Option<usize> {
        let mut state = self.inner.state.lock();
        let Some(session) = state.session_mut(session_id) else {
            tracing::warn!(
                workspace_id = %self.inner.id,
                session_id = %session_id,
                "Session deleted before reply arrived, dropping reply"
            );
            return None;
        };
        let index = session.add_message(message.clone());
        self.emit(ControllerEvent::MessageAppended {
            session_id: session_id.to_string(),
            index,
            message,
        });
        Some(index)
    }

    async fn play_back(&self, session_id: &str, index: usize, text: &str) {
        let prefixes = word_prefixes(text);
        tracing::debug!(
            workspace_id = %self.inner.id,
            session_id = %session_id,
            words = prefixes.len(),
            "Starting playback"
        );

        for prefix in prefixes {
            if !self.reveal(session_id, index, prefix) {
                return;
            }
            tokio::time::sleep(self.inner.playback.next_delay()).await;
        }

        let mut state = self.inner.state.lock();
        if let Some(session) = state.session_mut(session_id)
            && session.finish_streaming()
        {
            self.emit(ControllerEvent::StreamDone {
                session_id: session_id.to_string(),
            });
        }
    }

    fn reveal(&self, session_id: &str, index: usize, content: &str) -> bool {
        let mut state = self.inner.state.lock();
        let updated = state
            .session_mut(session_id)
            .is_some_and(|s| s.update_streaming(content));
        if updated {
            self.emit(ControllerEvent::MessageUpdated {
                session_id: session_id.to_string(),
                index,
                content: content.to_string(),
                is_streaming: true,
            });
        }
        updated
    }

    fn release_latch(&self) {
        let mut state = self.inner.state.lock();
        state.is_loading = false;
        state.touch();
        self.emit(ControllerEvent::LoadingChanged { is_loading: false });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Overlays
    // ─────────────────────────────────────────────────────────────────────

    /// Show the initial sign-in popup after `delay`, if still appropriate.
    pub fn schedule_login_prompt(&self, delay: Duration) -> tokio::task::JoinHandle<bool> {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.fire_login_prompt()
        })
    }

    /// Show the initial popup now. Returns whether it became visible.
    pub fn fire_login_prompt(&self) -> bool {
        let mut state = self.inner.state.lock();
        let signed_in = state.signed_in;
        let shown = state.usage.show_initial_popup(signed_in);
        if shown {
            tracing::debug!(workspace_id = %self.inner.id, "Initial sign-in popup shown");
            let event = state.usage_event();
            self.emit(event);
        }
        shown
    }

    pub fn dismiss_popup(&self) {
        let mut state = self.inner.state.lock();
        state.touch();
        state.usage.dismiss_popup();
        let event = state.usage_event();
        self.emit(event);
    }

    /// Hide the banner; refused while the free interactions are exhausted.
    pub fn dismiss_banner(&self) -> bool {
        let mut state = self.inner.state.lock();
        state.touch();
        let signed_in = state.signed_in;
        let dismissed = state.usage.dismiss_banner(signed_in);
        if dismissed {
            let event = state.usage_event();
            self.emit(event);
        }
        dismissed
    }
}

/// Clears the in-flight latch when dropped.
struct LoadingLatch {
    controller: Controller,
}

impl Drop for LoadingLatch {
    fn drop(&mut self) {
        self.controller.release_latch();
    }
}

/// An admitted submission awaiting its reply.
pub struct Turn {
    controller: Controller,
    session_id: String,
    persona: Persona,
    request: ChatRequest,
    latch: LoadingLatch,
}

impl std::fmt::Debug for Turn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Turn")
            .field("session_id", &self.session_id)
            .field("persona", &self.persona)
            .finish_non_exhaustive()
    }
}

impl Turn {
    /// Call the backend, then append and play back the reply (or the error
    /// message). Releases the latch on exit.
    pub async fn run(self) {
        let Turn {
            controller,
            session_id,
            persona,
            request,
            latch,
        } = self;

        match controller.inner.backend.send(request).await {
            Ok(reply) => {
                let author = reply.persona().unwrap_or(persona);
                tracing::info!(
                    workspace_id = %controller.inner.id,
                    session_id = %session_id,
                    persona = %author,
                    reply_length = reply.message.len(),
                    tools_used = ?reply.tools_used,
                    "Chat reply received"
                );
                if let Some(index) =
                    controller.append(&session_id, ChatMessage::streaming(author, &reply.message))
                {
                    controller.play_back(&session_id, index, &reply.message).await;
                }
            }
            Err(e) => {
                tracing::error!(
                    workspace_id = %controller.inner.id,
                    session_id = %session_id,
                    error = %e,
                    "Chat call failed"
                );
                controller.append(&session_id, ChatMessage::assistant(persona, ERROR_REPLY));
            }
        }

        drop(latch);
    }
}
