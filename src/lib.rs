//! Career Mentor
//!
//! A chat front end for a multi-agent career guidance service. Visitors talk
//! to one of several mentor personas, each conversation kept in its own
//! session, and replies are revealed word by word. Unauthenticated visitors
//! get a limited number of free interactions before being asked to sign up.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server, server-rendered HTML, SSE for live updates
//! - **Controller**: per-page session and streaming state machine
//! - **Backend**: JSON client for the external chat service
//! - **Usage gate**: free-interaction counter, sign-in popup and banner
//!
//! # Modules
//!
//! - [`controller`]: sessions, send pipeline, simulated streaming
//! - [`workspace`]: one controller per open page
//! - [`usage`]: free-interaction gate
//! - [`events`]: controller events and their SSE encoding
//! - [`backend`]: chat service client

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod auth;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod persona;
pub mod render;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod usage;
pub mod workspace;

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::backend::ChatBackend;
use crate::config::AppConfig;
use crate::workspace::WorkspaceStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Global Configuration
    pub config: Arc<AppConfig>,
    /// One controller per open page.
    pub workspaces: WorkspaceStore,
    /// Identity provider token verification.
    pub verifier: TokenVerifier,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("workspaces", &self.workspaces)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build state around an existing backend.
    #[must_use]
    pub fn new(config: Arc<AppConfig>, backend: Arc<dyn ChatBackend>) -> Self {
        let workspaces = WorkspaceStore::new(backend, config.controller_settings());
        let verifier = TokenVerifier::new(config.auth.jwt_secret.as_deref());
        Self {
            config,
            workspaces,
            verifier,
        }
    }
}
