//! Teneo Session Gateway
//!
//! A stateless HTTP gateway that bridges a client to the Teneo dialogue
//! engine, preserving server-side session affinity across calls without any
//! server-side storage. Session identity (two backend-issued cookies plus
//! routing coordinates) is packed into a single opaque token the client
//! carries between calls.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP surface, one method-agnostic dialogue route
//! - **Engine client**: one form-encoded POST per request to the dialogue
//!   engine, behind the [`engine::DialogueBackend`] trait
//! - **Session codec**: reversible descriptor-to-token mapping
//!
//! # Modules
//!
//! - [`config`]: CLI, file, and environment configuration
//! - [`engine`]: dialogue engine client and backend trait
//! - [`server`]: router and request orchestration
//! - [`session`]: session descriptor and token codec

pub mod config;
pub mod engine;
pub mod server;
pub mod session;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::DialogueBackend;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Dialogue engine backend used for the per-request round-trip.
    pub backend: Arc<dyn DialogueBackend>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}
