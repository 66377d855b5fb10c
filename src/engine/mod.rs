//! Dialogue engine client.
//!
//! This module owns the single outbound round-trip the gateway performs per
//! request: deriving the backend host and path from a session's routing
//! coordinates, attaching the affinity cookies, and reading back the JSON
//! payload together with any renewed affinity state.
//!
//! The [`DialogueBackend`] trait is the seam between the request orchestrator
//! and the wire: [`TeneoClient`] is the production implementation, and tests
//! substitute a stub to exercise the orchestrator without a network.

pub mod teneo;

pub use teneo::TeneoClient;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::session::SessionDescriptor;

/// Sticky-session cookie name issued by the backend servlet container.
pub const PRIMARY_COOKIE_NAME: &str = "JSESSIONID";
/// Load-balancer affinity cookie name.
pub const AFFINITY_COOKIE_NAME: &str = "ApplicationGatewayAffinity";
/// CORS variant of the affinity cookie. Same value, distinct name; the load
/// balancer requires it to route CORS-originated requests consistently.
pub const AFFINITY_CORS_COOKIE_NAME: &str = "ApplicationGatewayAffinityCORS";

/// One request-response cycle against the dialogue engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Session affinity and routing state for this call.
    pub descriptor: SessionDescriptor,
    /// User utterance to forward, if any.
    pub user_input: Option<String>,
    /// Explicit engine command to forward, if any.
    pub command: Option<String>,
    /// Whether this call terminates the session.
    pub end_session: bool,
}

/// Affinity cookie values renewed by the backend via `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewedAffinity {
    /// Renewed sticky-session identifier.
    pub primary: String,
    /// Renewed load-balancer affinity identifier.
    pub affinity: String,
}

/// Parsed backend reply: the JSON payload plus any renewed affinity state.
#[derive(Debug, Clone)]
pub struct EngineReply {
    /// The backend's JSON object payload.
    pub payload: Map<String, Value>,
    /// Renewed cookies, if the backend set any. `None` means the reply
    /// carried no `Set-Cookie` headers at all.
    pub renewed: Option<RenewedAffinity>,
}

/// Errors from the backend round-trip.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The round-trip exceeded the configured timeout.
    #[error("dialogue engine timed out")]
    Timeout,

    /// Connection-level failure: refused, reset, DNS, TLS.
    #[error("failed to reach dialogue engine: {0}")]
    Transport(String),

    /// The backend replied with something other than a JSON object.
    #[error("dialogue engine returned a malformed reply: {0}")]
    Protocol(String),
}

/// A backend capable of one dialogue round-trip per call.
#[async_trait]
pub trait DialogueBackend: Send + Sync {
    /// Perform exactly one request-response cycle. Never retried.
    async fn converse(&self, req: EngineRequest) -> Result<EngineReply, GatewayError>;
}
