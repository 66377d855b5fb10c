use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::any,
};
use serde::Deserialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::AppState;
use crate::config::AppConfig;
use crate::engine::{EngineRequest, GatewayError, TeneoClient};
use crate::session::{SessionDescriptor, TokenError};

/// Sentinel reissued instead of a token when the session was ended.
/// The session is intentionally unrecoverable afterwards.
const SESSION_ENDED: &str = "Session Ended.";

/// Exact client-facing explanation for a request that satisfies neither
/// parameter set. The trailing space is part of the contract.
const MISSING_PARAMS_MESSAGE: &str = "Expecting either both \"endpoint\" and \"subdomain\" parameters or a single \"session\" parameter. Optional parameters \"userinput\", \"command\", \"endsession\". ";

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let backend = TeneoClient::new(Duration::from_secs(config.backend.timeout_secs))?;

    let state = AppState {
        backend: Arc::new(backend),
        config: config.clone(),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the router. Separated from [`start_server`] so tests can mount it
/// over a stub backend.
pub fn router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/", any(dialogue))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(request_timeout, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters for the dialogue route. Method-agnostic; everything
/// travels in the query string.
#[derive(Debug, Deserialize)]
struct DialogueParams {
    /// Composite session token for a continuation call.
    #[serde(default)]
    session: Option<String>,
    /// Backend deployment identifier (new-session branch).
    #[serde(default)]
    endpoint: Option<String>,
    /// Backend routing namespace (new-session branch).
    #[serde(default)]
    subdomain: Option<String>,
    /// User utterance to forward.
    #[serde(default)]
    userinput: Option<String>,
    /// Explicit engine command to forward.
    #[serde(default)]
    command: Option<String>,
    /// Presence flag: end the session.
    #[serde(default)]
    endsession: Option<String>,
}

/// Errors surfaced to the client by the dialogue handler.
#[derive(Debug, thiserror::Error)]
enum ApiError {
    /// Neither a session token nor both routing parameters were supplied.
    #[error("{MISSING_PARAMS_MESSAGE}")]
    MissingParameters,

    /// The supplied session token could not be decoded.
    #[error("invalid \"session\" parameter: {0}")]
    MalformedToken(#[from] TokenError),

    /// The backend round-trip failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The backend issued no cookies and the client held no token; there is
    /// no session state left to reissue.
    #[error("dialogue engine issued no session cookies and no session token was provided")]
    InconsistentSessionState,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingParameters | Self::MalformedToken(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(GatewayError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Gateway(_) | Self::InconsistentSessionState => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            error!(name: "gateway.backend_failure", error = %self, "Backend call failed");
        }

        (status, self.to_string()).into_response()
    }
}

/// The dialogue route: decode or construct the session descriptor, perform
/// the single backend round-trip, reconcile session state, and reissue the
/// token inside the backend payload.
async fn dialogue(
    State(state): State<AppState>,
    Query(params): Query<DialogueParams>,
) -> Result<Json<Value>, ApiError> {
    let original_token = params.session.as_deref().filter(|s| !s.is_empty());

    // Token takes precedence; explicit routing coordinates start a session.
    let descriptor = if let Some(token) = original_token {
        SessionDescriptor::decode(token)?
    } else if let (Some(endpoint), Some(subdomain)) = (&params.endpoint, &params.subdomain) {
        SessionDescriptor::new_session(endpoint.clone(), subdomain.clone())
    } else {
        return Err(ApiError::MissingParameters);
    };

    let end_session = params.endsession.is_some();

    info!(
        name: "gateway.request",
        endpoint = %descriptor.endpoint,
        continuation = original_token.is_some(),
        end_session,
        "Dialogue request"
    );

    let request = EngineRequest {
        descriptor: descriptor.clone(),
        user_input: params.userinput.clone(),
        command: params.command.clone(),
        end_session,
    };

    let reply = state.backend.converse(request).await?;

    // Post-call reconciliation, in precedence order: ended session, renewed
    // cookies, echoed client token.
    let session_id = if end_session {
        SESSION_ENDED.to_string()
    } else if let Some(renewed) = reply.renewed {
        SessionDescriptor {
            primary_cookie: renewed.primary,
            affinity_cookie: renewed.affinity,
            endpoint: descriptor.endpoint,
            subdomain: descriptor.subdomain,
        }
        .encode()
    } else if let Some(token) = original_token {
        token.to_string()
    } else {
        return Err(ApiError::InconsistentSessionState);
    };

    let mut payload = reply.payload;
    payload.insert("sessionId".to_string(), Value::String(session_id));

    Ok(Json(Value::Object(payload)))
}
