//! Teneo engine driver.
//!
//! Performs the form-encoded POST the engine expects, with routing derived
//! from the session's endpoint and subdomain, and extracts renewed affinity
//! cookies from the reply headers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use serde_json::Value;
use tracing::debug;

use super::{
    AFFINITY_COOKIE_NAME, AFFINITY_CORS_COOKIE_NAME, DialogueBackend, EngineReply, EngineRequest,
    GatewayError, PRIMARY_COOKIE_NAME, RenewedAffinity,
};
use crate::session::SessionDescriptor;

/// Public routing domain for production deployments.
const PUBLIC_DOMAIN_SUFFIX: &str = "teneo.solutions";
/// Fixed staging host, selected by `endpoint=test`.
const STAGING_HOST: &str = "longberry-en-prod-staging.artificial-solutions.com";
/// Base path on the staging host.
const STAGING_BASE_PATH: &str = "/longberry/";
/// Path suffix that terminates a session on the engine side.
const END_SESSION_SEGMENT: &str = "endsession";
/// Fixed `viewtype` the TIE API expects on every call.
const VIEWTYPE: &str = "tieapi";

/// Production [`DialogueBackend`] speaking to a Teneo engine over HTTPS.
#[derive(Clone)]
pub struct TeneoClient {
    http: reqwest::Client,
}

impl std::fmt::Debug for TeneoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeneoClient").finish()
    }
}

impl TeneoClient {
    /// Create a client whose round-trips are aborted after `timeout`.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

/// Derive the backend host and path from a session's routing coordinates.
///
/// `endpoint=test` short-circuits to the fixed staging deployment regardless
/// of subdomain. The end-session segment is appended to the base path.
fn derive_route(descriptor: &SessionDescriptor, end_session: bool) -> (String, String) {
    let (host, base_path) = if descriptor.endpoint == "test" {
        (STAGING_HOST.to_string(), STAGING_BASE_PATH)
    } else {
        (
            format!(
                "{}.{}{PUBLIC_DOMAIN_SUFFIX}",
                descriptor.endpoint, descriptor.subdomain
            ),
            "/",
        )
    };

    let path = if end_session {
        format!("{base_path}{END_SESSION_SEGMENT}")
    } else {
        base_path.to_string()
    };

    (host, path)
}

/// Build the outbound `Cookie` header value.
///
/// All three names are always present; values may be empty on the first call
/// of a session.
fn cookie_header(descriptor: &SessionDescriptor) -> String {
    format!(
        "{PRIMARY_COOKIE_NAME}={}; {AFFINITY_COOKIE_NAME}={}; {AFFINITY_CORS_COOKIE_NAME}={}",
        descriptor.primary_cookie, descriptor.affinity_cookie, descriptor.affinity_cookie
    )
}

/// Build the form body pairs. Absent optional fields are omitted, not sent
/// empty.
fn form_pairs(req: &EngineRequest) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("viewtype", VIEWTYPE.to_string())];
    if let Some(input) = req.user_input.as_ref().filter(|s| !s.is_empty()) {
        pairs.push(("userinput", input.clone()));
    }
    if let Some(command) = req.command.as_ref().filter(|s| !s.is_empty()) {
        pairs.push(("command", command.clone()));
    }
    pairs
}

/// Extract renewed affinity values from the reply's `Set-Cookie` headers.
///
/// Returns `None` when no `Set-Cookie` header is present. When the backend
/// renews only one of the two names, the incoming descriptor value is kept
/// for the other.
fn renewed_affinity(headers: &HeaderMap, incoming: &SessionDescriptor) -> Option<RenewedAffinity> {
    let mut saw_any = false;
    let mut primary = None;
    let mut affinity = None;

    for header in headers.get_all(SET_COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        saw_any = true;

        // Only the leading name=value pair matters; attributes follow.
        let pair = raw.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        match name.trim() {
            PRIMARY_COOKIE_NAME => primary = Some(value.trim().to_string()),
            AFFINITY_COOKIE_NAME => affinity = Some(value.trim().to_string()),
            _ => {}
        }
    }

    saw_any.then(|| RenewedAffinity {
        primary: primary.unwrap_or_else(|| incoming.primary_cookie.clone()),
        affinity: affinity.unwrap_or_else(|| incoming.affinity_cookie.clone()),
    })
}

fn transport_error(err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

#[async_trait]
impl DialogueBackend for TeneoClient {
    async fn converse(&self, req: EngineRequest) -> Result<EngineReply, GatewayError> {
        let (host, path) = derive_route(&req.descriptor, req.end_session);
        let url = format!("https://{host}{path}");

        debug!(
            name: "engine.roundtrip",
            %url,
            end_session = req.end_session,
            "Posting to dialogue engine"
        );

        let response = self
            .http
            .post(&url)
            .header(COOKIE, cookie_header(&req.descriptor))
            .form(&form_pairs(&req))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let renewed = renewed_affinity(response.headers(), &req.descriptor);

        let body = response.bytes().await.map_err(|e| transport_error(&e))?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::Protocol(format!("invalid JSON body: {e}")))?;
        let Value::Object(payload) = value else {
            return Err(GatewayError::Protocol(
                "reply payload is not a JSON object".to_string(),
            ));
        };

        debug!(
            name: "engine.reply",
            renewed = renewed.is_some(),
            "Dialogue engine replied"
        );

        Ok(EngineReply { payload, renewed })
    }
}
