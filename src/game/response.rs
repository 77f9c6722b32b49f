//! Game API responses and their normalization.
//!
//! The two endpoint families disagree on wire shape: family B uses camelCase
//! session fields and may carry its payload under `structuredContent`
//! alongside a human-readable `result`. Each family gets its own wire struct;
//! [`normalize`] folds either into one [`GameResponse`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::transport::HttpReply;
use super::{Family, Session};

/// Server asks the client to slow down.
pub const RATE_LIMITED: &str = "rate_limited";
/// The session id is unknown to the server.
pub const SESSION_INVALID: &str = "session_invalid";
/// The session id is known but past its lifetime.
pub const SESSION_EXPIRED: &str = "session_expired";
/// The command needs a logged-in session.
pub const NOT_AUTHENTICATED: &str = "not_authenticated";
/// Produced locally when the server cannot be reached.
pub const CONNECTION_FAILED: &str = "connection_failed";
/// Produced locally for non-JSON bodies.
pub const HTTP_ERROR: &str = "http_error";

/// Wait applied to a rate-limit error that carries no `wait_seconds`.
pub const DEFAULT_RATE_LIMIT_WAIT_SECS: f64 = 10.0;
/// Upper bound on a server-requested rate-limit wait.
pub const MAX_RATE_LIMIT_WAIT_SECS: f64 = 3600.0;

/// Structured error reported by (or on behalf of) the game server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(
        default,
        alias = "waitSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_seconds: Option<f64>,
}

impl ApiError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            wait_seconds: None,
        }
    }

    /// The generic error for unreachable servers and exhausted bootstraps.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(CONNECTION_FAILED, message)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.code == RATE_LIMITED
    }

    /// Whether the error means the family's session must be renewed.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self.code.as_str(),
            SESSION_INVALID | SESSION_EXPIRED | NOT_AUTHENTICATED
        )
    }

    /// How long to back off before resubmitting a rate-limited command.
    pub fn rate_limit_wait(&self) -> Duration {
        let secs = self
            .wait_seconds
            .filter(|s| s.is_finite() && *s >= 0.0)
            .unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS)
            .min(MAX_RATE_LIMIT_WAIT_SECS);
        Duration::from_secs_f64(secs)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Normalized response of one game command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameResponse {
    /// Command payload (family B's structured result when it sent one)
    pub result: Option<Value>,
    /// Out-of-band events the server attached to the response
    pub notifications: Vec<Value>,
    /// Refreshed session, if the server rotated it
    pub session: Option<Session>,
    /// Failure reported for the command
    pub error: Option<ApiError>,
}

impl GameResponse {
    pub fn from_error(error: ApiError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Classified result of one HTTP exchange with the game server.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// A JSON body, success or structured error.
    Response(GameResponse),
    /// HTTP 401: the session is no longer accepted.
    Unauthorized,
    /// The body was not JSON; carries the HTTP status.
    Protocol { status: u16, body: String },
}

/// Classify a raw reply from `family` into a [`RequestOutcome`].
pub fn classify_reply(family: Family, reply: HttpReply) -> RequestOutcome {
    if reply.status == 401 {
        return RequestOutcome::Unauthorized;
    }
    match serde_json::from_str::<Value>(&reply.body) {
        Ok(body) if body.is_object() => RequestOutcome::Response(normalize(family, body)),
        _ => RequestOutcome::Protocol {
            status: reply.status,
            body: reply.body,
        },
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireResponseA {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    notifications: Option<Value>,
    #[serde(default)]
    session: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponseB {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    structured_content: Option<Value>,
    #[serde(default)]
    notifications: Option<Value>,
    #[serde(default)]
    session: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug)]
enum WireResponse {
    A(WireResponseA),
    B(WireResponseB),
}

#[derive(Debug, Deserialize)]
struct WireSessionA {
    #[serde(alias = "session_id")]
    id: String,
    #[serde(default)]
    player_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSessionB {
    #[serde(alias = "id")]
    session_id: String,
    #[serde(default)]
    player_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

impl From<WireSessionA> for Session {
    fn from(w: WireSessionA) -> Self {
        Session {
            id: w.id,
            player_id: w.player_id,
            created_at: w.created_at.unwrap_or_else(Utc::now),
            expires_at: w.expires_at,
        }
    }
}

impl From<WireSessionB> for Session {
    fn from(w: WireSessionB) -> Self {
        Session {
            id: w.session_id,
            player_id: w.player_id,
            created_at: w.created_at.unwrap_or_else(Utc::now),
            expires_at: w.expires_at,
        }
    }
}

fn parse_session(family: Family, raw: Value) -> Option<Session> {
    if raw.is_null() {
        return None;
    }
    let parsed = match family {
        Family::A => serde_json::from_value::<WireSessionA>(raw).map(Session::from),
        Family::B => serde_json::from_value::<WireSessionB>(raw).map(Session::from),
    };
    match parsed {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(family = %family, error = %e, "Ignoring malformed session in response");
            None
        }
    }
}

fn parse_error(raw: Value) -> Option<ApiError> {
    match raw {
        Value::Null => None,
        Value::String(message) => Some(ApiError::new("unknown_error", message)),
        other => match serde_json::from_value::<ApiError>(other.clone()) {
            Ok(err) => Some(err),
            Err(_) => Some(ApiError::new("unknown_error", other.to_string())),
        },
    }
}

fn parse_notifications(raw: Option<Value>) -> Vec<Value> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
    }
}

/// Fold a JSON body from `family` into a [`GameResponse`].
///
/// Pure: no I/O, no client state.
///
/// # Example
/// ```
/// use gamepilot::game::{normalize, Family};
/// use serde_json::json;
///
/// let body = json!({
///     "result": "You have 3 ore.",
///     "structuredContent": {"ore": 3},
///     "session": {"sessionId": "b-1", "expiresAt": "2099-01-01T00:00:00Z"}
/// });
/// let response = normalize(Family::B, body);
/// assert_eq!(response.result, Some(json!({"ore": 3})));
/// assert_eq!(response.session.unwrap().id, "b-1");
/// ```
pub fn normalize(family: Family, body: Value) -> GameResponse {
    let wire = match family {
        Family::A => serde_json::from_value(body).map(WireResponse::A),
        Family::B => serde_json::from_value(body).map(WireResponse::B),
    };

    let (result, notifications, session, error) = match wire {
        Ok(WireResponse::A(w)) => (w.result, w.notifications, w.session, w.error),
        Ok(WireResponse::B(w)) => (
            w.structured_content.or(w.result),
            w.notifications,
            w.session,
            w.error,
        ),
        Err(e) => {
            return GameResponse::from_error(ApiError::new(
                HTTP_ERROR,
                format!("unreadable response body: {}", e),
            ));
        }
    };

    GameResponse {
        result: result.filter(|v| !v.is_null()),
        notifications: parse_notifications(notifications),
        session: session.and_then(|s| parse_session(family, s)),
        error: error.and_then(parse_error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(status: u16, body: &str) -> HttpReply {
        HttpReply {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_normalize_family_a_snake_case_session() {
        let body = json!({
            "result": {"credits": 10},
            "session": {
                "id": "a-1",
                "player_id": "p-7",
                "created_at": "2030-01-01T00:00:00Z",
                "expires_at": "2030-01-01T01:00:00Z"
            }
        });
        let response = normalize(Family::A, body);
        assert!(response.is_ok());
        assert_eq!(response.result, Some(json!({"credits": 10})));
        let session = response.session.unwrap();
        assert_eq!(session.id, "a-1");
        assert_eq!(session.player_id.as_deref(), Some("p-7"));
    }

    #[test]
    fn test_normalize_family_b_camel_case_session() {
        let body = json!({
            "result": "ok",
            "session": {
                "sessionId": "b-1",
                "playerId": "p-7",
                "createdAt": "2030-01-01T00:00:00Z",
                "expiresAt": "2030-01-01T01:00:00Z"
            }
        });
        let session = normalize(Family::B, body).session.unwrap();
        assert_eq!(session.id, "b-1");
        assert_eq!(session.player_id.as_deref(), Some("p-7"));
    }

    #[test]
    fn test_structured_content_promoted_over_result() {
        let body = json!({"result": "Docked at Sol.", "structuredContent": {"docked": true}});
        let response = normalize(Family::B, body);
        assert_eq!(response.result, Some(json!({"docked": true})));
    }

    #[test]
    fn test_family_b_falls_back_to_result() {
        let body = json!({"result": "Docked at Sol."});
        let response = normalize(Family::B, body);
        assert_eq!(response.result, Some(json!("Docked at Sol.")));
    }

    #[test]
    fn test_family_a_ignores_structured_content() {
        let body = json!({"result": "text", "structuredContent": {"x": 1}});
        let response = normalize(Family::A, body);
        assert_eq!(response.result, Some(json!("text")));
    }

    #[test]
    fn test_error_with_wait_seconds() {
        let body = json!({"error": {"code": "rate_limited", "message": "slow down", "wait_seconds": 2.5}});
        let err = normalize(Family::A, body).error.unwrap();
        assert!(err.is_rate_limited());
        assert_eq!(err.rate_limit_wait(), Duration::from_millis(2500));
    }

    #[test]
    fn test_rate_limit_default_wait() {
        let err = ApiError::new(RATE_LIMITED, "");
        assert_eq!(err.rate_limit_wait(), Duration::from_secs(10));
    }

    #[test]
    fn test_huge_wait_seconds_is_capped() {
        let body = json!({"error": {"code": "rate_limited", "wait_seconds": 1e30}});
        let err = normalize(Family::A, body).error.unwrap();
        assert_eq!(err.rate_limit_wait(), Duration::from_secs(3600));
    }

    #[test]
    fn test_session_error_codes() {
        for code in [SESSION_INVALID, SESSION_EXPIRED, NOT_AUTHENTICATED] {
            assert!(ApiError::new(code, "").is_session_error());
        }
        assert!(!ApiError::new("not_enough_fuel", "").is_session_error());
        assert!(!ApiError::new(RATE_LIMITED, "").is_session_error());
    }

    #[test]
    fn test_string_error_is_wrapped() {
        let err = normalize(Family::A, json!({"error": "boom"})).error.unwrap();
        assert_eq!(err.code, "unknown_error");
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_single_notification_is_wrapped() {
        let response = normalize(Family::A, json!({"notifications": {"kind": "chat"}}));
        assert_eq!(response.notifications, vec![json!({"kind": "chat"})]);
    }

    #[test]
    fn test_malformed_session_is_dropped() {
        let response = normalize(Family::A, json!({"result": 1, "session": {"id": "x"}}));
        assert!(response.session.is_none());
        assert!(response.is_ok());
    }

    #[test]
    fn test_classify_unauthorized() {
        let outcome = classify_reply(Family::A, reply(401, r#"{"error":{"code":"x"}}"#));
        assert_eq!(outcome, RequestOutcome::Unauthorized);
    }

    #[test]
    fn test_classify_non_json_body() {
        let outcome = classify_reply(Family::B, reply(502, "<html>Bad Gateway</html>"));
        assert_eq!(
            outcome,
            RequestOutcome::Protocol {
                status: 502,
                body: "<html>Bad Gateway</html>".into()
            }
        );
    }

    #[test]
    fn test_classify_json_error_status_is_response() {
        let outcome = classify_reply(
            Family::A,
            reply(429, r#"{"error":{"code":"rate_limited","message":"wait"}}"#),
        );
        match outcome {
            RequestOutcome::Response(r) => assert!(r.error.unwrap().is_rate_limited()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(ApiError::new("x", "").to_string(), "x");
        assert_eq!(ApiError::new("x", "y").to_string(), "x: y");
    }
}
