//! Session-aware game client.
//!
//! [`SessionClient`] owns one session slot per endpoint family and hides
//! session churn from callers. [`SessionClient::execute`] always yields a
//! [`GameResponse`]; failures travel in its `error` field.
//!
//! Recovery inside `execute` is an explicit bounded loop:
//!
//! - transport failure: both sessions are dropped and the request is retried
//!   once on fresh sessions, then `connection_failed`;
//! - `rate_limited`: sleep `wait_seconds` and resubmit, giving up after
//!   [`MAX_RATE_LIMIT_RETRIES`] consecutive occurrences;
//! - session errors and HTTP 401: renew the family's session and retry once.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::{PilotError, Result};
use crate::utils::string::preview;

use super::response::{
    classify_reply, ApiError, GameResponse, RequestOutcome, HTTP_ERROR, NOT_AUTHENTICATED,
};
use super::routing::{CommandRouter, Route};
use super::transport::{GameTransport, HttpTransport};
use super::{Credentials, Family, Session, SessionStatus};

/// Consecutive rate-limited responses tolerated before `execute` gives up.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Client for both endpoint families of the game server.
pub struct SessionClient {
    transport: Arc<dyn GameTransport>,
    router: CommandRouter,
    family_a_path: String,
    family_b_path: String,
    credentials: RwLock<Option<Credentials>>,
    // Each slot stays locked for the whole renewal, so racing callers wait
    // for the in-flight bootstrap instead of starting their own.
    slot_a: Mutex<Option<Session>>,
    slot_b: Mutex<Option<Session>>,
    rate_limit_streak: AtomicU32,
    bootstrap_attempts: u32,
    bootstrap_base_delay: Duration,
}

impl SessionClient {
    /// Create a client over an arbitrary transport.
    pub fn new(config: &GameConfig, transport: Arc<dyn GameTransport>) -> Self {
        Self {
            transport,
            router: CommandRouter::from_config(config),
            family_a_path: config.family_a_path.clone(),
            family_b_path: config.family_b_path.clone(),
            credentials: RwLock::new(None),
            slot_a: Mutex::new(None),
            slot_b: Mutex::new(None),
            rate_limit_streak: AtomicU32::new(0),
            bootstrap_attempts: config.bootstrap_attempts.max(1),
            bootstrap_base_delay: Duration::from_millis(config.bootstrap_base_delay_ms),
        }
    }

    /// Create a client talking HTTP to `config.base_url`.
    pub fn from_config(config: &GameConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Set the credentials used after every fresh session creation.
    pub fn with_credentials(self, credentials: Option<Credentials>) -> Self {
        Self {
            credentials: RwLock::new(credentials),
            ..self
        }
    }

    /// Replace the credentials. Applies from the next bootstrap on.
    pub async fn set_credentials(&self, credentials: Credentials) {
        info!(username = %credentials.username, "Game credentials updated");
        *self.credentials.write().await = Some(credentials);
    }

    /// Whether credentials are configured.
    pub async fn has_credentials(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    /// The command router used for classification.
    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    fn slot(&self, family: Family) -> &Mutex<Option<Session>> {
        match family {
            Family::A => &self.slot_a,
            Family::B => &self.slot_b,
        }
    }

    fn prefix(&self, family: Family) -> &str {
        match family {
            Family::A => &self.family_a_path,
            Family::B => &self.family_b_path,
        }
    }

    /// Make sure family A holds a usable session.
    pub async fn ensure_session(&self) -> Result<Session> {
        self.ensure_family(Family::A).await
    }

    /// Make sure family B holds a usable session.
    pub async fn ensure_session_b(&self) -> Result<Session> {
        self.ensure_family(Family::B).await
    }

    /// Return the family's session, bootstrapping a new one when the slot is
    /// empty or inside the expiry margin.
    pub async fn ensure_family(&self, family: Family) -> Result<Session> {
        let mut slot = self.slot(family).lock().await;
        if let Some(session) = slot.as_ref() {
            if !session.is_expiring(Utc::now()) {
                return Ok(session.clone());
            }
            debug!(family = %family, session_id = %session.id, "Session inside expiry margin");
        }
        *slot = None;

        let session = self.bootstrap(family).await?;
        info!(
            family = %family,
            session_id = %session.id,
            player_id = session.player_id.as_deref().unwrap_or("-"),
            "Session established"
        );
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Create (and log in) a session with exponential backoff between attempts.
    async fn bootstrap(&self, family: Family) -> Result<Session> {
        let credentials = self.credentials.read().await.clone();
        let mut last_error = String::new();

        for attempt in 0..self.bootstrap_attempts {
            if attempt > 0 {
                let delay = self.bootstrap_base_delay * 2u32.saturating_pow(attempt - 1);
                debug!(family = %family, attempt, delay_ms = delay.as_millis() as u64, "Bootstrap backoff");
                tokio::time::sleep(delay).await;
            }

            match self.bootstrap_once(family, credentials.as_ref()).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    warn!(family = %family, attempt = attempt + 1, error = %e, "Session bootstrap attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(PilotError::Connection(format!(
            "session bootstrap for family {} failed after {} attempts: {}",
            family, self.bootstrap_attempts, last_error
        )))
    }

    async fn bootstrap_once(
        &self,
        family: Family,
        credentials: Option<&Credentials>,
    ) -> Result<Session> {
        let prefix = self.prefix(family);

        let reply = self
            .transport
            .post(&format!("{}/session", prefix), None, &json!({}))
            .await?;
        let created = expect_session(family, "create", classify_reply(family, reply))?;
        let mut session = created
            .ok_or_else(|| PilotError::Session("create returned no session".into()))?;
        if session.is_expiring(Utc::now()) {
            return Err(PilotError::Session(format!(
                "server issued session {} inside the expiry margin",
                session.id
            )));
        }

        if let Some(creds) = credentials {
            let body = json!({"username": creds.username, "password": creds.password});
            let reply = self
                .transport
                .post(&format!("{}/login", prefix), Some(&session.id), &body)
                .await?;
            if let Some(rotated) = expect_session(family, "login", classify_reply(family, reply))? {
                session = rotated;
            }
        }

        Ok(session)
    }

    /// Send one classified request on the family's current session.
    ///
    /// Does not bootstrap; callers run [`Self::ensure_family`] first.
    pub async fn do_request(&self, route: &Route, payload: &Value) -> Result<RequestOutcome> {
        let family = route.family();
        let session_id = self.slot(family).lock().await.as_ref().map(|s| s.id.clone());
        let path = route.path(&self.family_a_path, &self.family_b_path);

        let reply = self
            .transport
            .post(&path, session_id.as_deref(), payload)
            .await?;
        Ok(classify_reply(family, reply))
    }

    /// Run `command` with recovery. Never returns a Rust error.
    pub async fn execute(&self, command: &str, payload: Option<Value>) -> GameResponse {
        let route = self.router.classify(command, payload.as_ref());
        let family = route.family();
        let body = payload.unwrap_or_else(|| json!({}));

        let mut transport_retried = false;
        let mut session_retried = false;

        loop {
            if let Err(e) = self.ensure_family(family).await {
                warn!(command, family = %family, error = %e, "No usable session");
                return GameResponse::from_error(ApiError::connection_failed(e.to_string()));
            }

            let outcome = match self.do_request(&route, &body).await {
                Ok(outcome) => outcome,
                Err(e) if transport_retried => {
                    warn!(command, error = %e, "Transport failed again; giving up");
                    return GameResponse::from_error(ApiError::connection_failed(e.to_string()));
                }
                Err(e) => {
                    warn!(command, error = %e, "Transport failure; resetting sessions");
                    transport_retried = true;
                    self.invalidate_all().await;
                    continue;
                }
            };

            let response = match outcome {
                RequestOutcome::Response(response) => response,
                RequestOutcome::Unauthorized => GameResponse::from_error(ApiError::new(
                    NOT_AUTHENTICATED,
                    "HTTP 401 Unauthorized",
                )),
                RequestOutcome::Protocol { status, body } => {
                    warn!(command, status, "Non-JSON response");
                    return GameResponse::from_error(ApiError::new(
                        HTTP_ERROR,
                        format!("HTTP {}: {}", status, preview(&body, 200)),
                    ));
                }
            };

            let error = match &response.error {
                None => {
                    self.rate_limit_streak.store(0, Ordering::SeqCst);
                    if let Some(session) = &response.session {
                        debug!(family = %family, session_id = %session.id, "Session refreshed by server");
                        *self.slot(family).lock().await = Some(session.clone());
                    }
                    return response;
                }
                Some(error) => error,
            };

            if error.is_rate_limited() {
                let streak = self.rate_limit_streak.fetch_add(1, Ordering::SeqCst) + 1;
                if streak >= MAX_RATE_LIMIT_RETRIES {
                    warn!(command, streak, "Rate limited too many times; giving up");
                    self.rate_limit_streak.store(0, Ordering::SeqCst);
                    return response;
                }
                let wait = error.rate_limit_wait();
                info!(command, streak, wait_secs = wait.as_secs_f64(), "Rate limited; waiting");
                tokio::time::sleep(wait).await;
                continue;
            }

            if error.is_session_error() {
                if session_retried {
                    warn!(command, code = %error.code, "Session error after renewal");
                    return response;
                }
                info!(command, family = %family, code = %error.code, "Session rejected; renewing");
                session_retried = true;
                self.invalidate(family).await;
                continue;
            }

            return response;
        }
    }

    /// Drop the family's session; the next call bootstraps a new one.
    pub async fn invalidate(&self, family: Family) {
        *self.slot(family).lock().await = None;
    }

    /// Drop both sessions.
    pub async fn invalidate_all(&self) {
        self.invalidate(Family::A).await;
        self.invalidate(Family::B).await;
    }

    /// Snapshot of both slots, without touching the network.
    pub async fn session_status(&self) -> Vec<SessionStatus> {
        let a = self.slot_a.lock().await;
        let status_a = SessionStatus::of(Family::A, a.as_ref());
        drop(a);
        let b = self.slot_b.lock().await;
        vec![status_a, SessionStatus::of(Family::B, b.as_ref())]
    }

    /// Current count of consecutive rate-limited responses.
    pub fn rate_limit_streak(&self) -> u32 {
        self.rate_limit_streak.load(Ordering::SeqCst)
    }
}

/// Interpret a bootstrap reply; `Ok(None)` means success without a session.
fn expect_session(
    family: Family,
    step: &str,
    outcome: RequestOutcome,
) -> Result<Option<Session>> {
    match outcome {
        RequestOutcome::Response(response) => match response.error {
            Some(err) => Err(PilotError::Session(format!("{} rejected: {}", step, err))),
            None => Ok(response.session),
        },
        RequestOutcome::Unauthorized => Err(PilotError::Session(format!(
            "{} on family {} returned HTTP 401",
            step, family
        ))),
        RequestOutcome::Protocol { status, body } => Err(PilotError::Session(format!(
            "{} on family {} returned HTTP {}: {}",
            step,
            family,
            status,
            preview(&body, 200)
        ))),
    }
}
