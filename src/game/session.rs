//! Game session types.
//!
//! A [`Session`] is the server-issued bearer credential for one endpoint
//! family. The client holds one slot per [`Family`]; both are renewed
//! independently.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Remaining lifetime below which a session is treated as already expired.
pub const SESSION_EXPIRY_MARGIN_SECS: i64 = 60;

/// One of the two independently-versioned endpoint families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    /// The default family, `<A>/{command}`
    A,
    /// The newer family, `<B>/{base}[/{action}]`
    B,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::A => write!(f, "A"),
            Family::B => write!(f, "B"),
        }
    }
}

/// A normalized game session, independent of the wire casing it arrived in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id sent in the session header
    pub id: String,
    /// Player bound to the session after login
    pub player_id: Option<String>,
    /// When the server created the session
    pub created_at: DateTime<Utc>,
    /// When the server will stop honouring the session
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session expiring `ttl_secs` from now.
    ///
    /// # Example
    /// ```
    /// use gamepilot::game::Session;
    ///
    /// let session = Session::new("abc", 3600);
    /// assert!(!session.is_expiring(chrono::Utc::now()));
    /// ```
    pub fn new(id: &str, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            player_id: None,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        }
    }

    /// Whether less than [`SESSION_EXPIRY_MARGIN_SECS`] of lifetime remain at `now`.
    pub fn is_expiring(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(SESSION_EXPIRY_MARGIN_SECS)
    }

    /// Seconds of lifetime left at `now` (negative once expired).
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

/// Login credentials, shared by both families.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Point-in-time view of one session slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub family: Family,
    pub active: bool,
    pub session_id: Option<String>,
    pub player_id: Option<String>,
    pub expires_in_secs: Option<i64>,
}

impl SessionStatus {
    pub(crate) fn of(family: Family, slot: Option<&Session>) -> Self {
        let now = Utc::now();
        match slot {
            Some(s) => Self {
                family,
                active: !s.is_expiring(now),
                session_id: Some(s.id.clone()),
                player_id: s.player_id.clone(),
                expires_in_secs: Some(s.remaining_secs(now)),
            },
            None => Self {
                family,
                active: false,
                session_id: None,
                player_id: None,
                expires_in_secs: None,
            },
        }
    }
}
