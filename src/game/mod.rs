//! Game server access.
//!
//! - [`session`]: session, credential and family types
//! - [`routing`]: command classification into family A / family B routes
//! - [`response`]: per-family wire formats folded into [`GameResponse`]
//! - [`transport`]: the HTTP seam ([`GameTransport`], [`HttpTransport`])
//! - [`client`]: [`SessionClient`], sessions plus recovery

pub mod client;
pub mod response;
pub mod routing;
pub mod session;
pub mod transport;

pub use client::{SessionClient, MAX_RATE_LIMIT_RETRIES};
pub use response::{classify_reply, normalize, ApiError, GameResponse, RequestOutcome};
pub use routing::{CommandRouter, Route};
pub use session::{Credentials, Family, Session, SessionStatus, SESSION_EXPIRY_MARGIN_SECS};
pub use transport::{GameTransport, HttpReply, HttpTransport};
