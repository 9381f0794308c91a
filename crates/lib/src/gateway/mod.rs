//! Gateway: HTTP(S) surface of the relay.
//!
//! One router serves `GET /` (health), `GET /call` (direct call behind the bearer key) and
//! `POST /callback` (LINE webhook). The same router is bound to the plain listener and, when TLS
//! material is configured, to a second TLS listener.

mod auth;
mod error;
mod relay;
mod server;

pub use auth::{bearer_token, require_call_key};
pub use error::RelayError;
pub use relay::{relay_events, BatchFailure};
pub use server::{router, run_gateway, GatewayState, CALL_RESPONSE_PREFIX};
