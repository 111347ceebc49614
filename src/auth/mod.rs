//! SMART-on-FHIR authorization: flow management and token lifecycle.
//!
//! - [`AuthorizationFlow`] runs the authorization-code flow: building the
//!   redirect URL, holding per-flow state, exchanging the code for tokens.
//! - [`SessionManager`] owns one session's access/refresh tokens and performs
//!   single-flight refresh.
//! - [`PendingStore`] keeps in-flight flows with TTL eviction.

pub mod flow;
pub mod manager;
pub mod pending;

pub use flow::{generate_state, AuthorizationFlow, AuthorizeOptions};
pub use manager::SessionManager;
pub use pending::{PendingAuthorization, PendingStore};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Compute an HTTP Basic credential from client id and secret.
pub(crate) fn basic_credential(client_id: &str, client_secret: &str) -> String {
    STANDARD.encode(format!("{}:{}", client_id, client_secret))
}
