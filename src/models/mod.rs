//! Data types for sessions and token endpoint payloads.

pub mod auth;

pub use auth::{RefreshResponse, Session, TokenExchangeResponse};
