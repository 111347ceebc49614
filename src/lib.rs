//! # fhir-smart
//!
//! Rust client library for FHIR servers with SMART-on-FHIR OAuth2
//! authorization.
//!
//! Provides endpoint discovery from server capability metadata, the
//! authorization-code flow, transparent token refresh, and resource
//! CRUD/search calls. Resources are opaque JSON documents; this crate does
//! not validate or interpret their content.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhir_smart::{AuthorizationFlow, AuthorizeOptions, FhirClient, RequestOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Start an authorization flow and send the user to the returned URL
//!     let flow = AuthorizationFlow::new();
//!     let url = flow
//!         .authorize(
//!             AuthorizeOptions::new(
//!                 "my-app",
//!                 "https://app.example/callback",
//!                 "patient/*.read offline_access",
//!                 "https://fhir.example/r4",
//!             )
//!             .with_client_secret("s3cret"),
//!         )
//!         .await?;
//!     println!("Visit: {}", url);
//!
//!     // ... the authorization server redirects back ...
//!     let session = flow
//!         .complete_auth("https://app.example/callback?code=abc&state=xyz", false)
//!         .await?;
//!
//!     // The first request refreshes and attaches the access token
//!     let client = FhirClient::from_session(session);
//!     let bundle = client
//!         .search("Patient", RequestOptions::new().param("family", "Smith"))
//!         .await?;
//!     println!("{}", bundle["total"]);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod storage;
pub mod transport;

// Re-exports for ergonomic usage
pub use auth::{AuthorizationFlow, AuthorizeOptions, PendingAuthorization, SessionManager};
pub use client::{FhirClient, FhirClientBuilder, PatientContext};
pub use error::{Error, Result};
pub use metadata::{CapabilityStatement, SecurityEndpoints};
pub use models::auth::Session;
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use transport::http::RequestOptions;
