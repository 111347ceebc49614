//! HTTP transport for authenticated FHIR requests.

pub mod headers;
pub mod http;

pub use http::{FhirHttpClient, RequestOptions};
