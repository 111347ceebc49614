//! FHIR request header construction.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::config::FHIR_JSON;

/// Build the standard headers for authenticated FHIR requests.
pub fn fhir_headers(access_token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));

    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", access_token))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer invalid")),
    );

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fhir_headers() {
        let headers = fhir_headers("tok-123");
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/fhir+json");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok-123");
    }
}
