//! Credential headers for backend requests.

/// Adds a bearer `Authorization` header when a credential is present.
/// Requests without one go out anonymously.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    token: Option<&str>,
) -> reqwest::RequestBuilder {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_added_for_tokens() {
        let client = reqwest::Client::new();
        let request = add_auth_headers(client.get("https://example.com"), Some("test-key"))
            .build()
            .expect("request builds");
        assert_eq!(
            request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer test-key")
        );
    }

    #[test]
    fn anonymous_requests_carry_no_header() {
        let client = reqwest::Client::new();
        for token in [None, Some(""), Some("   ")] {
            let request = add_auth_headers(client.get("https://example.com"), token)
                .build()
                .expect("request builds");
            assert!(request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .is_none());
        }
    }
}
