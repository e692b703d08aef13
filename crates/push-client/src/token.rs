//! Token-provider lookups for authenticated device registration.
//!
//! The application supplies an endpoint that exchanges a user id for a
//! short-lived push token. Failures here never stop registration; the
//! manager falls back to an anonymous device.

use serde::Deserialize;
use url::Url;

use crate::PushError;

/// Token-provider response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Fetches scoped auth tokens from the application's token provider.
#[derive(Clone)]
pub struct TokenProvider {
    http: reqwest::Client,
}

impl Default for TokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenProvider {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Build the request URL with the `user_id` query parameter appended.
    pub fn request_url(endpoint: &str, user_id: &str) -> Result<String, PushError> {
        let mut url = Url::parse(endpoint)?;
        url.query_pairs_mut().append_pair("user_id", user_id);
        Ok(url.to_string())
    }

    /// Fetch a token for `user_id`.
    pub async fn fetch(&self, endpoint: &str, user_id: &str) -> Result<String, PushError> {
        let url = Self::request_url(endpoint, user_id)?;
        tracing::debug!(user_id, "Requesting push token");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(PushError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        if parsed.token.trim().is_empty() {
            return Err(PushError::Api {
                status: status.as_u16(),
                message: "token provider returned an empty token".into(),
            });
        }
        Ok(parsed.token)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_url_appends_user_id() {
        let url = TokenProvider::request_url("https://example.com/pusher/beams-auth", "admin 1")
            .unwrap();
        assert_eq!(url, "https://example.com/pusher/beams-auth?user_id=admin+1");
    }

    #[test]
    fn request_url_keeps_existing_query() {
        let url = TokenProvider::request_url("https://example.com/auth?portal=admin", "a1").unwrap();
        assert_eq!(url, "https://example.com/auth?portal=admin&user_id=a1");
    }

    #[tokio::test]
    async fn fetch_returns_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/beams-auth")
                    .query_param("user_id", "admin-1");
                then.status(200).json_body(json!({ "token": "secret-token" }));
            })
            .await;

        let provider = TokenProvider::new();
        let token = provider
            .fetch(&server.url("/beams-auth"), "admin-1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token, "secret-token");
    }

    #[tokio::test]
    async fn fetch_maps_rejection_to_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/beams-auth");
                then.status(401).body("no session");
            })
            .await;

        let err = TokenProvider::new()
            .fetch(&server.url("/beams-auth"), "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Api { status: 401, .. }));
    }
}
