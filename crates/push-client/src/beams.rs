//! Beams-compatible device API client.
//!
//! Talks to the vendor's device endpoints over HTTPS. Every request is a
//! single attempt; retry policy belongs to the caller.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::PushError;
use crate::sdk::PushSdk;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    metadata: DeviceMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceMetadata {
    sdk_version: &'static str,
    platform: &'static str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: String,
}

/// HTTP client for one Beams instance.
pub struct BeamsClient {
    http: reqwest::Client,
    instance_id: String,
    base_url: String,
}

impl BeamsClient {
    /// Create a client for `instance_id`.
    ///
    /// `base_url` overrides the vendor host (used for self-hosted relays and tests).
    pub fn new(instance_id: &str, base_url: Option<&str>) -> Result<Self, PushError> {
        let instance_id = instance_id.trim();
        if instance_id.is_empty() {
            return Err(PushError::SdkInit("instance id is empty".into()));
        }

        let base = match base_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => url.to_string(),
            None => format!("https://{instance_id}.pushnotifications.pusher.com"),
        };
        let parsed = Url::parse(&base)
            .map_err(|e| PushError::SdkInit(format!("invalid base url {base:?}: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            instance_id: instance_id.to_string(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn devices_url(&self) -> String {
        format!(
            "{}/device_api/v1/instances/{}/devices/web",
            self.base_url, self.instance_id
        )
    }

    fn device_url(&self, device_id: &str) -> String {
        format!("{}/{}", self.devices_url(), device_id)
    }

    fn interest_url(&self, device_id: &str, interest: &str) -> String {
        format!("{}/interests/{}", self.device_url(device_id), interest)
    }

    fn bearer_headers(token: &str) -> Result<HeaderMap, PushError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| PushError::InvalidToken(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Send a request and return the body, mapping non-2xx to `Api`.
    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<String, PushError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(PushError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl PushSdk for BeamsClient {
    async fn register_device(&self) -> Result<String, PushError> {
        let req = RegisterRequest {
            metadata: DeviceMetadata {
                sdk_version: env!("CARGO_PKG_VERSION"),
                platform: std::env::consts::OS,
            },
        };
        let body = self
            .execute(self.http.post(self.devices_url()).json(&req))
            .await?;
        let resp: RegisterResponse = serde_json::from_str(&body)?;
        tracing::debug!(device_id = %resp.id, "Beams device registered");
        Ok(resp.id)
    }

    async fn set_user_id(
        &self,
        device_id: &str,
        user_id: &str,
        token: &str,
    ) -> Result<(), PushError> {
        let headers = Self::bearer_headers(token)?;
        self.execute(
            self.http
                .put(format!("{}/user", self.device_url(device_id)))
                .headers(headers)
                .json(&serde_json::json!({})),
        )
        .await?;
        tracing::debug!(device_id, user_id, "Beams device associated with user");
        Ok(())
    }

    async fn add_interest(&self, device_id: &str, interest: &str) -> Result<(), PushError> {
        self.execute(self.http.post(self.interest_url(device_id, interest)))
            .await?;
        Ok(())
    }

    async fn remove_interest(&self, device_id: &str, interest: &str) -> Result<(), PushError> {
        self.execute(self.http.delete(self.interest_url(device_id, interest)))
            .await?;
        Ok(())
    }

    async fn delete_device(&self, device_id: &str) -> Result<(), PushError> {
        self.execute(self.http.delete(self.device_url(device_id)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{DELETE, POST, PUT};
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    #[test]
    fn new_rejects_empty_instance_id() {
        let err = BeamsClient::new("  ", None).err();
        assert!(matches!(err, Some(PushError::SdkInit(_))));
    }

    #[test]
    fn new_rejects_unparsable_base_url() {
        let err = BeamsClient::new("instance", Some("not a url")).err();
        assert!(matches!(err, Some(PushError::SdkInit(_))));
    }

    #[test]
    fn default_base_url_uses_instance_host() {
        let client = BeamsClient::new("abc-123", None).unwrap();
        assert_eq!(
            client.devices_url(),
            "https://abc-123.pushnotifications.pusher.com/device_api/v1/instances/abc-123/devices/web"
        );
    }

    #[tokio::test]
    async fn register_device_returns_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/device_api/v1/instances/inst/devices/web")
                    .body_contains("\"sdkVersion\"");
                then.status(200).json_body(json!({ "id": "web-device-1" }));
            })
            .await;

        let client = BeamsClient::new("inst", Some(&server.base_url())).unwrap();
        let id = client.register_device().await.unwrap();

        mock.assert_async().await;
        assert_eq!(id, "web-device-1");
    }

    #[tokio::test]
    async fn token_with_control_characters_is_rejected_locally() {
        let client = BeamsClient::new("inst", Some("http://127.0.0.1:9")).unwrap();
        let err = client
            .set_user_id("dev-1", "admin-1", "tok\n1")
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn set_user_id_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/device_api/v1/instances/inst/devices/web/dev-1/user")
                    .header("authorization", "Bearer tok-1");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = BeamsClient::new("inst", Some(&server.base_url())).unwrap();
        client.set_user_id("dev-1", "admin-7", "tok-1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn interest_calls_hit_device_interest_path() {
        let server = MockServer::start_async().await;
        let add = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/device_api/v1/instances/inst/devices/web/dev-1/interests/admin-notifications");
                then.status(200);
            })
            .await;
        let remove = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/device_api/v1/instances/inst/devices/web/dev-1/interests/admin-notifications");
                then.status(200);
            })
            .await;

        let client = BeamsClient::new("inst", Some(&server.base_url())).unwrap();
        client
            .add_interest("dev-1", "admin-notifications")
            .await
            .unwrap();
        client
            .remove_interest("dev-1", "admin-notifications")
            .await
            .unwrap();

        add.assert_async().await;
        remove.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_maps_to_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/device_api/v1/instances/inst/devices/web");
                then.status(503).body("unavailable");
            })
            .await;

        let client = BeamsClient::new("inst", Some(&server.base_url())).unwrap();
        let err = client.register_device().await.unwrap_err();
        match err {
            PushError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
