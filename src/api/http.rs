//! JSON client for a remote plant server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PlantApi;
use crate::error::SyncError;
use crate::models::PlantDescriptor;

/// Body of a batch delete request.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub guids: Vec<String>,
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Plant API backed by a plant server over HTTP.
pub struct HttpPlantApi {
    server_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpPlantApi {
    pub fn new(server_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Builds an absolute URL for `path`, adding a scheme to bare hosts.
    fn build_url(&self, path: &str) -> String {
        build_http_url(&self.server_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.build_url(path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, SyncError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        Err(SyncError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PlantApi for HttpPlantApi {
    async fn fetch_plants(&self) -> Result<Vec<PlantDescriptor>, SyncError> {
        let response = self
            .send(self.request(reqwest::Method::GET, "/plants"))
            .await?;
        Ok(response.json().await?)
    }

    async fn add_plant(&self, plant: &PlantDescriptor) -> Result<(), SyncError> {
        self.send(self.request(reqwest::Method::POST, "/plants").json(plant))
            .await?;
        Ok(())
    }

    async fn update_plant(&self, plant: &PlantDescriptor) -> Result<(), SyncError> {
        let path = plant_path(&plant.guid);
        self.send(self.request(reqwest::Method::PUT, &path).json(plant))
            .await?;
        Ok(())
    }

    async fn delete_plants(&self, guids: &[String]) -> Result<(), SyncError> {
        let body = DeleteRequest {
            guids: guids.to_vec(),
        };
        self.send(
            self.request(reqwest::Method::POST, "/plants/delete")
                .json(&body),
        )
        .await?;
        Ok(())
    }
}

/// Path of a single plant; the guid is percent-encoded as one segment.
fn plant_path(guid: &str) -> String {
    format!("/plants/{}", urlencoding::encode(guid))
}

fn build_http_url(server_url: &str, path: &str) -> String {
    let base = if server_url.starts_with("http://") || server_url.starts_with("https://") {
        server_url.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", server_url.trim_end_matches('/'))
    };
    format!("{}{}", base, path)
}

/// Returns true if the server answers its health check.
pub async fn check_server(server_url: &str) -> bool {
    let url = build_http_url(server_url, "/health");
    match reqwest::Client::new().get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            tracing::debug!("Health check against {} failed: {}", url, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_path_encodes_guid() {
        assert_eq!(plant_path("3f2a-01"), "/plants/3f2a-01");
        assert_eq!(plant_path("pots/big?#1"), "/plants/pots%2Fbig%3F%231");
    }

    #[test]
    fn test_build_url_with_http() {
        let api = HttpPlantApi::new("http://localhost:8080", None);
        assert_eq!(api.build_url("/plants"), "http://localhost:8080/plants");
    }

    #[test]
    fn test_build_url_with_https_and_trailing_slash() {
        let api = HttpPlantApi::new("https://plants.example.com/", None);
        assert_eq!(
            api.build_url("/plants/abc"),
            "https://plants.example.com/plants/abc"
        );
    }

    #[test]
    fn test_build_url_bare_host() {
        let api = HttpPlantApi::new("localhost:8080", None);
        assert_eq!(api.build_url("/health"), "http://localhost:8080/health");
    }

    #[tokio::test]
    async fn test_check_server_unreachable() {
        // Port 9 (discard) is not expected to run an HTTP server.
        assert!(!check_server("http://127.0.0.1:9").await);
    }
}
