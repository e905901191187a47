use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::{PollError, PollResponse, StartError, StartResponse};
use crate::config::{
    errors::{ERR_POLL_DECODE, ERR_POLL_HTTP, ERR_START_DECODE, ERR_START_HTTP},
    ServiceConfig,
};

/// The remote generation service, as seen by the orchestrator.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn start(&self) -> Result<StartResponse, StartError>;
    async fn poll(&self, task_id: &str) -> Result<PollResponse, PollError>;
}

/// `reqwest`-backed client for the generation API.
#[derive(Clone)]
pub struct HttpGenerationService {
    http: Client,
    base_url: Url,
}

impl HttpGenerationService {
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn from_config(config: &ServiceConfig) -> reqwest::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(builder.build()?, config.base_url.clone()))
    }

    fn endpoint(&self, segments: &[&str]) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(segments);
        Some(url)
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn start(&self) -> Result<StartResponse, StartError> {
        let url = self
            .endpoint(&["generate-widgets"])
            .ok_or_else(|| StartError::new(format!("{ERR_START_HTTP}: base url cannot take a path")))?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|err| StartError::new(format!("{ERR_START_HTTP}: {err}")))?;
        read_json(resp)
            .await
            .map_err(|failure| StartError::new(failure.detail(ERR_START_HTTP, ERR_START_DECODE)))
    }

    async fn poll(&self, task_id: &str) -> Result<PollResponse, PollError> {
        let url = self
            .endpoint(&["generate-widgets", "result", task_id])
            .ok_or_else(|| PollError::new(format!("{ERR_POLL_HTTP}: base url cannot take a path")))?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| PollError::new(format!("{ERR_POLL_HTTP}: {err}")))?;
        read_json(resp)
            .await
            .map_err(|failure| PollError::new(failure.detail(ERR_POLL_HTTP, ERR_POLL_DECODE)))
    }
}

enum ReadFailure {
    Status(u16),
    Body(String),
    Decode(String),
}

impl ReadFailure {
    fn detail(&self, http_code: &str, decode_code: &str) -> String {
        match self {
            ReadFailure::Status(status) => format!("{http_code}: service responded with HTTP {status}"),
            ReadFailure::Body(err) => format!("{http_code}: reading response body failed: {err}"),
            ReadFailure::Decode(err) => format!("{decode_code}: response is not the expected JSON: {err}"),
        }
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ReadFailure> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ReadFailure::Status(status.as_u16()));
    }
    let body = resp
        .bytes()
        .await
        .map_err(|err| ReadFailure::Body(err.to_string()))?;
    serde_json::from_slice(&body).map_err(|err| ReadFailure::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::service::parse_base_url;
    use httpmock::prelude::*;

    fn service(server: &MockServer) -> HttpGenerationService {
        let base = parse_base_url(&server.url("/api")).unwrap();
        HttpGenerationService::new(Client::new(), base)
    }

    #[tokio::test]
    async fn start_posts_empty_json_object() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate-widgets")
                    .json_body(serde_json::json!({}));
                then.status(200)
                    .json_body(serde_json::json!({"task_id": "t1", "status": "PENDING"}));
            })
            .await;

        let started = service(&server).start().await.unwrap();
        assert_eq!(started.task_id, "t1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_http_failure_maps_to_start_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate-widgets");
                then.status(500).body("boom");
            })
            .await;

        let err = service(&server).start().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to start widget generation");
        assert!(err.detail.starts_with(ERR_START_HTTP), "{}", err.detail);
        assert!(err.detail.contains("500"));
    }

    #[tokio::test]
    async fn poll_hits_result_path_and_reports_decode_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/generate-widgets/result/t-9");
                then.status(200).body("not json");
            })
            .await;

        let err = service(&server).poll("t-9").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to poll widget generation result");
        assert!(err.detail.starts_with(ERR_POLL_DECODE), "{}", err.detail);
    }
}
