use crate::{
    config::AnalyticsConfig,
    error::{AnalyticsError, Result},
    logging::{redacted_body, SensitiveApiKey},
    payload::DispatchPayload,
};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

/// Posts drained batches to the collection server
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing client; the endpoint and timeout still come from
    /// `config`
    pub fn with_client(client: Client, config: &AnalyticsConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint(),
            timeout: config.request_timeout(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one `POST /api/log-request`
    ///
    /// Returns the response status without interpreting it. Only transport
    /// failures (connect, timeout, ...) are errors.
    pub async fn dispatch(&self, payload: &DispatchPayload) -> Result<StatusCode> {
        tracing::info!(
            endpoint = %self.endpoint,
            records = payload.len(),
            api_key = %SensitiveApiKey::new(&payload.api_key),
            framework = %payload.framework,
            "Sending requests to analytics server"
        );
        tracing::debug!(body = %redacted_body(payload), "Analytics request body");

        let start = Instant::now();
        let result = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let error = AnalyticsError::from(e);
                crate::metrics::record_dispatch(error.kind(), payload.len(), start.elapsed());
                return Err(error);
            }
        };

        let status = response.status();
        let outcome = if status.is_success() { "success" } else { "rejected" };
        crate::metrics::record_dispatch(outcome, payload.len(), start.elapsed());

        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Response from analytics server");
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                body = %body,
                "Analytics server did not accept batch"
            );
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RequestRecord;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn test_config(server_url: &str) -> AnalyticsConfig {
        AnalyticsConfig {
            server_url: server_url.to_string(),
            request_timeout_secs: 1,
            ..AnalyticsConfig::default()
        }
    }

    fn test_payload() -> DispatchPayload {
        DispatchPayload {
            api_key: "k1".to_string(),
            requests: vec![
                RequestRecord::new().with("path", "/x").with("status", 200),
                RequestRecord::new().with("path", "/y").with("status", 404),
            ],
            framework: "FastAPI".to_string(),
            privacy_level: 1,
        }
    }

    #[tokio::test]
    async fn test_dispatch_posts_payload_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/log-request"))
            .and(body_json(serde_json::json!({
                "api_key": "k1",
                "requests": [
                    {"path": "/x", "status": 200},
                    {"path": "/y", "status": 404}
                ],
                "framework": "FastAPI",
                "privacy_level": 1
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&test_config(&server.uri())).unwrap();
        let status = dispatcher.dispatch(&test_payload()).await.unwrap();

        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_dispatch_returns_server_error_status_uninterpreted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/log-request"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&test_config(&server.uri())).unwrap();
        let status = dispatcher.dispatch(&test_payload()).await.unwrap();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_dispatch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&test_config(&server.uri())).unwrap();
        let error = dispatcher.dispatch(&test_payload()).await.unwrap_err();

        assert_eq!(error.kind(), "timeout");
    }

    #[test]
    fn test_endpoint_from_config() {
        let dispatcher = Dispatcher::new(&test_config("http://localhost:3000/")).unwrap();
        assert_eq!(dispatcher.endpoint(), "http://localhost:3000/api/log-request");
    }
}
