//! Twitter REST API client and the capability interface it implements.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    config::{RateLimitInfo, TwitterConfig},
    error::{Error, Result},
    oauth::RequestSigner,
    stream::{spawn_reader, StatusStream},
};

/// The platform calls the collector depends on.
///
/// Everything the collector needs from the network goes through this
/// interface; tests substitute an in-memory implementation. Timeline pages
/// are returned newest first, as raw payloads for the model layer.
#[allow(async_fn_in_trait)]
pub trait StatusApi {
    /// Probe the credentials; returns the account payload on success.
    async fn verify_credentials(&self) -> Result<Value>;

    /// One page of the authenticated user's home timeline, capped at
    /// `count` items, bounded above by `max_id` when given.
    async fn home_timeline(&self, count: usize, max_id: Option<u64>) -> Result<Vec<Value>>;

    /// One page of `screen_name`'s timeline, same contract as
    /// [`StatusApi::home_timeline`].
    async fn user_timeline(
        &self,
        screen_name: &str,
        count: usize,
        max_id: Option<u64>,
    ) -> Result<Vec<Value>>;

    /// Batch handle-to-profile lookup.
    async fn lookup_users(&self, screen_names: &[String]) -> Result<Vec<Value>>;

    /// Open the live filtered stream restricted to the given author ids.
    async fn filter_stream(&self, follow: &[u64]) -> Result<StatusStream>;
}

/// reqwest-backed client for the v1.1 API.
#[derive(Debug)]
pub struct TwitterApiClient {
    client: Client,
    stream_client: Client,
    api_url: String,
    stream_url: String,
    signer: RequestSigner,
    max_attempts: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
}

impl TwitterApiClient {
    /// Create a new API client from configuration.
    pub fn new(config: &TwitterConfig) -> Result<Self> {
        let user_agent = format!("birdwatch/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent.clone())
            .build()?;

        // The stream connection stays open indefinitely; only bound the
        // connect phase.
        let stream_client = Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            stream_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            stream_url: config.stream_url.trim_end_matches('/').to_string(),
            signer: RequestSigner::new(config),
            max_attempts: config.retry.max_attempts,
            initial_delay_ms: config.retry.initial_delay_ms,
            max_delay_ms: config.retry.max_delay_ms,
        })
    }

    /// Signed GET with retry: connect and timeout failures and 5xx
    /// responses back off exponentially, a 429 waits for the reported
    /// window reset.
    #[instrument(skip(self, params))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_url, endpoint);
        let mut delay = Duration::from_millis(self.initial_delay_ms);
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, endpoint, "Twitter API request");

            let auth = self.signer.authorization_header("GET", &url, params)?;
            let full_url = if params.is_empty() {
                url.clone()
            } else {
                let query = params
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&");
                format!("{url}?{query}")
            };

            let result = self
                .client
                .get(&full_url)
                .header("Authorization", &auth)
                .send()
                .await;

            match result {
                Ok(response) => match handle_response(response).await {
                    Ok(data) => return Ok(data),
                    Err(e) if e.is_retryable() && attempts < self.max_attempts => {
                        if let Some(retry_after) = e.retry_after() {
                            delay = retry_after;
                        }
                        warn!(
                            attempt = attempts,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "retrying Twitter API request"
                        );
                        tokio::time::sleep(delay).await;
                        delay = std::cmp::min(delay * 2, Duration::from_millis(self.max_delay_ms));
                    }
                    Err(e) => return Err(e),
                },
                Err(e) if (e.is_timeout() || e.is_connect()) && attempts < self.max_attempts => {
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "retrying after connection error"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_millis(self.max_delay_ms));
                }
                Err(e) => return Err(Error::Http(e)),
            }
        }
    }

    fn timeline_params(count: usize, max_id: Option<u64>) -> Vec<(String, String)> {
        let mut params = vec![
            ("count".to_string(), count.to_string()),
            ("tweet_mode".to_string(), "extended".to_string()),
        ];
        if let Some(max_id) = max_id {
            params.push(("max_id".to_string(), max_id.to_string()));
        }
        params
    }
}

impl StatusApi for TwitterApiClient {
    async fn verify_credentials(&self) -> Result<Value> {
        self.get_json("/1.1/account/verify_credentials.json", &[])
            .await
    }

    async fn home_timeline(&self, count: usize, max_id: Option<u64>) -> Result<Vec<Value>> {
        let params = Self::timeline_params(count, max_id);
        self.get_json("/1.1/statuses/home_timeline.json", &params)
            .await
    }

    async fn user_timeline(
        &self,
        screen_name: &str,
        count: usize,
        max_id: Option<u64>,
    ) -> Result<Vec<Value>> {
        let mut params = Self::timeline_params(count, max_id);
        params.push(("screen_name".to_string(), screen_name.to_string()));
        self.get_json("/1.1/statuses/user_timeline.json", &params)
            .await
    }

    async fn lookup_users(&self, screen_names: &[String]) -> Result<Vec<Value>> {
        let params = vec![("screen_name".to_string(), screen_names.join(","))];
        self.get_json("/1.1/users/lookup.json", &params).await
    }

    #[instrument(skip(self))]
    async fn filter_stream(&self, follow: &[u64]) -> Result<StatusStream> {
        let url = format!("{}/1.1/statuses/filter.json", self.stream_url);
        let follow_param = follow
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let params = vec![("follow".to_string(), follow_param)];

        let auth = self.signer.authorization_header("POST", &url, &params)?;
        let response = self
            .stream_client
            .post(&url)
            .header("Authorization", &auth)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        debug!(follow = follow.len(), "filtered stream connected");
        Ok(spawn_reader(response))
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let rate_limit = RateLimitInfo::from_headers(response.headers());
    if rate_limit.is_exhausted() {
        debug!(reset = ?rate_limit.reset, "rate limit window exhausted");
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = rate_limit
            .time_until_reset()
            .map(|d| d.as_secs())
            .unwrap_or(60);
        return Err(Error::RateLimited { retry_after });
    }

    let bytes = response.bytes().await?;

    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(Error::from);
    }

    // v1.1 error envelope: {"errors": [{"code": 32, "message": "..."}]}
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        errors: Vec<ErrorItem>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorItem {
        #[serde(default)]
        message: String,
    }

    let message = serde_json::from_slice::<ErrorBody>(&bytes)
        .ok()
        .and_then(|body| body.errors.into_iter().next())
        .map(|item| item.message)
        .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{header_exists, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn test_config(mock_server: &MockServer) -> TwitterConfig {
        TwitterConfig {
            consumer_key: "test_consumer_key".into(),
            consumer_secret: "test_consumer_secret".into(),
            access_token: "test_access_token".into(),
            access_token_secret: "test_access_token_secret".into(),
            api_url: mock_server.uri(),
            stream_url: mock_server.uri(),
            retry: crate::config::RetryConfig {
                max_attempts: 1,
                initial_delay_ms: 10,
                max_delay_ms: 100,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn verify_credentials_returns_account_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.1/account/verify_credentials.json"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 123456789u64,
                "screen_name": "testuser"
            })))
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let account = client.verify_credentials().await.unwrap();
        assert_eq!(account["screen_name"], "testuser");
    }

    #[tokio::test]
    async fn user_timeline_sends_paging_parameters() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.1/statuses/user_timeline.json"))
            .and(query_param("screen_name", "BTCTN"))
            .and(query_param("count", "200"))
            .and(query_param("max_id", "999"))
            .and(query_param("tweet_mode", "extended"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"id": 998}, {"id": 997}])),
            )
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let page = client.user_timeline("BTCTN", 200, Some(999)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["id"], 998);
    }

    #[tokio::test]
    async fn home_timeline_omits_cursor_on_first_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.1/statuses/home_timeline.json"))
            .and(query_param("count", "50"))
            .and(query_param("tweet_mode", "extended"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let page = client.home_timeline(50, None).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn lookup_users_joins_handles() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.1/users/lookup.json"))
            .and(query_param("screen_name", "alice,bob"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "screen_name": "alice"},
                {"id": 2, "screen_name": "bob"}
            ])))
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let users = client
            .lookup_users(&["alice".to_string(), "bob".to_string()])
            .await
            .unwrap();
        assert_eq!(users[1]["id"], 2);
    }

    #[tokio::test]
    async fn api_error_body_becomes_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.1/account/verify_credentials.json"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "errors": [{"code": 32, "message": "Could not authenticate you."}]
            })))
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let err = client.verify_credentials().await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Could not authenticate you.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rate_limited_response_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.1/statuses/home_timeline.json"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("x-rate-limit-remaining", "0")
                    .set_body_json(serde_json::json!({
                        "errors": [{"code": 88, "message": "Rate limit exceeded"}]
                    })),
            )
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let err = client.home_timeline(10, None).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn server_error_is_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.1/statuses/home_timeline.json"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.1/statuses/home_timeline.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 5}])),
            )
            .mount(&mock_server)
            .await;

        let mut config = test_config(&mock_server);
        config.retry.max_attempts = 2;
        let client = TwitterApiClient::new(&config).unwrap();

        let page = client.home_timeline(10, None).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn filter_stream_yields_line_delimited_payloads() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "{\"id\":1,\"text\":\"a\"}\r\n\r\n{\"id\":2,\"text\":\"b\"}\r\n",
                "application/json",
            ))
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let mut stream = client.filter_stream(&[1, 2]).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn filter_stream_rejects_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .respond_with(ResponseTemplate::new(420))
            .mount(&mock_server)
            .await;

        let client = TwitterApiClient::new(&test_config(&mock_server)).unwrap();

        let err = client.filter_stream(&[1]).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 420, .. }));
    }
}
