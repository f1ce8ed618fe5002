use anyhow::anyhow;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::debug;

#[derive(Debug)]
pub(crate) struct FetchAttemptError {
    pub(crate) error: anyhow::Error,
    pub(crate) retryable: bool,
    pub(crate) retry_after: Option<Duration>,
}

impl FetchAttemptError {
    pub(crate) fn retryable(error: anyhow::Error, retry_after: Option<Duration>) -> Self {
        Self {
            error,
            retryable: true,
            retry_after,
        }
    }

    pub(crate) fn terminal(error: anyhow::Error) -> Self {
        Self {
            error,
            retryable: false,
            retry_after: None,
        }
    }
}

/// Linear retry schedule: attempt `n` waits `delay_ms * n`, or longer when the server
/// asked for it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) retries: u32,
    pub(crate) delay_ms: u64,
}

impl RetryPolicy {
    pub(crate) fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let linear = Duration::from_millis(self.delay_ms.saturating_mul(u64::from(attempt)));
        match retry_after {
            Some(retry_after) => linear.max(retry_after),
            None => linear,
        }
    }
}

pub(crate) fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Scheme, host and path of `raw`; provider URLs carry API keys in the query string.
pub(crate) fn display_target(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => format!(
            "{}://{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default(),
            parsed.path()
        ),
        Err(_) => "<invalid url>".to_string(),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub(crate) fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub(crate) async fn get_json(
        &self,
        url: &str,
        api_key: Option<&str>,
    ) -> anyhow::Result<Value> {
        let target_label = display_target(url);
        let target = target_label.as_str();
        self.with_retries(target, move || {
            let mut request = self.client.get(url);
            if let Some(api_key) = api_key {
                request = request.header("x-api-key", api_key);
            }
            send_once(request, target)
        })
        .await
    }

    /// JSON-RPC call returning the `result` member. A JSON-RPC error object is terminal;
    /// a null result is retried since freshly created accounts may not be indexed yet.
    pub(crate) async fn rpc_call(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> anyhow::Result<Value> {
        let target_label = format!("{method} via {}", display_target(url));
        let target = target_label.as_str();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let body = &body;
        self.with_retries(target, move || async move {
            let mut response = send_once(self.client.post(url).json(body), target).await?;
            if let Some(error) = response.get("error") {
                return Err(FetchAttemptError::terminal(anyhow!(
                    "{target} returned rpc error: {error}"
                )));
            }
            match response.get_mut("result").map(Value::take) {
                Some(result) if !result.is_null() => Ok(result),
                _ => Err(FetchAttemptError::retryable(
                    anyhow!("{target} returned an empty result"),
                    None,
                )),
            }
        })
        .await
    }

    async fn with_retries<F, Fut>(&self, target: &str, mut attempt_fn: F) -> anyhow::Result<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, FetchAttemptError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(fetch_error) => {
                    if !fetch_error.retryable || attempt >= self.policy.retries {
                        debug!(
                            target = %target,
                            attempt,
                            retryable = fetch_error.retryable,
                            "fetch attempt failed; giving up"
                        );
                        return Err(fetch_error.error);
                    }
                    attempt += 1;
                    let wait = self.policy.delay_for(attempt, fetch_error.retry_after);
                    debug!(
                        error = %fetch_error.error,
                        target = %target,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "retrying fetch after backoff"
                    );
                    time::sleep(wait).await;
                }
            }
        }
    }
}

async fn send_once(request: RequestBuilder, target: &str) -> Result<Value, FetchAttemptError> {
    let response = request.send().await.map_err(|error| {
        let error_message = anyhow!("request to {target} failed: {error}");
        if error.is_builder() {
            FetchAttemptError::terminal(error_message)
        } else {
            FetchAttemptError::retryable(error_message, None)
        }
    })?;

    let status = response.status();
    if status.as_u16() == 429 || status.is_server_error() {
        let retry_after = parse_retry_after(&response);
        return Err(FetchAttemptError::retryable(
            anyhow!("retryable status {status} from {target}"),
            retry_after,
        ));
    }
    if !status.is_success() {
        return Err(FetchAttemptError::terminal(anyhow!(
            "non-success status {status} from {target}"
        )));
    }

    response.json::<Value>().await.map_err(|error| {
        if error.is_timeout() {
            FetchAttemptError::retryable(anyhow!("timed out reading {target}: {error}"), None)
        } else {
            FetchAttemptError::terminal(anyhow!("invalid json from {target}: {error}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_stub, StubResponse};

    fn fetcher(retries: u32) -> HttpFetcher {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("client");
        HttpFetcher::new(
            client,
            RetryPolicy {
                retries,
                delay_ms: 10,
            },
        )
    }

    #[test]
    fn linear_delay_respects_retry_after() {
        let policy = RetryPolicy {
            retries: 3,
            delay_ms: 250,
        };
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(250));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(750));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn display_target_drops_query() {
        assert_eq!(
            display_target("https://mainnet.helius-rpc.com/?api-key=secret"),
            "https://mainnet.helius-rpc.com/"
        );
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let stub = spawn_stub(vec![
            StubResponse::status(503),
            StubResponse::status(503),
            StubResponse::json(200, r#"{"ok":true}"#),
        ])
        .await;
        let value = fetcher(3)
            .get_json(&stub.url("/token/abc"), None)
            .await
            .expect("third attempt succeeds");
        assert_eq!(value["ok"], true);
        assert_eq!(stub.hits(), 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let stub = spawn_stub(vec![StubResponse::status(404)]).await;
        let error = fetcher(3)
            .get_json(&stub.url("/token/missing"), None)
            .await
            .expect_err("404 is terminal");
        assert!(error.to_string().contains("404"));
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let stub = spawn_stub(vec![StubResponse::status(500)]).await;
        let result = fetcher(2).get_json(&stub.url("/"), None).await;
        assert!(result.is_err());
        assert_eq!(stub.hits(), 3);
    }

    #[tokio::test]
    async fn rpc_error_object_is_terminal() {
        let stub = spawn_stub(vec![StubResponse::json(
            200,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"boom"}}"#,
        )])
        .await;
        let error = fetcher(3)
            .rpc_call(&stub.url("/"), "getAsset", json!({"id": "x"}))
            .await
            .expect_err("rpc error");
        assert!(error.to_string().contains("rpc error"));
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn api_key_header_is_sent() {
        let stub = spawn_stub(vec![StubResponse::json(200, "{}")]).await;
        fetcher(0)
            .get_json(&stub.url("/token/abc"), Some("bags-key"))
            .await
            .expect("ok");
        let request = stub.last_request().expect("request recorded");
        assert!(request.to_ascii_lowercase().contains("x-api-key: bags-key"));
    }
}
