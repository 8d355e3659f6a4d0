//! JSON-RPC fetcher for the reference and candidate endpoints

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ComparatorError, FailureReason, Result};
use crate::normalize::{normalize, unwrap_envelope};
use crate::query::QuerySpec;
use crate::types::{quantity, EndpointResponse};

/// Which node a request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Reference,
    Candidate,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Reference => f.write_str("reference"),
            Side::Candidate => f.write_str("candidate"),
        }
    }
}

/// Unparsed `eth_getLogs` result plus the time it took to get it
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: std::result::Result<Value, FailureReason>,
    pub latency: Duration,
}

impl RawResponse {
    /// Normalize the body; parse failures keep the measured latency
    pub fn into_endpoint_response(self) -> EndpointResponse {
        let latency = self.latency;
        match self.body.and_then(|result| normalize(&result)) {
            Ok(logs) => EndpointResponse::Ok { logs, latency },
            Err(reason) => EndpointResponse::Err { reason, latency },
        }
    }
}

/// Source of log query results for both sides of a comparison
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current head block of one endpoint
    async fn block_number(&self, side: Side) -> std::result::Result<u64, FailureReason>;

    /// Issue exactly one `eth_getLogs` request, no retries
    async fn get_logs(&self, side: Side, query: &QuerySpec) -> RawResponse;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: P,
    id: u64,
}

/// HTTP JSON-RPC client bound to a reference and a candidate URL
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    reference_url: String,
    candidate_url: String,
}

impl RpcClient {
    pub fn new(reference_url: &str, candidate_url: &str, timeout: Duration) -> Result<Self> {
        for url in [reference_url, candidate_url] {
            url.parse::<reqwest::Url>()
                .map_err(|e| ComparatorError::Configuration(format!("Invalid RPC URL '{}': {}", url, e)))?;
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ComparatorError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            reference_url: reference_url.to_string(),
            candidate_url: candidate_url.to_string(),
        })
    }

    pub fn url(&self, side: Side) -> &str {
        match side {
            Side::Reference => &self.reference_url,
            Side::Candidate => &self.candidate_url,
        }
    }

    /// Single JSON-RPC call returning the `result` member
    pub async fn call<P: Serialize + Send>(
        &self,
        url: &str,
        method: &str,
        params: P,
    ) -> std::result::Result<Value, FailureReason> {
        let request = JsonRpcRequest { jsonrpc: "2.0", method, params, id: 1 };

        let response = self.client.post(url).json(&request).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let envelope: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(FailureReason::Transport(format!("HTTP {}", status)));
            }
            Err(e) => return Err(FailureReason::Parse(format!("response is not JSON: {}", e))),
        };

        if !envelope.is_object() {
            return Err(FailureReason::Parse("response is not a JSON-RPC envelope".to_string()));
        }

        match unwrap_envelope(&envelope) {
            Ok(result) => Ok(result.clone()),
            // Some nodes pair a JSON-RPC error with a 4xx/5xx status
            Err(FailureReason::Parse(_)) if !status.is_success() => {
                Err(FailureReason::Transport(format!("HTTP {}", status)))
            }
            Err(reason) => Err(reason),
        }
    }

    /// `eth_getLogs` against an arbitrary URL
    pub async fn fetch(&self, url: &str, query: &QuerySpec) -> RawResponse {
        let started = Instant::now();
        let body = self.call(url, "eth_getLogs", [query]).await;
        let latency = started.elapsed();
        debug!(
            url,
            from_block = query.from_block(),
            to_block = query.to_block(),
            latency_ms = latency.as_millis() as u64,
            ok = body.is_ok(),
            "eth_getLogs"
        );
        RawResponse { body, latency }
    }
}

#[async_trait]
impl LogSource for RpcClient {
    async fn block_number(&self, side: Side) -> std::result::Result<u64, FailureReason> {
        let result = self.call(self.url(side), "eth_blockNumber", Vec::<Value>::new()).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| FailureReason::Parse(format!("eth_blockNumber returned {}", result)))?;
        quantity::parse(hex).map_err(FailureReason::Parse)
    }

    async fn get_logs(&self, side: Side, query: &QuerySpec) -> RawResponse {
        self.fetch(self.url(side), query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(url: &str) -> RpcClient {
        RpcClient::new(url, url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_url() {
        let err = RpcClient::new("not a url", "http://localhost:8545", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ComparatorError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_fetch_logs_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "jsonrpc": "2.0",
                "method": "eth_getLogs",
                "params": [{"fromBlock": "0x1", "toBlock": "0x2"}],
                "id": 1
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": [{
                        "address": "0x00000000000000000000000000000000000000aa",
                        "topics": [],
                        "data": "0x",
                        "blockNumber": "0x2",
                        "transactionIndex": "0x0",
                        "logIndex": "0x0"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let query = QuerySpec::new(1, 2).unwrap();
        let response = client.get_logs(Side::Reference, &query).await.into_endpoint_response();

        mock.assert_async().await;
        assert_eq!(response.log_count(), Some(1));
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"limit exceeded"}}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let raw = client.fetch(&server.url(), &QuerySpec::new(1, 1).unwrap()).await;
        assert_eq!(
            raw.body.unwrap_err(),
            FailureReason::Rpc { code: -32005, message: "limit exceeded".into() }
        );
    }

    #[tokio::test]
    async fn test_http_error_status_is_transport() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let raw = client.fetch(&server.url(), &QuerySpec::new(1, 1).unwrap()).await;
        assert!(matches!(raw.body, Err(FailureReason::Transport(ref msg)) if msg.contains("502")));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"unexpected":true}}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let response = client
            .get_logs(Side::Candidate, &QuerySpec::new(1, 1).unwrap())
            .await
            .into_endpoint_response();
        assert!(matches!(response.failure(), Some(FailureReason::Parse(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        // Port 9 (discard) is not expected to accept HTTP locally
        let client = client_for("http://127.0.0.1:9");
        let raw = client.get_logs(Side::Candidate, &QuerySpec::new(1, 1).unwrap()).await;
        assert!(matches!(raw.body, Err(FailureReason::Transport(_))));
    }

    #[tokio::test]
    async fn test_block_number() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber", "params": []})))
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x10d4f"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        assert_eq!(client.block_number(Side::Reference).await.unwrap(), 68943);
    }
}
