//! JSON-RPC client for chain height and event logs

use alloy_primitives::{Address, B256, U64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result};
use crate::types::RawLog;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block number
    async fn current_height(&self) -> Result<u64>;

    /// Logs emitted by `address` between `from_block` and `to_block` inclusive, in chain order
    async fn get_logs(
        &self,
        address: Address,
        topics: Vec<B256>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct RpcChainClient {
    endpoint: String,
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
    request_timeout: Duration,
}

impl RpcChainClient {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::builder().timeout(request_timeout).build()?,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            request_timeout,
        })
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Execute RPC call with retry logic
    async fn call_with_retry<T>(&self, method: &str, params: serde_json::Value) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            debug!("RPC {} attempt {}/{} to {}", method, attempt, self.max_retries, self.endpoint);

            match timeout(self.request_timeout, self.call::<T>(method, params.clone())).await {
                Ok(Ok(result)) => {
                    if attempt > 1 {
                        info!("RPC {} succeeded on attempt {}", method, attempt);
                    }
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    warn!("RPC {} failed on attempt {}: {}", method, attempt, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!("RPC {} timed out on attempt {}", method, attempt);
                    last_error = Some(PipelineError::Rpc(format!("{} timed out", method)));
                }
            }

            if attempt < self.max_retries {
                let delay = self.retry_delay * attempt;
                debug!("Waiting {:?} before retry...", delay);
                sleep(delay).await;
            }
        }

        error!("RPC {} failed after {} attempts", method, self.max_retries);
        Err(last_error.unwrap_or_else(|| PipelineError::Rpc("All retry attempts failed".to_string())))
    }

    async fn call<T>(&self, method: &str, params: serde_json::Value) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::Rpc(format!("HTTP error ({}): {}", status, error_text)));
        }

        let rpc_response: RpcResponse<T> = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(PipelineError::Rpc(format!("{} ({})", error.message, error.code)));
        }

        rpc_response
            .result
            .ok_or_else(|| PipelineError::Rpc(format!("No result for {}", method)))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn current_height(&self) -> Result<u64> {
        let height: U64 = self.call_with_retry("eth_blockNumber", serde_json::json!([])).await?;
        Ok(height.to::<u64>())
    }

    async fn get_logs(
        &self,
        address: Address,
        topics: Vec<B256>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>> {
        let filter = serde_json::json!({
            "address": address,
            "topics": topics,
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        });

        let logs: Vec<RawLog> = self.call_with_retry("eth_getLogs", serde_json::json!([filter])).await?;
        debug!("Fetched {} logs for blocks {}..={}", logs.len(), from_block, to_block);
        Ok(logs)
    }
}
