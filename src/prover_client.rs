//! Client for the local proof generation service

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::accumulator::FinalizedProofRequest;
use crate::error::{PipelineError, Result};
use crate::types::Proof;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProofGenerationClient: Send + Sync {
    /// Generate a proof for the finalized request. May run for minutes.
    async fn prove(&self, request: &FinalizedProofRequest) -> Result<Proof>;
}

#[derive(Deserialize)]
struct ProveResponse {
    #[serde(default)]
    proof: Option<String>,
    #[serde(default)]
    circuit_output: Option<serde_json::Value>,
    #[serde(default)]
    err: Option<ProverErr>,
}

#[derive(Deserialize)]
struct ProverErr {
    #[serde(default)]
    code: i64,
    msg: String,
}

pub struct HttpProverClient {
    endpoint: String,
    client: Client,
}

impl HttpProverClient {
    /// `timeout` bounds the whole prove call, proving is slow so it is
    /// usually far larger than ordinary request timeouts
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl ProofGenerationClient for HttpProverClient {
    async fn prove(&self, request: &FinalizedProofRequest) -> Result<Proof> {
        let url = format!("{}/prove", self.endpoint);
        debug!("Requesting proof for {} receipts from {}", request.len(), url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::ProofGeneration(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::ProofGeneration(format!(
                "Prover returned error {}: {}",
                status, error_text
            )));
        }

        let body: ProveResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ProofGeneration(format!("Invalid prover response: {}", e)))?;

        if let Some(err) = body.err {
            return Err(PipelineError::ProofGeneration(format!("{} (code {})", err.msg, err.code)));
        }

        let proof = body
            .proof
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PipelineError::ProofGeneration("Prover returned no proof".to_string()))?;

        info!("Proof generated ({} chars)", proof.len());

        Ok(Proof {
            proof,
            circuit_output: body.circuit_output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::ProofRequestAccumulator;
    use crate::schema::Schema;
    use crate::types::ReceiptDescriptor;
    use alloy_primitives::B256;
    use mockito::Matcher;

    fn request() -> FinalizedProofRequest {
        let mut acc = ProofRequestAccumulator::new();
        for i in 0..2 {
            acc.append(
                ReceiptDescriptor {
                    tx_hash: B256::repeat_byte(i as u8),
                    fields: Schema::Volatility.selectors(),
                },
                i,
            )
            .unwrap();
        }
        acc.finalize().unwrap()
    }

    #[tokio::test]
    async fn test_prove() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/prove")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "receipts": [
                    {"index": 0, "receipt": {"fields": [
                        {"log_pos": 0, "is_topic": true, "field_index": 0},
                        {"log_pos": 0, "is_topic": true, "field_index": 1},
                        {"log_pos": 0, "is_topic": true, "field_index": 2},
                        {"log_pos": 0, "is_topic": true, "field_index": 7}
                    ]}},
                    {"index": 1}
                ]
            })))
            .with_body(r#"{"proof":"0xabcdef","circuit_output":{"output":"0x01"}}"#)
            .create_async()
            .await;

        let client = HttpProverClient::new(&format!("{}/", server.url()), Duration::from_secs(5)).unwrap();
        let proof = client.prove(&request()).await.unwrap();

        assert_eq!(proof.proof, "0xabcdef");
        assert_eq!(proof.circuit_output, Some(serde_json::json!({"output": "0x01"})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_prover_reported_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prove")
            .with_body(r#"{"err":{"code":3,"msg":"receipt 1 has no topic 7"}}"#)
            .create_async()
            .await;

        let client = HttpProverClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.prove(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ProofGeneration(ref msg) if msg.contains("no topic 7")));
    }

    #[tokio::test]
    async fn test_http_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prove")
            .with_status(500)
            .with_body("circuit not loaded")
            .create_async()
            .await;

        let client = HttpProverClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        assert!(matches!(client.prove(&request()).await, Err(PipelineError::ProofGeneration(_))));
    }
}
