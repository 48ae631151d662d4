//! Client for the remote attestation network

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::accumulator::FinalizedProofRequest;
use crate::error::{PipelineError, Result};
use crate::signer::SubmissionSigner;
use crate::types::{CompletionStatus, Proof, QueryStatus, SubmissionPayload, SubmissionResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttestationClient: Send + Sync {
    /// Submit a request and its proof, returning the query handle
    #[allow(clippy::too_many_arguments)]
    async fn submit(
        &self,
        request: &FinalizedProofRequest,
        proof: &Proof,
        src_chain_id: u64,
        dst_chain_id: u64,
        option: u8,
        api_key: Option<String>,
        callback_address: Address,
    ) -> Result<SubmissionResult>;

    /// Poll until the query completes on `chain_id`
    async fn wait(&self, query_key: &str, chain_id: u64) -> Result<CompletionStatus>;
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    query_key: Option<String>,
    #[serde(default)]
    err: Option<String>,
}

pub struct HttpAttestationClient {
    endpoint: String,
    client: Client,
    signer: Arc<SubmissionSigner>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl HttpAttestationClient {
    pub fn new(
        endpoint: &str,
        signer: Arc<SubmissionSigner>,
        request_timeout: Duration,
        poll_interval: Duration,
        max_poll_attempts: u32,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::builder().timeout(request_timeout).build()?,
            signer,
            poll_interval,
            max_poll_attempts,
        })
    }

    async fn query_status(&self, query_key: &str, chain_id: u64) -> Result<CompletionStatus> {
        let url = format!("{}/query/{}", self.endpoint, query_key);
        let response = self
            .client
            .get(&url)
            .query(&[("chain_id", chain_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::Submission(format!(
                "Query status returned error {}: {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AttestationClient for HttpAttestationClient {
    async fn submit(
        &self,
        request: &FinalizedProofRequest,
        proof: &Proof,
        src_chain_id: u64,
        dst_chain_id: u64,
        option: u8,
        api_key: Option<String>,
        callback_address: Address,
    ) -> Result<SubmissionResult> {
        let callback_address = callback_address.to_string();
        let signature =
            self.signer
                .sign_submission(request, proof, src_chain_id, dst_chain_id, &callback_address)?;

        let payload = SubmissionPayload {
            receipts: request.receipts(),
            proof,
            src_chain_id,
            dst_chain_id,
            option,
            api_key: api_key.as_deref(),
            callback_address,
            submitter: self.signer.address().to_string(),
            signature,
        };

        let url = format!("{}/submit", self.endpoint);
        debug!("Submitting proof for {} receipts to {}", request.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::Submission(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::Submission(format!(
                "Attestation network returned error {}: {}",
                status, error_text
            )));
        }

        let body: SubmitResponse = response.json().await?;

        if let Some(err) = body.err {
            return Err(PipelineError::Submission(err));
        }

        let query_key = body
            .query_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PipelineError::Submission("No query key in response".to_string()))?;

        info!("Proof submitted with query key: {}", query_key);

        Ok(SubmissionResult { query_key })
    }

    async fn wait(&self, query_key: &str, chain_id: u64) -> Result<CompletionStatus> {
        for attempt in 1..=self.max_poll_attempts {
            match self.query_status(query_key, chain_id).await {
                Ok(status) => match status.status {
                    QueryStatus::Completed => {
                        info!("Query {} completed after {} polls", query_key, attempt);
                        return Ok(status);
                    }
                    QueryStatus::Failed => {
                        return Err(PipelineError::Submission(format!(
                            "Query {} failed on the attestation network",
                            query_key
                        )));
                    }
                    QueryStatus::Pending => {
                        debug!("Query {} pending (poll {}/{})", query_key, attempt, self.max_poll_attempts);
                    }
                },
                Err(e) => {
                    warn!("Polling query {} failed on attempt {}: {}", query_key, attempt, e);
                }
            }

            if attempt < self.max_poll_attempts {
                sleep(self.poll_interval).await;
            }
        }

        Err(PipelineError::PollTimeout {
            query_key: query_key.to_string(),
            attempts: self.max_poll_attempts,
        })
    }
}
