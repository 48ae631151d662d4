//! Log scan to proof submission pipeline
//!
//! A run walks `Idle -> WindowResolved -> RequestBuilt -> ProofGenerated` and ends in
//! either `Submitted` or `Failed`. Every run builds its own accumulator, the pipeline
//! itself only holds read-only settings and shared clients so runs can overlap freely.

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::accumulator::ProofRequestAccumulator;
use crate::attestation_client::AttestationClient;
use crate::chain_client::ChainClient;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::prover_client::ProofGenerationClient;
use crate::receipt_builder::ReceiptBuilder;
use crate::schema::Schema;
use crate::types::{BlockWindow, CompletionStatus};
use crate::window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    WindowResolved,
    RequestBuilt,
    ProofGenerated,
    Submitted,
    Failed,
}

/// What a trigger asks the pipeline to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSpec {
    pub schema: Schema,
    pub lookback: i64,
}

/// Read-only settings shared by every run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub contract_address: Address,
    pub topics: Vec<B256>,
    pub callback_address: Address,
    pub api_key: Option<String>,
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub submission_option: u8,
    pub prove_timeout: Duration,
    pub submit_timeout: Duration,
    pub wait_timeout: Duration,
    pub strict_field_check: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let address = |value: &str| {
            Address::from_str(value)
                .map_err(|e| PipelineError::Config(format!("Invalid address '{}': {}", value, e)))
        };
        let topics = config
            .event_topics
            .iter()
            .map(|t| {
                B256::from_str(t).map_err(|e| PipelineError::Config(format!("Invalid topic '{}': {}", t, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            contract_address: address(&config.contract_address)?,
            topics,
            callback_address: address(&config.callback_address)?,
            api_key: config.attestation_api_key.clone(),
            src_chain_id: config.src_chain_id,
            dst_chain_id: config.dst_chain_id,
            submission_option: config.submission_option,
            prove_timeout: config.prove_timeout(),
            submit_timeout: config.submit_timeout(),
            wait_timeout: config.wait_timeout(),
            strict_field_check: config.strict_field_check,
        })
    }
}

/// Outcome of one run, logged and returned to the trigger
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub schema: Schema,
    pub state: RunState,
    pub window: Option<BlockWindow>,
    pub receipt_count: usize,
    pub query_key: Option<String>,
    pub completion: Option<CompletionStatus>,
    /// Operator facing only, never sent back to the caller
    #[serde(skip)]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

struct Run {
    id: String,
    schema: Schema,
    state: RunState,
    window: Option<BlockWindow>,
    receipt_count: usize,
    query_key: Option<String>,
    completion: Option<CompletionStatus>,
}

impl Run {
    fn transition(&mut self, next: RunState) {
        debug!(run_id = %self.id, from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
    }

    fn into_report(self, error: Option<String>) -> RunReport {
        RunReport {
            run_id: self.id,
            schema: self.schema,
            state: self.state,
            window: self.window,
            receipt_count: self.receipt_count,
            query_key: self.query_key,
            completion: self.completion,
            error,
            finished_at: Utc::now(),
        }
    }
}

pub struct Pipeline {
    chain: Arc<dyn ChainClient>,
    prover: Arc<dyn ProofGenerationClient>,
    attestation: Arc<dyn AttestationClient>,
    settings: PipelineSettings,
    next_run: AtomicU64,
}

impl Pipeline {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        prover: Arc<dyn ProofGenerationClient>,
        attestation: Arc<dyn AttestationClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            chain,
            prover,
            attestation,
            settings,
            next_run: AtomicU64::new(0),
        }
    }

    /// Execute one run to a terminal state. Never retries a failed stage.
    pub async fn run(&self, spec: RunSpec, cancel: &CancellationToken) -> RunReport {
        let mut run = Run {
            id: format!("{}-{}", spec.schema, self.next_run.fetch_add(1, Ordering::Relaxed)),
            schema: spec.schema,
            state: RunState::Idle,
            window: None,
            receipt_count: 0,
            query_key: None,
            completion: None,
        };

        info!(run_id = %run.id, schema = %spec.schema, lookback = spec.lookback, "Starting pipeline run");

        match self.execute(spec, &mut run, cancel).await {
            Ok(()) => {
                run.transition(RunState::Submitted);
                info!(
                    run_id = %run.id,
                    receipts = run.receipt_count,
                    query_key = run.query_key.as_deref().unwrap_or_default(),
                    "Pipeline run submitted"
                );
                run.into_report(None)
            }
            Err(e) => {
                let (from_block, to_block) = run.window.map(|w| (w.from_block, w.to_block)).unwrap_or_default();
                if run.state == RunState::ProofGenerated {
                    warn!(run_id = %run.id, "Proof was generated but will not be resubmitted");
                }
                error!(
                    run_id = %run.id,
                    schema = %run.schema,
                    stage = ?run.state,
                    from_block,
                    to_block,
                    receipts = run.receipt_count,
                    error = %e,
                    "Pipeline run failed"
                );
                run.transition(RunState::Failed);
                run.into_report(Some(e.to_string()))
            }
        }
    }

    async fn execute(&self, spec: RunSpec, run: &mut Run, cancel: &CancellationToken) -> Result<()> {
        let settings = &self.settings;

        // Idle -> WindowResolved
        let height = cancellable("chain height", cancel, self.chain.current_height()).await?;
        let window = window::resolve(height, spec.lookback)?;
        run.window = Some(window);
        run.transition(RunState::WindowResolved);

        // WindowResolved -> RequestBuilt
        let logs = cancellable(
            "log fetch",
            cancel,
            self.chain.get_logs(
                settings.contract_address,
                settings.topics.clone(),
                window.from_block,
                window.to_block,
            ),
        )
        .await?;
        info!(
            run_id = %run.id,
            from_block = window.from_block,
            to_block = window.to_block,
            logs = logs.len(),
            "Fetched logs"
        );

        let builder = ReceiptBuilder::new(spec.schema).strict(settings.strict_field_check);
        let mut accumulator = ProofRequestAccumulator::new();
        for (index, log) in logs.iter().enumerate() {
            let receipt = builder.build(index, log)?;
            accumulator.append(receipt, index)?;
        }
        run.receipt_count = accumulator.len();
        run.transition(RunState::RequestBuilt);

        // RequestBuilt -> ProofGenerated
        let request = accumulator.finalize()?;
        let proof = bounded(
            "proof generation",
            settings.prove_timeout,
            cancel,
            self.prover.prove(&request),
        )
        .await?;
        run.transition(RunState::ProofGenerated);

        // ProofGenerated -> Submitted
        let submission = bounded(
            "submission",
            settings.submit_timeout,
            cancel,
            self.attestation.submit(
                &request,
                &proof,
                settings.src_chain_id,
                settings.dst_chain_id,
                settings.submission_option,
                settings.api_key.clone(),
                settings.callback_address,
            ),
        )
        .await?;
        run.query_key = Some(submission.query_key.clone());

        let completion = bounded(
            "completion wait",
            settings.wait_timeout,
            cancel,
            self.attestation.wait(&submission.query_key, settings.dst_chain_id),
        )
        .await?;
        run.completion = Some(completion);

        Ok(())
    }
}

async fn cancellable<T>(
    stage: &'static str,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled(stage)),
        res = fut => res,
    }
}

async fn bounded<T>(
    stage: &'static str,
    limit: Duration,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    cancellable(stage, cancel, async {
        timeout(limit, fut).await.unwrap_or_else(|_| {
            Err(PipelineError::Timeout {
                stage,
                secs: limit.as_secs(),
            })
        })
    })
    .await
}
