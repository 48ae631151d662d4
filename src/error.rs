//! Error types for the relay pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid block window: lookback {lookback} at height {height}")]
    InvalidWindow { height: u64, lookback: i64 },

    #[error("Malformed log entry at position {position}: {reason}")]
    MalformedLogEntry { position: usize, reason: String },

    #[error("Unknown field '{field}' for schema {schema}")]
    UnknownField { schema: String, field: String },

    #[error("Duplicate receipt index {0}")]
    DuplicateIndex(usize),

    #[error("Non-contiguous receipt index: expected {expected}, got {actual}")]
    NonContiguousIndex { expected: usize, actual: usize },

    #[error("Proof request already finalized")]
    AccumulatorFinalized,

    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("Attestation submission failed: {0}")]
    Submission(String),

    #[error("Query {query_key} did not complete after {attempts} polls")]
    PollTimeout { query_key: String, attempts: u32 },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("Run cancelled during {0}")]
    Cancelled(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
