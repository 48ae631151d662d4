//! Type definitions for the relay pipeline

use alloy_primitives::{Address, Bytes, B256, U64};
use serde::{Deserialize, Serialize};

use crate::schema::FieldSelector;

/// Raw event log as returned by `eth_getLogs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Left unparsed so a missing or malformed hash is caught by the receipt builder
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<U64>,
}

/// One log entry's worth of attestable fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDescriptor {
    pub tx_hash: B256,
    pub fields: Vec<FieldSelector>,
}

/// Receipt paired with the index the prover uses to correlate inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedReceipt {
    pub index: usize,
    pub receipt: ReceiptDescriptor,
}

/// Inclusive block range scanned by one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub from_block: u64,
    pub to_block: u64,
}

/// Proof artifact returned by the prover service, forwarded as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    /// Hex encoded proof bytes
    pub proof: String,

    /// Circuit output and any other metadata attached by the prover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_output: Option<serde_json::Value>,
}

/// Handle returned by the attestation network after a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub query_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Completed,
    Failed,
}

/// Final state of a submitted query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub query_key: String,
    pub status: QueryStatus,

    /// Callback transaction on the destination chain, once executed
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Payload posted to the attestation network
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload<'a> {
    pub receipts: &'a [IndexedReceipt],
    pub proof: &'a Proof,
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub option: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
    pub callback_address: String,
    pub submitter: String,
    pub signature: String,
}
