//! Builds receipt descriptors from raw logs

use alloy_primitives::B256;

use crate::error::{PipelineError, Result};
use crate::schema::Schema;
use crate::types::{RawLog, ReceiptDescriptor};

pub struct ReceiptBuilder {
    schema: Schema,
    strict: bool,
}

impl ReceiptBuilder {
    pub fn new(schema: Schema) -> Self {
        Self { schema, strict: false }
    }

    /// Reject logs that lack a topic or data word the schema selects.
    /// Off by default: the prover performs that check.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Build the descriptor for the log at `position` in the fetched log list
    pub fn build(&self, position: usize, log: &RawLog) -> Result<ReceiptDescriptor> {
        let malformed = |reason: String| PipelineError::MalformedLogEntry { position, reason };

        let raw_hash = log
            .transaction_hash
            .as_deref()
            .ok_or_else(|| malformed("missing transaction hash".to_string()))?;
        let tx_hash = parse_tx_hash(raw_hash).map_err(malformed)?;

        if self.strict {
            if let Some((name, selector)) = self.schema.fields().iter().find(|(_, s)| s.extract(log).is_none()) {
                let slot = if selector.is_topic { "topic" } else { "data word" };
                return Err(malformed(format!(
                    "no {} {} for field {} of schema {}",
                    slot, selector.field_index, name, self.schema
                )));
            }
        }

        Ok(ReceiptDescriptor {
            tx_hash,
            fields: self.schema.selectors(),
        })
    }
}

fn parse_tx_hash(raw: &str) -> std::result::Result<B256, String> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(stripped).map_err(|e| format!("invalid transaction hash hex: {}", e))?;
    if bytes.len() != 32 {
        return Err(format!("transaction hash is {} bytes, expected 32", bytes.len()));
    }
    Ok(B256::from_slice(&bytes))
}
