//! Per-run proof request accumulation

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::types::{IndexedReceipt, ReceiptDescriptor};

/// Receipts collected for a single pipeline run.
///
/// A fresh accumulator is built for every run and handed to the prover once,
/// through [`ProofRequestAccumulator::finalize`].
#[derive(Debug, Default)]
pub struct ProofRequestAccumulator {
    receipts: Vec<IndexedReceipt>,
    finalized: bool,
}

/// Frozen, index ordered proof request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedProofRequest {
    receipts: Vec<IndexedReceipt>,
}

impl ProofRequestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    /// Append `receipt` at `index`, which must equal the current size
    pub fn append(&mut self, receipt: ReceiptDescriptor, index: usize) -> Result<()> {
        if self.finalized {
            return Err(PipelineError::AccumulatorFinalized);
        }
        let expected = self.receipts.len();
        if index < expected {
            return Err(PipelineError::DuplicateIndex(index));
        }
        if index > expected {
            return Err(PipelineError::NonContiguousIndex { expected, actual: index });
        }
        self.receipts.push(IndexedReceipt { index, receipt });
        Ok(())
    }

    /// Freeze the request. Later appends fail with `AccumulatorFinalized`.
    pub fn finalize(&mut self) -> Result<FinalizedProofRequest> {
        if self.finalized {
            return Err(PipelineError::AccumulatorFinalized);
        }
        self.finalized = true;
        Ok(FinalizedProofRequest {
            receipts: std::mem::take(&mut self.receipts),
        })
    }
}

impl FinalizedProofRequest {
    pub fn receipts(&self) -> &[IndexedReceipt] {
        &self.receipts
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}
