//! Field selector tables for each proof request schema
//!
//! A schema fixes which log fields end up in a receipt and in which order the
//! proving circuit reads them. Tables are plain data so a new field is a one-line
//! change.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::RawLog;

/// Size of one ABI word in a log's data payload
pub const DATA_WORD_SIZE: usize = 32;

/// Position of one scalar value inside a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSelector {
    /// Position of the log within its transaction receipt
    pub log_pos: u32,
    pub is_topic: bool,
    /// Topic index, or data word index when `is_topic` is false
    pub field_index: u32,
}

impl FieldSelector {
    pub const fn topic(field_index: u32) -> Self {
        Self { log_pos: 0, is_topic: true, field_index }
    }

    pub const fn data(field_index: u32) -> Self {
        Self { log_pos: 0, is_topic: false, field_index }
    }

    /// Read the selected value from `log`, which must be the entry at `log_pos`.
    /// Returns `None` when the log has no such topic or data word.
    pub fn extract(&self, log: &RawLog) -> Option<B256> {
        let index = self.field_index as usize;
        if self.is_topic {
            return log.topics.get(index).copied();
        }
        let start = index.checked_mul(DATA_WORD_SIZE)?;
        let word = log.data.get(start..start + DATA_WORD_SIZE)?;
        Some(B256::from_slice(word))
    }
}

// Uniswap v4 Swap(id indexed, sender indexed, amount0, amount1, sqrtPriceX96, liquidity, tick, fee).
// The volatility circuit was compiled against the tick living in topic 7.
const VOLATILITY_FIELDS: &[(&str, FieldSelector)] = &[
    ("event_id", FieldSelector::topic(0)),
    ("pool_id", FieldSelector::topic(1)),
    ("pool_address", FieldSelector::topic(2)),
    ("tick", FieldSelector::topic(7)),
];

const COMPUTE_FIELDS: &[(&str, FieldSelector)] = &[
    ("event_id", FieldSelector::topic(0)),
    ("pool_id", FieldSelector::topic(1)),
    ("sqrt_price", FieldSelector::data(2)),
    ("liquidity", FieldSelector::data(3)),
    ("tick", FieldSelector::data(4)),
];

/// Named, fixed ordering of field selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Short window tick volatility run
    Volatility,
    /// Large window bulk compute run
    Compute,
}

impl Schema {
    pub const ALL: [Schema; 2] = [Schema::Volatility, Schema::Compute];

    pub fn name(&self) -> &'static str {
        match self {
            Schema::Volatility => "volatility",
            Schema::Compute => "compute",
        }
    }

    /// Fields in the order the prover expects them
    pub fn fields(&self) -> &'static [(&'static str, FieldSelector)] {
        match self {
            Schema::Volatility => VOLATILITY_FIELDS,
            Schema::Compute => COMPUTE_FIELDS,
        }
    }

    pub fn selector(&self, field: &str) -> Result<FieldSelector> {
        self.fields()
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, selector)| *selector)
            .ok_or_else(|| PipelineError::UnknownField {
                schema: self.name().to_string(),
                field: field.to_string(),
            })
    }

    pub fn selectors(&self) -> Vec<FieldSelector> {
        self.fields().iter().map(|(_, selector)| *selector).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Schema {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "volatility" => Ok(Schema::Volatility),
            "compute" => Ok(Schema::Compute),
            other => Err(PipelineError::Config(format!("Unknown schema: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    #[test]
    fn test_volatility_table() {
        let schema = Schema::Volatility;
        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.selector("event_id").unwrap(), FieldSelector::topic(0));
        assert_eq!(schema.selector("pool_id").unwrap(), FieldSelector::topic(1));
        assert_eq!(schema.selector("pool_address").unwrap(), FieldSelector::topic(2));
        assert_eq!(schema.selector("tick").unwrap(), FieldSelector::topic(7));
    }

    #[test]
    fn test_compute_table() {
        let schema = Schema::Compute;
        assert_eq!(schema.selector("tick").unwrap(), FieldSelector::data(4));
        assert_eq!(schema.selector("sqrt_price").unwrap(), FieldSelector::data(2));
    }

    #[test]
    fn test_unknown_field() {
        let err = Schema::Compute.selector("pool_address").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownField { .. }));
    }

    #[test]
    fn test_every_schema_is_non_empty() {
        for schema in Schema::ALL {
            assert!(!schema.fields().is_empty(), "{} has no fields", schema);
            assert_eq!(schema.name().parse::<Schema>().unwrap(), schema);
        }
        assert!("bulk".parse::<Schema>().is_err());
    }

    #[test]
    fn test_extract() {
        let mut data = vec![0u8; 64];
        data[63] = 7;
        let log = RawLog {
            topics: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
            data: Bytes::from(data),
            ..Default::default()
        };

        assert_eq!(FieldSelector::topic(1).extract(&log), Some(B256::repeat_byte(2)));
        assert_eq!(FieldSelector::topic(2).extract(&log), None);
        assert_eq!(FieldSelector::data(1).extract(&log), Some(B256::with_last_byte(7)));
        assert_eq!(FieldSelector::data(2).extract(&log), None);
    }
}
