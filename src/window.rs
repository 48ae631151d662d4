//! Block window resolution

use crate::error::{PipelineError, Result};
use crate::types::BlockWindow;

/// Ethereum blocks land roughly every 12-15 seconds, so 900 blocks covers
/// a little over the 15 minute volatility horizon.
pub const VOLATILITY_LOOKBACK: i64 = 900;

pub const COMPUTE_LOOKBACK: i64 = 50_000;

/// Window ending at `current_height` and reaching `lookback` blocks back
pub fn resolve(current_height: u64, lookback: i64) -> Result<BlockWindow> {
    let invalid = || PipelineError::InvalidWindow { height: current_height, lookback };

    let span = u64::try_from(lookback).map_err(|_| invalid())?;
    let from_block = current_height.checked_sub(span).ok_or_else(invalid)?;

    Ok(BlockWindow {
        from_block,
        to_block: current_height,
    })
}
