//! Log and context builders shared by unit tests.

use alloy::primitives::{Address, B256, LogData};
use alloy::rpc::types::Log;

use crate::events::LogContext;

/// Context for a log in a one-transaction block: the tx hash is derived
/// from the block number so every log of a block shares it.
pub(crate) fn context(block_number: u64, log_index: u64) -> LogContext {
    LogContext {
        transaction_hash: B256::left_padding_from(&block_number.to_be_bytes()),
        log_index,
        block_number,
        timestamp: 1_700_000_000 + block_number * 5,
    }
}

/// RPC log as returned by `eth_getLogs`, with `block_timestamp` populated.
pub(crate) fn rpc_log(ctx: &LogContext, data: LogData) -> Log {
    Log {
        inner: alloy::primitives::Log { address: Address::ZERO, data },
        block_hash: None,
        block_number: Some(ctx.block_number),
        block_timestamp: Some(ctx.timestamp),
        transaction_hash: Some(ctx.transaction_hash),
        transaction_index: Some(0),
        log_index: Some(ctx.log_index),
        removed: false,
    }
}
