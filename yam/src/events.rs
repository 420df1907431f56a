//! YAM contract event ABI and the log decoder that feeds the mapper.
//!
//! The four events are declared with [`alloy::sol!`] so topic0 hashes and
//! ABI decoding come from the signatures themselves. [`decode`] turns a raw
//! RPC [`Log`] into a [`YamEvent`] carrying both the decoded parameters and
//! the chain context every record copies.

use alloy::primitives::B256;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::record::record_id;

sol! {
    /// Emitted when a seller lists `amount` of `offerToken` at `price` units of `buyerToken`.
    #[derive(Debug, PartialEq, Eq)]
    event OfferCreated(
        address indexed offerToken,
        address indexed buyerToken,
        address seller,
        address buyer,
        uint256 indexed offerId,
        uint256 price,
        uint256 amount
    );

    /// Emitted when a buyer takes `amount` from an offer.
    #[derive(Debug, PartialEq, Eq)]
    event OfferAccepted(
        uint256 indexed offerId,
        address indexed seller,
        address indexed buyer,
        address offerToken,
        address buyerToken,
        uint256 price,
        uint256 amount
    );

    /// Emitted when the seller withdraws an offer.
    #[derive(Debug, PartialEq, Eq)]
    event OfferDeleted(uint256 indexed offerId);

    /// Emitted when the seller changes the price or the amount of an offer.
    #[derive(Debug, PartialEq, Eq)]
    event OfferUpdated(
        uint256 indexed offerId,
        uint256 oldPrice,
        uint256 indexed newPrice,
        uint256 oldAmount,
        uint256 indexed newAmount
    );
}

/// Chain context shared by every event and copied onto every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogContext {
    /// Hash of the emitting transaction.
    pub transaction_hash: B256,
    /// Position of the log within its block.
    pub log_index: u64,
    /// Number of the containing block.
    pub block_number: u64,
    /// Block timestamp in unix seconds.
    pub timestamp: u64,
}

impl LogContext {
    /// Record identity for this log: `0x<tx hash>-<log index>`.
    #[must_use]
    pub fn id(&self) -> String {
        record_id(&self.transaction_hash, self.log_index)
    }
}

impl TryFrom<&Log> for LogContext {
    type Error = IngestError;

    fn try_from(log: &Log) -> Result<Self> {
        let missing = |field| IngestError::MalformedEvent { field };
        Ok(Self {
            transaction_hash: log.transaction_hash.ok_or_else(|| missing("transaction_hash"))?,
            log_index: log.log_index.ok_or_else(|| missing("log_index"))?,
            block_number: log.block_number.ok_or_else(|| missing("block_number"))?,
            timestamp: log.block_timestamp.ok_or_else(|| missing("block_timestamp"))?,
        })
    }
}

/// A decoded event: chain context plus typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<P> {
    /// Where the log was emitted.
    pub context: LogContext,
    /// ABI-decoded event parameters.
    pub params: P,
}

impl<P> Event<P> {
    /// Pair decoded parameters with their chain context.
    #[must_use]
    pub const fn new(context: LogContext, params: P) -> Self {
        Self { context, params }
    }
}

/// Any event emitted by the YAM contract.
#[derive(Debug, PartialEq, Eq)]
pub enum YamEvent {
    /// See [`OfferCreated`].
    OfferCreated(Event<OfferCreated>),
    /// See [`OfferAccepted`].
    OfferAccepted(Event<OfferAccepted>),
    /// See [`OfferDeleted`].
    OfferDeleted(Event<OfferDeleted>),
    /// See [`OfferUpdated`].
    OfferUpdated(Event<OfferUpdated>),
}

impl YamEvent {
    /// Chain context of the wrapped event.
    #[must_use]
    pub const fn context(&self) -> &LogContext {
        match self {
            Self::OfferCreated(e) => &e.context,
            Self::OfferAccepted(e) => &e.context,
            Self::OfferDeleted(e) => &e.context,
            Self::OfferUpdated(e) => &e.context,
        }
    }
}

/// Decode a raw contract log.
///
/// Returns `Ok(None)` for logs whose topic0 is not one of the four YAM
/// events, so callers can feed every log of the contract through here.
///
/// # Errors
///
/// - [`IngestError::MalformedEvent`] if the log lacks its transaction hash,
///   log index, block number or block timestamp.
/// - [`IngestError::Decode`] if the payload does not match the event ABI.
pub fn decode(log: &Log) -> Result<Option<YamEvent>> {
    let Some(topic0) = log.topics().first() else {
        return Ok(None);
    };

    let event = if *topic0 == OfferCreated::SIGNATURE_HASH {
        YamEvent::OfferCreated(decode_as(log)?)
    } else if *topic0 == OfferAccepted::SIGNATURE_HASH {
        YamEvent::OfferAccepted(decode_as(log)?)
    } else if *topic0 == OfferDeleted::SIGNATURE_HASH {
        YamEvent::OfferDeleted(decode_as(log)?)
    } else if *topic0 == OfferUpdated::SIGNATURE_HASH {
        YamEvent::OfferUpdated(decode_as(log)?)
    } else {
        return Ok(None);
    };

    Ok(Some(event))
}

fn decode_as<E: SolEvent>(log: &Log) -> Result<Event<E>> {
    let context = LogContext::try_from(log)?;
    let params = E::decode_log_data(log.data()).map_err(|source| IngestError::Decode {
        event: event_name::<E>(),
        source,
    })?;
    Ok(Event::new(context, params))
}

fn event_name<E: SolEvent>() -> &'static str {
    E::SIGNATURE.split('(').next().unwrap_or(E::SIGNATURE)
}
