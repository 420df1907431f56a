//! Stored record types, one per YAM event.
//!
//! A [`Record`] is the chain context of a log plus a typed payload copied
//! verbatim from the event parameters. Its `id` depends only on the
//! transaction hash and log index, so replaying a log rewrites the same
//! record.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::events::{self, LogContext};

/// Derive the record identity of a log: `0x<64 hex digits>-<decimal log index>`.
#[must_use]
pub fn record_id(transaction_hash: &B256, log_index: u64) -> String {
    format!("{transaction_hash:#x}-{log_index}")
}

/// A persisted entity produced from one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<P> {
    /// Unique, replay-stable identity. See [`record_id`].
    pub id: String,
    /// Hash of the emitting transaction.
    pub transaction_hash: B256,
    /// Position of the log within its block.
    pub log_index: u64,
    /// Number of the containing block.
    pub block_number: u64,
    /// Block timestamp in unix seconds.
    pub timestamp: u64,
    /// Event-specific fields.
    #[serde(flatten)]
    pub payload: P,
}

impl<P> Record<P> {
    /// Build a record from its chain context and payload, deriving the id.
    #[must_use]
    pub fn new(context: &LogContext, payload: P) -> Self {
        Self {
            id: context.id(),
            transaction_hash: context.transaction_hash,
            log_index: context.log_index,
            block_number: context.block_number,
            timestamp: context.timestamp,
            payload,
        }
    }

    /// The chain context this record was built from.
    #[must_use]
    pub const fn context(&self) -> LogContext {
        LogContext {
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
            block_number: self.block_number,
            timestamp: self.timestamp,
        }
    }
}

/// Payload of an `OfferCreated` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCreatedPayload {
    /// Token being sold.
    pub offer_token: Address,
    /// Token the seller wants in exchange.
    pub buyer_token: Address,
    /// Offer creator.
    pub seller: Address,
    /// Private buyer, or the zero address for a public offer.
    pub buyer: Address,
    /// Contract-assigned offer identifier.
    pub offer_id: U256,
    /// Price per unit in `buyer_token` base units.
    pub price: U256,
    /// Amount of `offer_token` listed.
    pub amount: U256,
}

/// Payload of an `OfferAccepted` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAcceptedPayload {
    /// Token being sold.
    pub offer_token: Address,
    /// Token paid by the buyer.
    pub buyer_token: Address,
    /// Offer creator.
    pub seller: Address,
    /// Account that took the offer.
    pub buyer: Address,
    /// Offer being accepted.
    pub offer_id: U256,
    /// Price per unit paid.
    pub price: U256,
    /// Amount bought.
    pub amount: U256,
}

/// Payload of an `OfferDeleted` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferDeletedPayload {
    /// Offer withdrawn by its seller.
    pub offer_id: U256,
}

/// Payload of an `OfferUpdated` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferUpdatedPayload {
    /// Offer being changed.
    pub offer_id: U256,
    /// Price before the update.
    pub old_price: U256,
    /// Price after the update.
    pub new_price: U256,
    /// Amount before the update.
    pub old_amount: U256,
    /// Amount after the update.
    pub new_amount: U256,
}

impl From<&events::OfferCreated> for OfferCreatedPayload {
    fn from(e: &events::OfferCreated) -> Self {
        Self {
            offer_token: e.offerToken,
            buyer_token: e.buyerToken,
            seller: e.seller,
            buyer: e.buyer,
            offer_id: e.offerId,
            price: e.price,
            amount: e.amount,
        }
    }
}

impl From<&events::OfferAccepted> for OfferAcceptedPayload {
    fn from(e: &events::OfferAccepted) -> Self {
        Self {
            offer_token: e.offerToken,
            buyer_token: e.buyerToken,
            seller: e.seller,
            buyer: e.buyer,
            offer_id: e.offerId,
            price: e.price,
            amount: e.amount,
        }
    }
}

impl From<&events::OfferDeleted> for OfferDeletedPayload {
    fn from(e: &events::OfferDeleted) -> Self {
        Self { offer_id: e.offerId }
    }
}

impl From<&events::OfferUpdated> for OfferUpdatedPayload {
    fn from(e: &events::OfferUpdated) -> Self {
        Self {
            offer_id: e.offerId,
            old_price: e.oldPrice,
            new_price: e.newPrice,
            old_amount: e.oldAmount,
            new_amount: e.newAmount,
        }
    }
}

/// Record of an `OfferCreated` event.
pub type OfferCreatedRecord = Record<OfferCreatedPayload>;
/// Record of an `OfferAccepted` event.
pub type OfferAcceptedRecord = Record<OfferAcceptedPayload>;
/// Record of an `OfferDeleted` event.
pub type OfferDeletedRecord = Record<OfferDeletedPayload>;
/// Record of an `OfferUpdated` event.
pub type OfferUpdatedRecord = Record<OfferUpdatedPayload>;

/// Discriminant of [`AnyRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    /// `OfferCreated`.
    OfferCreated,
    /// `OfferAccepted`.
    OfferAccepted,
    /// `OfferDeleted`.
    OfferDeleted,
    /// `OfferUpdated`.
    OfferUpdated,
}

impl RecordKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::OfferCreated,
        Self::OfferAccepted,
        Self::OfferDeleted,
        Self::OfferUpdated,
    ];

    /// Event name as emitted by the contract.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OfferCreated => "OfferCreated",
            Self::OfferAccepted => "OfferAccepted",
            Self::OfferDeleted => "OfferDeleted",
            Self::OfferUpdated => "OfferUpdated",
        }
    }

    /// `snake_case` name, used for file and table names.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::OfferCreated => "offer_created",
            Self::OfferAccepted => "offer_accepted",
            Self::OfferDeleted => "offer_deleted",
            Self::OfferUpdated => "offer_updated",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AnyRecord {
    /// See [`OfferCreatedRecord`].
    OfferCreated(OfferCreatedRecord),
    /// See [`OfferAcceptedRecord`].
    OfferAccepted(OfferAcceptedRecord),
    /// See [`OfferDeletedRecord`].
    OfferDeleted(OfferDeletedRecord),
    /// See [`OfferUpdatedRecord`].
    OfferUpdated(OfferUpdatedRecord),
}

impl AnyRecord {
    /// Which event produced this record.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::OfferCreated(_) => RecordKind::OfferCreated,
            Self::OfferAccepted(_) => RecordKind::OfferAccepted,
            Self::OfferDeleted(_) => RecordKind::OfferDeleted,
            Self::OfferUpdated(_) => RecordKind::OfferUpdated,
        }
    }

    /// Record identity.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::OfferCreated(r) => &r.id,
            Self::OfferAccepted(r) => &r.id,
            Self::OfferDeleted(r) => &r.id,
            Self::OfferUpdated(r) => &r.id,
        }
    }

    /// Chain context copied from the source log.
    #[must_use]
    pub const fn context(&self) -> LogContext {
        match self {
            Self::OfferCreated(r) => r.context(),
            Self::OfferAccepted(r) => r.context(),
            Self::OfferDeleted(r) => r.context(),
            Self::OfferUpdated(r) => r.context(),
        }
    }

    /// Offer the record refers to.
    #[must_use]
    pub const fn offer_id(&self) -> U256 {
        match self {
            Self::OfferCreated(r) => r.payload.offer_id,
            Self::OfferAccepted(r) => r.payload.offer_id,
            Self::OfferDeleted(r) => r.payload.offer_id,
            Self::OfferUpdated(r) => r.payload.offer_id,
        }
    }

    /// Chain ordering key: `(block_number, log_index)`.
    #[must_use]
    pub const fn position(&self) -> (u64, u64) {
        let ctx = self.context();
        (ctx.block_number, ctx.log_index)
    }
}

macro_rules! impl_from_record {
    ($($variant:ident => $payload:ty),* $(,)?) => {
        $(
            impl From<Record<$payload>> for AnyRecord {
                fn from(record: Record<$payload>) -> Self {
                    Self::$variant(record)
                }
            }
        )*
    };
}

impl_from_record! {
    OfferCreated => OfferCreatedPayload,
    OfferAccepted => OfferAcceptedPayload,
    OfferDeleted => OfferDeletedPayload,
    OfferUpdated => OfferUpdatedPayload,
}
