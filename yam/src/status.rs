//! Offer status derived from an offer's stored history.

use std::fmt;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::record::AnyRecord;
use crate::store::MemoryStore;

/// Lifecycle state of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    /// Open with a positive remaining amount.
    InProgress,
    /// The whole listed amount was bought.
    SoldOut,
    /// Withdrawn by the seller.
    Deleted,
}

impl OfferStatus {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "InProgress",
            Self::SoldOut => "SoldOut",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive an offer's status from its records.
///
/// `history` may contain records of other offers and need not be sorted.
/// Returns `None` when the offer was never created or when acceptances
/// exceed the listed amount.
///
/// The latest `OfferUpdated` resets the remaining amount to its
/// `new_amount`; only acceptances after it count against that amount.
pub fn offer_status<'a>(
    offer_id: U256,
    history: impl IntoIterator<Item = &'a AnyRecord>,
) -> Option<OfferStatus> {
    let mut events: Vec<&AnyRecord> = history
        .into_iter()
        .filter(|r| r.offer_id() == offer_id)
        .collect();
    events.sort_by_key(|r| r.position());

    let created = events
        .iter()
        .position(|r| matches!(r, AnyRecord::OfferCreated(_)))?;

    if matches!(events.last(), Some(AnyRecord::OfferDeleted(_))) {
        return Some(OfferStatus::Deleted);
    }

    let start = events
        .iter()
        .rposition(|r| matches!(r, AnyRecord::OfferUpdated(_)))
        .unwrap_or(created);

    let mut remaining = match events.get(start) {
        Some(AnyRecord::OfferUpdated(u)) => u.payload.new_amount,
        Some(AnyRecord::OfferCreated(c)) => c.payload.amount,
        _ => return None,
    };
    for record in events.iter().skip(start + 1) {
        if let AnyRecord::OfferAccepted(a) = record {
            remaining = remaining.checked_sub(a.payload.amount)?;
        }
    }

    Some(if remaining.is_zero() { OfferStatus::SoldOut } else { OfferStatus::InProgress })
}

impl MemoryStore {
    /// Status of `offer_id` given everything stored so far.
    #[must_use]
    pub fn offer_status(&self, offer_id: U256) -> Option<OfferStatus> {
        offer_status(offer_id, self.iter())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;
    use crate::record::{
        OfferAcceptedPayload, OfferCreatedPayload, OfferDeletedPayload, OfferUpdatedPayload,
        Record,
    };
    use crate::store::RecordStore;
    use crate::test_utils::context;

    const OFFER: u64 = 42;

    fn created(block: u64, amount: u64) -> AnyRecord {
        Record::new(
            &context(block, 0),
            OfferCreatedPayload {
                offer_token: Address::repeat_byte(1),
                buyer_token: Address::repeat_byte(2),
                seller: Address::repeat_byte(3),
                buyer: Address::ZERO,
                offer_id: U256::from(OFFER),
                price: U256::from(10),
                amount: U256::from(amount),
            },
        )
        .into()
    }

    fn accepted(block: u64, amount: u64) -> AnyRecord {
        Record::new(
            &context(block, 1),
            OfferAcceptedPayload {
                offer_token: Address::repeat_byte(1),
                buyer_token: Address::repeat_byte(2),
                seller: Address::repeat_byte(3),
                buyer: Address::repeat_byte(4),
                offer_id: U256::from(OFFER),
                price: U256::from(10),
                amount: U256::from(amount),
            },
        )
        .into()
    }

    fn updated(block: u64, new_amount: u64) -> AnyRecord {
        Record::new(
            &context(block, 2),
            OfferUpdatedPayload {
                offer_id: U256::from(OFFER),
                old_price: U256::from(10),
                new_price: U256::from(12),
                old_amount: U256::from(1),
                new_amount: U256::from(new_amount),
            },
        )
        .into()
    }

    fn deleted(block: u64) -> AnyRecord {
        Record::new(&context(block, 3), OfferDeletedPayload { offer_id: U256::from(OFFER) })
            .into()
    }

    fn status(records: &[AnyRecord]) -> Option<OfferStatus> {
        offer_status(U256::from(OFFER), records)
    }

    #[test]
    fn unknown_offer_has_no_status() {
        assert_eq!(status(&[]), None, "empty history");
        assert_eq!(status(&[accepted(2, 1)]), None, "acceptance without creation");
    }

    #[test]
    fn partial_and_full_fills() {
        assert_eq!(status(&[created(1, 5)]), Some(OfferStatus::InProgress), "fresh offer");
        assert_eq!(
            status(&[created(1, 5), accepted(2, 2)]),
            Some(OfferStatus::InProgress),
            "partially filled"
        );
        assert_eq!(
            status(&[accepted(3, 3), created(1, 5), accepted(2, 2)]),
            Some(OfferStatus::SoldOut),
            "filled, input order irrelevant"
        );
        assert_eq!(status(&[created(1, 1), accepted(2, 2)]), None, "overfilled");
    }

    #[test]
    fn update_resets_remaining_amount() {
        let history = [created(1, 5), accepted(2, 5), updated(3, 4), accepted(4, 1)];
        assert_eq!(status(&history), Some(OfferStatus::InProgress), "refilled after sell-out");

        let history = [created(1, 5), accepted(2, 1), updated(3, 0)];
        assert_eq!(status(&history), Some(OfferStatus::SoldOut), "updated to zero");
    }

    #[test]
    fn deletion_wins_only_when_last() {
        assert_eq!(
            status(&[created(1, 5), accepted(2, 1), deleted(3)]),
            Some(OfferStatus::Deleted),
            "deleted"
        );
        assert_eq!(
            status(&[created(1, 5), deleted(2), updated(3, 2)]),
            Some(OfferStatus::InProgress),
            "re-activated by a later update"
        );
    }

    #[test]
    fn memory_store_reports_status() {
        let mut store = MemoryStore::new();
        for record in [created(1, 2), accepted(2, 2)] {
            store.upsert(&record.id().to_owned(), record).unwrap();
        }
        assert_eq!(store.offer_status(U256::from(OFFER)), Some(OfferStatus::SoldOut), "sold out");
        assert_eq!(store.offer_status(U256::from(OFFER + 1)), None, "other offer");
    }
}
