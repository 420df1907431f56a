//! Trade report: accepted offers involving a set of accounts.
//!
//! Selects `OfferAccepted` records where any of the given accounts is the
//! buyer or the seller, inside an inclusive block-timestamp window. The
//! accepted record already carries both tokens and both parties, so no
//! lookup of the creating `OfferCreated` record is needed.

use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::record::{AnyRecord, OfferAcceptedRecord};
use crate::store::MemoryStore;

/// Side of a trade taken by the reported accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The accounts bought.
    Buyer,
    /// The accounts sold.
    Seller,
    /// The accounts were on both sides, or either side when filtering.
    Both,
}

impl Side {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Both => "both",
        }
    }

    /// Side `accounts` took in `trade`, or `None` if they took no part.
    #[must_use]
    pub fn of(accounts: &[Address], trade: &OfferAcceptedRecord) -> Option<Self> {
        let bought = accounts.contains(&trade.payload.buyer);
        let sold = accounts.contains(&trade.payload.seller);
        match (bought, sold) {
            (true, true) => Some(Self::Both),
            (true, false) => Some(Self::Buyer),
            (false, true) => Some(Self::Seller),
            (false, false) => None,
        }
    }

    /// Whether a trade where the accounts took `taken` passes this filter.
    const fn includes(self, taken: Self) -> bool {
        matches!(
            (self, taken),
            (Self::Both, _) | (_, Self::Both) | (Self::Buyer, Self::Buyer) | (Self::Seller, Self::Seller)
        )
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One report line: an accepted offer and the side the accounts took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trade<'a> {
    /// Side taken by the reported accounts.
    pub side: Side,
    /// The stored `OfferAccepted` record.
    #[serde(flatten)]
    pub record: &'a OfferAcceptedRecord,
}

impl MemoryStore {
    /// Accepted offers where `accounts` took `side`, with a block timestamp
    /// in `[from_ts, to_ts]`, oldest first.
    ///
    /// Trades within one second keep chain order.
    #[must_use]
    pub fn accepted_by_account(
        &self,
        accounts: &[Address],
        side: Side,
        from_ts: u64,
        to_ts: u64,
    ) -> Vec<Trade<'_>> {
        let mut trades: Vec<Trade<'_>> = self
            .iter()
            .filter_map(|r| match r {
                AnyRecord::OfferAccepted(record) => Some(record),
                _ => None,
            })
            .filter(|record| (from_ts..=to_ts).contains(&record.timestamp))
            .filter_map(|record| {
                Side::of(accounts, record)
                    .filter(|taken| side.includes(*taken))
                    .map(|taken| Trade { side: taken, record })
            })
            .collect();
        trades.sort_by_key(|t| (t.record.timestamp, t.record.block_number, t.record.log_index));
        trades
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::record::{OfferAcceptedPayload, OfferDeletedPayload, Record};
    use crate::test_utils::context;

    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);
    const CAROL: Address = Address::repeat_byte(0xc0);

    fn accepted(block: u64, log_index: u64, seller: Address, buyer: Address) -> AnyRecord {
        Record::new(
            &context(block, log_index),
            OfferAcceptedPayload {
                offer_token: Address::repeat_byte(1),
                buyer_token: Address::repeat_byte(2),
                seller,
                buyer,
                offer_id: U256::from(block),
                price: U256::from(10),
                amount: U256::from(1),
            },
        )
        .into()
    }

    fn ts(block: u64) -> u64 {
        context(block, 0).timestamp
    }

    fn blocks(trades: &[Trade<'_>]) -> Vec<u64> {
        trades.iter().map(|t| t.record.block_number).collect()
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.extend([
            accepted(10, 0, ALICE, BOB),
            accepted(20, 1, BOB, ALICE),
            accepted(20, 0, CAROL, ALICE),
            accepted(30, 0, ALICE, ALICE),
            accepted(40, 0, BOB, CAROL),
            Record::new(&context(25, 0), OfferDeletedPayload { offer_id: U256::from(25) }).into(),
        ]);
        store
    }

    #[test]
    fn splits_buyer_and_seller_trades() {
        let store = store();
        let all = store.accepted_by_account(&[ALICE], Side::Both, 0, u64::MAX);
        assert_eq!(blocks(&all), vec![10, 20, 20, 30], "every trade alice took part in");
        assert_eq!(all[0].side, Side::Seller, "alice sold in block 10");
        assert_eq!(all[3].side, Side::Both, "self trade");

        let bought = store.accepted_by_account(&[ALICE], Side::Buyer, 0, u64::MAX);
        assert_eq!(blocks(&bought), vec![20, 20, 30], "purchases only");

        let sold = store.accepted_by_account(&[ALICE], Side::Seller, 0, u64::MAX);
        assert_eq!(blocks(&sold), vec![10, 30], "sales only");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let store = store();
        let hits = store.accepted_by_account(&[ALICE], Side::Both, ts(20), ts(30));
        assert_eq!(blocks(&hits), vec![20, 20, 30], "both bounds included");

        let hits = store.accepted_by_account(&[ALICE], Side::Both, ts(20) + 1, ts(30) - 1);
        assert!(hits.is_empty(), "trades just outside the window excluded");
    }

    #[test]
    fn same_second_trades_keep_log_order() {
        let store = store();
        let hits = store.accepted_by_account(&[ALICE], Side::Buyer, ts(20), ts(20));
        let order: Vec<u64> = hits.iter().map(|t| t.record.log_index).collect();
        assert_eq!(order, vec![0, 1], "log order within the block");
    }

    #[test]
    fn several_accounts_and_strangers() {
        let store = store();
        let hits = store.accepted_by_account(&[BOB, CAROL], Side::Both, 0, u64::MAX);
        assert_eq!(blocks(&hits), vec![10, 20, 20, 40], "union of both accounts");
        assert_eq!(hits[3].side, Side::Both, "bob sold to carol");

        let none = store.accepted_by_account(&[Address::repeat_byte(0xee)], Side::Both, 0, u64::MAX);
        assert!(none.is_empty(), "unknown account has no trades");
    }

    #[test]
    fn trade_serializes_flat() {
        let store = store();
        let hits = store.accepted_by_account(&[BOB], Side::Buyer, 0, ts(10));
        let json = serde_json::to_value(hits[0]).unwrap();
        assert_eq!(json["side"], "buyer", "side tag");
        assert_eq!(json["block_number"], 10, "record fields inlined");
        assert!(json.get("record").is_none(), "no nested record object");
    }
}
