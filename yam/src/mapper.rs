//! Event to record mapping.
//!
//! Every handler follows the same steps: derive the id from the log's
//! transaction hash and log index, build the typed record with the chain
//! context and the verbatim event parameters, and upsert it. The mapper
//! keeps no state between calls; the injected store owns every record.

use crate::error::Result;
use crate::events::{Event, OfferAccepted, OfferCreated, OfferDeleted, OfferUpdated, YamEvent};
use crate::record::{
    AnyRecord, OfferAcceptedPayload, OfferCreatedPayload, OfferDeletedPayload,
    OfferUpdatedPayload, Record,
};
use crate::store::RecordStore;

/// Maps decoded YAM events into records held by `S`.
#[derive(Debug)]
pub struct Mapper<S> {
    store: S,
}

impl<S: RecordStore> Mapper<S> {
    /// Create a mapper writing into `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Store an `OfferCreated` record.
    ///
    /// # Errors
    ///
    /// Propagates the store's error unchanged.
    pub fn handle_offer_created(&mut self, event: &Event<OfferCreated>) -> Result<()> {
        self.save(Record::new(&event.context, OfferCreatedPayload::from(&event.params)))
    }

    /// Store an `OfferAccepted` record.
    ///
    /// # Errors
    ///
    /// Propagates the store's error unchanged.
    pub fn handle_offer_accepted(&mut self, event: &Event<OfferAccepted>) -> Result<()> {
        self.save(Record::new(&event.context, OfferAcceptedPayload::from(&event.params)))
    }

    /// Store an `OfferDeleted` record.
    ///
    /// # Errors
    ///
    /// Propagates the store's error unchanged.
    pub fn handle_offer_deleted(&mut self, event: &Event<OfferDeleted>) -> Result<()> {
        self.save(Record::new(&event.context, OfferDeletedPayload::from(&event.params)))
    }

    /// Store an `OfferUpdated` record. Old and new values are kept side by side.
    ///
    /// # Errors
    ///
    /// Propagates the store's error unchanged.
    pub fn handle_offer_updated(&mut self, event: &Event<OfferUpdated>) -> Result<()> {
        self.save(Record::new(&event.context, OfferUpdatedPayload::from(&event.params)))
    }

    /// Dispatch any decoded event to its handler.
    ///
    /// # Errors
    ///
    /// Propagates the store's error unchanged.
    pub fn handle(&mut self, event: &YamEvent) -> Result<()> {
        match event {
            YamEvent::OfferCreated(e) => self.handle_offer_created(e),
            YamEvent::OfferAccepted(e) => self.handle_offer_accepted(e),
            YamEvent::OfferDeleted(e) => self.handle_offer_deleted(e),
            YamEvent::OfferUpdated(e) => self.handle_offer_updated(e),
        }
    }

    fn save<P>(&mut self, record: Record<P>) -> Result<()>
    where
        AnyRecord: From<Record<P>>,
    {
        let record = AnyRecord::from(record);
        tracing::trace!(id = record.id(), kind = %record.kind(), "upserting record");
        let id = record.id().to_owned();
        self.store.upsert(&id, record)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256, address, b256};

    use super::*;
    use crate::error::IngestError;
    use crate::events::LogContext;
    use crate::store::MemoryStore;
    use crate::test_utils::context;

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn upsert(&mut self, _id: &str, _record: AnyRecord) -> Result<()> {
            Err(IngestError::store("disk full"))
        }
    }

    fn created(ctx: LogContext) -> Event<OfferCreated> {
        Event::new(
            ctx,
            OfferCreated {
                offerToken: address!("0x0000000000000000000000000000000000000a11"),
                buyerToken: address!("0x0000000000000000000000000000000000000b22"),
                seller: address!("0x0000000000000000000000000000000000000c33"),
                buyer: Address::ZERO,
                offerId: U256::from(7),
                price: U256::from(100),
                amount: U256::from(2),
            },
        )
    }

    #[test]
    fn offer_created_fields_are_preserved() {
        let ctx = LogContext {
            transaction_hash: b256!(
                "0xabc0000000000000000000000000000000000000000000000000000000000001"
            ),
            log_index: 3,
            block_number: 25_600_000,
            timestamp: 1_690_000_000,
        };
        let mut mapper = Mapper::new(MemoryStore::new());
        mapper.handle_offer_created(&created(ctx)).unwrap();

        let id = "0xabc0000000000000000000000000000000000000000000000000000000000001-3";
        let Some(AnyRecord::OfferCreated(record)) = mapper.store().get(id) else {
            panic!("OfferCreated record missing");
        };
        assert_eq!(record.id, id, "id");
        assert_eq!(record.context(), ctx, "chain context copied");
        assert_eq!(record.payload.offer_id, U256::from(7), "offer id");
        assert_eq!(record.payload.price, U256::from(100), "price");
        assert_eq!(record.payload.amount, U256::from(2), "amount");
        assert_eq!(
            record.payload.offer_token,
            address!("0x0000000000000000000000000000000000000a11"),
            "offer token"
        );
        assert_eq!(record.payload.buyer, Address::ZERO, "public offer buyer");
    }

    #[test]
    fn offer_updated_keeps_old_and_new_values() {
        let event = Event::new(
            context(10, 1),
            OfferUpdated {
                offerId: U256::from(7),
                oldPrice: U256::from(100),
                newPrice: U256::from(120),
                oldAmount: U256::from(2),
                newAmount: U256::from(2),
            },
        );
        let mut mapper = Mapper::new(MemoryStore::new());
        mapper.handle(&YamEvent::OfferUpdated(event)).unwrap();

        let Some(AnyRecord::OfferUpdated(record)) = mapper.store().get(&context(10, 1).id())
        else {
            panic!("OfferUpdated record missing");
        };
        assert_eq!(record.payload.old_price, U256::from(100), "old price");
        assert_eq!(record.payload.new_price, U256::from(120), "new price");
        assert_eq!(record.payload.old_amount, record.payload.new_amount, "amount untouched");
    }

    #[test]
    fn accepted_and_deleted_are_stored_under_their_own_ids() {
        let accepted = Event::new(
            context(11, 0),
            OfferAccepted {
                offerId: U256::from(7),
                seller: address!("0x0000000000000000000000000000000000000c33"),
                buyer: address!("0x0000000000000000000000000000000000000d44"),
                offerToken: address!("0x0000000000000000000000000000000000000a11"),
                buyerToken: address!("0x0000000000000000000000000000000000000b22"),
                price: U256::from(100),
                amount: U256::from(1),
            },
        );
        let deleted = Event::new(context(11, 1), OfferDeleted { offerId: U256::from(7) });

        let mut mapper = Mapper::new(MemoryStore::new());
        mapper.handle_offer_accepted(&accepted).unwrap();
        mapper.handle_offer_deleted(&deleted).unwrap();

        let store = mapper.into_inner();
        assert_eq!(store.len(), 2, "two distinct records");
        assert!(
            matches!(store.get(&context(11, 0).id()), Some(AnyRecord::OfferAccepted(r)) if r.payload.amount == U256::from(1)),
            "accepted amount"
        );
        assert!(
            matches!(store.get(&context(11, 1).id()), Some(AnyRecord::OfferDeleted(_))),
            "deleted record"
        );
    }

    #[test]
    fn replaying_an_event_is_idempotent() {
        let event = YamEvent::OfferCreated(created(context(1, 0)));

        let mut once = Mapper::new(MemoryStore::new());
        once.handle(&event).unwrap();

        let mut twice = Mapper::new(MemoryStore::new());
        twice.handle(&event).unwrap();
        twice.handle(&event).unwrap();

        assert_eq!(once.store(), twice.store(), "replay must not change state");
    }

    #[test]
    fn mapper_works_through_a_borrowed_store() {
        let mut store = MemoryStore::new();
        Mapper::new(&mut store).handle(&YamEvent::OfferCreated(created(context(1, 0)))).unwrap();
        assert_eq!(store.len(), 1, "record written through &mut");
    }

    #[test]
    fn store_failure_is_propagated() {
        let mut mapper = Mapper::new(FailingStore);
        let err = mapper.handle_offer_created(&created(context(1, 0))).unwrap_err();
        assert!(matches!(err, IngestError::StoreUnavailable(_)), "store error surfaced: {err}");
    }
}
