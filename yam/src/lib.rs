//! Typed ingestion of RealT YAM exchange events.
//!
//! The YAM contract emits four events (`OfferCreated`, `OfferAccepted`,
//! `OfferDeleted`, `OfferUpdated`). This crate decodes their logs, maps each
//! one to a record whose id is stable across replays, and upserts it into a
//! caller-supplied [`RecordStore`].
//!
//! ```
//! use yam::{Mapper, MemoryStore, events};
//! # fn run(logs: Vec<alloy::rpc::types::Log>) -> yam::Result<()> {
//! let mut mapper = Mapper::new(MemoryStore::new());
//! for log in &logs {
//!     if let Some(event) = events::decode(log)? {
//!         mapper.handle(&event)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod mapper;
pub mod record;
pub mod report;
pub mod status;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use error::{IngestError, Result};
pub use events::{Event, LogContext, YamEvent};
pub use mapper::Mapper;
pub use record::{AnyRecord, Record, RecordKind, record_id};
pub use report::{Side, Trade};
pub use status::{OfferStatus, offer_status};
pub use store::{MemoryStore, RecordStore};
