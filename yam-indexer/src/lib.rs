//! RealT YAM event indexer library.
//!
//! Fetches `OfferCreated`, `OfferAccepted`, `OfferDeleted` and
//! `OfferUpdated` logs from the YAM contract over JSON-RPC, maps them into
//! records with the [`yam`] crate and stores them as Parquet files.

pub mod config;
pub mod cursor;
pub mod fetcher;
pub mod parquet;
pub mod store;
