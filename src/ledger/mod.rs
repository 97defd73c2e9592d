//! The ingestion ledger: the local record of which receipt images have been processed, keyed by
//! the content hash of their bytes.
//!
//! `Ledger` is the store, loaded fully at the start of a run and rewritten atomically after each
//! successful extraction. `ingest` reconciles a batch of images against it, calling the
//! extractor only for content it has not seen before.

mod ingest;
mod retry;
mod store;

pub use ingest::{ingest, IngestOptions, IngestReport, Notice};
pub use store::{Ledger, LedgerEntry};
