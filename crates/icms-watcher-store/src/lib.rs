//! Persistence layer: blob storage, per-account baselines, failure counters.

mod error;
pub use error::StoreError;

pub mod baseline;
pub mod blob;
pub mod failure;

pub use baseline::Baselines;
pub use blob::{BlobStore, FileStore, MemoryStore};
pub use failure::{FailureAccountant, FailurePolicy, Verdict};
