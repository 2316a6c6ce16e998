//! Image record lifecycle
//!
//! This module decides what gets persisted when an image record is created or
//! updated. [`strategy`] is the entry point the object store calls; [`merge`]
//! holds the pure update policy; [`fetcher`] reaches a registry when manifest
//! lists have to be resolved.

pub mod fetcher;
pub mod memory;
pub mod merge;
pub mod strategy;
pub mod validation;

pub use fetcher::{FetchedManifest, ManifestFetcher, RegistryFetcher, RegistryFetcherBuilder};
pub use memory::MemoryImageStore;
pub use merge::{Provenance, UpdatePlan};
pub use strategy::{ImageStrategy, MergeOutcome};
pub use validation::validate_image;
