//! Image Import Library
//!
//! Turns container image manifests (Docker schema 1, schema 2, OCI and
//! manifest lists) into the derived fields of an image record, and decides
//! how those fields survive updates to the record.

pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod registry;

pub use config::{ImportConfig, ManifestListPolicy, Platform};
pub use error::{ImportError, Result};
pub use image::Image;
pub use registry::{ImageStrategy, MergeOutcome, Provenance};
