//! Content digests for manifests, configs and layers
//!
//! Digests are strings of the form `algorithm:hex`. Hash algorithms live in a
//! [`DigestRegistry`] keyed by the algorithm prefix, so callers can add new
//! algorithms without touching the code that verifies manifests.

use crate::error::{ImportError, Result};
use sha2::Digest as _;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// SHA256 of the gzip-compressed empty tar archive, the throwaway layer blob
/// referenced by legacy schema 1 manifests
pub const EMPTY_TAR_BLOB_DIGEST: &str =
    "sha256:a3ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";

/// A parsed `algorithm:hex` digest string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    pub fn new(algorithm: &str, hex: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_ascii_lowercase(),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Whether `value` has the shape of a digest string.
    pub fn is_digest_shaped(value: &str) -> bool {
        value.parse::<Digest>().is_ok()
    }
}

impl FromStr for Digest {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self> {
        let (algorithm, hex) = value.split_once(':').ok_or_else(|| {
            ImportError::Validation(format!("Digest missing algorithm prefix: {}", value))
        })?;

        if !is_valid_algorithm(algorithm) {
            return Err(ImportError::Validation(format!(
                "Invalid digest algorithm in: {}",
                value
            )));
        }
        if hex.len() < 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ImportError::Validation(format!(
                "Invalid digest hex part in: {}",
                value
            )));
        }

        Ok(Digest::new(algorithm, hex))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

// Lowercase alphanumeric components joined by one of `+._-`.
fn is_valid_algorithm(algorithm: &str) -> bool {
    !algorithm.is_empty()
        && algorithm
            .split(['+', '.', '_', '-'])
            .all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            })
}

/// A hash function addressable by its digest prefix
pub trait DigestAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;

    /// Length of the hex encoding of a hash
    fn hex_len(&self) -> usize;

    fn hash_hex(&self, data: &[u8]) -> String;
}

pub struct Sha256Algorithm;
pub struct Sha384Algorithm;
pub struct Sha512Algorithm;

impl DigestAlgorithm for Sha256Algorithm {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hex_len(&self) -> usize {
        64
    }

    fn hash_hex(&self, data: &[u8]) -> String {
        hex::encode(sha2::Sha256::digest(data))
    }
}

impl DigestAlgorithm for Sha384Algorithm {
    fn name(&self) -> &'static str {
        "sha384"
    }

    fn hex_len(&self) -> usize {
        96
    }

    fn hash_hex(&self, data: &[u8]) -> String {
        hex::encode(sha2::Sha384::digest(data))
    }
}

impl DigestAlgorithm for Sha512Algorithm {
    fn name(&self) -> &'static str {
        "sha512"
    }

    fn hex_len(&self) -> usize {
        128
    }

    fn hash_hex(&self, data: &[u8]) -> String {
        hex::encode(sha2::Sha512::digest(data))
    }
}

/// Registry of digest algorithms keyed by prefix
#[derive(Clone)]
pub struct DigestRegistry {
    algorithms: HashMap<&'static str, Arc<dyn DigestAlgorithm>>,
}

impl Default for DigestRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Sha256Algorithm);
        registry.register(Sha384Algorithm);
        registry.register(Sha512Algorithm);
        registry
    }
}

impl fmt::Debug for DigestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.algorithms.keys().collect();
        names.sort();
        f.debug_struct("DigestRegistry")
            .field("algorithms", &names)
            .finish()
    }
}

impl DigestRegistry {
    pub fn empty() -> Self {
        Self {
            algorithms: HashMap::new(),
        }
    }

    /// Add or replace an algorithm
    pub fn register<A: DigestAlgorithm + 'static>(&mut self, algorithm: A) {
        self.algorithms.insert(algorithm.name(), Arc::new(algorithm));
    }

    pub fn supports(&self, algorithm: &str) -> bool {
        self.algorithms.contains_key(algorithm)
    }

    fn algorithm(&self, name: &str) -> Result<&Arc<dyn DigestAlgorithm>> {
        self.algorithms
            .get(name)
            .ok_or_else(|| ImportError::UnsupportedDigestAlgorithm(name.to_string()))
    }

    /// Compute the digest of `data` with the named algorithm
    pub fn compute(&self, algorithm: &str, data: &[u8]) -> Result<Digest> {
        let algorithm = self.algorithm(algorithm)?;
        Ok(Digest::new(algorithm.name(), &algorithm.hash_hex(data)))
    }

    /// Compute the canonical sha256 digest of `data`
    pub fn sha256(data: &[u8]) -> Digest {
        Digest::new("sha256", &Sha256Algorithm.hash_hex(data))
    }

    /// Verify that `data` hashes to `expected`, using the algorithm the
    /// digest names. Fails closed on unknown algorithms.
    pub fn verify(&self, expected: &Digest, data: &[u8]) -> Result<()> {
        let algorithm = self.algorithm(expected.algorithm())?;
        if expected.hex().len() != algorithm.hex_len() {
            return Err(ImportError::Validation(format!(
                "Invalid {} digest length: expected {} hex characters, got {}",
                algorithm.name(),
                algorithm.hex_len(),
                expected.hex().len()
            )));
        }

        let actual = Digest::new(algorithm.name(), &algorithm.hash_hex(data));
        if !actual.hex().eq_ignore_ascii_case(expected.hex()) {
            return Err(ImportError::DigestMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Confirm a manifest is the content an image name identifies.
    ///
    /// Names that are not digest-shaped are not content-addressed and skip
    /// verification.
    pub fn verify_manifest(&self, name: &str, manifest: &[u8]) -> Result<()> {
        match name.parse::<Digest>() {
            Ok(expected) => {
                self.verify(&expected, manifest)?;
                tracing::debug!(name, "Manifest digest matches image name");
                Ok(())
            }
            Err(_) => {
                tracing::trace!(name, "Image name is not a digest, skipping verification");
                Ok(())
            }
        }
    }
}
