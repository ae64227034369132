//! Content manifest: entry name → hex digest.

use crate::{Result, WalletError};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// File name of the manifest inside the archive.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Digest used for manifest entries.
///
/// Wallet clients have always accepted SHA-1 manifests; SHA-256 is available
/// for targets that require it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Hex digest of `bytes`.
    pub fn hex_digest(&self, bytes: &[u8]) -> String {
        match self {
            Self::Sha1 => hex::encode(Sha1::digest(bytes)),
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
        }
    }

    /// Length of a hex digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }
}

impl std::str::FromStr for DigestAlgorithm {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(WalletError::Configuration(format!(
                "unsupported manifest digest: {}",
                other
            ))),
        }
    }
}

/// Mapping of every content entry to its digest, ordered by entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    algorithm: DigestAlgorithm,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Digests every `(name, bytes)` pair.
    pub fn compute<'a, I>(algorithm: DigestAlgorithm, entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let entries = entries
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), algorithm.hex_digest(bytes)))
            .collect();
        Self { algorithm, entries }
    }

    /// Parses manifest bytes read back from an archive. The algorithm is
    /// inferred from the digest length.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_slice(bytes)
            .map_err(|e| WalletError::Validation(format!("malformed manifest: {}", e)))?;
        let algorithm = match entries.values().next().map(String::len) {
            Some(64) => DigestAlgorithm::Sha256,
            _ => DigestAlgorithm::Sha1,
        };
        if let Some((name, _)) = entries.iter().find(|(_, d)| d.len() != algorithm.hex_len()) {
            return Err(WalletError::Validation(format!(
                "manifest digest for {} has unexpected length",
                name
            )));
        }
        Ok(Self { algorithm, entries })
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn digest(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Canonical serialized form; these are the bytes that get signed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.entries)?)
    }

    /// Checks that `name` hashes to its recorded digest.
    pub fn verify_entry(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let expected = self.digest(name).ok_or_else(|| {
            WalletError::Validation(format!("{} is not listed in the manifest", name))
        })?;
        if self.algorithm.hex_digest(bytes) != expected {
            return Err(WalletError::Validation(format!(
                "digest mismatch for {}",
                name
            )));
        }
        Ok(())
    }
}
