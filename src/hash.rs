// src/hash.rs

//! Digest algorithms and manifest digest identifiers
//!
//! An implementation is named by the digest of its manifest. Four algorithm
//! generations are understood:
//!
//! | Identifier | Hash | Manifest layout | Encoding |
//! |------------|------|-----------------|----------|
//! | `sha1=...` | SHA-1 | legacy (directory mtimes, interleaved walk) | hex |
//! | `sha1new=...` | SHA-1 | new | hex |
//! | `sha256=...` | SHA-256 | new | hex |
//! | `sha256new_...` | SHA-256 | new | base32, lowercase, unpadded |
//!
//! Hashes inside manifest lines are always hex; only the final identifier of
//! `sha256new` uses base32.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648Lower { padding: false };

/// Manifest digest algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DigestAlgorithm {
    /// Original SHA-1 manifest format, includes directory mtimes
    Sha1,
    Sha1New,
    Sha256,
    /// Preferred for new digests
    #[default]
    Sha256New,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 4] = [
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha1New,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha256New,
    ];

    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha1New => "sha1new",
            Self::Sha256 => "sha256",
            Self::Sha256New => "sha256new",
        }
    }

    /// Separator between name and value in the digest identifier
    #[inline]
    pub const fn separator(&self) -> char {
        match self {
            Self::Sha256New => '_',
            _ => '=',
        }
    }

    /// Legacy manifests carry directory mtimes and interleave files with subdirectories
    #[inline]
    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::Sha1)
    }

    /// Preference when an implementation lists several digests (higher is better)
    pub const fn rating(&self) -> u8 {
        match self {
            Self::Sha1 => 10,
            Self::Sha1New => 50,
            Self::Sha256 => 80,
            Self::Sha256New => 90,
        }
    }

    /// Create a streaming hasher for this algorithm
    pub fn hasher(&self) -> Hasher {
        let state = match self {
            Self::Sha1 | Self::Sha1New => HasherState::Sha1(Sha1::new()),
            Self::Sha256 | Self::Sha256New => HasherState::Sha256(Sha256::new()),
        };
        Hasher { state }
    }

    /// Encode a raw digest of the manifest as this algorithm's identifier value
    pub fn encode(&self, raw: &[u8]) -> String {
        match self {
            Self::Sha256New => base32::encode(BASE32, raw),
            _ => hex::encode(raw),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha1" => Ok(Self::Sha1),
            "sha1new" => Ok(Self::Sha1New),
            "sha256" => Ok(Self::Sha256),
            "sha256new" => Ok(Self::Sha256New),
            _ => Err(Error::ParseError(format!("unknown digest algorithm: {}", s))),
        }
    }
}

/// Incremental hasher over SHA-1 or SHA-256
pub struct Hasher {
    state: HasherState,
}

enum HasherState {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha1(h) => h.update(data),
            HasherState::Sha256(h) => h.update(data),
        }
    }

    /// Finalize and return the raw digest bytes
    pub fn finalize(self) -> Vec<u8> {
        match self.state {
            HasherState::Sha1(h) => h.finalize().to_vec(),
            HasherState::Sha256(h) => h.finalize().to_vec(),
        }
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

/// Hex hash of a byte slice, as used inside manifest lines
pub fn hash_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    let mut hasher = algorithm.hasher();
    hasher.update(data);
    hasher.finalize_hex()
}

/// Hex hash of everything a reader yields
pub fn hash_reader<R: Read>(algorithm: DigestAlgorithm, reader: &mut R) -> io::Result<String> {
    let mut hasher = algorithm.hasher();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize_hex())
}

/// A manifest digest identifier such as `sha1new=f7ff...` or `sha256new_...`
///
/// The identifier doubles as the store directory name of the implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ManifestDigest {
    pub algorithm: DigestAlgorithm,
    pub value: String,
}

impl ManifestDigest {
    /// Validate `value` and store it in lowercase, the store's canonical form
    pub fn new(algorithm: DigestAlgorithm, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let valid = match algorithm {
            DigestAlgorithm::Sha256New => value
                .chars()
                .all(|c| c.is_ascii_alphabetic() || ('2'..='7').contains(&c)),
            _ => value.chars().all(|c| c.is_ascii_hexdigit()),
        };
        if value.is_empty() || !valid {
            return Err(Error::ParseError(format!(
                "invalid {} digest value: {:?}",
                algorithm, value
            )));
        }
        Ok(Self {
            algorithm,
            value: value.to_ascii_lowercase(),
        })
    }

    /// Digest identifier from raw manifest hash bytes
    pub fn from_raw(algorithm: DigestAlgorithm, raw: &[u8]) -> Self {
        Self {
            algorithm,
            value: algorithm.encode(raw),
        }
    }

    /// Pick the digest with the most preferred algorithm
    pub fn best<'a>(digests: impl IntoIterator<Item = &'a ManifestDigest>) -> Option<&'a ManifestDigest> {
        digests.into_iter().max_by_key(|d| d.algorithm.rating())
    }
}

impl fmt::Display for ManifestDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.algorithm.name(), self.algorithm.separator(), self.value)
    }
}

impl FromStr for ManifestDigest {
    type Err = Error;

    /// Parse `alg=value` or `sha256new_value`
    fn from_str(s: &str) -> Result<Self> {
        if let Some((alg, value)) = s.split_once('=') {
            let algorithm: DigestAlgorithm = alg.parse()?;
            if algorithm == DigestAlgorithm::Sha256New {
                return Err(Error::ParseError(format!(
                    "sha256new digests use '_' as separator: {}",
                    s
                )));
            }
            return Self::new(algorithm, value);
        }
        if let Some(value) = s.strip_prefix("sha256new_") {
            return Self::new(DigestAlgorithm::Sha256New, value);
        }
        Err(Error::ParseError(format!("not a manifest digest: {}", s)))
    }
}

impl TryFrom<String> for ManifestDigest {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ManifestDigest> for String {
    fn from(d: ManifestDigest) -> String {
        d.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sha1() {
        assert_eq!(
            hash_bytes(DigestAlgorithm::Sha1New, b"Hello"),
            "f7ff9e8b7bb2e09b70935a5d785e0cc5d9d0abf0"
        );
        assert_eq!(
            hash_bytes(DigestAlgorithm::Sha1, b"Hello World"),
            "0a4d55a8d778e5022fab701977c5d840bbc486d0"
        );
    }

    #[test]
    fn test_hash_reader_matches_bytes() {
        let data = vec![7u8; 20_000];
        let streamed = hash_reader(DigestAlgorithm::Sha256, &mut data.as_slice()).unwrap();
        assert_eq!(streamed, hash_bytes(DigestAlgorithm::Sha256, &data));
        assert_eq!(streamed.len(), 64);
    }

    #[test]
    fn test_parse_digest_identifiers() {
        let d: ManifestDigest = "sha1new=F7FF9E8B7BB2E09B70935A5D785E0CC5D9D0ABF0".parse().unwrap();
        assert_eq!(d.algorithm, DigestAlgorithm::Sha1New);
        assert_eq!(d.to_string(), "sha1new=f7ff9e8b7bb2e09b70935a5d785e0cc5d9d0abf0");

        let d: ManifestDigest = "sha256new_abcdefgh234567".parse().unwrap();
        assert_eq!(d.algorithm, DigestAlgorithm::Sha256New);
        assert_eq!(d.to_string(), "sha256new_abcdefgh234567");

        assert!("sha256new=abc".parse::<ManifestDigest>().is_err());
        assert!("md5=abc".parse::<ManifestDigest>().is_err());
        assert!("sha1=xyz".parse::<ManifestDigest>().is_err());
        assert!("garbage".parse::<ManifestDigest>().is_err());
    }

    #[test]
    fn test_sha256new_encoding() {
        let raw = Sha256::digest(b"").to_vec();
        let d = ManifestDigest::from_raw(DigestAlgorithm::Sha256New, &raw);
        // 32 bytes -> 52 unpadded base32 characters
        assert_eq!(d.value.len(), 52);
        assert!(!d.value.contains('='));
        assert_eq!(d.value, d.value.to_lowercase());
        let reparsed: ManifestDigest = d.to_string().parse().unwrap();
        assert_eq!(reparsed, d);
    }

    #[test]
    fn test_sha256new_uppercase_is_normalized() {
        let upper: ManifestDigest = "sha256new_RPUJPVVHEWJ673N736OCN7EMESYAEYM2UAY6OJ4MDFGUZ7QACLKA"
            .parse()
            .unwrap();
        let lower: ManifestDigest = "sha256new_rpujpvvhewj673n736ocn7emesyaeym2uay6oj4mdfguz7qaclka"
            .parse()
            .unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), lower.to_string());

        let raw = Sha256::digest(b"x").to_vec();
        let d = ManifestDigest::from_raw(DigestAlgorithm::Sha256New, &raw);
        let shouted: ManifestDigest = format!("sha256new_{}", d.value.to_uppercase()).parse().unwrap();
        assert_eq!(shouted, d);

        // '1' and '8' are outside the base32 alphabet in either case
        assert!("sha256new_ABC1".parse::<ManifestDigest>().is_err());
        assert!("sha256new_abc8".parse::<ManifestDigest>().is_err());
    }

    #[test]
    fn test_best_digest() {
        let a: ManifestDigest = "sha1=0a4d55a8d778e5022fab701977c5d840bbc486d0".parse().unwrap();
        let b: ManifestDigest = "sha256=abcd".parse().unwrap();
        let digests = vec![a, b.clone()];
        assert_eq!(ManifestDigest::best(&digests), Some(&b));
        let empty: Vec<ManifestDigest> = Vec::new();
        assert_eq!(ManifestDigest::best(&empty), None);
    }
}
