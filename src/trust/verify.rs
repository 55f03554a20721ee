// src/trust/verify.rs

//! Detached OpenPGP signature checking
//!
//! Uses the sequoia-openpgp library (pure Rust implementation) against a
//! keyring directory of public certificates.

use crate::error::{Error, Result};
use openpgp::PacketPile;
use openpgp::cert::CertParser;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use sequoia_openpgp as openpgp;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// A signature that verified against a known key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignature {
    /// Fingerprint of the signing certificate (uppercase hex)
    pub fingerprint: String,
    /// Signature creation time, seconds since the epoch
    pub timestamp: Option<i64>,
}

/// Checks a detached signature over some data
pub trait SignatureVerifier: Send + Sync {
    /// All signatures that verify; an empty list means none did
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<Vec<ValidSignature>>;
}

/// Verifier over an in-memory set of certificates
pub struct OpenPgpVerifier {
    certs: Vec<openpgp::Cert>,
    policy: StandardPolicy<'static>,
}

impl Default for OpenPgpVerifier {
    fn default() -> Self {
        Self {
            certs: Vec::new(),
            policy: StandardPolicy::new(),
        }
    }
}

impl OpenPgpVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.asc`, `.gpg`, and `.pgp` file in `dir`
    ///
    /// Unreadable files are skipped with a warning.
    pub fn from_keyring_dir(dir: &Path) -> Result<Self> {
        let mut verifier = Self::new();
        if !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::IoError(format!("Failed to create keyring directory: {}", e)))?;
            return Ok(verifier);
        }

        for entry in fs::read_dir(dir)
            .map_err(|e| Error::IoError(format!("Failed to read keyring directory: {}", e)))?
        {
            let path = entry?.path();
            let is_key = matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("asc" | "gpg" | "pgp")
            );
            if !is_key {
                continue;
            }
            let data = fs::read(&path)?;
            match verifier.add_certs(&data) {
                Ok(fingerprints) => debug!("Loaded {:?} from {}", fingerprints, path.display()),
                Err(e) => warn!("Skipping keyring file {}: {}", path.display(), e),
            }
        }
        Ok(verifier)
    }

    /// Add every certificate in `data`, returning their fingerprints
    pub fn add_certs(&mut self, data: &[u8]) -> Result<Vec<String>> {
        let mut fingerprints = Vec::new();
        let parser = CertParser::from_bytes(data)
            .map_err(|e| Error::ParseError(format!("Failed to parse OpenPGP key: {}", e)))?;
        for cert in parser {
            let cert = cert.map_err(|e| Error::ParseError(format!("Failed to parse OpenPGP key: {}", e)))?;
            fingerprints.push(cert.fingerprint().to_hex());
            self.certs.push(cert);
        }
        Ok(fingerprints)
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.certs.iter().map(|c| c.fingerprint().to_hex()).collect()
    }
}

impl SignatureVerifier for OpenPgpVerifier {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<Vec<ValidSignature>> {
        let pile = PacketPile::from_bytes(signature)
            .map_err(|e| Error::ParseError(format!("Failed to parse signature: {}", e)))?;

        let mut valid: Vec<ValidSignature> = Vec::new();
        for packet in pile.descendants() {
            let openpgp::Packet::Signature(sig) = packet else {
                continue;
            };
            for cert in &self.certs {
                let verified = cert.keys().with_policy(&self.policy, None).any(|key| {
                    let mut sig = sig.clone();
                    key.for_signing() && sig.verify_message(key.key(), data).is_ok()
                });
                if !verified {
                    continue;
                }
                let fingerprint = cert.fingerprint().to_hex();
                if valid.iter().any(|v| v.fingerprint == fingerprint) {
                    continue;
                }
                let timestamp = sig
                    .signature_creation_time()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64);
                debug!("Good signature from {}", fingerprint);
                valid.push(ValidSignature { fingerprint, timestamp });
            }
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_keyring_dir_is_created() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("keys");
        let verifier = OpenPgpVerifier::from_keyring_dir(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(verifier.fingerprints().is_empty());
    }

    #[test]
    fn test_garbage_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.asc"), b"not a key").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();
        let verifier = OpenPgpVerifier::from_keyring_dir(tmp.path()).unwrap();
        assert!(verifier.fingerprints().is_empty());
    }

    #[test]
    fn test_garbage_signature_never_verifies() {
        let verifier = OpenPgpVerifier::new();
        let result = verifier.verify(b"data", b"not a signature");
        assert!(result.map(|sigs| sigs.is_empty()).unwrap_or(true));
    }
}
