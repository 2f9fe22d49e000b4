use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha512};

/// Outcome of checking a payload against a Subresource Integrity string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityCheck {
    Verified,
    /// No entry uses an algorithm we can compute.
    Unsupported,
}

pub fn sha512_integrity(payload: &[u8]) -> String {
    format!("sha512-{}", STANDARD.encode(Sha512::digest(payload)))
}

/// Verifies `payload` against a space-separated SRI string such as
/// `sha512-<base64>`. Any matching `sha512` entry is enough; a mismatch on
/// every `sha512` entry is an error.
pub fn verify_integrity(payload: &[u8], integrity: &str) -> Result<IntegrityCheck> {
    let mut expected = Vec::new();
    for entry in integrity.split_whitespace() {
        let Some((algorithm, digest)) = entry.split_once('-') else {
            continue;
        };
        if !algorithm.eq_ignore_ascii_case("sha512") {
            continue;
        }
        // options after '?' are allowed by the SRI grammar
        let digest = digest.split('?').next().unwrap_or(digest);
        let decoded = STANDARD
            .decode(digest)
            .map_err(|err| anyhow!("invalid sha512 integrity digest '{digest}': {err}"))?;
        expected.push(decoded);
    }

    if expected.is_empty() {
        return Ok(IntegrityCheck::Unsupported);
    }

    let actual = Sha512::digest(payload);
    if expected.iter().any(|digest| digest.as_slice() == actual.as_slice()) {
        return Ok(IntegrityCheck::Verified);
    }
    Err(anyhow!(
        "sha512 digest mismatch: expected {integrity}, got {}",
        sha512_integrity(payload)
    ))
}
