//! Seal records: identifier, creation time and integrity hash.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::SecretSalt;
use crate::error::{Result, SealError};

/// Prefix shared by every seal identifier.
pub const SEAL_ID_PREFIX: &str = "MBH";

/// Seal identifier of the form `MBH-YYYYMM-NNNN`.
///
/// Only locally distinguishing: the suffix is four random digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SealId(String);

impl SealId {
    /// Generate an identifier for the UTC month of `now`.
    pub fn generate<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: u16 = rng.gen_range(0..10_000);
        Self(format!(
            "{}-{:04}{:02}-{:04}",
            SEAL_ID_PREFIX,
            now.year(),
            now.month(),
            suffix
        ))
    }

    /// Validate an identifier string.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || SealError::InvalidSealId(value.to_string());

        let mut parts = value.split('-');
        let (prefix, month, suffix) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(m), Some(s), None) => (p, m, s),
            _ => return Err(invalid()),
        };

        let all_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
        if prefix != SEAL_ID_PREFIX || !all_digits(month, 6) || !all_digits(suffix, 4) {
            return Err(invalid());
        }

        let month_number: u32 = month[4..].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month_number) {
            return Err(invalid());
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SealId {
    type Error = SealError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SealId> for String {
    fn from(id: SealId) -> Self {
        id.0
    }
}

/// The record bound to a seal.
///
/// Immutable once created; the hash ties the identifier and timestamp to the
/// secret salt so the visible identifier cannot be forged without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealRecord {
    id: SealId,
    created_at_ms: i64,
    hash: String,
}

impl SealRecord {
    pub fn new(id: SealId, created_at_ms: i64, salt: &SecretSalt) -> Self {
        let hash = record_hash(&id, created_at_ms, salt);
        Self {
            id,
            created_at_ms,
            hash,
        }
    }

    /// Create a fresh record stamped with the current time.
    pub fn create(salt: &SecretSalt) -> Self {
        let now = Utc::now();
        let id = SealId::generate(now, &mut rand::thread_rng());
        Self::new(id, now.timestamp_millis(), salt)
    }

    pub fn id(&self) -> &SealId {
        &self.id
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    /// Hex-encoded SHA-256 integrity hash (64 characters).
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// `id:createdAtMs` as UTF-8, the payload of the geometric channel.
    pub fn payload(&self) -> Vec<u8> {
        format!("{}:{}", self.id, self.created_at_ms).into_bytes()
    }

    /// Recompute the hash with `salt` and compare it to the stored one.
    pub fn is_authentic(&self, salt: &SecretSalt) -> bool {
        record_hash(&self.id, self.created_at_ms, salt) == self.hash
    }

    /// Serialize the record to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| SealError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize a record from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SealError::Serialization(e.to_string()))
    }
}

fn record_hash(id: &SealId, created_at_ms: i64, salt: &SecretSalt) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", id, created_at_ms, salt.expose()).as_bytes());
    hex::encode(hasher.finalize())
}
