//! Mismatch signature
//!
//! A [`Signature`] fingerprints the *set* of failing bytes, not the file content.
//! Each mismatch is serialized as `offset (u64 LE) || actual byte` and fed into a
//! CRC-32, so two passes over the same corrupted file produce the same value if and
//! only if they found the same `(offset, value)` pairs.

use serde::Serialize;
use std::fmt;

/// Finalized 32-bit mismatch signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Signature(pub u32);

impl Signature {
    /// Signature of a pass that found no mismatches
    pub const CLEAN: Signature = Signature(0);
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Accumulates mismatch records in discovery order
#[derive(Clone)]
pub struct SignatureBuilder {
    hasher: crc32fast::Hasher,
    records: u64,
}

impl SignatureBuilder {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
            records: 0,
        }
    }

    /// Append one mismatch record
    pub fn record(&mut self, offset: u64, actual: u8) {
        let mut record = [0u8; 9];
        record[..8].copy_from_slice(&offset.to_le_bytes());
        record[8] = actual;
        self.hasher.update(&record);
        self.records += 1;
    }

    /// Number of records appended so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Finalize the checksum
    pub fn finish(self) -> Signature {
        Signature(self.hasher.finalize())
    }
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignatureBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureBuilder")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}
