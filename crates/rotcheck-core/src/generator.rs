//! Deterministic pseudo-random stream generator
//!
//! Both the write and the verify phase construct their own [`Generator`] from the
//! same fixed seed. Because the state only advances with stream position, the byte
//! at any absolute offset is the same no matter how callers split their requests,
//! as long as every request is a multiple of [`BLOCK_SIZE`].

use crate::error::{Error, Result};

/// Granularity of a single `fill` request in bytes (four 64-bit words)
pub const BLOCK_SIZE: usize = 32;

const WORD_SIZE: usize = std::mem::size_of::<u64>();

const SEED: [u64; 4] = [
    0x9E37_79B9_7F4A_7C15,
    0xBF58_476D_1CE4_E5B9,
    0x94D0_49BB_1331_11EB,
    0x2545_F491_4F6C_DD1D,
];

/// Xorshift generator over four 64-bit state words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    state: [u64; 4],
}

impl Generator {
    /// Create a generator positioned at stream offset 0
    pub fn new() -> Self {
        Self { state: SEED }
    }

    /// Fill `buf` with the next `buf.len()` bytes of the stream.
    ///
    /// Words are emitted little-endian so the stream is identical on every platform.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `buf.len()` is not a multiple of
    /// [`BLOCK_SIZE`]. The state is left untouched in that case.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(Error::InvalidArgument(format!(
                "buffer length {} is not a multiple of {} bytes",
                buf.len(),
                BLOCK_SIZE
            )));
        }

        for word in buf.chunks_exact_mut(WORD_SIZE) {
            word.copy_from_slice(&self.next_word().to_le_bytes());
        }

        Ok(())
    }

    #[inline]
    fn next_word(&mut self) -> u64 {
        let [x, y, z, w] = self.state;
        let t = x ^ (x << 11);
        let next = w ^ (w >> 19) ^ t ^ (t >> 8);
        self.state = [y, z, w, next];
        next
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}
