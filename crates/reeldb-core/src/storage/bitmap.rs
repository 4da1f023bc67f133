//! Fixed-capacity slot bitmap.
//!
//! Bit `i` lives in bit `i % 8` of byte `i / 8` (LSB first). Bit 0 is reserved
//! and permanently set, so slot 0 is never handed out.

use crate::error::{Error, Result};

/// Bit vector tracking which slots are live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u8>,
    capacity: u32,
}

impl Bitmap {
    /// Creates a bitmap with room for `capacity` slots, all free except slot 0.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        let mut bitmap = Self {
            bits: vec![0u8; Self::byte_len(capacity)],
            capacity,
        };
        if capacity > 0 {
            bitmap.bits[0] |= 1;
        }
        bitmap
    }

    /// Number of bytes needed to hold `capacity` bits.
    #[must_use]
    pub fn byte_len(capacity: u32) -> usize {
        (capacity as usize).div_ceil(8)
    }

    /// Total number of slots, including the reserved slot 0.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns true if slot `i` is free. Out-of-range slots are never free.
    #[must_use]
    pub fn is_free(&self, i: u32) -> bool {
        if i >= self.capacity {
            return false;
        }
        self.bits[(i / 8) as usize] & (1 << (i % 8)) == 0
    }

    /// Marks slot `i` as live.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] if `i` is outside the bitmap.
    pub fn set(&mut self, i: u32) -> Result<()> {
        if i >= self.capacity {
            return Err(Error::capacity(format!(
                "slot {i} exceeds bitmap capacity {}",
                self.capacity
            )));
        }
        self.bits[(i / 8) as usize] |= 1 << (i % 8);
        Ok(())
    }

    /// Clears slot `i`. Idempotent; slot 0 and out-of-range slots are ignored.
    pub fn free(&mut self, i: u32) {
        if i == 0 || i >= self.capacity {
            return;
        }
        self.bits[(i / 8) as usize] &= !(1 << (i % 8));
    }

    /// Allocates the lowest free slot `>= 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] when every slot is taken; the bitmap is
    /// left untouched in that case.
    pub fn alloc(&mut self) -> Result<u32> {
        let slot = self.first_free().ok_or_else(|| {
            Error::capacity(format!("no free slot in bitmap of {}", self.capacity))
        })?;
        self.set(slot)?;
        Ok(slot)
    }

    /// Lowest free slot `>= 1`, without allocating it.
    #[must_use]
    pub fn first_free(&self) -> Option<u32> {
        let byte = self.bits.iter().position(|&b| b != u8::MAX)?;
        let bit = self.bits[byte].trailing_ones();
        let slot = u32::try_from(byte).ok()? * 8 + bit;
        (slot < self.capacity).then_some(slot)
    }

    /// Number of live slots, not counting the reserved slot 0.
    #[must_use]
    pub fn count_live(&self) -> u32 {
        let ones: u32 = self.bits.iter().map(|b| b.count_ones()).sum();
        ones.saturating_sub(1)
    }

    /// Raw packed bytes, `ceil(capacity / 8)` long.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Rebuilds a bitmap from packed bytes produced by [`Bitmap::as_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if the byte length does not match `capacity`.
    pub fn from_bytes(capacity: u32, bytes: &[u8]) -> Result<Self> {
        let expected = Self::byte_len(capacity);
        if bytes.len() != expected {
            return Err(Error::corruption(format!(
                "bitmap blob is {} bytes, expected {expected}",
                bytes.len()
            )));
        }
        let mut bitmap = Self {
            bits: bytes.to_vec(),
            capacity,
        };
        if capacity > 0 {
            bitmap.bits[0] |= 1;
        }
        Ok(bitmap)
    }
}
