//! Pointer-aligned IOCTL scratch buffers

use core::fmt;
use core::mem::size_of;

use crate::error::{CsmiError, CsmiResult};

/// Zero-initialized byte buffer aligned to `usize`
///
/// Drivers read the header fields in place, so the buffer start must be
/// pointer aligned.
pub struct AlignedBuffer {
    words: Vec<usize>,
    len: usize,
}

impl AlignedBuffer {
    /// Allocate `len` zeroed bytes
    pub fn zeroed(len: usize) -> CsmiResult<Self> {
        let count = len.div_ceil(size_of::<usize>());
        let mut words = Vec::new();
        words
            .try_reserve_exact(count)
            .map_err(|_| CsmiError::MemoryFailure)?;
        words.resize(count, 0);
        Ok(Self { words, len })
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Zero length
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte view
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `words` owns at least `len` initialized bytes and u8 has
        // no alignment requirement.
        unsafe { core::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    /// Mutable byte view
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and the borrow is unique through `&mut self`.
        unsafe { core::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer").field("len", &self.len).finish()
    }
}
