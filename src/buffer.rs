use alloc::boxed::Box;
use alloc::vec;

/// Owned message buffer of fixed length
///
/// Buffers are only created by a [MemPool] and must be returned to it.
#[derive(Debug, PartialEq, Eq)]
pub struct Buffer(Box<[u8]>);

impl Buffer {
    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a buffer of length 0
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Content of the buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Copies `src` into the buffer starting at `offset`, returns the number of bytes copied
    pub fn copy_to(&mut self, offset: usize, src: &[u8]) -> usize {
        let Some(dst) = self.0.get_mut(offset..) else {
            return 0;
        };
        let count = dst.len().min(src.len());
        dst[..count].copy_from_slice(&src[..count]);
        count
    }
}

/// Byte budget for message buffers
pub struct MemPool {
    capacity: usize,
    used: usize,
}

impl MemPool {
    /// Creates a budget of `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, used: 0 }
    }

    /// Allocates a zeroed buffer of `len` bytes
    /// Fails for empty buffers and when the budget would be exceeded
    pub fn alloc(&mut self, len: usize) -> Option<Buffer> {
        if len == 0 || len > self.available() {
            return None;
        }
        self.used += len;
        Some(Buffer(vec![0; len].into_boxed_slice()))
    }

    /// Returns a buffer to the budget
    pub fn free(&mut self, buffer: Buffer) {
        self.used = self.used.saturating_sub(buffer.len());
    }

    /// Bytes held by allocated buffers
    pub fn in_use(&self) -> usize {
        self.used
    }

    /// Bytes left in the budget
    pub fn available(&self) -> usize {
        self.capacity - self.used
    }
}
