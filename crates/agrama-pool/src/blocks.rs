//! Fixed-shape slot payloads for the mandatory pools: request-sized
//! buffers, response-sized buffers, JSON-like objects, and vector-aligned
//! embedding blocks.

use bytemuck::{Pod, Zeroable};

/// Default byte capacity for a request-buffer slot. Requests larger than
/// this are not split across slots; the caller allocates from its arena
/// instead (pools never partially serve a request).
pub const REQUEST_BUFFER_SIZE: usize = 4 * 1024;

/// Default byte capacity for a response-buffer slot.
pub const RESPONSE_BUFFER_SIZE: usize = 16 * 1024;

/// Upper bound on embedding dimension. Vector
/// blocks are sized to the max so one pool shape serves every configured
/// dimension without per-dimension pool proliferation.
pub const MAX_EMBEDDING_DIM: usize = 3072;

/// A fixed-capacity byte buffer used for request/response staging.
#[derive(Clone)]
pub struct FixedBuffer<const N: usize> {
    data: Box<[u8; N]>,
    len: usize,
}

impl<const N: usize> Default for FixedBuffer<N> {
    fn default() -> Self {
        Self {
            data: Box::new([0u8; N]),
            len: 0,
        }
    }
}

impl<const N: usize> FixedBuffer<N> {
    pub const CAPACITY: usize = N;

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Copies `bytes` into the slot. Returns `false` (instead of panicking)
    /// if the payload exceeds the slot's fixed capacity — the caller should
    /// fall back to an arena allocation in that case.
    pub fn fill(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > N {
            return false;
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        true
    }
}

/// A 32-byte-aligned block large enough to hold the widest configured
/// embedding. `repr(align(32))` guarantees the alignment the semantic
/// index's inner loops rely on for wide SIMD loads; `Pod`/`Zeroable` assert
/// zero-copy, predictable layout at compile time.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(32))]
pub struct VectorBlock {
    data: [f32; MAX_EMBEDDING_DIM],
    len: u32,
    _pad: [u32; 7], // keeps the struct's tail 32-byte aligned
}

impl Default for VectorBlock {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl VectorBlock {
    pub fn as_slice(&self) -> &[f32] {
        &self.data[..self.len as usize]
    }

    pub fn fill(&mut self, values: &[f32]) -> bool {
        if values.len() > MAX_EMBEDDING_DIM {
            return false;
        }
        self.data[..values.len()].copy_from_slice(values);
        self.len = values.len() as u32;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_block_is_32_byte_aligned() {
        assert_eq!(std::mem::align_of::<VectorBlock>(), 32);
    }

    #[test]
    fn fixed_buffer_rejects_oversized_payload() {
        let mut buf: FixedBuffer<8> = FixedBuffer::default();
        assert!(!buf.fill(&[0u8; 9]));
        assert!(buf.fill(&[1, 2, 3]));
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }
}
