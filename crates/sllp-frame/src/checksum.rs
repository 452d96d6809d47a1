//! Curve checksum: the leading 16 bytes of a SHA-256 digest, accumulated
//! block by block as a curve is transferred.

use sha2::{Digest, Sha256};

/// Checksum width on the wire.
pub const CHECKSUM_SIZE: usize = 16;

/// A curve checksum.
pub type CurveChecksum = [u8; CHECKSUM_SIZE];

/// Running checksum over curve blocks.
#[derive(Debug, Clone, Default)]
pub struct CurveHasher {
    inner: Sha256,
    len: usize,
}

impl CurveHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the next block into the checksum.
    pub fn update(&mut self, block: &[u8]) {
        self.inner.update(block);
        self.len += block.len();
    }

    /// Bytes folded in so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checksum of everything folded in so far. The hasher stays usable.
    pub fn checksum(&self) -> CurveChecksum {
        let digest = self.inner.clone().finalize();
        let mut out = [0u8; CHECKSUM_SIZE];
        out.copy_from_slice(&digest[..CHECKSUM_SIZE]);
        out
    }
}

/// Checksum of a complete curve.
pub fn curve_checksum(data: &[u8]) -> CurveChecksum {
    let mut hasher = CurveHasher::new();
    hasher.update(data);
    hasher.checksum()
}
