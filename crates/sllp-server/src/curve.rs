//! Chunked curve upload with a commit-time checksum gate.
//!
//! ```text
//! Idle --block 0--> Receiving --block n+1--> Receiving
//!   ^                  |  \
//!   |     finish(ok)   |   any failure
//!   +---- Committed <--+    +--> Discarded --> Idle
//! ```
//!
//! A transfer left in `Receiving` stays there until the next block 0
//! restarts it or a finish closes it.

use sllp_frame::{curve_checksum, CurveChecksum, CurveHasher, CurveInfo};
use tracing::{debug, warn};

use crate::config::CurveConfig;
use crate::error::DeviceError;

const KIND: &str = "curve";

#[derive(Debug, Clone, Default)]
enum Transfer {
    #[default]
    Idle,
    Receiving {
        next_index: u16,
        buf: Vec<u8>,
        hasher: CurveHasher,
    },
}

/// Externally visible transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Receiving { blocks: u16, bytes: usize },
}

/// One curve: committed contents plus the in-flight transfer, if any.
#[derive(Debug, Clone)]
pub struct Curve {
    writable: bool,
    block_size: u16,
    block_count: u8,
    data: Vec<u8>,
    checksum: CurveChecksum,
    transfer: Transfer,
}

impl Curve {
    pub fn new(config: &CurveConfig) -> Self {
        Self {
            writable: config.writable,
            block_size: config.block_size,
            block_count: config.block_count,
            data: Vec::new(),
            checksum: curve_checksum(&[]),
            transfer: Transfer::Idle,
        }
    }

    /// Most bytes a transfer may carry.
    pub fn capacity(&self) -> usize {
        usize::from(self.block_size) * usize::from(self.block_count)
    }

    /// Committed contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn checksum(&self) -> CurveChecksum {
        self.checksum
    }

    pub fn state(&self) -> TransferState {
        match &self.transfer {
            Transfer::Idle => TransferState::Idle,
            Transfer::Receiving {
                next_index, buf, ..
            } => TransferState::Receiving {
                blocks: *next_index,
                bytes: buf.len(),
            },
        }
    }

    fn info(&self) -> CurveInfo {
        CurveInfo {
            writable: self.writable,
            block_count: self.block_count,
            block_size: self.block_size,
            checksum: self.checksum,
        }
    }

    fn begin_block(&mut self, id: u8, index: u16, data: &[u8]) -> Result<(), DeviceError> {
        if !self.writable {
            return Err(DeviceError::ReadOnly { kind: KIND, id });
        }
        if index == 0 {
            self.transfer = Transfer::Receiving {
                next_index: 0,
                buf: Vec::with_capacity(self.capacity()),
                hasher: CurveHasher::new(),
            };
        }

        let capacity = self.capacity();
        let block_size = usize::from(self.block_size);
        let result = match &mut self.transfer {
            Transfer::Idle => Err(DeviceError::MalformedMessage(format!(
                "curve {id}: block {index} without an open transfer"
            ))),
            Transfer::Receiving { next_index, .. } if *next_index != index => {
                Err(DeviceError::MalformedMessage(format!(
                    "curve {id}: block {index} out of order, expected {next_index}"
                )))
            }
            Transfer::Receiving { .. } if data.len() > block_size => {
                Err(DeviceError::InvalidPayloadSize {
                    what: "curve block",
                    expected: block_size,
                    actual: data.len(),
                })
            }
            Transfer::Receiving { buf, .. } if buf.len() + data.len() > capacity => {
                Err(DeviceError::InvalidPayloadSize {
                    what: "curve transfer",
                    expected: capacity,
                    actual: buf.len() + data.len(),
                })
            }
            Transfer::Receiving {
                next_index,
                buf,
                hasher,
            } => {
                buf.extend_from_slice(data);
                hasher.update(data);
                *next_index += 1;
                Ok(())
            }
        };

        if let Err(err) = &result {
            if matches!(self.transfer, Transfer::Receiving { .. }) {
                warn!(curve = id, %err, "curve transfer discarded");
            }
            self.transfer = Transfer::Idle;
        }
        result
    }

    fn finish(&mut self, id: u8, expected: &CurveChecksum) -> Result<(), DeviceError> {
        if !self.writable {
            return Err(DeviceError::ReadOnly { kind: KIND, id });
        }
        match std::mem::take(&mut self.transfer) {
            Transfer::Idle => Err(DeviceError::MalformedMessage(format!(
                "curve {id}: no transfer to finish"
            ))),
            Transfer::Receiving { buf, hasher, .. } => {
                let actual = hasher.checksum();
                if &actual != expected {
                    warn!(curve = id, bytes = buf.len(), "curve checksum mismatch");
                    return Err(DeviceError::ChecksumMismatch { curve: id });
                }
                debug!(curve = id, bytes = buf.len(), "curve committed");
                self.data = buf;
                self.checksum = actual;
                Ok(())
            }
        }
    }

    fn recalc_checksum(&mut self) {
        self.checksum = curve_checksum(&self.data);
    }
}

/// Every curve of a device, addressed by dense id.
#[derive(Debug, Clone, Default)]
pub struct CurveStore {
    curves: Vec<Curve>,
}

impl CurveStore {
    pub fn new(configs: &[CurveConfig]) -> Self {
        Self {
            curves: configs.iter().map(Curve::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn get(&self, id: u8) -> Result<&Curve, DeviceError> {
        self.curves
            .get(usize::from(id))
            .ok_or(DeviceError::InvalidId { kind: KIND, id })
    }

    fn get_mut(&mut self, id: u8) -> Result<&mut Curve, DeviceError> {
        self.curves
            .get_mut(usize::from(id))
            .ok_or(DeviceError::InvalidId { kind: KIND, id })
    }

    /// Accept block `index` of curve `id`. Block 0 opens (or restarts) a
    /// transfer; later blocks must arrive in order. Any failure discards
    /// the transfer.
    pub fn begin_block(&mut self, id: u8, index: u16, data: &[u8]) -> Result<(), DeviceError> {
        self.get_mut(id)?.begin_block(id, index, data)
    }

    /// Close the transfer: commit on checksum match, discard otherwise.
    /// Either way the curve returns to idle.
    pub fn finish(&mut self, id: u8, checksum: &CurveChecksum) -> Result<(), DeviceError> {
        self.get_mut(id)?.finish(id, checksum)
    }

    /// Recompute the stored checksum from the committed contents.
    pub fn recalc_checksum(&mut self, id: u8) -> Result<(), DeviceError> {
        self.get_mut(id)?.recalc_checksum();
        Ok(())
    }

    /// Catalog entries for the curve list.
    pub fn infos(&self) -> Vec<CurveInfo> {
        self.curves.iter().map(Curve::info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CurveStore {
        CurveStore::new(&[
            CurveConfig {
                block_size: 4,
                block_count: 3,
                writable: true,
            },
            CurveConfig {
                block_size: 4,
                block_count: 1,
                writable: false,
            },
        ])
    }

    fn send(store: &mut CurveStore, data: &[u8]) {
        for (index, block) in data.chunks(4).enumerate() {
            store.begin_block(0, index as u16, block).unwrap();
        }
    }

    #[test]
    fn matching_checksum_commits() {
        let mut store = store();
        let data = b"0123456789";
        send(&mut store, data);
        assert_eq!(
            store.get(0).unwrap().state(),
            TransferState::Receiving {
                blocks: 3,
                bytes: 10
            }
        );

        store.finish(0, &curve_checksum(data)).unwrap();
        let curve = store.get(0).unwrap();
        assert_eq!(curve.data(), data);
        assert_eq!(curve.checksum(), curve_checksum(data));
        assert_eq!(curve.state(), TransferState::Idle);
    }

    #[test]
    fn corrupted_checksum_keeps_prior_contents() {
        let mut store = store();
        send(&mut store, b"first");
        store.finish(0, &curve_checksum(b"first")).unwrap();

        send(&mut store, b"second!");
        let mut bad = curve_checksum(b"second!");
        bad[0] ^= 0xFF;
        let err = store.finish(0, &bad).unwrap_err();
        assert_eq!(err, DeviceError::ChecksumMismatch { curve: 0 });

        let curve = store.get(0).unwrap();
        assert_eq!(curve.data(), b"first");
        assert_eq!(curve.state(), TransferState::Idle);
    }

    #[test]
    fn out_of_order_block_discards() {
        let mut store = store();
        store.begin_block(0, 0, b"abcd").unwrap();
        let err = store.begin_block(0, 2, b"efgh").unwrap_err();
        assert!(matches!(err, DeviceError::MalformedMessage(_)));
        assert_eq!(store.get(0).unwrap().state(), TransferState::Idle);
        assert!(matches!(
            store.begin_block(0, 1, b"efgh"),
            Err(DeviceError::MalformedMessage(_))
        ));
    }

    #[test]
    fn block_zero_restarts_stalled_transfer() {
        let mut store = store();
        store.begin_block(0, 0, b"old!").unwrap();
        store.begin_block(0, 1, b"old!").unwrap();
        store.begin_block(0, 0, b"new!").unwrap();
        store.finish(0, &curve_checksum(b"new!")).unwrap();
        assert_eq!(store.get(0).unwrap().data(), b"new!");
    }

    #[test]
    fn oversized_blocks_are_rejected() {
        let mut store = store();
        let err = store.begin_block(0, 0, b"too long").unwrap_err();
        assert!(matches!(err, DeviceError::InvalidPayloadSize { .. }));

        send(&mut store, b"012345678901");
        let err = store.begin_block(0, 3, b"x").unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidPayloadSize {
                what: "curve transfer",
                ..
            }
        ));
        assert_eq!(store.get(0).unwrap().state(), TransferState::Idle);
    }

    #[test]
    fn read_only_and_unknown_curves() {
        let mut store = store();
        assert!(matches!(
            store.begin_block(1, 0, b"abcd"),
            Err(DeviceError::ReadOnly { id: 1, .. })
        ));
        assert!(matches!(
            store.begin_block(2, 0, b"abcd"),
            Err(DeviceError::InvalidId { id: 2, .. })
        ));
        assert!(matches!(
            store.finish(0, &[0u8; 16]),
            Err(DeviceError::MalformedMessage(_))
        ));
    }

    #[test]
    fn recalc_reflects_committed_data() {
        let mut store = store();
        send(&mut store, b"abc");
        store.finish(0, &curve_checksum(b"abc")).unwrap();
        store.recalc_checksum(0).unwrap();
        assert_eq!(store.infos()[0].checksum, curve_checksum(b"abc"));
        assert_eq!(store.infos()[1].checksum, curve_checksum(&[]));
    }
}
