//! The authoritative variable table.

use sllp_frame::{BinaryOp, VariableInfo};
use tracing::trace;

use crate::config::VariableConfig;
use crate::error::DeviceError;

const KIND: &str = "variable";

#[derive(Debug, Clone)]
struct Variable {
    writable: bool,
    raw: Vec<u8>,
}

/// Fixed set of variables with dense ids `0..len()`.
///
/// Widths never change after construction, and every write replaces a
/// value whole: the new bytes are validated before any are copied in.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    vars: Vec<Variable>,
}

impl VariableRegistry {
    /// Build the table. Widths and initial values must already be valid
    /// (see [`DeviceConfig::validate`](crate::DeviceConfig::validate)).
    pub fn new(configs: &[VariableConfig]) -> Self {
        let vars = configs
            .iter()
            .map(|cfg| {
                let mut raw = vec![0u8; usize::from(cfg.width)];
                if cfg.initial.len() == raw.len() {
                    raw.copy_from_slice(&cfg.initial);
                }
                Variable {
                    writable: cfg.writable,
                    raw,
                }
            })
            .collect();
        Self { vars }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn get(&self, id: u8) -> Result<&Variable, DeviceError> {
        self.vars
            .get(usize::from(id))
            .ok_or(DeviceError::InvalidId { kind: KIND, id })
    }

    fn get_writable(&mut self, id: u8) -> Result<&mut Variable, DeviceError> {
        let var = self
            .vars
            .get_mut(usize::from(id))
            .ok_or(DeviceError::InvalidId { kind: KIND, id })?;
        if !var.writable {
            return Err(DeviceError::ReadOnly { kind: KIND, id });
        }
        Ok(var)
    }

    /// Byte width of `id`.
    pub fn width(&self, id: u8) -> Result<usize, DeviceError> {
        Ok(self.get(id)?.raw.len())
    }

    pub fn is_writable(&self, id: u8) -> Result<bool, DeviceError> {
        Ok(self.get(id)?.writable)
    }

    /// Current raw bytes of `id`.
    pub fn read(&self, id: u8) -> Result<&[u8], DeviceError> {
        Ok(&self.get(id)?.raw)
    }

    /// Replace the value of `id`. Fails with `InvalidId`, then `ReadOnly`,
    /// then `InvalidValue` when `raw` is not exactly the variable's width.
    pub fn write(&mut self, id: u8, raw: &[u8]) -> Result<(), DeviceError> {
        let var = self.get_writable(id)?;
        if raw.len() != var.raw.len() {
            return Err(DeviceError::InvalidValue {
                id,
                expected: var.raw.len(),
                actual: raw.len(),
            });
        }
        var.raw.copy_from_slice(raw);
        trace!(id, ?raw, "variable written");
        Ok(())
    }

    /// Apply a bitwise operation in place. The mask must match the width.
    pub fn apply(&mut self, id: u8, op: BinaryOp, mask: &[u8]) -> Result<(), DeviceError> {
        let var = self.get_writable(id)?;
        if mask.len() != var.raw.len() {
            return Err(DeviceError::InvalidValue {
                id,
                expected: var.raw.len(),
                actual: mask.len(),
            });
        }
        op.apply(&mut var.raw, mask);
        Ok(())
    }

    /// Every id, in order.
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.vars.len()).filter_map(|id| u8::try_from(id).ok())
    }

    /// Ids of writable variables, in order.
    pub fn writable_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.ids().filter(|&id| self.vars[usize::from(id)].writable)
    }

    /// Catalog entries for the variable list.
    pub fn infos(&self) -> Vec<VariableInfo> {
        self.vars
            .iter()
            .map(|var| VariableInfo {
                writable: var.writable,
                width: var.raw.len() as u8,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    fn simulator() -> VariableRegistry {
        VariableRegistry::new(&DeviceConfig::default().variables)
    }

    #[test]
    fn byte_variable_write_then_read() {
        let mut registry = simulator();
        assert_eq!(registry.read(5).unwrap(), &[0x03]);
        registry.write(5, &[0x07]).unwrap();
        assert_eq!(registry.read(5).unwrap(), &[0x07]);
    }

    #[test]
    fn width_is_enforced() {
        let mut registry = simulator();
        let err = registry.write(5, &[0x07, 0x00]).unwrap_err();
        assert_eq!(
            err,
            DeviceError::InvalidValue {
                id: 5,
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(registry.read(5).unwrap(), &[0x03]);
        assert!(registry.write(0, &[0u8; 4]).is_err());
    }

    #[test]
    fn every_width_round_trips() {
        let mut registry = VariableRegistry::new(&[
            VariableConfig::new(1, true, Vec::new()),
            VariableConfig::new(4, true, Vec::new()),
            VariableConfig::new(8, true, Vec::new()),
        ]);
        for id in registry.ids().collect::<Vec<_>>() {
            let width = registry.width(id).unwrap();
            let value: Vec<u8> = (1..=width as u8).collect();
            registry.write(id, &value).unwrap();
            assert_eq!(registry.read(id).unwrap(), value.as_slice());
        }
    }

    #[test]
    fn unknown_id_and_read_only() {
        let mut registry = simulator();
        assert_eq!(
            registry.read(6).unwrap_err(),
            DeviceError::InvalidId {
                kind: "variable",
                id: 6
            }
        );
        assert_eq!(
            registry.write(1, &[0u8; 8]).unwrap_err(),
            DeviceError::ReadOnly {
                kind: "variable",
                id: 1
            }
        );
    }

    #[test]
    fn binary_op_in_place() {
        let mut registry = simulator();
        registry.apply(5, BinaryOp::Toggle, &[0x01]).unwrap();
        assert_eq!(registry.read(5).unwrap(), &[0x02]);
        assert!(registry.apply(5, BinaryOp::Or, &[0x01, 0x00]).is_err());
        assert!(registry.apply(2, BinaryOp::Or, &[0u8; 8]).is_err());
    }

    #[test]
    fn catalog_and_writable_ids() {
        let registry = simulator();
        let infos = registry.infos();
        assert_eq!(infos.len(), 6);
        assert_eq!(
            infos[5],
            VariableInfo {
                writable: true,
                width: 1
            }
        );
        assert_eq!(registry.writable_ids().collect::<Vec<_>>(), vec![0, 5]);
    }
}
