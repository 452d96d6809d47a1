//! Device description loaded from JSON.
//!
//! ```json
//! {
//!   "variables": [
//!     { "width": 8, "writable": true, "initial": [127, 255, 255, 255, 255, 255, 255, 255] },
//!     { "width": 1, "writable": true, "initial": [3] }
//!   ],
//!   "curves": [ { "block_size": 64, "block_count": 4, "writable": true } ],
//!   "max_groups": 8
//! }
//! ```

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sllp_frame::{Framing, CURVE_INFO_SIZE, MAX_PAYLOAD, RESERVED_GROUP_COUNT};

use crate::error::{Result, ServerError};

/// Largest device description file accepted.
pub const MAX_CONFIG_FILE_SIZE: usize = 64 * 1024;

/// Most variables a device can expose; group sizes travel in 7 bits.
pub const MAX_VARIABLES: usize = 0x7F;

/// Most curves a device can expose; the curve list must fit one frame.
pub const MAX_CURVES: usize = MAX_PAYLOAD / CURVE_INFO_SIZE;

const VALID_WIDTHS: [u8; 3] = [1, 4, 8];

fn default_max_groups() -> usize {
    8
}

/// One variable of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableConfig {
    pub width: u8,
    #[serde(default)]
    pub writable: bool,
    /// Initial raw bytes. Empty means all zeros.
    #[serde(default)]
    pub initial: Vec<u8>,
}

impl VariableConfig {
    pub fn new(width: u8, writable: bool, initial: impl Into<Vec<u8>>) -> Self {
        Self {
            width,
            writable,
            initial: initial.into(),
        }
    }
}

/// One curve of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurveConfig {
    pub block_size: u16,
    pub block_count: u8,
    #[serde(default)]
    pub writable: bool,
}

/// Everything a [`Device`](crate::Device) is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub variables: Vec<VariableConfig>,
    #[serde(default)]
    pub curves: Vec<CurveConfig>,
    /// Group table size, reserved groups included.
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,
}

impl Default for DeviceConfig {
    /// The reference simulator: five 8-byte variables (only the first
    /// writable), one writable byte, and one writable curve.
    fn default() -> Self {
        let double = [0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut variables = vec![VariableConfig::new(8, true, double)];
        variables.extend((1..5).map(|_| VariableConfig::new(8, false, double)));
        variables.push(VariableConfig::new(1, true, [0x03]));
        Self {
            variables,
            curves: vec![CurveConfig {
                block_size: 64,
                block_count: 4,
                writable: true,
            }],
            max_groups: default_max_groups(),
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a JSON description.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: DeviceConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON description from disk, refusing oversized files.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            ServerError::Config(format!("failed opening {}: {err}", path.display()))
        })?;
        let len = file.metadata()?.len();
        if len > MAX_CONFIG_FILE_SIZE as u64 {
            return Err(ServerError::Config(format!(
                "{} is too large ({len} bytes, max {MAX_CONFIG_FILE_SIZE})",
                path.display()
            )));
        }

        let read_limit = u64::try_from(MAX_CONFIG_FILE_SIZE.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit).read_to_string(&mut content)?;
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ServerError::Config(format!(
                "{} grew past {MAX_CONFIG_FILE_SIZE} bytes while reading",
                path.display()
            )));
        }
        Self::from_json(&content)
    }

    /// Check structural limits.
    pub fn validate(&self) -> Result<()> {
        if self.variables.len() > MAX_VARIABLES {
            return Err(ServerError::Config(format!(
                "{} variables exceed the maximum of {MAX_VARIABLES}",
                self.variables.len()
            )));
        }
        for (id, var) in self.variables.iter().enumerate() {
            if !VALID_WIDTHS.contains(&var.width) {
                return Err(ServerError::Config(format!(
                    "variable {id}: width {} is not one of 1, 4, 8",
                    var.width
                )));
            }
            if !var.initial.is_empty() && var.initial.len() != usize::from(var.width) {
                return Err(ServerError::Config(format!(
                    "variable {id}: initial value is {} bytes, width is {}",
                    var.initial.len(),
                    var.width
                )));
            }
        }
        if self.curves.len() > MAX_CURVES {
            return Err(ServerError::Config(format!(
                "{} curves exceed the maximum of {MAX_CURVES}",
                self.curves.len()
            )));
        }
        for (id, curve) in self.curves.iter().enumerate() {
            if curve.block_size == 0 || curve.block_count == 0 {
                return Err(ServerError::Config(format!("curve {id}: empty geometry")));
            }
            if usize::from(curve.block_size) > MAX_PAYLOAD - 3 {
                return Err(ServerError::Config(format!(
                    "curve {id}: block size {} does not fit a frame",
                    curve.block_size
                )));
            }
        }
        if self.max_groups < usize::from(RESERVED_GROUP_COUNT) || self.max_groups > MAX_VARIABLES {
            return Err(ServerError::Config(format!(
                "max_groups must be between {RESERVED_GROUP_COUNT} and {MAX_VARIABLES}, got {}",
                self.max_groups
            )));
        }
        Ok(())
    }
}

/// Server accept-loop settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Framing spoken on every accepted connection.
    pub framing: Framing,
    /// How often blocked reads and accepts wake up to check for stop.
    pub poll_interval: Duration,
    /// Connections served at once; further clients wait in the backlog.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            framing: Framing::Variable,
            poll_interval: Duration::from_millis(50),
            max_connections: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_reference_table() {
        let config = DeviceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.variables.len(), 6);
        assert!(config.variables[0].writable);
        assert!(config.variables[1..5].iter().all(|v| !v.writable && v.width == 8));
        assert_eq!(config.variables[5], VariableConfig::new(1, true, [0x03]));
        assert_eq!(config.max_groups, 8);
    }

    #[test]
    fn json_defaults_fill_in() {
        let config = DeviceConfig::from_json(r#"{"variables":[{"width":4}]}"#).unwrap();
        assert!(!config.variables[0].writable);
        assert!(config.variables[0].initial.is_empty());
        assert!(config.curves.is_empty());
        assert_eq!(config.max_groups, 8);
    }

    #[test]
    fn rejects_bad_width_and_initial() {
        assert!(DeviceConfig::from_json(r#"{"variables":[{"width":2}]}"#).is_err());
        assert!(
            DeviceConfig::from_json(r#"{"variables":[{"width":1,"initial":[1,2]}]}"#).is_err()
        );
        assert!(DeviceConfig::from_json(r#"{"variables":[],"bogus":1}"#).is_err());
    }

    #[test]
    fn rejects_too_few_groups() {
        let err = DeviceConfig::from_json(r#"{"variables":[],"max_groups":2}"#).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_refuses_oversized_file() {
        let dir = std::env::temp_dir().join(format!("sllp-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let ok = dir.join("device.json");
        std::fs::write(&ok, r#"{"variables":[{"width":1,"writable":true}]}"#).unwrap();
        assert_eq!(DeviceConfig::load(&ok).unwrap().variables.len(), 1);

        let big = dir.join("big.json");
        std::fs::write(&big, vec![b' '; MAX_CONFIG_FILE_SIZE + 1]).unwrap();
        assert!(matches!(
            DeviceConfig::load(&big),
            Err(ServerError::Config(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
