use serde::Serialize;
use sllp_frame::SupplyStatus;

/// Named view of a supply status octet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub raw: u8,
    pub power_on: bool,
    pub generic_fault: bool,
    pub dc_undervoltage: bool,
    pub mosfet_overtemperature: bool,
    pub shunt_overtemperature: bool,
    pub interlock_open: bool,
    pub input_overcurrent: bool,
    pub crowbar_tripped: bool,
}

impl StatusReport {
    pub fn decode(raw: u8) -> Self {
        let bits = SupplyStatus::from_bits_retain(raw);
        Self {
            raw,
            power_on: bits.contains(SupplyStatus::POWER_ON),
            generic_fault: bits.contains(SupplyStatus::GENERIC_FAULT),
            dc_undervoltage: bits.contains(SupplyStatus::DC_UNDERVOLTAGE),
            mosfet_overtemperature: bits.contains(SupplyStatus::MOSFET_OVERTEMP),
            shunt_overtemperature: bits.contains(SupplyStatus::SHUNT_OVERTEMP),
            interlock_open: bits.contains(SupplyStatus::INTERLOCK_OPEN),
            input_overcurrent: bits.contains(SupplyStatus::INPUT_OVERCURRENT),
            crowbar_tripped: bits.contains(SupplyStatus::CROWBAR),
        }
    }

    /// Any latched fault present.
    pub fn has_fault(&self) -> bool {
        SupplyStatus::from_bits_retain(self.raw).intersects(SupplyStatus::FAULTS)
    }

    /// Names of the asserted fault conditions, in bit order.
    pub fn faults(&self) -> Vec<&'static str> {
        [
            (self.generic_fault, "generic fault"),
            (self.dc_undervoltage, "DC undervoltage"),
            (self.mosfet_overtemperature, "MOSFET overtemperature"),
            (self.shunt_overtemperature, "shunt overtemperature"),
            (self.interlock_open, "interlock open"),
            (self.input_overcurrent, "input overcurrent"),
            (self.crowbar_tripped, "crowbar tripped"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

impl From<u8> for StatusReport {
    fn from(raw: u8) -> Self {
        Self::decode(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_bit() {
        let report = StatusReport::decode(0x41);
        assert!(report.power_on);
        assert!(report.input_overcurrent);
        assert!(!report.crowbar_tripped);
        assert!(report.has_fault());
        assert_eq!(report.faults(), vec!["input overcurrent"]);

        let clean = StatusReport::decode(0x01);
        assert!(clean.power_on && !clean.has_fault());
        assert!(clean.faults().is_empty());

        let all = StatusReport::decode(0xFE);
        assert!(!all.power_on);
        assert_eq!(all.faults().len(), 7);
    }
}
