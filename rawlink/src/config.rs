//! Interface configuration.

use core::time::Duration;

use crate::frame::{EtherType, MacAddress};

/// Static configuration of an interface, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceConfig {
    /// Station address of this interface.
    pub address: MacAddress,

    /// The protocol tag receive filtering matches on. Frames carrying any
    /// other EtherType are counted and discarded without reaching callers.
    pub ethertype: EtherType,

    /// Accept frames regardless of destination address. On by default:
    /// fieldbus frames are typically addressed to the segment, not to the
    /// station.
    pub promiscuous: bool,

    /// MIIM bus address of the PHY.
    pub phy_address: u8,

    /// Upper bound on waiting for exclusive transmit access. Expiry
    /// signals contention, not a hardware problem.
    pub tx_timeout: Duration,
}

impl InterfaceConfig {
    pub fn new(address: MacAddress) -> Self {
        Self {
            address,
            ethertype: EtherType::ETHERCAT,
            promiscuous: true,
            phy_address: 0,
            tx_timeout: Duration::from_millis(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InterfaceConfig::new(MacAddress::BROADCAST);
        assert_eq!(config.ethertype, EtherType::ETHERCAT);
        assert!(config.promiscuous);
        assert_eq!(config.phy_address, 0);
        assert_eq!(config.tx_timeout, Duration::from_millis(10));
    }
}
