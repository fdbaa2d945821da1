//! The MAC hardware seam.
//!
//! Like the scheduler, the MAC itself is provided by the platform: the
//! core owns the descriptor rings and the transfer discipline, and asks
//! the hardware for only four things through [`MacDevice`]. Register-level
//! implementations write their poll-demand registers and ignore the ring
//! arguments (the DMA engine consumes the descriptor memory directly);
//! software MACs — emulated NICs, the loopback device — act on the rings
//! through the `dma_*` surface instead.

use crate::frame::{MacAddress, MAX_FRAME_LEN};
use crate::link::{Duplex, Speed};
use crate::ring::{RxRing, TxRing};

/// MAC bring-up parameters, fixed once the link is negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacConfig {
    /// Station address of this interface.
    pub address: MacAddress,
    /// Line rate from negotiation.
    pub speed: Speed,
    /// Duplex mode from negotiation.
    pub duplex: Duplex,
    /// Accept frames regardless of destination address.
    pub promiscuous: bool,
    /// Largest frame the receiver should accept.
    pub max_frame_len: usize,
}

impl MacConfig {
    pub fn new(address: MacAddress, speed: Speed, duplex: Duplex) -> Self {
        Self {
            address,
            speed,
            duplex,
            promiscuous: false,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

/// Access to the Ethernet MAC and its DMA engine.
///
/// All methods take `&self`: on real hardware they are single register
/// accesses, and the interface calls them while shared between tasks.
pub trait MacDevice {
    /// Brings the MAC up with the negotiated link parameters and starts
    /// both DMA engines.
    fn enable(&self, config: &MacConfig);

    /// Stops the DMA engines and disables the MAC.
    fn disable(&self);

    /// Asks the DMA engine to rescan the transmit descriptor list, after
    /// a slot was handed to it.
    fn tx_poll_demand(&self, ring: &mut TxRing<'_>);

    /// Asks the DMA engine to rescan the receive descriptor list, after a
    /// slot was returned to it.
    fn rx_poll_demand(&self, ring: &mut RxRing<'_>);
}

impl<T: MacDevice + ?Sized> MacDevice for &T {
    fn enable(&self, config: &MacConfig) {
        (**self).enable(config)
    }

    fn disable(&self) {
        (**self).disable()
    }

    fn tx_poll_demand(&self, ring: &mut TxRing<'_>) {
        (**self).tx_poll_demand(ring)
    }

    fn rx_poll_demand(&self, ring: &mut RxRing<'_>) {
        (**self).rx_poll_demand(ring)
    }
}
