//! A software loopback device.
//!
//! [`LoopbackMac`] implements [`MacDevice`] entirely in software: frames
//! committed to the transmit ring are carried over an internal "wire"
//! queue and fed back into the receive ring. Together with
//! [`LoopbackPhy`] this lets a board — or a host test — exercise the full
//! transmit and receive paths without a peer device, which is how the
//! diagnostic test frames are meant to be validated.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use critical_section::Mutex as CsMutex;
use ieee802_3_miim::Miim;

use crate::link::mii;
use crate::mac::{MacConfig, MacDevice};
use crate::ring::{RxRing, TxRing};

/// A MAC whose wire loops straight back to its own receiver.
pub struct LoopbackMac {
    wire: CsMutex<RefCell<VecDeque<Vec<u8>>>>,
    enabled: AtomicBool,
    tx_poison: AtomicBool,
    rx_poison: AtomicBool,
}

impl LoopbackMac {
    pub fn new() -> Self {
        Self {
            wire: CsMutex::new(RefCell::new(VecDeque::new())),
            enabled: AtomicBool::new(false),
            tx_poison: AtomicBool::new(false),
            rx_poison: AtomicBool::new(false),
        }
    }

    /// Queues a frame as if it had arrived from the wire.
    pub fn inject(&self, frame: &[u8]) {
        critical_section::with(|cs| {
            self.wire.borrow_ref_mut(cs).push_back(frame.to_vec());
        });
    }

    /// Frames currently on the wire, not yet delivered into the receive
    /// ring.
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.wire.borrow_ref(cs).len())
    }

    /// Makes the next transmitted frame fail, leaving an error summary in
    /// its descriptor.
    pub fn fail_next_tx(&self) {
        self.tx_poison.store(true, Ordering::Relaxed);
    }

    /// Makes the next delivered frame complete with a receive error.
    pub fn fail_next_rx(&self) {
        self.rx_poison.store(true, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for LoopbackMac {
    fn default() -> Self {
        Self::new()
    }
}

impl MacDevice for LoopbackMac {
    fn enable(&self, _config: &MacConfig) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    fn tx_poll_demand(&self, ring: &mut TxRing<'_>) {
        if !self.is_enabled() {
            return;
        }
        critical_section::with(|cs| {
            let mut wire = self.wire.borrow_ref_mut(cs);
            ring.dma_drain(|bytes| {
                if self.tx_poison.swap(false, Ordering::Relaxed) {
                    return false;
                }
                wire.push_back(bytes.to_vec());
                true
            });
        });
    }

    fn rx_poll_demand(&self, ring: &mut RxRing<'_>) {
        if !self.is_enabled() {
            return;
        }
        critical_section::with(|cs| {
            let mut wire = self.wire.borrow_ref_mut(cs);
            if self.rx_poison.swap(false, Ordering::Relaxed) && !ring.dma_complete_error() {
                return;
            }
            while let Some(frame) = wire.front() {
                if ring.dma_offer(frame) {
                    wire.pop_front();
                } else {
                    break;
                }
            }
        });
    }
}

/// A PHY whose link is always negotiated, for loopback and bench use.
pub struct LoopbackPhy {
    bmcr: u16,
    anar: u16,
    link: Arc<AtomicBool>,
}

impl LoopbackPhy {
    pub fn new() -> Self {
        Self {
            bmcr: 0,
            anar: 0,
            link: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared handle forcing the reported link state, for exercising
    /// link-loss behavior.
    pub fn link_control(&self) -> Arc<AtomicBool> {
        self.link.clone()
    }
}

impl Default for LoopbackPhy {
    fn default() -> Self {
        Self::new()
    }
}

impl Miim for LoopbackPhy {
    fn read(&mut self, _phy: u8, reg: u8) -> u16 {
        match reg {
            // reset self-clears immediately
            mii::BMCR => self.bmcr & !mii::BMCR_RESET,
            mii::BMSR => {
                if self.link.load(Ordering::Relaxed) {
                    mii::BMSR_AUTONEG_COMPLETE | mii::BMSR_LINK_UP
                } else {
                    0
                }
            }
            mii::ANAR => self.anar,
            // the loopback partner mirrors everything we can do
            mii::ANLPAR => self.anar,
            _ => 0,
        }
    }

    fn write(&mut self, _phy: u8, reg: u8, data: u16) {
        match reg {
            mii::BMCR => self.bmcr = data,
            mii::ANAR => self.anar = data,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{RingStorage, RING_DEPTH};

    #[test]
    fn carries_frames_from_tx_to_rx() {
        let mut storage = RingStorage::new();
        let mut tx = TxRing::new(&mut storage.tx);
        let mut rx = RxRing::new(&mut storage.rx);
        let mac = LoopbackMac::new();
        mac.enable(&MacConfig::new(
            crate::frame::MacAddress::BROADCAST,
            crate::link::Speed::Mbps100,
            crate::link::Duplex::Full,
        ));

        let mut slot = tx.send_next(64).unwrap();
        slot.fill(0x42);
        slot.commit();
        mac.tx_poll_demand(&mut tx);
        assert_eq!(mac.pending(), 1);

        mac.rx_poll_demand(&mut rx);
        assert_eq!(mac.pending(), 0);
        let received = rx.recv_next().unwrap();
        assert_eq!(received.len(), 64);
        assert!(received.iter().all(|byte| *byte == 0x42));
    }

    #[test]
    fn wire_backs_up_when_the_ring_is_full() {
        let mut storage = RingStorage::new();
        let mut rx = RxRing::new(&mut storage.rx);
        let mac = LoopbackMac::new();
        mac.enable(&MacConfig::new(
            crate::frame::MacAddress::BROADCAST,
            crate::link::Speed::Mbps100,
            crate::link::Duplex::Full,
        ));

        for _ in 0..RING_DEPTH + 2 {
            mac.inject(&[0; 64]);
        }
        mac.rx_poll_demand(&mut rx);
        assert_eq!(mac.pending(), 2);

        rx.recv_next().unwrap().free();
        mac.rx_poll_demand(&mut rx);
        assert_eq!(mac.pending(), 1);
    }

    #[test]
    fn disabled_mac_moves_nothing() {
        let mut storage = RingStorage::new();
        let mut rx = RxRing::new(&mut storage.rx);
        let mac = LoopbackMac::new();

        mac.inject(&[0; 64]);
        mac.rx_poll_demand(&mut rx);
        assert_eq!(mac.pending(), 1);
        assert!(rx.recv_next().is_err());
    }
}
