//! The frame I/O engine.
//!
//! [`Interface`] is the one explicitly-owned aggregate tying everything
//! together: the descriptor rings, the PHY monitor, the MAC, the
//! scheduler primitives and the statistics block. It is built once by the
//! owning task and shared by reference; the interrupt handler reaches it
//! only through [`handle_interrupt`](Interface::handle_interrupt), which
//! posts the receive signal and bumps counters but never touches the
//! rings.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use core::time::Duration;

use alloc::vec::Vec;
use critical_section::Mutex as CsMutex;
use ieee802_3_miim::Miim;

use crate::config::InterfaceConfig;
use crate::frame::{EtherType, Frame, FrameHeader, MacAddress, MAX_FRAME_LEN, MIN_FRAME_LEN};
use crate::link::{LinkError, LinkMonitor};
use crate::mac::{MacConfig, MacDevice};
use crate::ring::{RingStorage, RxRing, RxSlotError, TxAcquireError, TxRing};
use crate::rtos::{Rtos, Signal, TimedMutex};
use crate::stats::{Stats, StatsSnapshot};

/// Ways initialization can fail.
///
/// Initialization failure is the only condition fatal to the whole
/// interface: nothing is left half-configured, and retry means building
/// the interface again from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The scheduler could not allocate a synchronization object.
    Resources,
    /// Link establishment failed.
    Link(LinkError),
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::Resources => write!(f, "scheduler object allocation failed"),
            InitError::Link(inner) => write!(f, "{}", inner),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InitError {}

/// Ways [`Interface::send`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// Frame length outside [[`MIN_FRAME_LEN`], [`MAX_FRAME_LEN`]].
    /// Nothing was submitted and no statistic changed.
    InvalidLength,
    /// The cached link state is down.
    NoLink,
    /// Every transmit slot is in flight. Transient backpressure; retry.
    Busy,
    /// Exclusive transmit access could not be acquired in time.
    /// Contention, not a hardware problem; retry.
    Timeout,
    /// The hardware rejected the submission.
    Fault,
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SendError::InvalidLength => write!(f, "frame length out of range"),
            SendError::NoLink => write!(f, "link is down"),
            SendError::Busy => write!(f, "all transmit slots busy"),
            SendError::Timeout => write!(f, "transmit access timed out"),
            SendError::Fault => write!(f, "transmit fault"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SendError {}

/// Ways [`Interface::receive`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecvError {
    /// No matching frame arrived within the timeout. The normal idle
    /// outcome; also returned for spurious wakeups and for frames the
    /// protocol filter discarded.
    Timeout,
    /// A frame arrived but no copy buffer could be allocated. The ring
    /// slot was still drained, so reception continues.
    NoBuffer,
    /// The frame completed with a hardware error and was discarded.
    Fault,
}

impl core::fmt::Display for RecvError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RecvError::Timeout => write!(f, "no frame within timeout"),
            RecvError::NoBuffer => write!(f, "no buffer for received frame"),
            RecvError::Fault => write!(f, "receive fault"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RecvError {}

/// A raw Ethernet interface.
///
/// `send` and the queries take `&self` and may be called from any task;
/// concurrent senders are serialized by the transmit mutex. `receive` has
/// single-consumer semantics: it is meant to be issued from one task at a
/// time (memory-safe either way, but waiters are not queued fairly).
pub struct Interface<'r, M, P, R>
where
    M: MacDevice,
    P: Miim,
    R: Rtos,
{
    mac: M,
    phy: CsMutex<RefCell<LinkMonitor<P>>>,
    rtos: R,

    address: MacAddress,
    ethertype: EtherType,
    tx_timeout: Duration,

    link_up: AtomicBool,
    pub(crate) ping_seq: AtomicU16,

    tx: R::Mutex<TxRing<'r>>,
    rx: CsMutex<RefCell<RxRing<'r>>>,
    pub(crate) rx_ready: R::Signal,
    pub(crate) stats: Stats,
}

impl<'r, M, P, R> Interface<'r, M, P, R>
where
    M: MacDevice,
    P: Miim,
    R: Rtos,
{
    /// Brings the interface up.
    ///
    /// Sets up both descriptor rings over the caller-placed `storage`,
    /// allocates the scheduler objects, negotiates the link and enables
    /// the MAC with the negotiated parameters. On error everything built
    /// so far is torn down again; the caller owns the retry policy.
    pub fn new(
        config: InterfaceConfig,
        storage: &'r mut RingStorage,
        mac: M,
        miim: P,
        rtos: R,
    ) -> Result<Self, InitError> {
        let tx_ring = TxRing::new(&mut storage.tx);
        let rx_ring = RxRing::new(&mut storage.rx);

        let tx = rtos.new_mutex(tx_ring).ok_or(InitError::Resources)?;
        let rx_ready = rtos.new_signal().ok_or(InitError::Resources)?;

        let mut phy = LinkMonitor::new(miim, config.phy_address);
        let status = phy.negotiate().map_err(InitError::Link)?;
        log::info!(
            "link up: {} {} duplex, station {}",
            status.speed,
            status.duplex,
            config.address
        );

        mac.enable(&MacConfig {
            address: config.address,
            speed: status.speed,
            duplex: status.duplex,
            promiscuous: config.promiscuous,
            max_frame_len: MAX_FRAME_LEN,
        });

        Ok(Self {
            mac,
            phy: CsMutex::new(RefCell::new(phy)),
            rtos,
            address: config.address,
            ethertype: config.ethertype,
            tx_timeout: config.tx_timeout,
            link_up: AtomicBool::new(true),
            ping_seq: AtomicU16::new(0),
            tx,
            rx: CsMutex::new(RefCell::new(rx_ring)),
            rx_ready,
            stats: Stats::new(),
        })
    }

    /// Submits one frame for transmission.
    ///
    /// Returns as soon as the frame is handed to the DMA engine;
    /// completion is not awaited. Frames leave the interface in
    /// submission order.
    pub fn send(&self, frame: &[u8]) -> Result<(), SendError> {
        if frame.len() < MIN_FRAME_LEN || frame.len() > MAX_FRAME_LEN {
            return Err(SendError::InvalidLength);
        }
        if !self.link_up.load(Ordering::Relaxed) {
            return Err(SendError::NoLink);
        }

        let submitted = self.tx.with(self.tx_timeout, |ring| {
            let mut slot = match ring.send_next(frame.len()) {
                Ok(slot) => slot,
                Err(TxAcquireError::Busy) => return Err(SendError::Busy),
                Err(TxAcquireError::Fault) => return Err(SendError::Fault),
            };
            slot.copy_from_slice(frame);
            slot.commit();
            self.mac.tx_poll_demand(ring);
            Ok(())
        });

        match submitted {
            None => Err(SendError::Timeout),
            Some(Ok(())) => {
                self.stats.count_tx_frame();
                Ok(())
            }
            Some(Err(error)) => {
                if error == SendError::Fault {
                    self.stats.count_tx_error();
                }
                Err(error)
            }
        }
    }

    /// Waits up to `timeout` for a frame carrying the configured
    /// EtherType.
    ///
    /// The frame is copied out of the ring into a buffer owned by the
    /// returned [`Frame`]; the ring slot goes back to hardware before
    /// this returns. Non-matching frames are discarded transparently, so
    /// arrival order is preserved among matching frames only.
    pub fn receive(&self, timeout: Duration) -> Result<Frame, RecvError> {
        if !self.rx_ready.wait(timeout) {
            return Err(RecvError::Timeout);
        }

        let data = critical_section::with(|cs| {
            let mut ring = self.rx.borrow_ref_mut(cs);
            self.mac.rx_poll_demand(&mut ring);

            let slot = match ring.recv_next() {
                Ok(slot) => slot,
                Err(RxSlotError::WouldBlock) => return Err(RecvError::Timeout),
                Err(RxSlotError::DmaError) => {
                    self.stats.count_rx_error();
                    return Err(RecvError::Fault);
                }
            };

            // spurious wakeup tolerance
            if slot.is_empty() {
                return Err(RecvError::Timeout);
            }

            let mut data = Vec::new();
            if data.try_reserve_exact(slot.len()).is_err() {
                drop(slot);
                self.stats.count_rx_dropped();
                return Err(RecvError::NoBuffer);
            }
            data.extend_from_slice(&slot[..]);
            drop(slot);
            self.mac.rx_poll_demand(&mut ring);

            Ok(data)
        })?;

        let timestamp = self.rtos.now();
        match FrameHeader::parse(&data) {
            Some(header) if header.ethertype == self.ethertype => {
                Ok(Frame::new(data, timestamp))
            }
            _ => {
                self.stats.count_non_matching();
                Err(RecvError::Timeout)
            }
        }
    }

    /// Reads the live link state from the PHY and refreshes the cached
    /// flag `send` checks. Never blocks; a down link is a valid answer.
    pub fn is_link_up(&self) -> bool {
        let up = critical_section::with(|cs| self.phy.borrow_ref_mut(cs).link_up());
        self.link_up.store(up, Ordering::Relaxed);
        up
    }

    /// Station address of this interface.
    pub fn mac_address(&self) -> MacAddress {
        self.address
    }

    /// The protocol tag the receive filter matches on.
    pub fn ethertype(&self) -> EtherType {
        self.ethertype
    }

    /// A read-only copy of the interface counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Zeroes the interface counters.
    pub fn reset_stats(&self) {
        self.stats.reset()
    }

    /// Takes the interface down, disabling the MAC.
    pub fn shutdown(self) {
        self.mac.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackMac, LoopbackPhy};
    use crate::ring::RING_DEPTH;
    use crate::rtos::StdRtos;

    const STATION: MacAddress = MacAddress::new([0x02, 0x12, 0x13, 0x10, 0x15, 0x11]);

    /// A MAC whose DMA engine never makes progress.
    struct DeafMac;

    impl MacDevice for DeafMac {
        fn enable(&self, _config: &MacConfig) {}
        fn disable(&self) {}
        fn tx_poll_demand(&self, _ring: &mut TxRing<'_>) {}
        fn rx_poll_demand(&self, _ring: &mut RxRing<'_>) {}
    }

    #[test]
    fn send_rejects_bad_lengths_without_side_effects() {
        let mut storage = RingStorage::new();
        let iface = Interface::new(
            InterfaceConfig::new(STATION),
            &mut storage,
            DeafMac,
            LoopbackPhy::new(),
            StdRtos::new(),
        )
        .unwrap();

        assert_eq!(iface.send(&[0; MIN_FRAME_LEN - 1]), Err(SendError::InvalidLength));
        assert_eq!(iface.send(&[0; MAX_FRAME_LEN + 1]), Err(SendError::InvalidLength));
        assert_eq!(iface.send(&[]), Err(SendError::InvalidLength));
        assert_eq!(iface.stats(), StatsSnapshot::default());
    }

    #[test]
    fn send_backpressure_is_busy_not_fault() {
        let mut storage = RingStorage::new();
        let iface = Interface::new(
            InterfaceConfig::new(STATION),
            &mut storage,
            DeafMac,
            LoopbackPhy::new(),
            StdRtos::new(),
        )
        .unwrap();

        let frame = [0u8; MIN_FRAME_LEN];
        for _ in 0..RING_DEPTH {
            iface.send(&frame).unwrap();
        }
        assert_eq!(iface.send(&frame), Err(SendError::Busy));

        let stats = iface.stats();
        assert_eq!(stats.tx_frames, RING_DEPTH as u32);
        assert_eq!(stats.tx_errors, 0);
    }

    #[test]
    fn send_requires_link() {
        let mut storage = RingStorage::new();
        let phy = LoopbackPhy::new();
        let link = phy.link_control();
        let iface = Interface::new(
            InterfaceConfig::new(STATION),
            &mut storage,
            DeafMac,
            phy,
            StdRtos::new(),
        )
        .unwrap();

        link.store(false, Ordering::Relaxed);
        assert!(!iface.is_link_up());
        assert_eq!(iface.send(&[0; MIN_FRAME_LEN]), Err(SendError::NoLink));

        link.store(true, Ordering::Relaxed);
        assert!(iface.is_link_up());
        assert!(iface.send(&[0; MIN_FRAME_LEN]).is_ok());
    }

    #[test]
    fn receive_times_out_without_traffic() {
        let mut storage = RingStorage::new();
        let iface = Interface::new(
            InterfaceConfig::new(STATION),
            &mut storage,
            DeafMac,
            LoopbackPhy::new(),
            StdRtos::new(),
        )
        .unwrap();

        assert_eq!(iface.receive(Duration::ZERO), Err(RecvError::Timeout));
        assert_eq!(
            iface.receive(Duration::from_millis(5)),
            Err(RecvError::Timeout)
        );
    }

    #[test]
    fn spurious_wakeup_is_a_timeout() {
        let mut storage = RingStorage::new();
        let iface = Interface::new(
            InterfaceConfig::new(STATION),
            &mut storage,
            DeafMac,
            LoopbackPhy::new(),
            StdRtos::new(),
        )
        .unwrap();

        iface.handle_interrupt(crate::irq::MacEvent::FrameReceived);
        assert_eq!(iface.receive(Duration::ZERO), Err(RecvError::Timeout));
        assert_eq!(iface.stats().rx_frames, 1);
    }

    #[test]
    fn faulted_frame_is_discarded() {
        let mut storage = RingStorage::new();
        let mac = LoopbackMac::new();
        let iface = Interface::new(
            InterfaceConfig::new(STATION),
            &mut storage,
            &mac,
            LoopbackPhy::new(),
            StdRtos::new(),
        )
        .unwrap();

        mac.fail_next_rx();
        iface.handle_interrupt(crate::irq::MacEvent::FrameReceived);
        assert_eq!(iface.receive(Duration::ZERO), Err(RecvError::Fault));
        assert_eq!(iface.stats().rx_errors, 1);
    }

    #[test]
    fn shutdown_disables_the_mac() {
        let mut storage = RingStorage::new();
        let mac = LoopbackMac::new();
        let iface = Interface::new(
            InterfaceConfig::new(STATION),
            &mut storage,
            &mac,
            LoopbackPhy::new(),
            StdRtos::new(),
        )
        .unwrap();

        assert!(mac.is_enabled());
        iface.shutdown();
        assert!(!mac.is_enabled());
    }
}
