//! Rawlink is a raw Ethernet frame transport layer for RTOS-based
//! fieldbus gateways. It owns the DMA descriptor rings, negotiates the
//! physical link, exchanges EtherType-filtered frames with the MAC and
//! synchronizes interrupt-context completion with task-context callers.
//! It is a best-effort transport: no addressing, no network stack, no
//! delivery guarantees beyond FIFO order per direction.
//!
//! # Device interfaces
//! `rawlink` is designed to work with many different underlying
//! platforms, including embedded targets. This does mean that it cannot
//! use the standard library to reach the scheduler or the hardware; that
//! needs to be provided by the user of the library:
//!
//! * [`rtos::Rtos`] — the scheduler primitive set (bounded mutex, binary
//!   signal, monotonic tick). [`rtos::StdRtos`] is a ready host
//!   implementation behind the `std` feature.
//! * [`mac::MacDevice`] — the Ethernet MAC and its DMA engine.
//!   [`loopback::LoopbackMac`] is a ready software implementation for
//!   bench validation without a peer.
//! * [`ieee802_3_miim::Miim`] — MDIO access to the PHY.
//!
//! Logging goes through the [`log`] facade; the platform decides where it
//! ends up.
//!
//! # Usage sketch
//! Place a [`ring::RingStorage`] in DMA-visible memory, build an
//! [`Interface`] with it, wire the Ethernet interrupt to
//! [`Interface::handle_interrupt`], then exchange frames with
//! [`Interface::send`] and [`Interface::receive`]. Received frames are
//! caller-owned copies; drop them (or call [`Frame::release`]) when done.

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod diag;
mod frame;
mod iface;
mod irq;
pub mod link;
pub mod loopback;
pub mod mac;
pub mod ring;
pub mod rtos;
mod stats;
pub mod time;

pub use config::InterfaceConfig;
pub use frame::{
    EtherType, Frame, FrameHeader, MacAddress, BUFFER_LEN, HEADER_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN,
};
pub use iface::{InitError, Interface, RecvError, SendError};
pub use irq::MacEvent;
pub use stats::{Stats, StatsSnapshot};
