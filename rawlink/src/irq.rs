//! The interrupt bridge.
//!
//! The platform's Ethernet interrupt handler decodes its status register
//! into a [`MacEvent`] and forwards it here. This path runs at interrupt
//! priority and must finish in bounded time, so it only posts the receive
//! signal and bumps atomic counters — no blocking, no allocation, no
//! logging. Ring state is owned by task context and is never touched from
//! the interrupt.

use ieee802_3_miim::Miim;

use crate::iface::Interface;
use crate::mac::MacDevice;
use crate::rtos::{Rtos, Signal};

/// A hardware event, decoded from the MAC's interrupt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacEvent {
    /// A frame completed reception.
    FrameReceived,
    /// A frame completed transmission. Transmission is fire-and-confirm-
    /// submission, so nothing waits on this.
    FrameSent,
    /// The MAC reported an error condition.
    Error,
}

impl<M, P, R> Interface<'_, M, P, R>
where
    M: MacDevice,
    P: Miim,
    R: Rtos,
{
    /// Forwards one hardware event. Interrupt context.
    pub fn handle_interrupt(&self, event: MacEvent) {
        match event {
            MacEvent::FrameReceived => {
                self.stats.count_rx_frame();
                self.rx_ready.post();
            }
            MacEvent::FrameSent => {}
            MacEvent::Error => {
                self.stats.count_rx_error();
            }
        }
    }
}
