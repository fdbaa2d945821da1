//! DMA descriptor rings.
//!
//! Each direction owns a fixed ring of [`RingEntry`]s: a descriptor whose
//! status word carries the ownership flag, plus a buffer big enough for one
//! maximum-size frame. A slot is either owned by hardware (available for
//! DMA fill or drain) or owned by software (data valid, pending
//! processing); the ownership bit only changes hands at the transfer
//! points exposed here — [`TxSlot::commit`], dropping an [`RxSlot`], and
//! the `dma_*` methods that form the hardware side of the contract for
//! software-emulated MACs.
//!
//! Buffers live inside the entries and never move, so the whole ring can
//! be placed in DMA-visible memory as one static.

pub(crate) mod desc;
mod rx;
mod tx;

pub use rx::{RxRing, RxRingEntry, RxSlot, RxSlotError};
pub use tx::{TxAcquireError, TxRing, TxRingEntry, TxSlot};

use crate::frame::BUFFER_LEN;

/// Number of slots in each of the RX and TX rings.
pub const RING_DEPTH: usize = 8;

/// A DMA buffer able to hold one maximum-size frame.
#[repr(C, align(8))]
pub struct Buffer {
    bytes: [u8; BUFFER_LEN],
}

impl Buffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; BUFFER_LEN],
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for Buffer {
    type Target = [u8; BUFFER_LEN];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl core::ops::DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}

/// Descriptor behavior shared by both ring directions.
pub trait SlotDescriptor {
    /// Writes the buffer and chain fields and puts the descriptor into its
    /// initial ownership state.
    fn setup(&mut self, buffer: *const u8, len: usize, next: Option<&Self>);
}

/// One slot of a descriptor ring.
#[repr(C, align(8))]
pub struct RingEntry<T: SlotDescriptor> {
    desc: T,
    buffer: Buffer,
}

impl RingEntry<rx::RxDescriptor> {
    pub const fn new() -> Self {
        RingEntry {
            desc: rx::RxDescriptor::new(),
            buffer: Buffer::new(),
        }
    }
}

impl RingEntry<tx::TxDescriptor> {
    pub const fn new() -> Self {
        RingEntry {
            desc: tx::TxDescriptor::new(),
            buffer: Buffer::new(),
        }
    }
}

impl<T: SlotDescriptor> RingEntry<T> {
    pub(crate) fn setup(&mut self, next: Option<&Self>) {
        let buffer = self.buffer.as_ptr();
        let len = self.buffer.len();
        self.desc_mut()
            .setup(buffer, len, next.map(|next| next.desc()));
    }

    #[inline]
    pub(crate) fn desc(&self) -> &T {
        &self.desc
    }

    #[inline]
    pub(crate) fn desc_mut(&mut self) -> &mut T {
        &mut self.desc
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        &(*self.buffer)[..]
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut (*self.buffer)[..]
    }
}

/// Backing storage for both rings.
///
/// Const-constructible so the integration can place it in a static in
/// DMA-visible memory and hand it to the interface by reference.
pub struct RingStorage {
    pub rx: [RxRingEntry; RING_DEPTH],
    pub tx: [TxRingEntry; RING_DEPTH],
}

impl RingStorage {
    const RX_INIT: RxRingEntry = RxRingEntry::new();
    const TX_INIT: TxRingEntry = TxRingEntry::new();

    pub const fn new() -> Self {
        Self {
            rx: [Self::RX_INIT; RING_DEPTH],
            tx: [Self::TX_INIT; RING_DEPTH],
        }
    }
}

impl Default for RingStorage {
    fn default() -> Self {
        Self::new()
    }
}
