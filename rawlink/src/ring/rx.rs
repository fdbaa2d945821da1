//! The receive ring.

use core::sync::atomic::{compiler_fence, fence, Ordering};

use super::desc::Descriptor;
use super::{RingEntry, SlotDescriptor};
use crate::frame::BUFFER_LEN;

/// Owned by the DMA engine
const RXDESC_0_OWN: u32 = 1 << 31;
/// Error summary
const RXDESC_0_ES: u32 = 1 << 15;
/// Completed frame length
const RXDESC_0_FL_MASK: u32 = 0x3FFF;
const RXDESC_0_FL_SHIFT: usize = 16;

/// Receive buffer size
const RXDESC_1_RBS_MASK: u32 = 0x1FFF;
/// Chained to the descriptor in word 3
const RXDESC_1_RCH: u32 = 1 << 14;
/// End of ring
const RXDESC_1_RER: u32 = 1 << 15;

/// Ways draining the next receive slot can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxSlotError {
    /// The next slot is still owned by the DMA engine; nothing has
    /// completed. Try again later.
    WouldBlock,
    /// The slot completed with a hardware error. It has already been
    /// returned to the DMA engine.
    DmaError,
}

/// An RX DMA descriptor.
pub struct RxDescriptor {
    desc: Descriptor,
}

impl RxDescriptor {
    pub const fn new() -> Self {
        Self {
            desc: Descriptor::new(),
        }
    }

    fn is_owned(&self) -> bool {
        (self.desc.read(0) & RXDESC_0_OWN) == RXDESC_0_OWN
    }

    /// Passes ownership back to the DMA engine, clearing the completion
    /// status.
    pub(super) fn set_owned(&mut self) {
        // "Preceding reads and writes cannot be moved past subsequent writes."
        fence(Ordering::Release);
        compiler_fence(Ordering::Release);

        unsafe {
            self.desc.write(0, RXDESC_0_OWN);
        }

        // Flush the store buffer so the slot becomes visible to the DMA
        // engine as soon as possible.
        fence(Ordering::SeqCst);
    }

    fn has_error(&self) -> bool {
        (self.desc.read(0) & RXDESC_0_ES) == RXDESC_0_ES
    }

    fn frame_len(&self) -> usize {
        ((self.desc.read(0) >> RXDESC_0_FL_SHIFT) & RXDESC_0_FL_MASK) as usize
    }

    /// Hardware-side completion: clears ownership and records the outcome.
    fn complete(&mut self, len: usize, error: bool) {
        let mut status = ((len as u32) & RXDESC_0_FL_MASK) << RXDESC_0_FL_SHIFT;
        if error {
            status |= RXDESC_0_ES;
        }

        // Buffer contents must be visible before the status word hands the
        // slot to software.
        fence(Ordering::Release);
        compiler_fence(Ordering::Release);

        unsafe {
            self.desc.write(0, status);
        }

        fence(Ordering::SeqCst);
    }
}

impl Default for RxDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotDescriptor for RxDescriptor {
    fn setup(&mut self, buffer: *const u8, len: usize, next: Option<&Self>) {
        unsafe {
            self.desc
                .write(1, RXDESC_1_RCH | ((len as u32) & RXDESC_1_RBS_MASK));
            self.desc.write(2, buffer as u32);
        }
        match next {
            Some(next) => unsafe {
                self.desc.write(3, &next.desc as *const Descriptor as u32);
            },
            None => unsafe {
                self.desc.write(3, 0);
                self.desc.modify(1, |w| w | RXDESC_1_RER);
            },
        }
        self.set_owned();
    }
}

/// An entry of the receive ring.
pub type RxRingEntry = RingEntry<RxDescriptor>;

/// The receive ring: slot acquisition for software, frame completion for
/// the DMA side.
pub struct RxRing<'a> {
    entries: &'a mut [RxRingEntry],
    next_entry: usize,
    hw_entry: usize,
}

impl<'a> RxRing<'a> {
    /// Chains the descriptors and arms every slot for reception.
    pub fn new(entries: &'a mut [RxRingEntry]) -> Self {
        {
            let mut previous: Option<&mut RxRingEntry> = None;
            for entry in entries.iter_mut() {
                if let Some(prev_entry) = &mut previous {
                    prev_entry.setup(Some(entry));
                }
                previous = Some(entry);
            }
            if let Some(entry) = &mut previous {
                entry.setup(None);
            }
        }

        RxRing {
            entries,
            next_entry: 0,
            hw_entry: 0,
        }
    }

    /// Drains the next completed slot, if any.
    ///
    /// The returned [`RxSlot`] keeps the slot owned by software; dropping
    /// it re-arms the slot for the DMA engine. A slot that completed with
    /// an error is re-armed immediately and reported as
    /// [`RxSlotError::DmaError`].
    pub fn recv_next(&mut self) -> Result<RxSlot<'_>, RxSlotError> {
        let entries_len = self.entries.len();
        let entry_num = self.next_entry;

        if self.entries[entry_num].desc().is_owned() {
            return Err(RxSlotError::WouldBlock);
        }

        if self.entries[entry_num].desc().has_error() {
            self.entries[entry_num].desc_mut().set_owned();
            self.next_entry = (entry_num + 1) % entries_len;
            return Err(RxSlotError::DmaError);
        }

        let length = self.entries[entry_num].desc().frame_len().min(BUFFER_LEN);

        // "Subsequent reads and writes cannot be moved ahead of preceding reads."
        compiler_fence(Ordering::Acquire);

        self.next_entry = (entry_num + 1) % entries_len;

        Ok(RxSlot {
            entry: &mut self.entries[entry_num],
            length,
        })
    }

    /// Hardware side: writes a frame into the next DMA-owned slot and
    /// completes it.
    ///
    /// Returns `false` when software has not drained the ring far enough
    /// to leave a slot available (receiver overrun). Used by
    /// software-emulated MACs; real silicon walks the descriptor chain in
    /// memory instead.
    pub fn dma_offer(&mut self, frame: &[u8]) -> bool {
        let entries_len = self.entries.len();
        let entry_num = self.hw_entry;
        let entry = &mut self.entries[entry_num];

        if !entry.desc().is_owned() {
            return false;
        }

        let len = frame.len().min(BUFFER_LEN);
        entry.as_mut_slice()[..len].copy_from_slice(&frame[..len]);
        entry.desc_mut().complete(len, false);
        self.hw_entry = (entry_num + 1) % entries_len;
        true
    }

    /// Hardware side: completes the next DMA-owned slot with an error.
    pub fn dma_complete_error(&mut self) -> bool {
        let entries_len = self.entries.len();
        let entry_num = self.hw_entry;
        let entry = &mut self.entries[entry_num];

        if !entry.desc().is_owned() {
            return false;
        }

        entry.desc_mut().complete(0, true);
        self.hw_entry = (entry_num + 1) % entries_len;
        true
    }
}

/// A completed receive slot, owned by software.
///
/// Dereferences to the received bytes. Dropping it (or calling
/// [`free`](Self::free)) passes the slot back to the DMA engine, after
/// which the bytes must no longer be referenced — which the borrow makes
/// impossible.
pub struct RxSlot<'a> {
    entry: &'a mut RxRingEntry,
    length: usize,
}

impl core::ops::Deref for RxSlot<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.entry.as_slice()[..self.length]
    }
}

impl Drop for RxSlot<'_> {
    fn drop(&mut self) {
        self.entry.desc_mut().set_owned();
    }
}

impl RxSlot<'_> {
    /// Passes the slot back to the DMA engine.
    pub fn free(self) {
        drop(self)
    }
}
