//! The transmit ring.

use core::sync::atomic::{compiler_fence, fence, Ordering};

use super::desc::Descriptor;
use super::{RingEntry, SlotDescriptor};
use crate::frame::BUFFER_LEN;

/// Owned by the DMA engine
const TXDESC_0_OWN: u32 = 1 << 31;
/// Error summary, set by hardware when transmission of the slot failed
const TXDESC_0_ES: u32 = 1 << 15;

/// Transmit buffer size (the committed frame length)
const TXDESC_1_TBS_MASK: u32 = 0x1FFF;
/// Chained to the descriptor in word 3
const TXDESC_1_TCH: u32 = 1 << 14;
/// End of ring
const TXDESC_1_TER: u32 = 1 << 15;

/// Ways acquiring the next transmit slot can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxAcquireError {
    /// Every slot is still owned by the DMA engine. Transient
    /// backpressure, not a fault; try again later.
    Busy,
    /// The slot being reclaimed carries an error summary from its
    /// previous transmission. Reported once; the slot is clean again
    /// afterwards.
    Fault,
}

/// A TX DMA descriptor.
pub struct TxDescriptor {
    desc: Descriptor,
}

impl TxDescriptor {
    pub const fn new() -> Self {
        Self {
            desc: Descriptor::new(),
        }
    }

    fn is_owned(&self) -> bool {
        (self.desc.read(0) & TXDESC_0_OWN) == TXDESC_0_OWN
    }

    /// Reports and clears the error summary left by the previous use.
    fn take_error(&mut self) -> bool {
        if (self.desc.read(0) & TXDESC_0_ES) == TXDESC_0_ES {
            unsafe {
                self.desc.modify(0, |w| w & !TXDESC_0_ES);
            }
            true
        } else {
            false
        }
    }

    /// Records the frame length and hands the slot to the DMA engine.
    fn submit(&mut self, length: usize) {
        unsafe {
            self.desc.modify(1, |w| {
                (w & !TXDESC_1_TBS_MASK) | ((length as u32) & TXDESC_1_TBS_MASK)
            });
        }

        // Buffer contents must be visible before ownership transfers.
        fence(Ordering::Release);
        compiler_fence(Ordering::Release);

        unsafe {
            self.desc.write(0, TXDESC_0_OWN);
        }

        fence(Ordering::SeqCst);
    }

    fn length(&self) -> usize {
        (self.desc.read(1) & TXDESC_1_TBS_MASK) as usize
    }

    /// Hardware side: returns the slot to software, recording the outcome.
    fn reclaim(&mut self, error: bool) {
        let status = if error { TXDESC_0_ES } else { 0 };

        fence(Ordering::Release);
        compiler_fence(Ordering::Release);

        unsafe {
            self.desc.write(0, status);
        }

        fence(Ordering::SeqCst);
    }
}

impl Default for TxDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotDescriptor for TxDescriptor {
    fn setup(&mut self, buffer: *const u8, _len: usize, next: Option<&Self>) {
        unsafe {
            self.desc.write(1, TXDESC_1_TCH);
            self.desc.write(2, buffer as u32);
        }
        match next {
            Some(next) => unsafe {
                self.desc.write(3, &next.desc as *const Descriptor as u32);
            },
            None => unsafe {
                self.desc.write(3, 0);
                self.desc.modify(1, |w| w | TXDESC_1_TER);
            },
        }
        // transmit slots start out owned by software
        unsafe {
            self.desc.write(0, 0);
        }
    }
}

/// An entry of the transmit ring.
pub type TxRingEntry = RingEntry<TxDescriptor>;

/// The transmit ring: slot acquisition for software, frame collection for
/// the DMA side.
pub struct TxRing<'a> {
    entries: &'a mut [TxRingEntry],
    next_entry: usize,
    hw_entry: usize,
}

impl<'a> TxRing<'a> {
    /// Chains the descriptors; every slot starts out owned by software.
    pub fn new(entries: &'a mut [TxRingEntry]) -> Self {
        {
            let mut previous: Option<&mut TxRingEntry> = None;
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

        TxRing {
            entries,
            next_entry: 0,
            hw_entry: 0,
        }
    }

    /// Claims the next free slot for a frame of `length` bytes.
    ///
    /// Write the frame through the returned [`TxSlot`] and call
    /// [`commit`](TxSlot::commit) to hand it to the DMA engine. Slots are
    /// claimed strictly round-robin, so committed frames leave in
    /// submission order.
    pub fn send_next(&mut self, length: usize) -> Result<TxSlot<'_>, TxAcquireError> {
        assert!(length <= BUFFER_LEN, "frame exceeds the TX buffer");

        let entries_len = self.entries.len();
        let entry_num = self.next_entry;

        if self.entries[entry_num].desc().is_owned() {
            return Err(TxAcquireError::Busy);
        }

        if self.entries[entry_num].desc_mut().take_error() {
            return Err(TxAcquireError::Fault);
        }

        self.next_entry = (entry_num + 1) % entries_len;

        Ok(TxSlot {
            entry: &mut self.entries[entry_num],
            length,
        })
    }

    /// Hardware side: drains every committed slot in order, passing its
    /// bytes to `f` and returning the slot to software.
    ///
    /// `f` reports per-frame success; a `false` leaves an error summary in
    /// the reclaimed descriptor. Returns the number of slots drained. Used
    /// by software-emulated MACs; real silicon walks the descriptor chain
    /// in memory instead.
    pub fn dma_drain(&mut self, mut f: impl FnMut(&[u8]) -> bool) -> usize {
        let entries_len = self.entries.len();
        let mut drained = 0;

        loop {
            let entry_num = self.hw_entry;
            if !self.entries[entry_num].desc().is_owned() {
                return drained;
            }

            let length = self.entries[entry_num].desc().length().min(BUFFER_LEN);
            let ok = f(&self.entries[entry_num].as_slice()[..length]);
            self.entries[entry_num].desc_mut().reclaim(!ok);

            self.hw_entry = (entry_num + 1) % entries_len;
            drained += 1;
        }
    }
}

/// A claimed transmit slot.
///
/// Dereferences to the slot's buffer, sized to the requested frame
/// length. [`commit`](Self::commit) transfers the slot to the DMA engine;
/// a slot dropped without committing simply stays owned by software.
pub struct TxSlot<'a> {
    entry: &'a mut TxRingEntry,
    length: usize,
}

impl core::ops::Deref for TxSlot<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.entry.as_slice()[..self.length]
    }
}

impl core::ops::DerefMut for TxSlot<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry.as_mut_slice()[..self.length]
    }
}

impl TxSlot<'_> {
    /// Hands the filled slot to the DMA engine.
    pub fn commit(self) {
        self.entry.desc_mut().submit(self.length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RING_DEPTH;

    fn ring_entries() -> [TxRingEntry; RING_DEPTH] {
        [(); RING_DEPTH].map(|_| TxRingEntry::new())
    }

    #[test]
    fn commit_hands_frame_to_hardware() {
        let mut entries = ring_entries();
        let mut ring = TxRing::new(&mut entries);

        let mut slot = ring.send_next(64).unwrap();
        slot.copy_from_slice(&[0xA5; 64]);
        slot.commit();

        let mut seen = alloc::vec::Vec::new();
        let drained = ring.dma_drain(|bytes| {
            seen.extend_from_slice(bytes);
            true
        });
        assert_eq!(drained, 1);
        assert_eq!(seen.len(), 64);
        assert!(seen.iter().all(|byte| *byte == 0xA5));
    }

    #[test]
    fn uncommitted_slot_is_not_transmitted() {
        let mut entries = ring_entries();
        let mut ring = TxRing::new(&mut entries);

        let slot = ring.send_next(64).unwrap();
        drop(slot);

        assert_eq!(ring.dma_drain(|_| true), 0);
    }

    #[test]
    fn full_ring_reports_busy() {
        let mut entries = ring_entries();
        let mut ring = TxRing::new(&mut entries);

        for _ in 0..RING_DEPTH {
            let mut slot = ring.send_next(64).unwrap();
            slot.fill(0);
            slot.commit();
        }
        assert!(matches!(ring.send_next(64), Err(TxAcquireError::Busy)));

        // reclaiming one slot clears the backpressure
        let mut reclaimed = 0;
        ring.dma_drain(|_| {
            reclaimed += 1;
            true
        });
        assert_eq!(reclaimed, RING_DEPTH);
        assert!(ring.send_next(64).is_ok());
    }

    #[test]
    fn failed_transmission_faults_once_on_reuse() {
        let mut entries = ring_entries();
        let mut ring = TxRing::new(&mut entries);

        let mut slot = ring.send_next(64).unwrap();
        slot.fill(0);
        slot.commit();
        ring.dma_drain(|_| false);

        // wrap back around to the poisoned slot
        for _ in 0..RING_DEPTH - 1 {
            let mut slot = ring.send_next(64).unwrap();
            slot.fill(0);
            slot.commit();
        }
        ring.dma_drain(|_| true);

        assert!(matches!(ring.send_next(64), Err(TxAcquireError::Fault)));
        // reported once, slot clean again
        assert!(ring.send_next(64).is_ok());
    }

    #[test]
    fn frames_drain_in_submission_order() {
        let mut entries = ring_entries();
        let mut ring = TxRing::new(&mut entries);

        for seq in 0..4u8 {
            let mut slot = ring.send_next(64).unwrap();
            slot.fill(seq);
            slot.commit();
        }

        let mut order = alloc::vec::Vec::new();
        ring.dma_drain(|bytes| {
            order.push(bytes[0]);
            true
        });
        assert_eq!(order, alloc::vec![0, 1, 2, 3]);
    }
}
