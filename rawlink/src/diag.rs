//! Diagnostics: synthetic test frames and human-readable frame dumps.
//!
//! Test frames are deterministic for a given sequence number, so a bench
//! setup without a peer device can validate the transmit and receive
//! paths end to end and conformance-check the contents.

use core::fmt::Write;
use core::sync::atomic::Ordering;

use arrayvec::ArrayString;
use ieee802_3_miim::Miim;

use crate::frame::{EtherType, FrameHeader, MacAddress, HEADER_LEN, MIN_FRAME_LEN};
use crate::iface::{Interface, SendError};
use crate::mac::MacDevice;
use crate::rtos::Rtos;
use crate::stats::StatsSnapshot;

/// Test frames are minimum-size.
pub const TEST_FRAME_LEN: usize = MIN_FRAME_LEN;

/// Builds a broadcast test frame.
///
/// Layout: broadcast destination, `source`, `ethertype`, the two fixed
/// marker bytes `0x01 0x10`, the big-endian `sequence` at bytes 16–17, a
/// `(offset + sequence) % 255` pattern over bytes 18–59 and zero padding
/// up to 64 bytes.
pub fn build_test_frame(
    source: MacAddress,
    ethertype: EtherType,
    sequence: u16,
) -> [u8; TEST_FRAME_LEN] {
    let mut frame = [0u8; TEST_FRAME_LEN];

    frame[0..6].copy_from_slice(&MacAddress::BROADCAST.octets());
    frame[6..12].copy_from_slice(&source.octets());
    frame[12..14].copy_from_slice(&ethertype.to_be_bytes());

    frame[14] = 0x01;
    frame[15] = 0x10;
    frame[16..18].copy_from_slice(&sequence.to_be_bytes());

    for offset in 0..42 {
        frame[18 + offset] = ((offset + sequence as usize) % 255) as u8;
    }
    // bytes 60..64 stay zero

    frame
}

/// Logs a human-readable summary of a raw frame: addresses, EtherType and
/// the first 32 payload bytes.
pub fn dump_frame(frame: &[u8], label: &str) {
    if frame.is_empty() {
        return;
    }

    log::info!("=== {} ({} bytes) ===", label, frame.len());

    let header = match FrameHeader::parse(frame) {
        Some(header) => header,
        None => {
            log::info!("truncated header");
            return;
        }
    };
    log::info!(
        "dst {}  src {}  type {}",
        header.destination,
        header.source,
        header.ethertype
    );

    for chunk in frame[HEADER_LEN..].chunks(16).take(2) {
        let mut line = ArrayString::<48>::new();
        for byte in chunk {
            let _ = write!(line, "{:02X} ", byte);
        }
        log::info!("  {}", line.trim_end());
    }
}

/// Renders an interface status line, as polled by the telemetry task.
pub fn log_status(stats: &StatsSnapshot, link_up: bool) {
    log::info!(
        "link {}: tx {} rx {} tx_err {} rx_err {} dropped {} filtered {}",
        if link_up { "up" } else { "down" },
        stats.tx_frames,
        stats.rx_frames,
        stats.tx_errors,
        stats.rx_errors,
        stats.rx_dropped,
        stats.non_matching,
    );
}

impl<M, P, R> Interface<'_, M, P, R>
where
    M: MacDevice,
    P: Miim,
    R: Rtos,
{
    /// Builds and sends the test frame for `sequence`.
    pub fn send_test_frame(&self, sequence: u16) -> Result<(), SendError> {
        let frame = build_test_frame(self.mac_address(), self.ethertype(), sequence);
        self.send(&frame)
    }

    /// Sends a ping test frame with the interface's running sequence
    /// number.
    pub fn send_ping(&self) -> Result<(), SendError> {
        let sequence = self.ping_seq.fetch_add(1, Ordering::Relaxed);
        self.send_test_frame(sequence)
    }
}
