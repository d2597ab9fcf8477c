//! RTU framing (§4.4): `slave(1), function(1), body(n), crc(2 little-endian)`,
//! frames delimited by inter-character silence rather than a length prefix.

use std::time::Duration;

use crate::crc;

/// Minimum bytes in a data-bearing RTU frame: slave + function + 1 body byte + crc.
pub const MIN_FRAME_LEN: usize = 5;

/// Character/frame silence thresholds derived from the line's baud rate.
///
/// Below 19200 baud the gaps are computed from the 11-bit character time
/// (`start + 8 data + parity + stop`, worst case); above it the standard
/// fixes absolute values since the computed ones would be unrealistically
/// short for modern UARTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub t_char: Duration,
    pub t15: Duration,
    pub t35: Duration,
}

impl Timing {
    pub fn for_baud_rate(baud_rate: u32) -> Self {
        if baud_rate > 19200 {
            Self {
                t_char: Duration::from_micros(1_000_000 / baud_rate.max(1) as u64),
                t15: Duration::from_micros(750),
                t35: Duration::from_micros(1750),
            }
        } else {
            let t_char = Duration::from_secs_f64(11.0 / baud_rate as f64);
            Self {
                t_char,
                t15: t_char.mul_f64(1.5),
                t35: t_char.mul_f64(3.5),
            }
        }
    }
}

/// Appends the little-endian CRC to `slave_and_pdu` (`[slave, function,
/// body...]`), producing a ready-to-send frame.
pub fn encode(slave_and_pdu: &[u8]) -> Vec<u8> {
    let crc = crc::compute(slave_and_pdu);
    let mut frame = Vec::with_capacity(slave_and_pdu.len() + 2);
    frame.extend_from_slice(slave_and_pdu);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Splits a complete frame (as assembled by silence detection) into
/// `(slave_id, pdu)`, verifying the trailing CRC. Returns `None` on a short
/// frame or CRC mismatch — both are silently-dropped conditions per §4.4/§4.10.
pub fn decode(frame: &[u8]) -> Option<(u8, &[u8])> {
    if frame.len() < MIN_FRAME_LEN {
        return None;
    }
    let (body, crc_bytes) = frame.split_at(frame.len() - 2);
    let received = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    if !crc::verify(body, received) {
        return None;
    }
    Some((body[0], &body[1..]))
}

/// Accumulates bytes observed on the wire and reports when a silence gap has
/// completed a frame — the "server" half of the `IDLE -> RECEIVING ->
/// FRAME_READY` state machine from §4.10. Caller feeds bytes as they arrive
/// and calls `on_silence` whenever the transport observes a read timeout or
/// idle gap of at least `t35`; `on_silence` drains and returns the buffered
/// frame if non-empty.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Takes the buffered bytes as a completed frame, resetting the assembler
    /// to `IDLE`. Returns `None` if nothing was buffered (a spurious timeout).
    pub fn on_silence(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_above_19200_uses_fixed_thresholds() {
        let timing = Timing::for_baud_rate(115_200);
        assert_eq!(timing.t15, Duration::from_micros(750));
        assert_eq!(timing.t35, Duration::from_micros(1750));
    }

    #[test]
    fn timing_at_9600_derives_from_character_time() {
        let timing = Timing::for_baud_rate(9600);
        let t_char = Duration::from_secs_f64(11.0 / 9600.0);
        assert_eq!(timing.t_char, t_char);
        assert_eq!(timing.t35, t_char.mul_f64(3.5));
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let slave_and_pdu = [0x11, 0x03, 0x00, 0x6B, 0x00, 0x03];
        let frame = encode(&slave_and_pdu);
        let (slave, pdu) = decode(&frame).unwrap();
        assert_eq!(slave, 0x11);
        assert_eq!(pdu, &slave_and_pdu[1..]);
    }

    #[test]
    fn known_crc_vector_from_spec() {
        let frame = encode(&[0x01, 0x04, 0x02, 0xFF, 0xFF]);
        assert_eq!(&frame[frame.len() - 2..], &0xA880u16.to_le_bytes());
    }

    #[test]
    fn decode_drops_frame_with_bad_crc() {
        let mut frame = encode(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(decode(&frame).is_none());
    }

    #[test]
    fn decode_drops_too_short_frame() {
        assert!(decode(&[0x01, 0x02]).is_none());
    }

    #[test]
    fn assembler_buffers_until_silence() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.on_silence().is_none());
        assembler.push(&[0x11, 0x03]);
        assembler.push(&[0x00, 0x6B, 0x00, 0x03]);
        let frame = assembler.on_silence().unwrap();
        assert_eq!(frame, vec![0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]);
        assert!(assembler.is_empty());
    }
}
