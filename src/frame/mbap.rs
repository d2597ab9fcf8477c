//! MBAP header framing for Modbus/TCP (§4.3): `transaction_id(2), protocol_id(2)=0,
//! length(2), unit_id(1)`, followed by the PDU. `length` counts `unit_id` plus the PDU.

use crate::errors::FrameFormatKind;

pub const HEADER_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub unit_id: u8,
    pdu_len: u16,
}

impl MbapHeader {
    fn length_field(&self) -> u16 {
        self.pdu_len + 1
    }
}

/// A complete frame: header plus the PDU bytes that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub pdu: Vec<u8>,
}

/// Builds the full wire frame (header + PDU) for `transaction_id`/`unit_id`.
pub fn encode(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
    let header = MbapHeader {
        transaction_id,
        unit_id,
        pdu_len: pdu.len() as u16,
    };
    let mut buf = Vec::with_capacity(HEADER_LEN + pdu.len());
    buf.extend_from_slice(&header.transaction_id.to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x00]); // protocol_id
    buf.extend_from_slice(&header.length_field().to_be_bytes());
    buf.push(unit_id);
    buf.extend_from_slice(pdu);
    buf
}

/// Parses the 7-byte MBAP header (step 1 of the reassembly algorithm). Returns
/// the header plus how many more bytes (`length - 1`) the caller must read to
/// have the whole frame.
pub fn decode_header(bytes: &[u8; HEADER_LEN]) -> Result<(MbapHeader, usize), FrameFormatKind> {
    let transaction_id = u16::from_be_bytes([bytes[0], bytes[1]]);
    let protocol_id = u16::from_be_bytes([bytes[2], bytes[3]]);
    if protocol_id != 0 {
        return Err(FrameFormatKind::InvalidProtocolId);
    }
    let length = u16::from_be_bytes([bytes[4], bytes[5]]);
    if length == 0 {
        return Err(FrameFormatKind::InvalidHeader);
    }
    let unit_id = bytes[6];
    let remaining = (length - 1) as usize;
    Ok((
        MbapHeader {
            transaction_id,
            unit_id,
            pdu_len: length - 1,
        },
        remaining,
    ))
}

/// Assembles a header plus the trailing bytes the caller already read into a
/// `Frame`. Pure bookkeeping; the actual stream reads happen in the transport.
pub fn assemble(header: MbapHeader, trailing: Vec<u8>) -> Frame {
    Frame {
        transaction_id: header.transaction_id,
        unit_id: header.unit_id,
        pdu: trailing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let pdu = [0x03, 0x00, 0x0A, 0x00, 0x02];
        let wire = encode(42, 1, &pdu);
        assert_eq!(wire.len(), HEADER_LEN + pdu.len());

        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&wire[..HEADER_LEN]);
        let (header, remaining) = decode_header(&header_bytes).unwrap();
        assert_eq!(header.transaction_id, 42);
        assert_eq!(header.unit_id, 1);
        assert_eq!(remaining, pdu.len());

        let frame = assemble(header, wire[HEADER_LEN..].to_vec());
        assert_eq!(frame.pdu, pdu);
    }

    #[test]
    fn rejects_nonzero_protocol_id() {
        let mut wire = encode(1, 1, &[0x03]);
        wire[2] = 0x00;
        wire[3] = 0x01; // protocol_id = 1
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&wire[..HEADER_LEN]);
        assert_eq!(
            decode_header(&header_bytes).unwrap_err(),
            FrameFormatKind::InvalidProtocolId
        );
    }

    #[test]
    fn length_field_covers_unit_id_plus_pdu() {
        let pdu = [0x01, 0x02, 0x03];
        let wire = encode(1, 5, &pdu);
        let length = u16::from_be_bytes([wire[4], wire[5]]);
        assert_eq!(length as usize, 1 + pdu.len());
    }
}
