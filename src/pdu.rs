//! Function-code-specific PDU encoding and decoding (§4.2), shared verbatim
//! between the TCP and RTU transports — a PDU is `function_code(1) + body`,
//! transport-independent.

use crate::errors::ExceptionCode;

pub const MAX_READ_BITS_QTY: u16 = 2000;
pub const MAX_READ_REGISTERS_QTY: u16 = 125;
const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
}

impl FunctionCode {
    pub fn to_wire(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
        }
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::ReadCoils),
            0x02 => Ok(Self::ReadDiscreteInputs),
            0x03 => Ok(Self::ReadHoldingRegisters),
            0x04 => Ok(Self::ReadInputRegisters),
            0x05 => Ok(Self::WriteSingleCoil),
            0x06 => Ok(Self::WriteSingleRegister),
            0x0F => Ok(Self::WriteMultipleCoils),
            0x10 => Ok(Self::WriteMultipleRegisters),
            _ => Err(()),
        }
    }
}

/// A decoded request body, independent of transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadBits {
        function: FunctionCode, // ReadCoils or ReadDiscreteInputs
        address: u16,
        quantity: u16,
    },
    ReadRegisters {
        function: FunctionCode, // ReadHoldingRegisters or ReadInputRegisters
        address: u16,
        quantity: u16,
    },
    WriteSingleCoil {
        address: u16,
        value: bool,
    },
    WriteSingleRegister {
        address: u16,
        value: u16,
    },
    WriteMultipleCoils {
        address: u16,
        values: Vec<bool>,
    },
    WriteMultipleRegisters {
        address: u16,
        values: Vec<u16>,
    },
}

/// A decoded response body, independent of transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultiple { address: u16, quantity: u16 },
    Exception(ExceptionCode),
}

/// Packs booleans LSB-first: element *i* is bit `i mod 8` of byte `i div 8`.
pub fn pack_bits(values: &[bool]) -> Vec<u8> {
    let byte_count = values.len().div_ceil(8);
    let mut bytes = vec![0u8; byte_count];
    for (i, &v) in values.iter().enumerate() {
        if v {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpacks LSB-first bits and truncates to `quantity` elements.
pub fn unpack_bits(bytes: &[u8], quantity: u16) -> Vec<bool> {
    let mut values = Vec::with_capacity(quantity as usize);
    'outer: for &byte in bytes {
        for bit in 0..8 {
            if values.len() == quantity as usize {
                break 'outer;
            }
            values.push((byte >> bit) & 1 != 0);
        }
    }
    values.resize(quantity as usize, false);
    values
}

/// Builds the request PDU (function code byte + body) for a master call.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(8);
    match req {
        Request::ReadBits {
            function,
            address,
            quantity,
        }
        | Request::ReadRegisters {
            function,
            address,
            quantity,
        } => {
            pdu.push(function.to_wire());
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&quantity.to_be_bytes());
        }
        Request::WriteSingleCoil { address, value } => {
            pdu.push(FunctionCode::WriteSingleCoil.to_wire());
            pdu.extend_from_slice(&address.to_be_bytes());
            let wire_value: u16 = if *value { COIL_ON } else { COIL_OFF };
            pdu.extend_from_slice(&wire_value.to_be_bytes());
        }
        Request::WriteSingleRegister { address, value } => {
            pdu.push(FunctionCode::WriteSingleRegister.to_wire());
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&value.to_be_bytes());
        }
        Request::WriteMultipleCoils { address, values } => {
            pdu.push(FunctionCode::WriteMultipleCoils.to_wire());
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&(values.len() as u16).to_be_bytes());
            let packed = pack_bits(values);
            pdu.push(packed.len() as u8);
            pdu.extend_from_slice(&packed);
        }
        Request::WriteMultipleRegisters { address, values } => {
            pdu.push(FunctionCode::WriteMultipleRegisters.to_wire());
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&(values.len() as u16).to_be_bytes());
            pdu.push((values.len() * 2) as u8);
            for value in values {
                pdu.extend_from_slice(&value.to_be_bytes());
            }
        }
    }
    pdu
}

/// Encodes a normal or exception response PDU.
pub fn encode_response(function: FunctionCode, resp: &Response) -> Vec<u8> {
    match resp {
        Response::Exception(code) => vec![function.to_wire() | 0x80, code.to_wire()],
        Response::Bits(values) => {
            let packed = pack_bits(values);
            let mut pdu = Vec::with_capacity(2 + packed.len());
            pdu.push(function.to_wire());
            pdu.push(packed.len() as u8);
            pdu.extend_from_slice(&packed);
            pdu
        }
        Response::Registers(values) => {
            let mut pdu = Vec::with_capacity(2 + values.len() * 2);
            pdu.push(function.to_wire());
            pdu.push((values.len() * 2) as u8);
            for value in values {
                pdu.extend_from_slice(&value.to_be_bytes());
            }
            pdu
        }
        Response::WriteSingleCoil { address, value } => {
            let mut pdu = vec![function.to_wire()];
            pdu.extend_from_slice(&address.to_be_bytes());
            let wire_value: u16 = if *value { COIL_ON } else { COIL_OFF };
            pdu.extend_from_slice(&wire_value.to_be_bytes());
            pdu
        }
        Response::WriteSingleRegister { address, value } => {
            let mut pdu = vec![function.to_wire()];
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&value.to_be_bytes());
            pdu
        }
        Response::WriteMultiple { address, quantity } => {
            let mut pdu = vec![function.to_wire()];
            pdu.extend_from_slice(&address.to_be_bytes());
            pdu.extend_from_slice(&quantity.to_be_bytes());
            pdu
        }
    }
}

/// Decodes a request body on the server side. Returns the exception to answer
/// with when the body is too short or a value is out of the function's domain
/// (§4.6 steps 3-4); address-range and quantity-limit checks beyond raw shape
/// are left to the dispatcher, which has the data model in hand.
pub fn decode_request(function: FunctionCode, body: &[u8]) -> Result<Request, ExceptionCode> {
    match function {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
            if body.len() < 4 {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let quantity = u16::from_be_bytes([body[2], body[3]]);
            if quantity == 0 || quantity > MAX_READ_BITS_QTY {
                return Err(ExceptionCode::IllegalDataValue);
            }
            Ok(Request::ReadBits {
                function,
                address,
                quantity,
            })
        }
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            if body.len() < 4 {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let quantity = u16::from_be_bytes([body[2], body[3]]);
            if quantity == 0 || quantity > MAX_READ_REGISTERS_QTY {
                return Err(ExceptionCode::IllegalDataValue);
            }
            Ok(Request::ReadRegisters {
                function,
                address,
                quantity,
            })
        }
        FunctionCode::WriteSingleCoil => {
            if body.len() < 4 {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let raw = u16::from_be_bytes([body[2], body[3]]);
            let value = match raw {
                COIL_ON => true,
                COIL_OFF => false,
                _ => return Err(ExceptionCode::IllegalDataValue),
            };
            Ok(Request::WriteSingleCoil { address, value })
        }
        FunctionCode::WriteSingleRegister => {
            if body.len() < 4 {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let value = u16::from_be_bytes([body[2], body[3]]);
            Ok(Request::WriteSingleRegister { address, value })
        }
        FunctionCode::WriteMultipleCoils => {
            if body.len() < 5 {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let quantity = u16::from_be_bytes([body[2], body[3]]);
            let byte_count = body[4] as usize;
            if quantity == 0
                || quantity > MAX_READ_BITS_QTY
                || byte_count != quantity.div_ceil(8) as usize
                || body.len() < 5 + byte_count
            {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let values = unpack_bits(&body[5..5 + byte_count], quantity);
            Ok(Request::WriteMultipleCoils { address, values })
        }
        FunctionCode::WriteMultipleRegisters => {
            if body.len() < 5 {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let quantity = u16::from_be_bytes([body[2], body[3]]);
            let byte_count = body[4] as usize;
            if quantity == 0
                || quantity > MAX_READ_REGISTERS_QTY
                || byte_count != quantity as usize * 2
                || body.len() < 5 + byte_count
            {
                return Err(ExceptionCode::IllegalDataValue);
            }
            let mut values = Vec::with_capacity(quantity as usize);
            for chunk in body[5..5 + byte_count].chunks_exact(2) {
                values.push(u16::from_be_bytes([chunk[0], chunk[1]]));
            }
            Ok(Request::WriteMultipleRegisters { address, values })
        }
    }
}

/// Decodes a response PDU on the master side.
pub fn decode_response(
    expected: FunctionCode,
    pdu: &[u8],
    request_quantity: u16,
) -> Result<Response, String> {
    if pdu.is_empty() {
        return Err("empty PDU".into());
    }
    let fc_byte = pdu[0];
    if fc_byte & 0x80 != 0 {
        let code = *pdu.get(1).ok_or("exception response missing code")?;
        let exception =
            ExceptionCode::from_wire(code).ok_or_else(|| format!("unknown exception code {code}"))?;
        return Ok(Response::Exception(exception));
    }
    if fc_byte != expected.to_wire() {
        return Err(format!(
            "unexpected function code {fc_byte:#04X}, expected {:#04X}",
            expected.to_wire()
        ));
    }
    let body = &pdu[1..];
    match expected {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
            let byte_count = *body.first().ok_or("missing byte count")? as usize;
            let data = body.get(1..1 + byte_count).ok_or("short bit payload")?;
            Ok(Response::Bits(unpack_bits(data, request_quantity)))
        }
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            let byte_count = *body.first().ok_or("missing byte count")? as usize;
            let data = body.get(1..1 + byte_count).ok_or("short register payload")?;
            let values = data
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Ok(Response::Registers(values))
        }
        FunctionCode::WriteSingleCoil => {
            if body.len() < 4 {
                return Err("short write-single-coil echo".into());
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let value = u16::from_be_bytes([body[2], body[3]]) == COIL_ON;
            Ok(Response::WriteSingleCoil { address, value })
        }
        FunctionCode::WriteSingleRegister => {
            if body.len() < 4 {
                return Err("short write-single-register echo".into());
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let value = u16::from_be_bytes([body[2], body[3]]);
            Ok(Response::WriteSingleRegister { address, value })
        }
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
            if body.len() < 4 {
                return Err("short write-multiple echo".into());
            }
            let address = u16::from_be_bytes([body[0], body[1]]);
            let quantity = u16::from_be_bytes([body[2], body[3]]);
            Ok(Response::WriteMultiple { address, quantity })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_packing_round_trips_for_every_length_class() {
        for len in [1usize, 7, 8, 9, 16, 17, 2000] {
            let values: Vec<bool> = (0..len).map(|i| i % 3 == 0).collect();
            let packed = pack_bits(&values);
            let unpacked = unpack_bits(&packed, len as u16);
            assert_eq!(values, unpacked, "len={len}");
        }
    }

    #[test]
    fn read_coils_scenario_from_spec() {
        // 16 coils: T,F,T,F,F,F,F,F, T,T,F,F,F,F,F,F ; read qty=10 from addr 0.
        let values = [
            true, false, true, false, false, false, false, false, true, true, false, false,
            false, false, false, false,
        ];
        let packed = pack_bits(&values[..10]);
        assert_eq!(packed, vec![0b0000_0101, 0b0000_0011]);
        let unpacked = unpack_bits(&packed, 10);
        assert_eq!(unpacked, &values[..10]);
    }

    #[test]
    fn request_pdu_round_trips_for_every_function() {
        let cases = vec![
            Request::ReadBits {
                function: FunctionCode::ReadCoils,
                address: 10,
                quantity: 5,
            },
            Request::ReadRegisters {
                function: FunctionCode::ReadHoldingRegisters,
                address: 100,
                quantity: 3,
            },
            Request::WriteSingleCoil {
                address: 7,
                value: true,
            },
            Request::WriteSingleRegister {
                address: 7,
                value: 0x1234,
            },
            Request::WriteMultipleCoils {
                address: 0,
                values: vec![true, false, true],
            },
            Request::WriteMultipleRegisters {
                address: 0,
                values: vec![1, 2, 3],
            },
        ];

        for req in cases {
            let pdu = encode_request(&req);
            let function = FunctionCode::try_from(pdu[0] & 0x7F).unwrap();
            let decoded = decode_request(function, &pdu[1..]).unwrap();
            assert_eq!(req, decoded);
        }
    }

    #[test]
    fn write_single_register_echo_scenario() {
        let req = Request::WriteSingleRegister {
            address: 7,
            value: 0x1234,
        };
        let pdu = encode_request(&req);
        assert_eq!(&pdu[1..], &[0x00, 0x07, 0x12, 0x34]);
    }

    #[test]
    fn decode_request_rejects_bad_coil_qty() {
        let body = [0x00, 0x00, 0x00, 0x00]; // qty = 0
        let err = decode_request(FunctionCode::ReadCoils, &body).unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalDataValue);

        let body = [0x00, 0x00, 0x07, 0xD1]; // qty = 2001 > 2000
        let err = decode_request(FunctionCode::ReadCoils, &body).unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalDataValue);
    }

    #[test]
    fn decode_request_rejects_bad_coil_value() {
        let body = [0x00, 0x01, 0x12, 0x34];
        let err = decode_request(FunctionCode::WriteSingleCoil, &body).unwrap_err();
        assert_eq!(err, ExceptionCode::IllegalDataValue);
    }
}
