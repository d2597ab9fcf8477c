//! Master (client) roles (§4.7, §4.8): build a request, hand it to a
//! transport, interpret the response. [`tcp::TcpMaster`] and
//! [`rtu::RtuMaster`] share the PDU-building and response-shaping logic here;
//! each owns its own transport lifecycle and retry policy.

pub mod rtu;
pub mod tcp;

use crate::errors::MasterError;
use crate::pdu::{self, FunctionCode, Request, Response};

/// Maximum total attempts for a retryable failure (§4.7): the original call
/// plus two retries.
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_PAUSE: std::time::Duration = std::time::Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// The value returned by a successful `execute` call: a vector of decoded
/// values for reads, or the written address/echo for writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteValue {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
    Write { address: u16, echo: u16 },
}

/// Values for a multi-element write issued through `execute_multiple`
/// (FC 0x0F/0x10, §6) — the counterpart to `execute`'s scalar `value`, which
/// cannot express more than one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiWriteValues {
    Coils(Vec<bool>),
    Registers(Vec<u16>),
}

/// Builds the request PDU body for `execute(function_code, address, quantity,
/// value)`. `quantity` is only meaningful for reads and multi-writes;
/// `value` only for single writes.
pub fn build_request(
    function_code: u8,
    address: u16,
    quantity: u16,
    value: u16,
) -> Result<Request, MasterError> {
    let function = FunctionCode::try_from(function_code)
        .map_err(|_| MasterError::Malformed(format!("unsupported function code {function_code:#04X}")))?;
    Ok(match function {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => Request::ReadBits {
            function,
            address,
            quantity,
        },
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            Request::ReadRegisters {
                function,
                address,
                quantity,
            }
        }
        FunctionCode::WriteSingleCoil => Request::WriteSingleCoil {
            address,
            value: value != 0,
        },
        FunctionCode::WriteSingleRegister => Request::WriteSingleRegister { address, value },
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
            return Err(MasterError::Malformed(
                "multi-value writes are not expressible through the scalar execute() signature"
                    .into(),
            ));
        }
    })
}

/// Builds the request PDU body for `execute_multiple(function_code, address,
/// values)` — the FC 0x0F/0x10 counterpart to [`build_request`], which can
/// only carry a single scalar value.
pub fn build_multi_request(
    function_code: u8,
    address: u16,
    values: MultiWriteValues,
) -> Result<Request, MasterError> {
    let function = FunctionCode::try_from(function_code)
        .map_err(|_| MasterError::Malformed(format!("unsupported function code {function_code:#04X}")))?;
    match (function, values) {
        (FunctionCode::WriteMultipleCoils, MultiWriteValues::Coils(values)) => {
            Ok(Request::WriteMultipleCoils { address, values })
        }
        (FunctionCode::WriteMultipleRegisters, MultiWriteValues::Registers(values)) => {
            Ok(Request::WriteMultipleRegisters { address, values })
        }
        (other, _) => Err(MasterError::Malformed(format!(
            "function code {:#04X} does not accept multi-write values",
            other.to_wire()
        ))),
    }
}

/// Resolves the `FunctionCode` this request will come back addressed as (the
/// response echoes the same function code unless it's an exception).
pub fn function_of(request: &Request) -> FunctionCode {
    match request {
        Request::ReadBits { function, .. } | Request::ReadRegisters { function, .. } => *function,
        Request::WriteSingleCoil { .. } => FunctionCode::WriteSingleCoil,
        Request::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
        Request::WriteMultipleCoils { .. } => FunctionCode::WriteMultipleCoils,
        Request::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
    }
}

/// Turns a decoded response PDU into the public `ExecuteValue`, surfacing a
/// peer exception as `MasterError::Exception`.
pub fn interpret_response(
    request: &Request,
    response: Response,
) -> Result<ExecuteValue, MasterError> {
    match response {
        Response::Exception(code) => Err(MasterError::Exception(code)),
        Response::Bits(values) => Ok(ExecuteValue::Bits(values)),
        Response::Registers(values) => Ok(ExecuteValue::Registers(values)),
        Response::WriteSingleCoil { address, value } => Ok(ExecuteValue::Write {
            address,
            echo: u16::from(value),
        }),
        Response::WriteSingleRegister { address, value } => {
            Ok(ExecuteValue::Write { address, echo: value })
        }
        Response::WriteMultiple { address, quantity } => {
            let _ = request;
            Ok(ExecuteValue::Write {
                address,
                echo: quantity,
            })
        }
    }
}

pub(crate) fn request_quantity(request: &Request) -> u16 {
    match request {
        Request::ReadBits { quantity, .. } | Request::ReadRegisters { quantity, .. } => *quantity,
        _ => 0,
    }
}

pub(crate) fn encode(request: &Request) -> Vec<u8> {
    pdu::encode_request(request)
}
