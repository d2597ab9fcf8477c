//! Server dispatcher (§4.6): resolves a slave by unit ID, routes a decoded
//! request to the data model by function code, and builds the normal or
//! exception response PDU. Dispatch itself is a static table — one match arm
//! per function code — rather than a registry of boxed handlers.

use crate::datamodel::{DataModel, Kind};
use crate::errors::ExceptionCode;
use crate::pdu::{self, FunctionCode, Request, Response};

/// Dispatches one PDU addressed to `unit_id`. Always returns a response PDU
/// to write back, ready-made for the caller to frame — callers that must
/// suppress the reply (RTU broadcast, §4.4) check `unit_id == 0` themselves
/// before calling this.
pub fn dispatch(data_model: &mut DataModel, unit_id: u8, request_pdu: &[u8]) -> Vec<u8> {
    let Some(&function_byte) = request_pdu.first() else {
        return encode_exception(0, ExceptionCode::IllegalFunction);
    };
    let Ok(function) = FunctionCode::try_from(function_byte) else {
        return encode_exception(function_byte, ExceptionCode::IllegalFunction);
    };

    let Some(slave) = data_model.slave_mut(unit_id) else {
        return encode_exception(function_byte, ExceptionCode::SlaveDeviceFailure);
    };

    let body = &request_pdu[1..];
    let request = match pdu::decode_request(function, body) {
        Ok(request) => request,
        Err(exception) => return encode_exception(function_byte, exception),
    };

    match handle(slave, &request) {
        Ok(response) => pdu::encode_response(function, &response),
        Err(exception) => encode_exception(function_byte, exception),
    }
}

fn encode_exception(function_byte: u8, exception: ExceptionCode) -> Vec<u8> {
    vec![function_byte | 0x80, exception.to_wire()]
}

fn handle(
    slave: &mut crate::datamodel::Slave,
    request: &Request,
) -> Result<Response, ExceptionCode> {
    match request {
        Request::ReadBits {
            function,
            address,
            quantity,
        } => {
            check_address_range(*address, *quantity)?;
            let kind = match function {
                FunctionCode::ReadCoils => Kind::Coil,
                FunctionCode::ReadDiscreteInputs => Kind::DiscreteInput,
                _ => unreachable!("decode_request only produces ReadBits for bit functions"),
            };
            Ok(Response::Bits(slave.read_bits_by_address(
                kind, *address, *quantity,
            )))
        }
        Request::ReadRegisters {
            function,
            address,
            quantity,
        } => {
            check_address_range(*address, *quantity)?;
            let kind = match function {
                FunctionCode::ReadHoldingRegisters => Kind::HoldingRegister,
                FunctionCode::ReadInputRegisters => Kind::InputRegister,
                _ => unreachable!("decode_request only produces ReadRegisters for register functions"),
            };
            Ok(Response::Registers(slave.read_registers_by_address(
                kind, *address, *quantity,
            )))
        }
        Request::WriteSingleCoil { address, value } => {
            slave.write_bits_by_address(Kind::Coil, *address, &[*value]);
            Ok(Response::WriteSingleCoil {
                address: *address,
                value: *value,
            })
        }
        Request::WriteSingleRegister { address, value } => {
            slave.write_registers_by_address(Kind::HoldingRegister, *address, &[*value]);
            Ok(Response::WriteSingleRegister {
                address: *address,
                value: *value,
            })
        }
        Request::WriteMultipleCoils { address, values } => {
            check_address_range(*address, values.len() as u16)?;
            slave.write_bits_by_address(Kind::Coil, *address, values);
            Ok(Response::WriteMultiple {
                address: *address,
                quantity: values.len() as u16,
            })
        }
        Request::WriteMultipleRegisters { address, values } => {
            check_address_range(*address, values.len() as u16)?;
            slave.write_registers_by_address(Kind::HoldingRegister, *address, values);
            Ok(Response::WriteMultiple {
                address: *address,
                quantity: values.len() as u16,
            })
        }
    }
}

fn check_address_range(address: u16, quantity: u16) -> Result<(), ExceptionCode> {
    if address as u32 + quantity as u32 > 0x1_0000 {
        Err(ExceptionCode::IllegalDataAddress)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::rtu;

    fn model_with_holding_and_coils() -> DataModel {
        let mut model = DataModel::new();
        let slave = model.add_slave(1).unwrap();
        slave.create_block("c", Kind::Coil, 0, 16).unwrap();
        slave.create_block("holding", Kind::HoldingRegister, 0, 16).unwrap();
        model
    }

    #[test]
    fn read_coils_round_trip_scenario() {
        let mut model = model_with_holding_and_coils();
        let values = [
            true, false, true, false, false, false, false, false, true, true, false, false,
            false, false, false, false,
        ];
        model.slave_mut(1).unwrap().set_bits("c", 0, &values).unwrap();

        let request = pdu::encode_request(&Request::ReadBits {
            function: FunctionCode::ReadCoils,
            address: 0,
            quantity: 10,
        });
        let response = dispatch(&mut model, 1, &request);
        assert_eq!(response, vec![0x01, 0x02, 0b0000_0101, 0b0000_0011]);
    }

    #[test]
    fn write_single_register_echo_scenario() {
        let mut model = model_with_holding_and_coils();
        let request = pdu::encode_request(&Request::WriteSingleRegister {
            address: 7,
            value: 0x1234,
        });
        let response = dispatch(&mut model, 1, &request);
        assert_eq!(response, vec![0x06, 0x00, 0x07, 0x12, 0x34]);
        let read = model.slave(1).unwrap().get_registers("holding", 7, 1).unwrap();
        assert_eq!(read, vec![0x1234]);
    }

    #[test]
    fn unknown_slave_replies_slave_device_failure() {
        let mut model = model_with_holding_and_coils();
        let request = pdu::encode_request(&Request::ReadRegisters {
            function: FunctionCode::ReadHoldingRegisters,
            address: 0,
            quantity: 1,
        });
        let response = dispatch(&mut model, 9, &request);
        assert_eq!(response, vec![0x83, 0x04]);
    }

    #[test]
    fn unknown_function_code_replies_illegal_function() {
        let mut model = model_with_holding_and_coils();
        let response = dispatch(&mut model, 1, &[0x2B, 0x00]);
        assert_eq!(response, vec![0xAB, 0x01]);
    }

    #[test]
    fn address_overflow_replies_illegal_data_address() {
        let mut model = model_with_holding_and_coils();
        let request = pdu::encode_request(&Request::ReadRegisters {
            function: FunctionCode::ReadHoldingRegisters,
            address: 0xFFFF,
            quantity: 10,
        });
        let response = dispatch(&mut model, 1, &request);
        assert_eq!(response, vec![0x83, 0x02]);
    }

    #[test]
    fn partial_range_read_falls_back_to_defaults() {
        let mut model = DataModel::new();
        let slave = model.add_slave(1).unwrap();
        slave.create_block("holding", Kind::HoldingRegister, 10, 4).unwrap();
        slave.set_registers("holding", 10, &[11, 22, 33, 44]).unwrap();

        let request = pdu::encode_request(&Request::ReadRegisters {
            function: FunctionCode::ReadHoldingRegisters,
            address: 12,
            quantity: 4,
        });
        let response = dispatch(&mut model, 1, &request);
        assert_eq!(response[0], 0x03);
        assert_eq!(&response[2..], &[0x00, 33, 0x00, 44, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn rtu_frame_round_trip_through_dispatch() {
        let mut model = model_with_holding_and_coils();
        let pdu_bytes = pdu::encode_request(&Request::ReadRegisters {
            function: FunctionCode::ReadHoldingRegisters,
            address: 0,
            quantity: 2,
        });
        let mut slave_and_pdu = vec![0x01];
        slave_and_pdu.extend_from_slice(&pdu_bytes);
        let wire = rtu::encode(&slave_and_pdu);
        let (slave_id, parsed_pdu) = rtu::decode(&wire).unwrap();
        let response = dispatch(&mut model, slave_id, parsed_pdu);
        assert_eq!(response, vec![0x03, 0x04, 0, 0, 0, 0]);
    }
}
