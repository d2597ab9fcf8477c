//! Transport framing: MBAP for Modbus/TCP (§4.3), silence-delimited framing
//! for Modbus/RTU (§4.4).

pub mod mbap;
pub mod rtu;
