//! A Modbus TCP/RTU protocol engine: request/response codecs, frame
//! delimitation for both transports, a per-slave data model, a server
//! dispatcher, and master/server roles built on top of them.

pub mod config;
pub mod connection;
pub mod crc;
pub mod datamodel;
pub mod dispatch;
pub mod errors;
pub mod frame;
pub mod http_api;
pub mod logging;
pub mod master;
pub mod pdu;
pub mod server;

pub use datamodel::{DataModel, Kind, Slave};
pub use dispatch::dispatch;
pub use errors::ModbusError;
pub use master::rtu::RtuMaster;
pub use master::tcp::TcpMaster;
pub use master::ExecuteValue;
pub use pdu::{FunctionCode, Request, Response};
