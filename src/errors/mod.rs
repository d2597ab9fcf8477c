mod config;
mod connection;
mod data_model;
mod frame;
mod init;
mod kinds;
mod master;
mod modbus;

pub use kinds::{ExceptionCode, FrameFormatKind, FrameSizeKind};

pub use config::ConfigValidationError;
pub use connection::ConnectionError;
pub use data_model::DataModelError;
pub use frame::FrameError;
pub use init::InitializationError;
pub use master::MasterError;
pub use modbus::ModbusError;
