//! Layered configuration: built-in defaults, YAML files, then environment
//! variables, using the `config` crate.

mod connection;
mod engine;
mod http;
mod logging;
mod master;
mod rtu;
mod tcp;
mod types;

pub use connection::ConnectionConfig;
pub use engine::EngineConfig;
pub use http::HttpConfig;
pub use logging::LoggingConfig;
pub use master::MasterConfig;
pub use rtu::RtuConfig;
pub use tcp::TcpConfig;
pub use types::{DataBits, Parity, StopBits};
