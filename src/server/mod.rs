//! Server (slave) roles (§4.9, §4.10): a TCP accept loop and an RTU reader
//! loop, both dispatching through [`crate::dispatch`] against a shared
//! [`crate::datamodel::DataModel`].

pub mod rtu;
pub mod tcp;
