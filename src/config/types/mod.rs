mod data_bits;
mod parity;
mod stop_bits;

pub use data_bits::DataBits;
pub use parity::Parity;
pub use stop_bits::StopBits;
