use thiserror::Error;

/// Errors raised by the data model's own API surface (§3, §4.5). These are
/// configuration-time errors, not wire-visible: they never turn into a Modbus
/// exception response directly, since the dispatcher only calls into a data
/// model that already passed validation at setup time.
#[derive(Error, Debug)]
pub enum DataModelError {
    #[error("block '{name}' ({start}..{end}) overlaps existing block '{other}' of the same kind")]
    Overlap {
        name: String,
        other: String,
        start: u16,
        end: u32,
    },

    #[error("block '{name}' range {start}+{size} exceeds the 16-bit address space")]
    OutOfAddressSpace { name: String, start: u16, size: u16 },

    #[error("slave id {0} is out of range 1..=247 (0 is reserved for broadcast)")]
    InvalidSlaveId(u8),

    #[error("slave id {0} is already registered")]
    DuplicateSlaveId(u8),

    #[error("no block named '{0}' on this slave")]
    UnknownBlock(String),
}
