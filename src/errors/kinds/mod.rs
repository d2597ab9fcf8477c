mod frame_format;
mod frame_size;
mod protocol_error;

pub use frame_format::FrameFormatKind;
pub use frame_size::FrameSizeKind;
pub use protocol_error::ExceptionCode;
