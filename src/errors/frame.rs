use thiserror::Error;

use super::{FrameFormatKind, FrameSizeKind};

/// Errors raised while delimiting or validating a transport frame (MBAP or RTU),
/// before the PDU inside it is even looked at.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame size error: {kind} - {details}")]
    Size {
        kind: FrameSizeKind,
        details: String,
        frame_data: Option<Vec<u8>>,
    },

    #[error("frame format error: {kind} - {details}")]
    Format {
        kind: FrameFormatKind,
        details: String,
        frame_data: Option<Vec<u8>>,
    },

    #[error("CRC error: calculated={calculated:04X}, received={received:04X}, frame={frame_hex}")]
    Crc {
        calculated: u16,
        received: u16,
        frame_hex: String,
    },
}

impl FrameError {
    pub fn too_short(details: impl Into<String>, frame_data: impl Into<Vec<u8>>) -> Self {
        Self::Size {
            kind: FrameSizeKind::TooShort,
            details: details.into(),
            frame_data: Some(frame_data.into()),
        }
    }

    pub fn too_long(details: impl Into<String>) -> Self {
        Self::Size {
            kind: FrameSizeKind::TooLong,
            details: details.into(),
            frame_data: None,
        }
    }

    pub fn invalid_protocol_id(details: impl Into<String>) -> Self {
        Self::Format {
            kind: FrameFormatKind::InvalidProtocolId,
            details: details.into(),
            frame_data: None,
        }
    }

    pub fn invalid_header(details: impl Into<String>) -> Self {
        Self::Format {
            kind: FrameFormatKind::InvalidHeader,
            details: details.into(),
            frame_data: None,
        }
    }

    pub fn crc(calculated: u16, received: u16, frame: &[u8]) -> Self {
        Self::Crc {
            calculated,
            received,
            frame_hex: hex::encode(frame),
        }
    }
}
