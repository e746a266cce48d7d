//! # Error Types
//!
//! Failure conditions of the packet layer. Only `Desync` and the size
//! errors reach callers in normal operation; `BadMagic` and
//! `ChecksumMismatch` are recovered inside the reassembler and only
//! surface from the strict [`crate::frame::decode`] entry point.

use thiserror::Error;

/// Main error type for catframe operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than a decode needs
    #[error("short buffer: need {needed} bytes, have {available}")]
    ShortBuffer { needed: usize, available: usize },

    /// Destination buffer given to `encode_into` cannot hold the frame
    #[error("invalid payload size: frame needs {needed} bytes, buffer holds {capacity}")]
    InvalidPayloadSize { needed: usize, capacity: usize },

    /// Payload longer than the 16-bit length field
    #[error("payload of {0} bytes does not fit a 16-bit length")]
    PayloadTooLong(usize),

    /// Buffer does not start with the frame magic
    #[error("bad magic: {0:02x?}")]
    BadMagic([u8; 2]),

    /// Footer checksum disagrees with the payload
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Footer end marker is not 0xFF
    #[error("bad end marker: {0:#04x}")]
    BadEndMarker(u8),

    /// Reassembly buffer exceeded its bound without a frame boundary
    #[error("stream desync: {buffered} bytes buffered without a valid frame, buffer reset")]
    Desync { buffered: usize },

    /// Opcode outside the command catalog
    #[error("unknown command: {0:#04x}")]
    UnknownCommand(u8),

    /// Pixel buffer does not match its declared dimensions
    #[error("raster error: {0}")]
    Raster(String),

    /// Transport-level errors (BLE, closed channel)
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<btleplug::Error> for ProtocolError {
    fn from(err: btleplug::Error) -> Self {
        ProtocolError::Transport(err.to_string())
    }
}
