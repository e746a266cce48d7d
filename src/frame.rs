//! Wire frame codec.
//!
//! ```text
//! offset  size    field
//! 0       2       magic      51 78  (0x7851 little-endian)
//! 2       1       command
//! 3       1       direction  00 host -> device
//! 4       2       length     payload bytes, little-endian
//! 6       length  payload
//! 6+len   1       checksum   crc8(payload)
//! 7+len   1       end        FF
//! ```
//!
//! The codec is opcode-agnostic: the command byte is copied through as-is.

use std::fmt::Write as _;

use bytes::Bytes;

use crate::checksum::crc8;
use crate::command::Command;
use crate::error::{ProtocolError, Result};

pub const MAGIC: u16 = 0x7851;
pub const MAGIC_BYTES: [u8; 2] = MAGIC.to_le_bytes();
pub const END_MARKER: u8 = 0xFF;
pub const DIRECTION_HOST_TO_DEVICE: u8 = 0x00;
pub const HEADER_SIZE: usize = 6;
pub const FOOTER_SIZE: usize = 2;
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Total on-wire size of a frame carrying `payload_len` bytes.
pub const fn frame_size(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + FOOTER_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: u8,
    pub direction: u8,
    pub length: u16,
}

impl Header {
    /// Parses a header; `None` if short or the magic does not match.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || buf[..2] != MAGIC_BYTES {
            return None;
        }
        Some(Self {
            command: buf[2],
            direction: buf[3],
            length: u16::from_le_bytes([buf[4], buf[5]]),
        })
    }

    pub fn frame_size(&self) -> usize {
        frame_size(self.length as usize)
    }

    fn write(&self, dst: &mut [u8]) {
        dst[..2].copy_from_slice(&MAGIC_BYTES);
        dst[2] = self.command;
        dst[3] = self.direction;
        dst[4..6].copy_from_slice(&self.length.to_le_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub checksum: u8,
    pub end: u8,
}

impl Footer {
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            checksum: crc8(payload),
            end: END_MARKER,
        }
    }

    /// Checks the footer against `payload`: checksum first, then end marker.
    pub fn validate(&self, payload: &[u8]) -> Result<()> {
        let expected = crc8(payload);
        if self.checksum != expected {
            return Err(ProtocolError::ChecksumMismatch {
                expected,
                actual: self.checksum,
            });
        }
        if self.end != END_MARKER {
            return Err(ProtocolError::BadEndMarker(self.end));
        }
        Ok(())
    }
}

/// Result of [`try_decode`] on a buffer that starts with the magic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// Header parsed, payload and footer not fully buffered yet
    Partial(Header),
    /// All bytes of the frame are present; the footer is not yet validated
    Complete {
        header: Header,
        payload: &'a [u8],
        footer: Footer,
    },
}

/// A complete, validated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub direction: u8,
    pub payload: Bytes,
    pub checksum: u8,
}

impl Frame {
    /// Host -> device frame with its checksum filled in.
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            command,
            direction: DIRECTION_HOST_TO_DEVICE,
            checksum: crc8(&payload),
            payload,
        }
    }

    /// Catalog entry for the opcode, or `UnknownCommand`.
    pub fn command(&self) -> Result<Command> {
        Command::try_from(self.command)
    }

    pub fn wire_len(&self) -> usize {
        frame_size(self.payload.len())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_with_direction(self.command, self.direction, &self.payload)
    }
}

/// Builds a frame for the cat printer protocol.
///
/// - `command`: command byte
/// - `payload`: command payload
///
/// Returns the `6 + payload.len() + 2` wire bytes
pub fn encode(command: u8, payload: &[u8]) -> Result<Vec<u8>> {
    encode_with_direction(command, DIRECTION_HOST_TO_DEVICE, payload)
}

fn encode_with_direction(command: u8, direction: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; frame_size(payload.len())];
    write_frame(command, direction, payload, &mut out)?;
    Ok(out)
}

/// Writes a frame into a caller-supplied buffer.
///
/// - `dst`: destination, must hold at least `frame_size(payload.len())` bytes
///
/// Returns the number of bytes written, or `InvalidPayloadSize` if `dst`
/// is too small
pub fn encode_into(command: u8, payload: &[u8], dst: &mut [u8]) -> Result<usize> {
    write_frame(command, DIRECTION_HOST_TO_DEVICE, payload, dst)
}

fn write_frame(command: u8, direction: u8, payload: &[u8], dst: &mut [u8]) -> Result<usize> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLong(payload.len()));
    }
    let size = frame_size(payload.len());
    if dst.len() < size {
        return Err(ProtocolError::InvalidPayloadSize {
            needed: size,
            capacity: dst.len(),
        });
    }
    let header = Header {
        command,
        direction,
        length: payload.len() as u16,
    };
    header.write(&mut dst[..HEADER_SIZE]);
    dst[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
    let footer = Footer::for_payload(payload);
    dst[size - 2] = footer.checksum;
    dst[size - 1] = footer.end;
    Ok(size)
}

/// Looks at the start of `buf` for a frame.
///
/// Returns `None` if `buf` is shorter than a header or does not begin with
/// the magic; otherwise whether the whole frame is present yet.
pub fn try_decode(buf: &[u8]) -> Option<Decoded<'_>> {
    let header = Header::parse(buf)?;
    let size = header.frame_size();
    if buf.len() < size {
        return Some(Decoded::Partial(header));
    }
    Some(Decoded::Complete {
        header,
        payload: &buf[HEADER_SIZE..size - FOOTER_SIZE],
        footer: Footer {
            checksum: buf[size - 2],
            end: buf[size - 1],
        },
    })
}

/// Strict decode of one frame at the start of `buf`.
///
/// Returns the frame and the number of bytes it occupied
pub fn decode(buf: &[u8]) -> Result<(Frame, usize)> {
    if buf.len() >= 2 && buf[..2] != MAGIC_BYTES {
        return Err(ProtocolError::BadMagic([buf[0], buf[1]]));
    }
    match try_decode(buf) {
        None => Err(ProtocolError::ShortBuffer {
            needed: HEADER_SIZE,
            available: buf.len(),
        }),
        Some(Decoded::Partial(header)) => Err(ProtocolError::ShortBuffer {
            needed: header.frame_size(),
            available: buf.len(),
        }),
        Some(Decoded::Complete {
            header,
            payload,
            footer,
        }) => {
            footer.validate(payload)?;
            let frame = Frame {
                command: header.command,
                direction: header.direction,
                payload: Bytes::copy_from_slice(payload),
                checksum: footer.checksum,
            };
            Ok((frame, header.frame_size()))
        }
    }
}

/// Space-separated lowercase hex, for trace logs.
pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", b);
    }
    out
}
