//! Opcode catalog.
//!
//! The codec treats the command byte as opaque; this table is only used to
//! name opcodes and to sanity-check payloads before they are sent.

use std::fmt;

use crate::error::{ProtocolError, Result};

/// Payload layout a command expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// No payload bytes
    Empty,
    /// Exactly this many bytes
    Fixed(usize),
    /// Any length that fits the frame
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// One row of 1bpp bitmap
    PrintData = 0xA2,
    /// Status query; the device answers with a one-byte status bitmask
    Status = 0xA3,
    /// Print head heat level
    SetHeat = 0xA4,
    /// Print lattice start/stop sequence
    PrintStartStop = 0xA6,
    GetDeviceInfo = 0xA8,
    /// Print energy, u16 little-endian
    SetEnergy = 0xAF,
    PaperFeedSpeed = 0xBD,
    /// Draft mode on (1) / off (0)
    Draft = 0xBE,
    PrintDataCompressed = 0xBF,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::PrintData,
        Command::Status,
        Command::SetHeat,
        Command::PrintStartStop,
        Command::GetDeviceInfo,
        Command::SetEnergy,
        Command::PaperFeedSpeed,
        Command::Draft,
        Command::PrintDataCompressed,
    ];

    pub fn opcode(self) -> u8 {
        self as u8
    }

    pub fn payload_shape(self) -> PayloadShape {
        match self {
            Command::PrintData | Command::PrintDataCompressed | Command::PrintStartStop => {
                PayloadShape::Variable
            }
            Command::Status => PayloadShape::Fixed(1),
            Command::SetHeat => PayloadShape::Fixed(1),
            Command::SetEnergy => PayloadShape::Fixed(2),
            Command::PaperFeedSpeed => PayloadShape::Fixed(1),
            Command::Draft => PayloadShape::Fixed(1),
            Command::GetDeviceInfo => PayloadShape::Empty,
        }
    }

    /// Checks a payload against this command's declared shape.
    ///
    /// - `payload`: bytes about to be framed
    ///
    /// Returns `InvalidPayloadSize` when a fixed or empty shape is violated
    pub fn validate_payload(self, payload: &[u8]) -> Result<()> {
        let expected = match self.payload_shape() {
            PayloadShape::Variable => return Ok(()),
            PayloadShape::Empty => 0,
            PayloadShape::Fixed(n) => n,
        };
        if payload.len() == expected {
            Ok(())
        } else {
            Err(ProtocolError::InvalidPayloadSize {
                needed: expected,
                capacity: payload.len(),
            })
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        Command::ALL
            .into_iter()
            .find(|c| c.opcode() == value)
            .ok_or(ProtocolError::UnknownCommand(value))
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd.opcode()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#04x})", self, self.opcode())
    }
}
