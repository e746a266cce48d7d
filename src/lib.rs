//! catframe: packet protocol for 0x5178 cat thermal printers.
//!
//! Main modules:
//! - checksum: table-driven CRC-8 over frame payloads
//! - command: opcode catalog
//! - status: status byte decoding
//! - frame: frame encode/decode
//! - reassembler: frames from chunked notifications
//! - printer: request helpers and the inbound session
//! - ble: btleplug transport
//! - raster: PrintData row packing

pub mod ble;
pub mod checksum;
pub mod command;
pub mod config;
pub mod error;
pub mod frame;
pub mod printer;
pub mod raster;
pub mod reassembler;
pub mod status;

pub use checksum::{ChecksumTable, crc8};
pub use command::{Command, PayloadShape};
pub use config::ProtocolConfig;
pub use error::{ProtocolError, Result};
pub use frame::{Decoded, Footer, Frame, Header, decode, encode, encode_into, frame_size, try_decode};
/// Session API: requests out, events in
pub use printer::{Printer, PrinterEvent, Session, Transport, TransportEvent};
pub use reassembler::{ReassemblerStats, StreamReassembler};
pub use status::{PrinterStatus, StatusTracker};
