//! Status byte interpretation.
//!
//! The device reports its condition as a bitmask, but only one condition is
//! surfaced: the first entry of [`STATUS_PRECEDENCE`] whose mask is set.
//! Busy pre-empts every other flag.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrinterStatus {
    Ready,
    Busy,
    NoPaper,
    CoverOpen,
    Overheat,
    LowPower,
    Unknown,
}

/// (mask, status) pairs in evaluation order. A zero byte is `Ready` before
/// this list is consulted.
pub const STATUS_PRECEDENCE: [(u8, PrinterStatus); 5] = [
    (0x80, PrinterStatus::Busy),
    (0x01, PrinterStatus::NoPaper),
    (0x02, PrinterStatus::CoverOpen),
    (0x04, PrinterStatus::Overheat),
    (0x08, PrinterStatus::LowPower),
];

impl PrinterStatus {
    /// Decodes one status byte.
    ///
    /// - `byte`: status bitmask, payload byte 0 of a Status response
    ///
    /// Returns the highest-priority condition present
    pub fn decode(byte: u8) -> Self {
        if byte == 0 {
            return PrinterStatus::Ready;
        }
        STATUS_PRECEDENCE
            .iter()
            .find(|(mask, _)| byte & mask != 0)
            .map(|&(_, status)| status)
            .unwrap_or(PrinterStatus::Unknown)
    }

    /// Decodes the payload of a Status response. `None` for an empty payload.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        payload.first().copied().map(Self::decode)
    }

    pub fn is_ready(self) -> bool {
        self == PrinterStatus::Ready
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrinterStatus::Ready => "Ready",
            PrinterStatus::Busy => "Busy",
            PrinterStatus::NoPaper => "No paper",
            PrinterStatus::CoverOpen => "Cover open",
            PrinterStatus::Overheat => "Overheat",
            PrinterStatus::LowPower => "Low power",
            PrinterStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Last status the device reported on this connection.
///
/// Holds its value until a newer Status response replaces it. Starts as
/// `Unknown`.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    current: PrinterStatus,
    raw: Option<u8>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            current: PrinterStatus::Unknown,
            raw: None,
        }
    }

    pub fn current(&self) -> PrinterStatus {
        self.current
    }

    /// Raw byte of the last accepted report.
    pub fn raw(&self) -> Option<u8> {
        self.raw
    }

    /// Applies a Status response payload.
    ///
    /// Returns the new status, or `None` if the payload was empty and the
    /// previous value was kept.
    pub fn update(&mut self, payload: &[u8]) -> Option<PrinterStatus> {
        let byte = *payload.first()?;
        self.raw = Some(byte);
        self.current = PrinterStatus::decode(byte);
        Some(self.current)
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
