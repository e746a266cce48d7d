use crate::frame::{MAX_PAYLOAD, frame_size};

/// Bytes per transport write when nothing else is configured.
pub const DEFAULT_MTU: usize = 180;

/// Largest payload accepted from the device by default. The printer never
/// sends more than a notification's worth; declared lengths above this are
/// treated as corruption.
pub const DEFAULT_MAX_PAYLOAD: usize = 512;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Tunables for one printer connection.
///
/// - `max_payload`: largest inbound payload; longer declared lengths are not frames
/// - `mtu`: largest single transport write
/// - `channel_capacity`: depth of the inbound event queue
///
/// The reassembler bound is `frame_size(max_payload) + mtu` unless set
/// outright with [`ProtocolConfig::with_max_buffer`]; builder order does not
/// matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    max_payload: usize,
    mtu: usize,
    channel_capacity: usize,
    max_buffer: Option<usize>,
}

impl ProtocolConfig {
    pub fn new() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            mtu: DEFAULT_MTU,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_buffer: None,
        }
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu.max(1);
        self
    }

    /// Accept inbound payloads up to `max_payload` bytes (capped at the
    /// 16-bit length limit).
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(MAX_PAYLOAD);
        self
    }

    /// Overrides the derived reassembler bound.
    pub fn with_max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = Some(max_buffer);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Reassembler bound; past it without a frame the stream is desynced.
    pub fn max_buffer(&self) -> usize {
        self.max_buffer
            .unwrap_or_else(|| frame_size(self.max_payload) + self.mtu)
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::new()
    }
}
