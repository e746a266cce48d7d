//! Stream reassembler for chunked notifications.
//!
//! The transport hands over bytes in pieces of its own choosing: a frame
//! may span several notifications and one notification may hold several
//! frames. [`StreamReassembler::feed`] buffers whatever is not yet a whole
//! frame and returns every validated frame in arrival order.
//!
//! Resynchronization works on candidates. Every occurrence of the magic is
//! a candidate frame start; a candidate whose footer does not check out is
//! skipped by a single byte, so a real frame hiding inside its declared
//! payload is still found. A candidate declaring a payload longer than the
//! configured maximum is rejected as soon as its header is seen, so one
//! corrupted length byte cannot hold later frames hostage. Bytes that cannot
//! start a frame are dropped.
//!
//! # Example
//!
//! ```
//! use catframe::{encode, StreamReassembler};
//!
//! let mut rx = StreamReassembler::new();
//! let bytes = encode(0xA3, &[0x00]).unwrap();
//!
//! assert!(rx.feed(&bytes[..4]).unwrap().is_empty());
//! let frames = rx.feed(&bytes[4..]).unwrap();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].command, 0xA3);
//! ```

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, Result};
use crate::frame::{Decoded, FOOTER_SIZE, Frame, HEADER_SIZE, MAGIC_BYTES, hex, try_decode};

/// Counters since the reassembler was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    pub frames: u64,
    pub checksum_mismatches: u64,
    /// Candidates rejected for declaring an over-long payload
    pub oversized: u64,
    pub discarded_bytes: u64,
    pub desyncs: u64,
}

enum Step {
    /// Need more bytes
    Wait,
    /// Buffer holds a whole valid frame of this many bytes at offset 0
    Emit(usize),
    /// Candidate at offset 0 is not a frame
    Reject(ProtocolError),
}

/// Turns chunk deliveries into validated frames.
///
/// Must be driven by a single consumer; see [`crate::printer::Session`].
pub struct StreamReassembler {
    buffer: BytesMut,
    max_payload: usize,
    max_buffer: usize,
    stats: ReassemblerStats,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::with_config(&ProtocolConfig::default())
    }

    pub fn with_config(config: &ProtocolConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(config.mtu() * 2),
            max_payload: config.max_payload(),
            max_buffer: config.max_buffer(),
            stats: ReassemblerStats::default(),
        }
    }

    /// Appends a chunk and extracts every frame now complete.
    ///
    /// - `chunk`: bytes exactly as the transport delivered them
    ///
    /// Returns the frames in arrival order (possibly none). Fails with
    /// `Desync` when the buffer outgrew its bound without yielding a frame;
    /// the buffer is empty afterwards.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        // Offset before which no candidate start remains.
        let mut cursor = 0;

        loop {
            let Some(pos) = find_magic(&self.buffer[cursor..]) else {
                self.drop_garbage();
                break;
            };
            self.discard(cursor + pos);
            cursor = 0;

            let step = match try_decode(&self.buffer) {
                None => Step::Wait,
                Some(Decoded::Partial(header)) | Some(Decoded::Complete { header, .. })
                    if header.length as usize > self.max_payload =>
                {
                    Step::Reject(ProtocolError::PayloadTooLong(header.length as usize))
                }
                Some(Decoded::Partial(_)) => Step::Wait,
                Some(Decoded::Complete {
                    header,
                    payload,
                    footer,
                }) => match footer.validate(payload) {
                    Ok(()) => Step::Emit(header.frame_size()),
                    Err(err) => Step::Reject(err),
                },
            };

            match step {
                Step::Wait => break,
                Step::Emit(size) => {
                    let frame = self.take_frame(size);
                    trace!(command = frame.command, len = frame.payload.len(), "frame");
                    frames.push(frame);
                }
                Step::Reject(err) => {
                    match err {
                        ProtocolError::ChecksumMismatch { .. } => {
                            self.stats.checksum_mismatches += 1
                        }
                        ProtocolError::PayloadTooLong(_) => self.stats.oversized += 1,
                        _ => {}
                    }
                    debug!("dropping candidate frame: {}", err);
                    cursor = 1;
                }
            }
        }

        if frames.is_empty() && self.buffer.len() > self.max_buffer {
            let buffered = self.buffer.len();
            warn!(buffered, max = self.max_buffer, "no frame boundary found, resetting stream");
            self.stats.discarded_bytes += buffered as u64;
            self.stats.desyncs += 1;
            self.buffer.clear();
            return Err(ProtocolError::Desync { buffered });
        }

        Ok(frames)
    }

    /// Forgets any partial frame. Call on (re)connection.
    pub fn reset(&mut self) {
        if !self.buffer.is_empty() {
            debug!(len = self.buffer.len(), "reset with buffered bytes");
        }
        self.buffer.clear();
    }

    /// Bytes currently held waiting for more data.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    fn take_frame(&mut self, size: usize) -> Frame {
        let raw = self.buffer.split_to(size).freeze();
        self.stats.frames += 1;
        Frame {
            command: raw[2],
            direction: raw[3],
            checksum: raw[size - FOOTER_SIZE],
            payload: raw.slice(HEADER_SIZE..size - FOOTER_SIZE),
        }
    }

    /// No magic anywhere: keep only a trailing first magic byte, which may
    /// pair with the next chunk.
    fn drop_garbage(&mut self) {
        let keep = usize::from(self.buffer.last() == Some(&MAGIC_BYTES[0]));
        let drop = self.buffer.len() - keep;
        if drop > 0 {
            trace!("discarding {} bytes: {}", drop, hex(&self.buffer[..drop]));
            self.discard(drop);
        }
    }

    fn discard(&mut self, n: usize) {
        if n > 0 {
            self.buffer.advance(n);
            self.stats.discarded_bytes += n as u64;
        }
    }
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn find_magic(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| *w == MAGIC_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;
    use pretty_assertions::assert_eq;

    fn frame(command: u8, payload: &[u8]) -> Frame {
        Frame::new(command, payload.to_vec())
    }

    #[test]
    fn test_single_frame_one_chunk() {
        let mut rx = StreamReassembler::new();
        let frames = rx.feed(&encode(0xA3, &[0x00]).unwrap()).unwrap();
        assert_eq!(frames, vec![frame(0xA3, &[0x00])]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut rx = StreamReassembler::new();
        let bytes = encode(0xA4, &[0x05]).unwrap();

        let mut all = Vec::new();
        for b in &bytes {
            all.extend(rx.feed(&[*b]).unwrap());
        }

        assert_eq!(all, vec![frame(0xA4, &[0x05])]);
        assert_eq!(rx.stats().frames, 1);
    }

    #[test]
    fn test_split_inside_magic() {
        let mut rx = StreamReassembler::new();
        let bytes = encode(0xA3, &[0x80]).unwrap();

        assert!(rx.feed(&[0x10, 0x20, bytes[0]]).unwrap().is_empty());
        assert_eq!(rx.len(), 1);
        let frames = rx.feed(&bytes[1..]).unwrap();
        assert_eq!(frames, vec![frame(0xA3, &[0x80])]);
    }

    #[test]
    fn test_two_frames_one_chunk() {
        let mut rx = StreamReassembler::new();
        let mut data = encode(0xA3, &[0x00]).unwrap();
        data.extend(encode(0xA8, b"MX06").unwrap());

        let frames = rx.feed(&data).unwrap();
        assert_eq!(frames, vec![frame(0xA3, &[0x00]), frame(0xA8, b"MX06")]);
    }

    #[test]
    fn test_frame_plus_partial() {
        let mut rx = StreamReassembler::new();
        let first = encode(0xA3, &[0x00]).unwrap();
        let second = encode(0xA3, &[0x01]).unwrap();

        let mut data = first.clone();
        data.extend_from_slice(&second[..7]);
        assert_eq!(rx.feed(&data).unwrap(), vec![frame(0xA3, &[0x00])]);
        assert_eq!(rx.len(), 7);

        assert_eq!(rx.feed(&second[7..]).unwrap(), vec![frame(0xA3, &[0x01])]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_garbage_without_magic_is_dropped() {
        let mut rx = StreamReassembler::new();
        assert!(rx.feed(&[0x00, 0x13, 0x78, 0xFF, 0x42]).unwrap().is_empty());
        assert!(rx.is_empty());
        assert_eq!(rx.stats().discarded_bytes, 5);
    }

    #[test]
    fn test_leading_garbage_then_frame() {
        let mut rx = StreamReassembler::new();
        let mut data = vec![0xDE, 0xAD, 0x51, 0xBE, 0xEF, 0x78];
        data.extend(encode(0xAF, &[0x80, 0x3E]).unwrap());

        assert_eq!(rx.feed(&data).unwrap(), vec![frame(0xAF, &[0x80, 0x3E])]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_bad_checksum_skipped_next_frame_kept() {
        let mut rx = StreamReassembler::new();
        let mut bad = encode(0xA3, &[0x02]).unwrap();
        bad[7] ^= 0xFF;
        let good = encode(0xA3, &[0x04]).unwrap();

        let mut data = bad;
        data.extend_from_slice(&good);
        assert_eq!(rx.feed(&data).unwrap(), vec![frame(0xA3, &[0x04])]);
        assert_eq!(rx.stats().checksum_mismatches, 1);
    }

    #[test]
    fn test_bad_end_marker_skipped() {
        let mut rx = StreamReassembler::new();
        let mut bad = encode(0xBE, &[0x01]).unwrap();
        bad[8] = 0x00;
        let good = encode(0xBE, &[0x00]).unwrap();

        let mut data = bad;
        data.extend_from_slice(&good);
        assert_eq!(rx.feed(&data).unwrap(), vec![frame(0xBE, &[0x00])]);
        assert_eq!(rx.stats().checksum_mismatches, 0);
    }

    #[test]
    fn test_frame_inside_false_candidate_payload() {
        // Fake header declares 9 payload bytes, which swallow a real frame.
        let mut rx = StreamReassembler::new();
        let real = encode(0xA3, &[0x08]).unwrap();
        let mut data = vec![0x51, 0x78, 0xA2, 0x00, 0x09, 0x00];
        data.extend_from_slice(&real);
        data.extend_from_slice(&[0x00, 0x00]);

        assert_eq!(rx.feed(&data).unwrap(), vec![frame(0xA3, &[0x08])]);
    }

    #[test]
    fn test_false_candidate_waits_then_releases() {
        // Declared length runs past the real frame; once enough bytes
        // arrive the fake is rejected and the real frame surfaces.
        let mut rx = StreamReassembler::new();
        let real = encode(0xA3, &[0x00]).unwrap();
        let mut data = vec![0x51, 0x78, 0xA2, 0x00, 0x20, 0x00];
        data.extend_from_slice(&real);

        assert!(rx.feed(&data).unwrap().is_empty());
        let frames = rx.feed(&[0u8; 32]).unwrap();
        assert_eq!(frames, vec![frame(0xA3, &[0x00])]);
    }

    #[test]
    fn test_desync_resets() {
        let config = ProtocolConfig::new().with_max_buffer(32);
        let mut rx = StreamReassembler::with_config(&config);

        // Claims 0x100 bytes of payload; never completes within the bound.
        assert!(rx.feed(&[0x51, 0x78, 0xA2, 0x00, 0x00, 0x01]).unwrap().is_empty());
        let err = rx.feed(&[0u8; 40]).unwrap_err();
        assert_eq!(err, ProtocolError::Desync { buffered: 46 });
        assert!(rx.is_empty());
        assert_eq!(rx.stats().desyncs, 1);

        let frames = rx.feed(&encode(0xA3, &[0x00]).unwrap()).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_frames_before_overflow_are_returned() {
        let config = ProtocolConfig::new().with_max_buffer(16);
        let mut rx = StreamReassembler::with_config(&config);

        let mut data = encode(0xA3, &[0x00]).unwrap();
        data.extend_from_slice(&[0x51, 0x78, 0xA2, 0x00, 0x00, 0x01]);
        data.extend_from_slice(&[0u8; 20]);

        assert_eq!(rx.feed(&data).unwrap().len(), 1);
        assert!(matches!(rx.feed(&[0]), Err(ProtocolError::Desync { .. })));
    }

    #[test]
    fn test_corrupted_length_does_not_stall_later_frames() {
        let mut rx = StreamReassembler::new();
        let mut bad = encode(0xA3, &[0x00]).unwrap();
        bad[5] = 0xFF;
        assert!(rx.feed(&bad).unwrap().is_empty());

        let good = encode(0xA3, &[0x00]).unwrap();
        let mut emitted = 0;
        for _ in 0..2000 {
            emitted += rx.feed(&good).unwrap().len();
        }
        assert_eq!(emitted, 2000);
        assert_eq!(rx.stats().oversized, 1);
        assert_eq!(rx.stats().desyncs, 0);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_oversized_length_rejected_from_header_alone() {
        let config = ProtocolConfig::new().with_max_payload(48);
        let mut rx = StreamReassembler::with_config(&config);

        let mut data = vec![0x51, 0x78, 0xA2, 0x00, 0x31, 0x00];
        data.extend(encode(0xA2, &[0u8; 48]).unwrap());
        let frames = rx.feed(&data).unwrap();
        assert_eq!(frames, vec![frame(0xA2, &[0u8; 48])]);
        assert_eq!(rx.stats().oversized, 1);
    }

    #[test]
    fn test_full_length_frames_with_raised_limit() {
        let config = ProtocolConfig::new().with_max_payload(crate::frame::MAX_PAYLOAD);
        let mut rx = StreamReassembler::with_config(&config);
        let payload = vec![0x11u8; 4096];
        assert_eq!(rx.feed(&encode(0xA2, &payload).unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_reset_drops_partial() {
        let mut rx = StreamReassembler::new();
        let bytes = encode(0xA3, &[0x00]).unwrap();
        rx.feed(&bytes[..5]).unwrap();
        assert_eq!(rx.len(), 5);

        rx.reset();
        assert!(rx.is_empty());

        // Tail of the old frame is garbage now.
        assert!(rx.feed(&bytes[5..]).unwrap().is_empty());
        assert_eq!(rx.feed(&bytes).unwrap().len(), 1);
    }

    #[test]
    fn test_payload_shares_buffer() {
        let mut rx = StreamReassembler::new();
        let payload = [0xB6u8, 0x6D, 0xDB].repeat(16);
        let frames = rx.feed(&encode(0xA2, &payload).unwrap()).unwrap();
        assert_eq!(&frames[0].payload[..], &payload[..]);
        assert_eq!(frames[0].checksum, crate::checksum::crc8(&payload));
    }
}
