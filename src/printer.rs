use async_trait::async_trait;
use image::GrayImage;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::command::Command;
use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, Result};
use crate::frame::{Frame, encode, hex};
use crate::raster::rows_from_image;
use crate::reassembler::{ReassemblerStats, StreamReassembler};
use crate::status::{PrinterStatus, StatusTracker};

/// Payload of the Status request.
pub const STATUS_REQUEST: u8 = 0x01;

/// Paper feed opcode. Not part of the command catalog; sent raw.
pub const FEED_PAPER: u8 = 0xA1;

/// Lines fed after a print job so the output clears the tear bar.
pub const FEED_LINES_AFTER_JOB: u16 = 0x30;

/// PrintStartStop payload that opens a print job.
pub const LATTICE_START: [u8; 11] = [
    0xAA, 0x55, 0x17, 0x38, 0x44, 0x5F, 0x5F, 0x5F, 0x44, 0x38, 0x2C,
];

/// PrintStartStop payload that closes a print job.
pub const LATTICE_END: [u8; 11] = [
    0xAA, 0x55, 0x17, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17,
];

/// Outbound half of a printer connection.
/// Implement this for your BLE or mock transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write raw bytes to the printer. Fire-and-forget: no reply is awaited.
    async fn write(&self, data: &[u8]) -> Result<()>;
}

/// What the transport pushes onto the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    /// One notification, exactly as delivered
    Notification(Vec<u8>),
    Disconnected,
}

/// What the session hands to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterEvent {
    /// A Status response arrived
    Status(PrinterStatus),
    /// Any other validated frame, known opcode or not
    Frame(Frame),
    /// Stream could not be resynchronized; buffer was reset
    Desync { buffered: usize },
    Disconnected,
}

/// Bounded inbound queue sized from the config.
pub fn channel(
    config: &ProtocolConfig,
) -> (mpsc::Sender<TransportEvent>, mpsc::Receiver<TransportEvent>) {
    mpsc::channel(config.channel_capacity())
}

/// Request side of the protocol.
///
/// - `transport`: implements Transport (BLE or mock)
/// - `mtu`: bytes per transport write (default: 180)
///
/// Frames carry no correlation id; a reply is matched to a request only by
/// its opcode, e.g. the next Status frame answers `request_status`.
pub struct Printer<T: Transport> {
    pub transport: T,
    mtu: usize,
}

impl<T: Transport> Printer<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &ProtocolConfig::default())
    }

    pub fn with_config(transport: T, config: &ProtocolConfig) -> Self {
        Self {
            transport,
            mtu: config.mtu().max(1),
        }
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Bytes per transport write; 0 is taken as 1.
    pub fn set_mtu(&mut self, mtu: usize) {
        self.mtu = mtu.max(1);
    }

    /// Frames and writes an arbitrary opcode, split into MTU-sized writes.
    pub async fn send_raw(&self, command: u8, payload: &[u8]) -> Result<()> {
        let bytes = encode(command, payload)?;
        trace!(command, "tx {}", hex(&bytes));
        for chunk in bytes.chunks(self.mtu) {
            self.transport.write(chunk).await?;
        }
        Ok(())
    }

    /// Frames and writes a catalog command after checking its payload shape.
    pub async fn send(&self, command: Command, payload: &[u8]) -> Result<()> {
        command.validate_payload(payload)?;
        self.send_raw(command.opcode(), payload).await
    }

    /// Ask for a status report; the answer arrives as `PrinterEvent::Status`.
    pub async fn request_status(&self) -> Result<()> {
        self.send(Command::Status, &[STATUS_REQUEST]).await
    }

    pub async fn set_heat(&self, level: u8) -> Result<()> {
        self.send(Command::SetHeat, &[level]).await
    }

    pub async fn set_energy(&self, energy: u16) -> Result<()> {
        self.send(Command::SetEnergy, &energy.to_le_bytes()).await
    }

    pub async fn paper_feed_speed(&self, speed: u8) -> Result<()> {
        self.send(Command::PaperFeedSpeed, &[speed]).await
    }

    pub async fn draft(&self, enabled: bool) -> Result<()> {
        self.send(Command::Draft, &[u8::from(enabled)]).await
    }

    pub async fn print_start_stop(&self, payload: &[u8]) -> Result<()> {
        self.send(Command::PrintStartStop, payload).await
    }

    pub async fn get_device_info(&self) -> Result<()> {
        self.send(Command::GetDeviceInfo, &[]).await
    }

    /// Send one packed 1bpp row.
    pub async fn print_row(&self, row: &[u8]) -> Result<()> {
        self.send(Command::PrintData, row).await
    }

    /// Advance the paper by `lines` dot lines.
    pub async fn feed_paper(&self, lines: u16) -> Result<()> {
        self.send_raw(FEED_PAPER, &lines.to_le_bytes()).await
    }

    /// Send a whole job: lattice start, every row, paper feed, lattice end.
    pub async fn print_rows(&self, rows: &[Vec<u8>]) -> Result<()> {
        self.print_start_stop(&LATTICE_START).await?;
        for row in rows {
            self.print_row(row).await?;
        }
        self.feed_paper(FEED_LINES_AFTER_JOB).await?;
        self.print_start_stop(&LATTICE_END).await
    }

    /// Scale, dither and print a grayscale image.
    pub async fn print_image(&self, img: &GrayImage) -> Result<()> {
        let rows = rows_from_image(img)?;
        debug!(rows = rows.len(), "printing image");
        self.print_rows(&rows).await
    }
}

/// Inbound half of a printer connection.
///
/// Owns the reassembler and the last-known status. Driven either one event
/// at a time through [`Session::handle`] or by [`Session::run`] as the
/// single consumer of the inbound queue.
pub struct Session {
    reassembler: StreamReassembler,
    status: StatusTracker,
}

impl Session {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            reassembler: StreamReassembler::with_config(config),
            status: StatusTracker::new(),
        }
    }

    /// Last status reported on this connection.
    pub fn status(&self) -> PrinterStatus {
        self.status.current()
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.reassembler.stats()
    }

    /// Applies one transport event.
    ///
    /// Returns the resulting printer events in arrival order
    pub fn handle(&mut self, event: TransportEvent) -> Vec<PrinterEvent> {
        match event {
            TransportEvent::Connected => {
                info!("printer connected");
                self.reassembler.reset();
                Vec::new()
            }
            TransportEvent::Disconnected => {
                info!("printer disconnected");
                self.reassembler.reset();
                vec![PrinterEvent::Disconnected]
            }
            TransportEvent::Notification(chunk) => {
                trace!("rx {}", hex(&chunk));
                match self.reassembler.feed(&chunk) {
                    Ok(frames) => frames.into_iter().filter_map(|f| self.dispatch(f)).collect(),
                    Err(ProtocolError::Desync { buffered }) => {
                        vec![PrinterEvent::Desync { buffered }]
                    }
                    Err(err) => {
                        warn!("unexpected reassembly error: {}", err);
                        Vec::new()
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Option<PrinterEvent> {
        match frame.command() {
            Ok(Command::Status) => {
                let previous = self.status.current();
                let Some(status) = self.status.update(&frame.payload) else {
                    debug!("status frame without payload ignored");
                    return None;
                };
                if status != previous {
                    info!("status: {} -> {}", previous, status);
                }
                Some(PrinterEvent::Status(status))
            }
            Ok(_) => Some(PrinterEvent::Frame(frame)),
            Err(err) => {
                debug!("{}", err);
                Some(PrinterEvent::Frame(frame))
            }
        }
    }

    /// Consumes the inbound queue until it closes, forwarding printer events.
    ///
    /// Returns the session so its final status and counters can be read.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<TransportEvent>,
        events: mpsc::Sender<PrinterEvent>,
    ) -> Result<Self> {
        while let Some(event) = inbound.recv().await {
            for out in self.handle(event) {
                events
                    .send(out)
                    .await
                    .map_err(|_| ProtocolError::Transport("event receiver dropped".into()))?;
            }
        }
        debug!("inbound queue closed");
        Ok(self)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&ProtocolConfig::default())
    }
}
