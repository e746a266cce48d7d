//! BLE transport over an already-connected `btleplug` peripheral.
//!
//! Scanning and connecting stay with the caller. This adapter only finds
//! the printer's write and notify characteristics, subscribes, and pumps
//! every notification onto the inbound event queue.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, PeripheralProperties, WriteType};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, Result};
use crate::printer::{Transport, TransportEvent, channel};

/// Service UUID the printer advertises.
pub const ADVERTISED_SERVICE: Uuid = Uuid::from_u128(0x0000af30_0000_1000_8000_00805f9b34fb);
pub const PRINTER_SERVICE: Uuid = Uuid::from_u128(0x0000ae30_0000_1000_8000_00805f9b34fb);
pub const WRITE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000ae01_0000_1000_8000_00805f9b34fb);
pub const NOTIFY_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000ae02_0000_1000_8000_00805f9b34fb);

/// True if an advertisement lists the printer service.
pub fn advertises_printer(properties: &PeripheralProperties) -> bool {
    properties.services.contains(&ADVERTISED_SERVICE)
}

pub struct BleTransport {
    peripheral: Peripheral,
    write_char: Characteristic,
}

impl BleTransport {
    /// Subscribes to the notify characteristic of a connected printer.
    ///
    /// - `peripheral`: connected peripheral
    /// - `config`: sizes the inbound queue
    ///
    /// Returns the transport and the inbound queue; the queue yields
    /// `Connected` first and `Disconnected` when notifications stop.
    pub async fn attach(
        peripheral: Peripheral,
        config: &ProtocolConfig,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        if !peripheral.is_connected().await? {
            return Err(ProtocolError::Transport("peripheral not connected".into()));
        }
        peripheral.discover_services().await?;

        let chars = peripheral.characteristics();
        let find = |uuid: Uuid| {
            chars
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| ProtocolError::Transport(format!("characteristic {} not found", uuid)))
        };
        let write_char = find(WRITE_CHARACTERISTIC)?;
        let notify_char = find(NOTIFY_CHARACTERISTIC)?;

        peripheral.subscribe(&notify_char).await?;
        let mut notifications = peripheral.notifications().await?;

        let (tx, rx) = channel(config);
        tx.send(TransportEvent::Connected)
            .await
            .map_err(|_| ProtocolError::Transport("inbound queue closed".into()))?;
        info!("subscribed to printer notifications");

        tokio::spawn(async move {
            while let Some(n) = notifications.next().await {
                if n.uuid != NOTIFY_CHARACTERISTIC {
                    continue;
                }
                if tx.send(TransportEvent::Notification(n.value)).await.is_err() {
                    debug!("inbound queue dropped, stopping notification pump");
                    return;
                }
            }
            let _ = tx.send(TransportEvent::Disconnected).await;
        });

        Ok((
            Self {
                peripheral,
                write_char,
            },
            rx,
        ))
    }

    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.write_char, data, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }
}
