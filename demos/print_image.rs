use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Manager, Peripheral};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use catframe::ble::{ADVERTISED_SERVICE, BleTransport, advertises_printer};
use catframe::{Printer, PrinterEvent, PrinterStatus, ProtocolConfig, Session};

async fn find_printer(scan_for: Duration) -> Result<Peripheral, Box<dyn std::error::Error>> {
    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or("no Bluetooth adapter")?;
    adapter
        .start_scan(ScanFilter {
            services: vec![ADVERTISED_SERVICE],
        })
        .await?;
    tokio::time::sleep(scan_for).await;
    adapter.stop_scan().await?;

    for p in adapter.peripherals().await? {
        if let Some(props) = p.properties().await? {
            if advertises_printer(&props) {
                return Ok(p);
            }
        }
    }
    Err("no printer advertising 0xAF30 found".into())
}

/// Example: print an image file
/// - Finds the first printer advertising the cat printer service
/// - Waits for a Ready status, then prints with heat 53 / energy 16000
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args().nth(1).ok_or("usage: print_image <image>")?;
    let img = image::open(&path)?.to_luma8();

    let peripheral = find_printer(Duration::from_secs(5)).await?;
    peripheral.connect().await?;

    let config = ProtocolConfig::default();
    let (transport, inbound) = BleTransport::attach(peripheral, &config).await?;
    let printer = Printer::with_config(transport, &config);

    let (events_tx, mut events) = mpsc::channel(16);
    tokio::spawn(Session::new(&config).run(inbound, events_tx));

    printer.request_status().await?;
    loop {
        match tokio::time::timeout(Duration::from_secs(3), events.recv()).await {
            Ok(Some(PrinterEvent::Status(PrinterStatus::Ready))) => break,
            Ok(Some(PrinterEvent::Status(s))) => return Err(format!("printer not ready: {}", s).into()),
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => return Err("no status from printer".into()),
        }
    }

    printer.set_heat(53).await?;
    printer.set_energy(16000).await?;
    printer.draft(false).await?;
    printer.print_image(&img).await?;
    println!("Sent {}", path);

    printer.transport.peripheral().disconnect().await?;
    Ok(())
}
