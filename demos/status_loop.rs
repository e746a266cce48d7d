use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Manager, Peripheral};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use catframe::ble::{ADVERTISED_SERVICE, BleTransport, advertises_printer};
use catframe::{Printer, PrinterEvent, ProtocolConfig, Session};

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
                println!("Found printer {:?} ({})", props.local_name, props.address);
                return Ok(p);
            }
        }
    }
    Err("no printer advertising 0xAF30 found".into())
}

/// Example: query printer status 10 times, 1s apart
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let peripheral = find_printer(Duration::from_secs(5)).await?;
    peripheral.connect().await?;

    let config = ProtocolConfig::default();
    let (transport, inbound) = BleTransport::attach(peripheral, &config).await?;
    let printer = Printer::with_config(transport, &config);

    let (events_tx, mut events) = mpsc::channel(16);
    tokio::spawn(Session::new(&config).run(inbound, events_tx));

    for i in 0..10 {
        printer.request_status().await?;
        match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
            Ok(Some(PrinterEvent::Status(s))) => println!("Query {}: {}", i + 1, s),
            Ok(Some(other)) => println!("Query {}: {:?}", i + 1, other),
            Ok(None) => break,
            Err(_) => println!("Query {}: no answer", i + 1),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    printer.transport.peripheral().disconnect().await?;
    Ok(())
}
