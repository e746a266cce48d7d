//! Worked examples from the printer's documented traffic.

use catframe::{Command, PrinterStatus, crc8, decode, encode};
use pretty_assertions::assert_eq;

#[test]
fn heat_level_five() {
    assert_eq!(crc8(&[0x05]), 0x1B);
    assert_eq!(
        encode(Command::SetHeat.opcode(), &[0x05]).unwrap(),
        vec![0x51, 0x78, 0xA4, 0x00, 0x01, 0x00, 0x05, 0x1B, 0xFF]
    );
}

#[test]
fn captured_print_row_decodes() {
    let mut raw = vec![0x51u8, 0x78, 0xA2, 0x00, 0x30, 0x00];
    raw.extend([0xB6u8, 0x6D, 0xDB].repeat(16));
    raw.extend([0x74, 0xFF]);

    let (frame, used) = decode(&raw).unwrap();
    assert_eq!(used, raw.len());
    assert_eq!(frame.command(), Ok(Command::PrintData));
    assert_eq!(frame.payload.len(), 48);
    assert_eq!(frame.checksum, 0x74);
}

#[test]
fn status_examples() {
    assert_eq!(PrinterStatus::decode(0x81), PrinterStatus::Busy);
    assert_eq!(PrinterStatus::decode(0x00), PrinterStatus::Ready);
    assert_eq!(PrinterStatus::decode(0x10), PrinterStatus::Unknown);
}

#[test]
fn empty_checksum_is_seed() {
    assert_eq!(crc8(b""), 0);
}
