use once_cell::sync::Lazy;

/// Generator polynomial of the printer's CRC-8 (x^8 + x^2 + x + 1).
pub const POLYNOMIAL: u8 = 0x07;

static CRC8_TABLE: Lazy<ChecksumTable> = Lazy::new(|| ChecksumTable::build(POLYNOMIAL));

/// 256-entry CRC-8 lookup table.
///
/// Built once per process and shared read-only; see [`ChecksumTable::shared`].
#[derive(Clone, PartialEq, Eq)]
pub struct ChecksumTable([u8; 256]);

impl ChecksumTable {
    /// Builds the table for `poly` by doubling: every entry `i + j` with
    /// `j < i` is the entry for the power of two `i` xor the entry for `j`.
    ///
    /// - `poly`: generator polynomial without the implicit x^8 term
    ///
    /// Returns the finished table
    pub fn build(poly: u8) -> Self {
        let mut table = [0u8; 256];
        let mut crc: u8 = 0x80;
        let mut i = 1usize;
        while i < 256 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ poly } else { crc << 1 };
            for j in 0..i {
                table[i + j] = crc ^ table[j];
            }
            i <<= 1;
        }
        Self(table)
    }

    /// The process-wide table for [`POLYNOMIAL`].
    pub fn shared() -> &'static ChecksumTable {
        &CRC8_TABLE
    }

    /// Folds `seed` through the table once per input byte.
    ///
    /// - `data`: bytes to checksum
    /// - `seed`: initial accumulator (0 for outbound frames)
    ///
    /// Returns the final accumulator; `seed` itself for empty input
    pub fn compute(&self, data: &[u8], seed: u8) -> u8 {
        data.iter().fold(seed, |acc, &b| self.0[(acc ^ b) as usize])
    }

    #[cfg(test)]
    fn entry(&self, index: u8) -> u8 {
        self.0[index as usize]
    }
}

impl std::fmt::Debug for ChecksumTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumTable")
            .field("poly", &format_args!("{:#04x}", self.0[1]))
            .finish()
    }
}

/// Computes CRC-8 for a byte slice (cat printer protocol), seed 0.
///
/// - `data`: input bytes
///
/// Returns CRC-8 value
pub fn crc8(data: &[u8]) -> u8 {
    ChecksumTable::shared().compute(data, 0)
}

/// Same as [`crc8`] but continuing from a previous checksum.
pub fn crc8_with_seed(data: &[u8], seed: u8) -> u8 {
    ChecksumTable::shared().compute(data, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bit-at-a-time reference, MSB first.
    fn crc8_bitwise(data: &[u8]) -> u8 {
        let mut crc: u8 = 0;
        for &b in data {
            crc ^= b;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ POLYNOMIAL } else { crc << 1 };
            }
        }
        crc
    }

    #[test]
    fn test_table_first_entries() {
        let table = ChecksumTable::shared();
        assert_eq!(table.entry(0), 0x00);
        assert_eq!(table.entry(1), 0x07);
        assert_eq!(table.entry(2), 0x0E);
        assert_eq!(table.entry(3), 0x09);
        assert_eq!(table.entry(0x80), 0x89);
    }

    #[test]
    fn test_table_matches_bitwise() {
        let table = ChecksumTable::shared();
        for i in 0..=255u8 {
            assert_eq!(table.entry(i), crc8_bitwise(&[i]), "entry {i:#04x}");
        }
    }

    #[test]
    fn test_check_value() {
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn test_known_printer_payloads() {
        assert_eq!(crc8(&[0x05]), 0x1B);
        assert_eq!(crc8(&[0x33]), 0x99);
        assert_eq!(crc8(&[0x80, 0x3E]), 0x0C);
        assert_eq!(crc8(&[0xE0, 0x2E]), 0x89);
        assert_eq!(crc8(&[0x2D]), 0xC3);
        assert_eq!(crc8(&[0x50]), 0xB7);
        assert_eq!(crc8(&[0x01]), 0x07);
        assert_eq!(crc8(&[0x00]), 0x00);
    }

    #[test]
    fn test_empty_returns_seed() {
        assert_eq!(crc8(&[]), 0);
        assert_eq!(crc8_with_seed(&[], 0x5A), 0x5A);
    }

    #[test]
    fn test_seed_chains() {
        let data = [0xAA, 0x55, 0x17, 0x38, 0x44, 0x5F];
        let first = crc8(&data[..2]);
        assert_eq!(crc8_with_seed(&data[2..], first), crc8(&data));
    }

    #[test]
    fn test_rebuild_is_identical() {
        assert_eq!(&ChecksumTable::build(POLYNOMIAL), ChecksumTable::shared());
    }
}
