//! # CRC-16 Implementation
//!
//! Table-driven CRC-16 used to protect LapRF frames. Bytes are reflected on
//! input and the remainder is reflected on output, which reproduces
//! CRC-16/ARC bit-for-bit.
//!
//! **Polynomial**: 0x8005 (x^16 + x^15 + x^2 + 1)
//! **Initial Value**: 0x0000

use crate::error::{LapRfError, Result};

/// CRC-16 polynomial (normal form)
const CRC16_POLY: u16 = 0x8005;

/// Captured device frame used to verify the engine at construction time
pub const SELF_TEST_VECTOR: [u8; 61] = [
    0x5a, 0x3d, 0x00, 0x00, 0x00, 0x0a, 0xda, 0x21, 0x02, 0x3c, 0x0d, 0x23, 0x01, 0x01, 0x24, 0x04,
    0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x22, 0x04, 0x00, 0x80, 0x62, 0x44, 0x01, 0x01, 0x02,
    0x22, 0x04, 0x00, 0x00, 0x62, 0x44, 0x01, 0x01, 0x03, 0x22, 0x04, 0x00, 0x80, 0x6a, 0x44, 0x01,
    0x01, 0x04, 0x22, 0x04, 0x00, 0x00, 0x62, 0x44, 0x03, 0x02, 0x00, 0x00, 0x5b,
];

/// Expected checksum of [`SELF_TEST_VECTOR`]
pub const SELF_TEST_CRC: u16 = 0x1B53;

/// Generate the CRC16 lookup table
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut remainder = (i as u16) << 8;
        let mut j = 0;

        while j < 8 {
            if (remainder & 0x8000) != 0 {
                remainder = (remainder << 1) ^ CRC16_POLY;
            } else {
                remainder <<= 1;
            }
            j += 1;
        }

        table[i] = remainder;
        i += 1;
    }

    table
}

/// Reverse the low `bits` bits of `value`
fn reflect(value: u16, bits: u32) -> u16 {
    value.reverse_bits() >> (16 - bits)
}

/// Self-tested CRC-16 engine
///
/// Construct it once with [`Crc16::new`] and share it (usually behind an
/// `Arc`) with the encoder and decoder.
#[derive(Debug, Clone)]
pub struct Crc16 {
    table: [u16; 256],
}

impl Crc16 {
    /// Build the lookup table and verify it against the captured vector
    ///
    /// # Errors
    ///
    /// Returns [`LapRfError::CrcSelfTest`] if the table does not reproduce
    /// the expected checksum. An engine that fails this check must not be
    /// used; every frame validation depends on it.
    pub fn new() -> Result<Self> {
        let engine = Self {
            table: generate_crc16_table(),
        };

        let computed = engine.compute(&SELF_TEST_VECTOR);
        if computed != SELF_TEST_CRC {
            return Err(LapRfError::CrcSelfTest {
                expected: SELF_TEST_CRC,
                computed,
            });
        }

        Ok(engine)
    }

    /// Calculate the CRC-16 of `data` using the lookup table
    ///
    /// # Examples
    ///
    /// ```
    /// use laprf::codec::crc::Crc16;
    ///
    /// let crc = Crc16::new().unwrap();
    /// assert_eq!(crc.compute(b"123456789"), 0xBB3D);
    /// ```
    pub fn compute(&self, data: &[u8]) -> u16 {
        let mut remainder: u16 = 0;

        for &byte in data {
            let index = (reflect(byte as u16, 8) ^ (remainder >> 8)) & 0xFF;
            remainder = self.table[index as usize] ^ (remainder << 8);
        }

        reflect(remainder, 16)
    }
}

/// Bitwise reflected CRC-16/ARC (slow, for verification)
#[cfg(test)]
fn crc16_arc_slow(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;

    for &byte in data {
        crc ^= byte as u16;

        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_self_test_vector() {
        let crc = Crc16::new().unwrap();
        assert_eq!(crc.compute(&SELF_TEST_VECTOR), 0x1B53);
    }

    #[test]
    fn test_crc16_empty() {
        let crc = Crc16::new().unwrap();
        assert_eq!(crc.compute(&[]), 0x0000);
    }

    #[test]
    fn test_crc16_arc_check_value() {
        // Standard CRC-16/ARC check value
        let crc = Crc16::new().unwrap();
        assert_eq!(crc.compute(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(0x01, 8), 0x80);
        assert_eq!(reflect(0x80, 8), 0x01);
        assert_eq!(reflect(0x0001, 16), 0x8000);
        assert_eq!(reflect(0xA5, 8), 0xA5);
    }

    #[test]
    fn test_table_matches_slow() {
        let crc = Crc16::new().unwrap();
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0xFF, 0xFE, 0xFD],
            vec![0x5A, 0x08, 0x00, 0x00, 0x00, 0x08, 0xDA, 0x5B],
            vec![0x00; 24],
            vec![0xFF; 10],
            SELF_TEST_VECTOR.to_vec(),
        ];

        for data in test_data.iter() {
            assert_eq!(
                crc.compute(data),
                crc16_arc_slow(data),
                "CRC mismatch for data: {:02X?}",
                data
            );
        }
    }

    #[test]
    fn test_crc16_changes_with_data() {
        let crc = Crc16::new().unwrap();
        assert_ne!(crc.compute(&[0x5A, 0x00]), crc.compute(&[0x5A, 0x01]));
    }
}
