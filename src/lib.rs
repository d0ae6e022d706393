pub mod activity;
pub mod capture;
pub mod channel;
pub mod error;
pub mod exfil;
pub mod frame;
pub mod monitoring;
pub mod reconstruct;
pub mod sample;

pub use channel::{ChannelLabel, ChannelState};
pub use error::{Error, ErrorKind, Result};
pub use frame::{classify, Frame};
pub use reconstruct::{ChannelEvent, Reconstructor};
pub use sample::{Axes, Sample};

/// Size of a single data log item, set by the watchapp
pub const FRAME_SIZE: usize = 6;
/// Size of a channel tag in a recorded frame log
pub const TAG_SIZE: usize = 4;
/// One recorded frame: big-endian tag followed by the payload
pub const RECORD_SIZE: usize = TAG_SIZE + FRAME_SIZE;
/// Set in the first payload byte of every timestamp frame
pub const TAG_BIT: u8 = 0x80;

/// Decode a big-endian byte sequence into a signed integer.
///
/// The first byte carries the sign, every following byte is folded in unsigned.
/// An empty slice decodes to zero.
pub fn decode_be(bytes: &[u8]) -> i64 {
    match bytes.split_first() {
        Some((first, rest)) => rest
            .iter()
            .fold(*first as i8 as i64, |acc, byte| (acc << 8) | (*byte as i64 & 0xFF)),
        None => 0,
    }
}

/// Whether the tag bit is set on the most significant payload byte
pub fn has_tag(byte: u8) -> bool {
    byte & TAG_BIT != 0
}

/// Erase the tag bit, sign extending from the bit below it
pub fn strip_tag(byte: u8) -> u8 {
    ((byte << 1) as i8 >> 1) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pairs() {
        for (hi, lo) in [(0x00, 0x01), (0x7F, 0xFF), (0x80, 0x00), (0xFF, 0xFF), (0xFE, 0x0C)] {
            assert_eq!(
                decode_be(&[hi, lo]),
                i16::from_be_bytes([hi, lo]) as i64,
                "{hi:#04x} {lo:#04x}"
            );
        }
    }

    #[test]
    fn test_decode_wide() {
        let t = 1_449_000_123_456i64;
        let bytes = t.to_be_bytes();
        assert_eq!(decode_be(&bytes[2..]), t);
        assert_eq!(decode_be(&[0xFF, 0xFF, 0xFF, 0xFE]), -2);
        assert_eq!(decode_be(&[]), 0);
    }

    #[test]
    fn test_strip_tag() {
        assert!(has_tag(0x80));
        assert!(!has_tag(0x7F));
        assert_eq!(strip_tag(0x81), 0x01);
        // Bit 6 becomes the sign
        assert_eq!(strip_tag(0xC0), 0xC0);
        assert_eq!(strip_tag(0x40), 0xC0);
        assert_eq!(strip_tag(0x3F), 0x3F);
    }
}
