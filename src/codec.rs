//! Variable-length codec for the binary event stream
//!
//! Everything after the leading event byte is packed in 7-bit groups stored in
//! bytes whose top bit is forced to 1. No encoded byte is ever zero, which keeps
//! `0x00` free to mark checkpoints: a reader can scan backwards from any position
//! and the first zero byte it meets is the start of a checkpoint.
//!
//! # Layout
//!
//! ```text
//! time gap 300 (0b10_0101100), 2 groups, low-order first:
//!   [1_0101100] [1_0000010]
//!
//! fixed 4-byte value, always 5 groups (35 bits, top 3 unused):
//!   [1_ggggggg] x 5
//!
//! checkpoint time, always 8 groups (56 bits)
//! ```

use crate::error::CodecError;

/// Maximum number of 7-bit groups a time gap may occupy.
///
/// The group count is stored in the 3 high bits of the event byte.
pub const MAX_TIME_GAP_BYTES: usize = 7;

/// Largest time gap representable in [`MAX_TIME_GAP_BYTES`] groups.
pub const MAX_TIME_GAP: u64 = (1 << (7 * MAX_TIME_GAP_BYTES)) - 1;

/// Number of groups used by a packed 4-byte value.
pub const PACKED_VALUE_BYTES: usize = 5;

/// Number of groups used by a checkpoint's absolute time.
pub const CHECKPOINT_TIME_BYTES: usize = 8;

/// Largest absolute time a checkpoint can restate.
pub const MAX_CHECKPOINT_TIME: u64 = (1 << (7 * CHECKPOINT_TIME_BYTES)) - 1;

const GROUP_MASK: u64 = 0b0111_1111;
const HIGH_BIT: u8 = 0b1000_0000;

/// Minimum number of 7-bit groups needed to store `gap` (0 for a zero gap)
///
/// # Errors
///
/// Returns [`CodecError::TimeGapTooLarge`] if the gap needs an 8th group.
pub fn time_gap_byte_count(gap: u64) -> Result<usize, CodecError> {
    let bits = 64 - gap.leading_zeros() as usize;
    let groups = bits.div_ceil(7);
    if groups > MAX_TIME_GAP_BYTES {
        return Err(CodecError::TimeGapTooLarge {
            gap,
            max_bytes: MAX_TIME_GAP_BYTES,
        });
    }
    Ok(groups)
}

/// Encode `gap` into the front of `out`, returning the number of bytes written
///
/// # Errors
///
/// - [`CodecError::TimeGapTooLarge`] if the gap needs more than 7 groups
/// - [`CodecError::BufferTooSmall`] if `out` cannot hold the groups
pub fn encode_time_gap(gap: u64, out: &mut [u8]) -> Result<usize, CodecError> {
    let count = time_gap_byte_count(gap)?;
    if out.len() < count {
        return Err(CodecError::BufferTooSmall {
            needed: count,
            available: out.len(),
        });
    }
    write_groups(gap, &mut out[..count]);
    Ok(count)
}

/// Decode a time gap from exactly the groups that encode it
pub fn decode_time_gap(bytes: &[u8]) -> u64 {
    read_groups(bytes)
}

/// Pack the bit pattern of a 4-byte value into 5 non-zero bytes
pub fn encode_7x5(bits: u32) -> [u8; PACKED_VALUE_BYTES] {
    let mut out = [0u8; PACKED_VALUE_BYTES];
    write_groups(u64::from(bits), &mut out);
    out
}

/// Inverse of [`encode_7x5`]
pub fn decode_7x5(bytes: &[u8; PACKED_VALUE_BYTES]) -> u32 {
    // 35 bits are stored, only the low 32 are meaningful
    (read_groups(bytes) & u64::from(u32::MAX)) as u32
}

/// Encode an absolute time as exactly 8 groups
///
/// # Errors
///
/// Returns [`CodecError::CheckpointTimeTooLarge`] if `time` needs more than 56 bits.
pub fn encode_checkpoint_time(time: u64) -> Result<[u8; CHECKPOINT_TIME_BYTES], CodecError> {
    if time > MAX_CHECKPOINT_TIME {
        return Err(CodecError::CheckpointTimeTooLarge { time });
    }
    let mut out = [0u8; CHECKPOINT_TIME_BYTES];
    write_groups(time, &mut out);
    Ok(out)
}

/// Inverse of [`encode_checkpoint_time`]
pub fn decode_checkpoint_time(bytes: &[u8; CHECKPOINT_TIME_BYTES]) -> u64 {
    read_groups(bytes)
}

/// Write `out.len()` groups of `value`, low-order first
pub(crate) fn write_groups(value: u64, out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = HIGH_BIT | ((value >> (7 * i)) & GROUP_MASK) as u8;
    }
}

fn read_groups(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | ((u64::from(b) & GROUP_MASK) << (7 * i)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_gap_needs_no_bytes() {
        assert_eq!(time_gap_byte_count(0).unwrap(), 0);
        let mut out = [0u8; 7];
        assert_eq!(encode_time_gap(0, &mut out).unwrap(), 0);
        assert_eq!(decode_time_gap(&[]), 0);
    }

    #[test]
    fn test_group_boundaries() {
        assert_eq!(time_gap_byte_count(1).unwrap(), 1);
        assert_eq!(time_gap_byte_count(127).unwrap(), 1);
        assert_eq!(time_gap_byte_count(128).unwrap(), 2);
        assert_eq!(time_gap_byte_count((1 << 14) - 1).unwrap(), 2);
        assert_eq!(time_gap_byte_count(1 << 14).unwrap(), 3);
        assert_eq!(time_gap_byte_count(MAX_TIME_GAP).unwrap(), 7);
    }

    #[test]
    fn test_gap_requiring_eighth_group_rejected() {
        let err = time_gap_byte_count(MAX_TIME_GAP + 1).unwrap_err();
        assert_eq!(
            err,
            CodecError::TimeGapTooLarge {
                gap: MAX_TIME_GAP + 1,
                max_bytes: 7
            }
        );
        let mut out = [0u8; 16];
        assert!(encode_time_gap(u64::MAX, &mut out).is_err());
    }

    #[test]
    fn test_encode_300() {
        let mut out = [0u8; 7];
        let n = encode_time_gap(300, &mut out).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&out[..2], &[0b1010_1100, 0b1000_0010]);
        assert_eq!(decode_time_gap(&out[..n]), 300);
    }

    #[test]
    fn test_encode_into_short_buffer() {
        let mut out = [0u8; 1];
        assert_eq!(
            encode_time_gap(300, &mut out).unwrap_err(),
            CodecError::BufferTooSmall {
                needed: 2,
                available: 1
            }
        );
    }

    #[test]
    fn test_encoded_bytes_never_zero() {
        for value in [0u32, 1, 0x8000_0000, u32::MAX, 0x0102_0304] {
            assert!(encode_7x5(value).iter().all(|&b| b & 0x80 != 0));
        }
        let cp = encode_checkpoint_time(0).unwrap();
        assert!(cp.iter().all(|&b| b == 0x80));
    }

    #[test]
    fn test_7x5_extremes() {
        for value in [0u32, 1, 127, 128, u32::MAX, 0xDEAD_BEEF] {
            assert_eq!(decode_7x5(&encode_7x5(value)), value);
        }
        assert_eq!(
            decode_7x5(&encode_7x5(f32::NAN.to_bits())),
            f32::NAN.to_bits()
        );
    }

    #[test]
    fn test_checkpoint_time_limits() {
        let bytes = encode_checkpoint_time(MAX_CHECKPOINT_TIME).unwrap();
        assert_eq!(decode_checkpoint_time(&bytes), MAX_CHECKPOINT_TIME);
        assert_eq!(
            encode_checkpoint_time(MAX_CHECKPOINT_TIME + 1).unwrap_err(),
            CodecError::CheckpointTimeTooLarge {
                time: MAX_CHECKPOINT_TIME + 1
            }
        );
    }
}
