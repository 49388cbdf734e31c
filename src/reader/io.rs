//! Primitive readers and writers for the operand encodings used by AVM2 bytecode.
//!
//! Every reader takes the buffer and a cursor position and returns the decoded value together
//! with the number of bytes it consumed. Readers never allocate and never panic on malformed
//! input; short or invalid encodings are reported as [`crate::Error::TruncatedStream`] or
//! [`crate::Error::InvalidVarint`].
//!
//! # Encodings
//!
//! | Reader | Width | Encoding |
//! |--------|-------|----------|
//! | [`read_u8`] | 1 | unsigned byte |
//! | [`read_i8`] | 1 | two's complement byte |
//! | [`read_s24`] | 3 | little-endian, sign-extended to `i32` |
//! | [`read_u30`] | 1-5 | 7 payload bits per byte, high bit continues, value < 2^30 |
//!
//! The writers ([`write_u30`], [`write_s24`]) emit the minimal encodings and are used to
//! assemble bytecode for tests and benchmarks.
//!
//! # Examples
//!
//! ```rust
//! use abcscope::reader::{read_s24, read_u30};
//!
//! assert_eq!(read_u30(&[0x80, 0x01], 0)?, (128, 2));
//! assert_eq!(read_s24(&[0xFF, 0xFF, 0xFF], 0)?, (-1, 3));
//! # Ok::<(), abcscope::Error>(())
//! ```

use crate::{Error, Result};

/// Largest value representable by a `u30`.
pub const U30_MAX: u32 = (1 << 30) - 1;

/// Smallest value representable by an `s24`.
pub const S24_MIN: i32 = -(1 << 23);

/// Largest value representable by an `s24`.
pub const S24_MAX: i32 = (1 << 23) - 1;

/// Maximum number of bytes a `u30` encoding may occupy.
pub const U30_MAX_BYTES: usize = 5;

/// Returns `Ok(())` when `needed` bytes are available at `pos`.
fn ensure(data: &[u8], pos: usize, needed: usize) -> Result<()> {
    let available = data.len().saturating_sub(pos);
    if available < needed {
        return Err(Error::TruncatedStream {
            offset: pos,
            needed,
            available,
        });
    }
    Ok(())
}

/// Reads one unsigned byte.
///
/// # Errors
/// Returns [`crate::Error::TruncatedStream`] if `pos` is at or past the end of `data`.
pub fn read_u8(data: &[u8], pos: usize) -> Result<(u8, usize)> {
    ensure(data, pos, 1)?;
    Ok((data[pos], 1))
}

/// Reads one signed byte.
///
/// # Errors
/// Returns [`crate::Error::TruncatedStream`] if `pos` is at or past the end of `data`.
pub fn read_i8(data: &[u8], pos: usize) -> Result<(i8, usize)> {
    let (value, size) = read_u8(data, pos)?;
    Ok((i8::from_le_bytes([value]), size))
}

/// Reads a 3-byte little-endian signed integer and sign-extends it to `i32`.
///
/// # Errors
/// Returns [`crate::Error::TruncatedStream`] if fewer than 3 bytes remain.
///
/// # Examples
///
/// ```rust
/// use abcscope::reader::read_s24;
///
/// assert_eq!(read_s24(&[0x05, 0x00, 0x00], 0)?, (5, 3));
/// assert_eq!(read_s24(&[0x00, 0x00, 0x80], 0)?, (-8_388_608, 3));
/// # Ok::<(), abcscope::Error>(())
/// ```
pub fn read_s24(data: &[u8], pos: usize) -> Result<(i32, usize)> {
    ensure(data, pos, 3)?;

    // Place the three bytes in the upper part of an i32 and shift back arithmetically
    let raw = i32::from_le_bytes([0, data[pos], data[pos + 1], data[pos + 2]]);
    Ok((raw >> 8, 3))
}

/// Reads a variable-length unsigned 30-bit integer.
///
/// Each byte contributes its low 7 bits, least significant group first. A set high bit means
/// another byte follows. At most 5 bytes are allowed and the decoded value must not exceed
/// [`U30_MAX`].
///
/// # Errors
/// Returns [`crate::Error::InvalidVarint`] if the 5th byte still has its continuation bit set,
/// if the value exceeds 30 bits, or if the buffer ends before a terminating byte.
///
/// # Examples
///
/// ```rust
/// use abcscope::reader::read_u30;
///
/// assert_eq!(read_u30(&[0x7F], 0)?, (127, 1));
/// assert_eq!(read_u30(&[0xFF, 0xFF, 0xFF, 0xFF, 0x03], 0)?, ((1 << 30) - 1, 5));
/// assert!(read_u30(&[0x80, 0x80], 0).is_err());
/// # Ok::<(), abcscope::Error>(())
/// ```
pub fn read_u30(data: &[u8], pos: usize) -> Result<(u32, usize)> {
    let mut value: u64 = 0;

    for consumed in 0..U30_MAX_BYTES {
        let Some(&byte) = data.get(pos + consumed) else {
            return Err(Error::InvalidVarint { offset: pos });
        };

        value |= u64::from(byte & 0x7F) << (7 * consumed);

        if byte & 0x80 == 0 {
            return match u32::try_from(value) {
                Ok(value) if value <= U30_MAX => Ok((value, consumed + 1)),
                _ => Err(Error::InvalidVarint { offset: pos }),
            };
        }
    }

    Err(Error::InvalidVarint { offset: pos })
}

/// Returns the number of bytes the minimal `u30` encoding of `value` occupies.
#[must_use]
pub fn u30_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Appends the minimal `u30` encoding of `value` to `out`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `value` exceeds [`U30_MAX`].
pub fn write_u30(value: u32, out: &mut Vec<u8>) -> Result<()> {
    if value > U30_MAX {
        return Err(malformed_error!("Value {} does not fit in a u30", value));
    }

    let mut remaining = value;
    loop {
        let group = u8::try_from(remaining & 0x7F).unwrap_or(0);
        remaining >>= 7;
        if remaining == 0 {
            out.push(group);
            return Ok(());
        }
        out.push(group | 0x80);
    }
}

/// Appends the 3-byte little-endian encoding of `value` to `out`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `value` is outside of [`S24_MIN`]..=[`S24_MAX`].
pub fn write_s24(value: i32, out: &mut Vec<u8>) -> Result<()> {
    if !(S24_MIN..=S24_MAX).contains(&value) {
        return Err(malformed_error!("Value {} does not fit in an s24", value));
    }

    out.extend_from_slice(&value.to_le_bytes()[..3]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_u30(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_u30(value, &mut out).unwrap();
        out
    }

    fn encode_s24(value: i32) -> Vec<u8> {
        let mut out = Vec::new();
        write_s24(value, &mut out).unwrap();
        out
    }

    #[test]
    fn u30_single_byte() {
        assert_eq!(read_u30(&[0x00], 0).unwrap(), (0, 1));
        assert_eq!(read_u30(&[0x2A], 0).unwrap(), (42, 1));
        assert_eq!(read_u30(&[0x7F], 0).unwrap(), (127, 1));
    }

    #[test]
    fn u30_multi_byte() {
        assert_eq!(read_u30(&[0x80, 0x01], 0).unwrap(), (128, 2));
        assert_eq!(read_u30(&[0xE5, 0x8E, 0x26], 0).unwrap(), (624_485, 3));
        assert_eq!(
            read_u30(&[0xFF, 0xFF, 0xFF, 0xFF, 0x03], 0).unwrap(),
            (U30_MAX, 5)
        );
    }

    #[test]
    fn u30_reads_at_cursor() {
        let data = [0xAA, 0xBB, 0x80, 0x01, 0xCC];
        assert_eq!(read_u30(&data, 2).unwrap(), (128, 2));
    }

    #[test]
    fn u30_fifth_byte_continuation_rejected() {
        let err = read_u30(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01], 0).unwrap_err();
        assert_eq!(err, Error::InvalidVarint { offset: 0 });
    }

    #[test]
    fn u30_value_above_30_bits_rejected() {
        // 2^30 needs the third bit of the 5th group
        let err = read_u30(&[0x80, 0x80, 0x80, 0x80, 0x04], 0).unwrap_err();
        assert_eq!(err, Error::InvalidVarint { offset: 0 });
    }

    #[test]
    fn u30_unterminated_rejected() {
        assert_eq!(
            read_u30(&[0x01, 0x80, 0x80], 1).unwrap_err(),
            Error::InvalidVarint { offset: 1 }
        );
        assert_eq!(
            read_u30(&[], 0).unwrap_err(),
            Error::InvalidVarint { offset: 0 }
        );
    }

    #[test]
    fn u30_round_trip_minimal_length() {
        let mut samples = vec![0, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000];
        samples.extend([0x0FFF_FFFF, 0x1000_0000, U30_MAX - 1, U30_MAX]);
        // Walk the whole range with a coarse prime stride as well
        samples.extend((0..U30_MAX).step_by(7_368_787));

        for value in samples {
            let encoded = encode_u30(value);
            assert_eq!(encoded.len(), u30_size(value), "length of {value}");
            assert_eq!(read_u30(&encoded, 0).unwrap(), (value, encoded.len()));
        }
    }

    #[test]
    fn u30_write_rejects_large() {
        let mut out = Vec::new();
        assert!(write_u30(U30_MAX + 1, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn s24_values() {
        assert_eq!(read_s24(&[0x05, 0x00, 0x00], 0).unwrap(), (5, 3));
        assert_eq!(read_s24(&[0xFB, 0xFF, 0xFF], 0).unwrap(), (-5, 3));
        assert_eq!(read_s24(&[0xFF, 0xFF, 0x7F], 0).unwrap(), (S24_MAX, 3));
        assert_eq!(read_s24(&[0x00, 0x00, 0x80], 0).unwrap(), (S24_MIN, 3));
    }

    #[test]
    fn s24_round_trip() {
        let mut samples = vec![S24_MIN, S24_MIN + 1, -256, -1, 0, 1, 255, 256, S24_MAX];
        samples.extend((S24_MIN..=S24_MAX).step_by(65_537));

        for value in samples {
            let encoded = encode_s24(value);
            assert_eq!(encoded.len(), 3);
            assert_eq!(read_s24(&encoded, 0).unwrap(), (value, 3));
        }
    }

    #[test]
    fn s24_truncated() {
        assert_eq!(
            read_s24(&[0x16, 0x05, 0x00], 1).unwrap_err(),
            Error::TruncatedStream {
                offset: 1,
                needed: 3,
                available: 2
            }
        );
    }

    #[test]
    fn bytes() {
        assert_eq!(read_u8(&[0xFF], 0).unwrap(), (0xFF, 1));
        assert_eq!(read_i8(&[0xFF], 0).unwrap(), (-1, 1));
        assert_eq!(read_i8(&[0x7F], 0).unwrap(), (127, 1));
        assert!(matches!(
            read_u8(&[0x01], 1),
            Err(Error::TruncatedStream { needed: 1, .. })
        ));
    }

    #[test]
    fn s24_write_rejects_out_of_range() {
        let mut out = Vec::new();
        assert!(write_s24(S24_MAX + 1, &mut out).is_err());
        assert!(write_s24(S24_MIN - 1, &mut out).is_err());
    }
}
