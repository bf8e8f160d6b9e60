//! Primitive readers for the MQTT 5 wire format.
//!
//! All readers take a [`Bytes`] window and consume from the front, checking
//! the remaining length before every read. The framing layer guarantees the
//! window covers exactly one packet's variable header and payload.

use bytes::{Buf, Bytes};

/// Largest value encodable as a Variable Byte Integer (4 bytes of 7 bits).
pub const VARIABLE_BYTE_INTEGER_MAX: u32 = 268_435_455;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("packet ended before the value was complete")]
    InsufficientBytes,
    #[error("malformed variable byte integer")]
    MalformedVariableByteInteger,
    #[error("malformed UTF-8 string")]
    MalformedUtf8String,
}

pub fn read_u8(stream: &mut Bytes) -> Result<u8, ReadError> {
    if !stream.has_remaining() {
        return Err(ReadError::InsufficientBytes);
    }

    Ok(stream.get_u8())
}

pub fn read_u16(stream: &mut Bytes) -> Result<u16, ReadError> {
    if stream.remaining() < 2 {
        return Err(ReadError::InsufficientBytes);
    }

    Ok(stream.get_u16())
}

pub fn read_u32(stream: &mut Bytes) -> Result<u32, ReadError> {
    if stream.remaining() < 4 {
        return Err(ReadError::InsufficientBytes);
    }

    Ok(stream.get_u32())
}

/// Reads a length-prefixed run of bytes (MQTT Binary Data, 1.5.6).
pub fn read_binary(stream: &mut Bytes) -> Result<Bytes, ReadError> {
    let len = read_u16(stream)? as usize;
    if len > stream.remaining() {
        return Err(ReadError::InsufficientBytes);
    }

    Ok(stream.split_to(len))
}

/// Reads a length-prefixed UTF-8 string (MQTT 1.5.4).
///
/// Rejects U+0000 and the control ranges U+0001..U+001F and U+007F..U+009F.
/// Unpaired surrogates cannot occur in well-formed UTF-8, so [`str`]
/// validation already covers that clause of the spec.
pub fn read_string(stream: &mut Bytes) -> Result<String, ReadError> {
    let bytes = read_binary(stream)?;

    let s = std::str::from_utf8(&bytes).map_err(|_| ReadError::MalformedUtf8String)?;

    if s.chars().any(is_forbidden_code_point) {
        return Err(ReadError::MalformedUtf8String);
    }

    Ok(s.to_owned())
}

fn is_forbidden_code_point(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

/// Reads a Variable Byte Integer: 1-4 bytes, 7 value bits per byte
/// low-to-high, MSB set meaning another byte follows (MQTT 1.5.5).
pub fn read_variable_byte_integer(stream: &mut Bytes) -> Result<u32, ReadError> {
    let mut value = 0u32;

    for shift in 0..4 {
        let byte =
            read_u8(stream).map_err(|_| ReadError::MalformedVariableByteInteger)?;

        value |= u32::from(byte & 0x7F) << (7 * shift);

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    // A fifth byte would be required.
    Err(ReadError::MalformedVariableByteInteger)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{
        read_binary, read_string, read_u16, read_u32, read_variable_byte_integer, ReadError,
        VARIABLE_BYTE_INTEGER_MAX,
    };

    #[track_caller]
    fn vbi(bytes: &[u8]) -> Result<u32, ReadError> {
        read_variable_byte_integer(&mut Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn variable_byte_integer_boundaries() {
        // One value either side of each encoded-length boundary.
        assert_eq!(vbi(&[0x00]), Ok(0));
        assert_eq!(vbi(&[0x7F]), Ok(127));
        assert_eq!(vbi(&[0x80, 0x01]), Ok(128));
        assert_eq!(vbi(&[0xFF, 0x7F]), Ok(16_383));
        assert_eq!(vbi(&[0x80, 0x80, 0x01]), Ok(16_384));
        assert_eq!(vbi(&[0xFF, 0xFF, 0x7F]), Ok(2_097_151));
        assert_eq!(vbi(&[0x80, 0x80, 0x80, 0x01]), Ok(2_097_152));
        assert_eq!(
            vbi(&[0xFF, 0xFF, 0xFF, 0x7F]),
            Ok(VARIABLE_BYTE_INTEGER_MAX)
        );
    }

    #[test]
    fn variable_byte_integer_rejects_five_bytes() {
        assert_eq!(
            vbi(&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F]),
            Err(ReadError::MalformedVariableByteInteger)
        );
    }

    #[test]
    fn variable_byte_integer_rejects_truncation() {
        assert_eq!(vbi(&[]), Err(ReadError::MalformedVariableByteInteger));
        assert_eq!(vbi(&[0x80]), Err(ReadError::MalformedVariableByteInteger));
        assert_eq!(
            vbi(&[0x80, 0x80, 0x80]),
            Err(ReadError::MalformedVariableByteInteger)
        );
    }

    #[test]
    fn variable_byte_integer_only_consumes_its_bytes() {
        let mut stream = Bytes::copy_from_slice(&[0x80, 0x01, 0xAB]);
        assert_eq!(read_variable_byte_integer(&mut stream), Ok(128));
        assert_eq!(&stream[..], &[0xAB]);
    }

    #[test]
    fn integers_check_remaining_length() {
        assert_eq!(
            read_u16(&mut Bytes::copy_from_slice(&[0x01])),
            Err(ReadError::InsufficientBytes)
        );
        assert_eq!(
            read_u32(&mut Bytes::copy_from_slice(&[0x01, 0x02, 0x03])),
            Err(ReadError::InsufficientBytes)
        );
        assert_eq!(read_u32(&mut Bytes::copy_from_slice(&[0, 0, 0, 42])), Ok(42));
    }

    #[test]
    fn string_roundtrip() {
        let mut stream = Bytes::copy_from_slice(b"\x00\x04testrest");
        assert_eq!(read_string(&mut stream).as_deref(), Ok("test"));
        assert_eq!(&stream[..], b"rest");
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        // 0xC3 starts a two-byte sequence that never completes.
        let mut stream = Bytes::copy_from_slice(&[0x00, 0x02, 0xC3, 0x28]);
        assert_eq!(
            read_string(&mut stream),
            Err(ReadError::MalformedUtf8String)
        );
    }

    #[test]
    fn string_rejects_forbidden_code_points() {
        for bad in ["te\u{0000}st", "te\u{001F}st", "te\u{007F}st", "te\u{009F}st"] {
            let mut bytes = (bad.len() as u16).to_be_bytes().to_vec();
            bytes.extend_from_slice(bad.as_bytes());

            assert_eq!(
                read_string(&mut Bytes::from(bytes)),
                Err(ReadError::MalformedUtf8String),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn string_rejects_truncated_body() {
        let mut stream = Bytes::copy_from_slice(b"\x00\x05test");
        assert_eq!(
            read_string(&mut stream),
            Err(ReadError::InsufficientBytes)
        );
    }

    #[test]
    fn binary_allows_arbitrary_bytes() {
        let mut stream = Bytes::copy_from_slice(&[0x00, 0x03, 0xFF, 0x00, 0x80]);
        assert_eq!(
            read_binary(&mut stream).as_deref(),
            Ok(&[0xFF, 0x00, 0x80][..])
        );
    }
}
