//! Byte-level codec primitives for the Protobuf wire format.
//!
//! Everything in this module operates on plain integers, slices, and the
//! `bytes` buffer traits; buffering, limits, and recursion accounting live in
//! [`crate::stream`].

use bytes::{Buf, BufMut};

use crate::error::{DecodeError, DecodeErrorKind};

pub mod varint;
pub use varint::{decode_varint, encode_varint, encoded_len_varint};

pub mod wire_type;
pub use wire_type::{check_wire_type, WireType};

/// The smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// The largest valid field number, `2^29 - 1`.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// First field number of the range reserved for the wire format itself.
pub const FIRST_RESERVED_FIELD_NUMBER: u32 = 19000;
/// Last field number of the range reserved for the wire format itself.
pub const LAST_RESERVED_FIELD_NUMBER: u32 = 19999;

/// Returns whether `number` may appear on the wire.
#[inline]
pub fn is_valid_field_number(number: u32) -> bool {
    (MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&number)
        && !(FIRST_RESERVED_FIELD_NUMBER..=LAST_RESERVED_FIELD_NUMBER).contains(&number)
}

/// Packs a field number and wire type into a tag.
#[inline]
pub fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    debug_assert!(is_valid_field_number(field_number));
    (field_number << 3) | wire_type as u32
}

/// Splits a tag into its field number and wire type.
///
/// Fails on field number zero, numbers in the reserved range, and wire type
/// values 6 and 7.
#[inline]
pub fn split_tag(tag: u32) -> Result<(u32, WireType), DecodeError> {
    let wire_type = WireType::try_from(tag & 0x07)?;
    let field_number = tag >> 3;
    if !is_valid_field_number(field_number) {
        return Err(DecodeErrorKind::InvalidTag { field_number }.into());
    }
    Ok((field_number, wire_type))
}

/// Encodes a Protobuf field key, which consists of a wire type designator and
/// the field number.
#[inline]
pub fn encode_key(field_number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    encode_varint(u64::from(make_tag(field_number, wire_type)), buf);
}

/// Decodes a Protobuf field key, which consists of a wire type designator and
/// the field number.
#[inline]
pub fn decode_key(buf: &mut impl Buf) -> Result<(u32, WireType), DecodeError> {
    let key = decode_varint(buf)?;
    if key > u64::from(u32::MAX) {
        return Err(DecodeErrorKind::InvalidTag {
            field_number: (key >> 3) as u32,
        }
        .into());
    }
    split_tag(key as u32)
}

/// Returns the width of an encoded Protobuf field key with the given field
/// number. The returned width will be between 1 and 5 bytes (inclusive).
#[inline]
pub fn key_len(field_number: u32) -> usize {
    encoded_len_varint(u64::from(field_number << 3))
}

/// ZigZag-encodes a signed 32-bit integer so that small magnitudes map to
/// small unsigned values.
#[inline]
pub fn encode_zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`encode_zigzag32`].
#[inline]
pub fn decode_zigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ (-((value & 1) as i32))
}

/// ZigZag-encodes a signed 64-bit integer.
#[inline]
pub fn encode_zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`encode_zigzag64`].
#[inline]
pub fn decode_zigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}

/// Encodes a bare length delimiter.
///
/// Protobuf message fields are prefixed with a varint length delimiter; this
/// helper writes one without any following payload.
pub fn encode_length_delimiter(length: usize, buf: &mut impl BufMut) {
    encode_varint(length as u64, buf);
}

/// Returns the encoded width of a length delimiter for `length` bytes.
pub fn length_delimiter_len(length: usize) -> usize {
    encoded_len_varint(length as u64)
}

/// Decodes a bare length delimiter.
///
/// Delimiters above `i32::MAX` are rejected: the wire format inherits the
/// 32-bit reader interpretation under which they are negative.
pub fn decode_length_delimiter(buf: &mut impl Buf) -> Result<usize, DecodeError> {
    let length = decode_varint(buf)?;
    if length > i32::MAX as u64 {
        return Err(DecodeErrorKind::NegativeLength.into());
    }
    Ok(length as usize)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn tag_layout() {
        assert_eq!(make_tag(1, WireType::Varint), 0x08);
        assert_eq!(make_tag(2, WireType::LengthDelimited), 0x12);
        assert_eq!(make_tag(4, WireType::LengthDelimited), 0x22);
        assert_eq!(make_tag(1, WireType::StartGroup), 0x0B);
        assert_eq!(make_tag(1, WireType::EndGroup), 0x0C);

        assert_eq!(split_tag(0x08).unwrap(), (1, WireType::Varint));
        assert_eq!(split_tag(0x12).unwrap(), (2, WireType::LengthDelimited));
    }

    #[test]
    fn zero_and_reserved_field_numbers_rejected() {
        assert_eq!(
            split_tag(0x00).unwrap_err().kind(),
            &DecodeErrorKind::InvalidTag { field_number: 0 }
        );
        let reserved = 19000 << 3;
        assert_eq!(
            split_tag(reserved).unwrap_err().kind(),
            &DecodeErrorKind::InvalidTag {
                field_number: 19000
            }
        );
        assert!(split_tag(19999 << 3).is_err());
        assert!(split_tag(20000 << 3).is_ok());
        assert!(split_tag(18999 << 3).is_ok());
    }

    #[test]
    fn invalid_wire_type_value_rejected() {
        assert_eq!(
            split_tag((1 << 3) | 6).unwrap_err().kind(),
            &DecodeErrorKind::InvalidWireTypeValue { value: 6 }
        );
        assert!(split_tag((1 << 3) | 7).is_err());
    }

    #[test]
    fn key_widths() {
        assert_eq!(key_len(1), 1);
        assert_eq!(key_len(15), 1);
        assert_eq!(key_len(16), 2);
        assert_eq!(key_len(2047), 2);
        assert_eq!(key_len(2048), 3);
        assert_eq!(key_len(262143), 3);
        assert_eq!(key_len(262144), 4);
        assert_eq!(key_len(MAX_FIELD_NUMBER), 5);
    }

    #[test]
    fn zigzag_known_values() {
        assert_eq!(encode_zigzag32(0), 0);
        assert_eq!(encode_zigzag32(-1), 1);
        assert_eq!(encode_zigzag32(1), 2);
        assert_eq!(encode_zigzag32(-2), 3);
        assert_eq!(encode_zigzag32(i32::MAX), u32::MAX - 1);
        assert_eq!(encode_zigzag32(i32::MIN), u32::MAX);
        assert_eq!(encode_zigzag64(-1), 1);
        assert_eq!(encode_zigzag64(i64::MIN), u64::MAX);
    }

    #[test]
    fn length_delimiter_round_trip() {
        let mut buf = Vec::new();
        encode_length_delimiter(300, &mut buf);
        assert_eq!(buf, [0xAC, 0x02]);
        assert_eq!(length_delimiter_len(300), 2);
        assert_eq!(decode_length_delimiter(&mut &buf[..]).unwrap(), 300);

        let mut negative = Vec::new();
        encode_varint(u64::from(u32::MAX), &mut negative);
        assert_eq!(
            decode_length_delimiter(&mut &negative[..]).unwrap_err().kind(),
            &DecodeErrorKind::NegativeLength
        );
    }

    proptest! {
        #[test]
        fn zigzag32_bijection(value: i32) {
            prop_assert_eq!(decode_zigzag32(encode_zigzag32(value)), value);
        }

        #[test]
        fn zigzag64_bijection(value: i64) {
            prop_assert_eq!(decode_zigzag64(encode_zigzag64(value)), value);
        }

        #[test]
        fn key_round_trip(field_number in MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER, wire in 0u32..6) {
            prop_assume!(is_valid_field_number(field_number));
            let wire_type = WireType::try_from(wire).unwrap();
            let mut buf = Vec::new();
            encode_key(field_number, wire_type, &mut buf);
            prop_assert_eq!(buf.len(), key_len(field_number));
            let (number, decoded_wire_type) = decode_key(&mut &buf[..]).unwrap();
            prop_assert_eq!(number, field_number);
            prop_assert_eq!(decoded_wire_type, wire_type);
        }
    }
}
