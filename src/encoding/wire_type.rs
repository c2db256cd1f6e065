use crate::error::{DecodeError, DecodeErrorKind};

/// The wire type half of an encoded field tag.
///
/// The integer value is the encoded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    SixtyFourBit = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    ThirtyTwoBit = 5,
}

impl TryFrom<u32> for WireType {
    type Error = DecodeError;

    #[inline]
    fn try_from(value: u32) -> Result<WireType, DecodeError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::SixtyFourBit),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::ThirtyTwoBit),
            _ => Err(DecodeErrorKind::InvalidWireTypeValue { value }.into()),
        }
    }
}

/// Checks that the expected wire type matches the actual wire type, or
/// returns an error result.
#[inline]
pub fn check_wire_type(expected: WireType, actual: WireType) -> Result<(), DecodeError> {
    if expected != actual {
        return Err(DecodeErrorKind::UnexpectedWireType { actual, expected }.into());
    }
    Ok(())
}
