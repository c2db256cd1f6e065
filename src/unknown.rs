//! Storage for fields the schema does not know, preserved verbatim so they
//! survive round-trips.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::encoding::{encoded_len_varint, key_len, WireType};
use crate::error::{DecodeError, DecodeErrorKind, EncodeError};
use crate::stream::{CodedReader, CodedWriter};

/// The unknown fields of one message, keyed by field number.
///
/// Payloads arrive and are re-emitted in order within each number; numbers
/// are emitted in ascending order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct UnknownFieldSet {
    fields: BTreeMap<u32, Vec<UnknownField>>,
}

/// One unknown payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnknownField {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    LengthDelimited(Bytes),
    /// A group, stored as its own unknown-field set.
    Group(UnknownFieldSet),
}

impl UnknownFieldSet {
    pub fn new() -> UnknownFieldSet {
        UnknownFieldSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Field numbers present, ascending.
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }

    /// Payloads stored for one field number, in arrival order.
    pub fn get(&self, number: u32) -> &[UnknownField] {
        self.fields.get(&number).map_or(&[], Vec::as_slice)
    }

    /// All payloads, ascending by field number.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownField)> {
        self.fields
            .iter()
            .flat_map(|(&number, fields)| fields.iter().map(move |field| (number, field)))
    }

    pub fn add_varint(&mut self, number: u32, value: u64) {
        self.add(number, UnknownField::Varint(value));
    }

    pub fn add_fixed32(&mut self, number: u32, value: u32) {
        self.add(number, UnknownField::Fixed32(value));
    }

    pub fn add_fixed64(&mut self, number: u32, value: u64) {
        self.add(number, UnknownField::Fixed64(value));
    }

    pub fn add_length_delimited(&mut self, number: u32, value: Bytes) {
        self.add(number, UnknownField::LengthDelimited(value));
    }

    pub fn add_group(&mut self, number: u32, value: UnknownFieldSet) {
        self.add(number, UnknownField::Group(value));
    }

    fn add(&mut self, number: u32, field: UnknownField) {
        self.fields.entry(number).or_default().push(field);
    }

    /// Appends all of `other`'s payloads.
    pub fn merge_from(&mut self, other: &UnknownFieldSet) {
        for (&number, fields) in &other.fields {
            self.fields
                .entry(number)
                .or_default()
                .extend(fields.iter().cloned());
        }
    }

    /// Reads the payload of one field off the stream into this set.
    pub(crate) fn read_field(
        &mut self,
        reader: &mut CodedReader<'_>,
        number: u32,
        wire_type: WireType,
    ) -> Result<(), DecodeError> {
        match wire_type {
            WireType::Varint => {
                let value = reader.read_varint()?;
                self.add_varint(number, value);
            }
            WireType::ThirtyTwoBit => {
                let value = reader.read_fixed32()?;
                self.add_fixed32(number, value);
            }
            WireType::SixtyFourBit => {
                let value = reader.read_fixed64()?;
                self.add_fixed64(number, value);
            }
            WireType::LengthDelimited => {
                let len = reader.read_length()?;
                let value = reader.read_bytes(len)?;
                self.add_length_delimited(number, value);
            }
            WireType::StartGroup => {
                let mut nested = UnknownFieldSet::new();
                reader.read_group(number, |reader| nested.merge_group_body(reader))?;
                self.add_group(number, nested);
            }
            WireType::EndGroup => {
                return Err(DecodeErrorKind::UnexpectedEndGroupTag.into());
            }
        }
        Ok(())
    }

    /// Reads fields until the end of the frame or an end-group tag.
    fn merge_group_body(&mut self, reader: &mut CodedReader<'_>) -> Result<(), DecodeError> {
        loop {
            let tag = reader.read_tag()?;
            if tag == 0 || tag & 0x07 == WireType::EndGroup as u32 {
                return Ok(());
            }
            let number = tag >> 3;
            let wire_type = WireType::try_from(tag & 0x07)?;
            self.read_field(reader, number, wire_type)?;
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.iter()
            .map(|(number, field)| Self::encoded_len_field(number, field))
            .sum()
    }

    pub(crate) fn encoded_len_field(number: u32, field: &UnknownField) -> usize {
        match field {
            UnknownField::Varint(value) => key_len(number) + encoded_len_varint(*value),
            UnknownField::Fixed32(_) => key_len(number) + 4,
            UnknownField::Fixed64(_) => key_len(number) + 8,
            UnknownField::LengthDelimited(value) => {
                key_len(number) + encoded_len_varint(value.len() as u64) + value.len()
            }
            UnknownField::Group(value) => 2 * key_len(number) + value.encoded_len(),
        }
    }

    pub fn write_to(&self, writer: &mut CodedWriter<'_>) -> Result<(), EncodeError> {
        for (number, field) in self.iter() {
            Self::write_field(writer, number, field)?;
        }
        Ok(())
    }

    pub(crate) fn write_field(
        writer: &mut CodedWriter<'_>,
        number: u32,
        field: &UnknownField,
    ) -> Result<(), EncodeError> {
        match field {
            UnknownField::Varint(value) => {
                writer.write_tag(number, WireType::Varint)?;
                writer.write_varint(*value)
            }
            UnknownField::Fixed32(value) => {
                writer.write_tag(number, WireType::ThirtyTwoBit)?;
                writer.write_raw_fixed32(*value)
            }
            UnknownField::Fixed64(value) => {
                writer.write_tag(number, WireType::SixtyFourBit)?;
                writer.write_raw_fixed64(*value)
            }
            UnknownField::LengthDelimited(value) => {
                writer.write_tag(number, WireType::LengthDelimited)?;
                writer.write_length_delimited(value)
            }
            UnknownField::Group(value) => {
                writer.write_group(number, |writer| value.write_to(writer))
            }
        }
    }

    /// Writes length-delimited payloads as MessageSet items, everything else
    /// as regular fields.
    pub(crate) fn write_as_message_set_to(
        &self,
        writer: &mut CodedWriter<'_>,
    ) -> Result<(), EncodeError> {
        for (number, field) in self.iter() {
            match field {
                UnknownField::LengthDelimited(value) => {
                    writer.write_message_set_item(number, value.len(), |writer| {
                        writer.write_raw_bytes(value)
                    })?;
                }
                other => Self::write_field(writer, number, other)?,
            }
        }
        Ok(())
    }

    pub(crate) fn encoded_len_as_message_set(&self) -> usize {
        self.iter()
            .map(|(number, field)| match field {
                UnknownField::LengthDelimited(value) => message_set_item_len(number, value.len()),
                other => Self::encoded_len_field(number, other),
            })
            .sum()
    }
}

/// Wire size of one MessageSet item with the given payload length.
pub(crate) fn message_set_item_len(type_id: u32, payload_len: usize) -> usize {
    // Item start and end tags are field 1, one byte each.
    2 + key_len(2)
        + encoded_len_varint(u64::from(type_id))
        + key_len(3)
        + encoded_len_varint(payload_len as u64)
        + payload_len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_unknown(bytes: &[u8]) -> UnknownFieldSet {
        let mut reader = CodedReader::for_slice(bytes);
        let mut set = UnknownFieldSet::new();
        loop {
            let tag = reader.read_tag().unwrap();
            if tag == 0 {
                break;
            }
            let wire_type = WireType::try_from(tag & 0x07).unwrap();
            set.read_field(&mut reader, tag >> 3, wire_type).unwrap();
        }
        set
    }

    fn serialize(set: &UnknownFieldSet) -> Vec<u8> {
        let mut buf = Vec::new();
        set.write_to(&mut CodedWriter::for_vec(&mut buf)).unwrap();
        buf
    }

    #[test]
    fn round_trips_every_wire_type() {
        let bytes = [
            0x08, 0x96, 0x01, // field 1 varint 150
            0x15, 0x01, 0x02, 0x03, 0x04, // field 2 fixed32
            0x19, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // field 3 fixed64
            0x22, 0x02, 0xAB, 0xCD, // field 4 bytes
            0x2B, 0x08, 0x01, 0x2C, // field 5 group holding field 1 varint 1
        ];
        let set = parse_unknown(&bytes);
        assert_eq!(set.get(1), [UnknownField::Varint(150)]);
        assert_eq!(set.get(2), [UnknownField::Fixed32(0x04030201)]);
        assert_eq!(set.get(4).len(), 1);
        assert!(matches!(set.get(5), [UnknownField::Group(_)]));

        assert_eq!(set.encoded_len(), bytes.len());
        assert_eq!(serialize(&set), bytes);
    }

    #[test]
    fn repeated_payloads_keep_arrival_order() {
        let bytes = [
            0x08, 0x02, // field 1 varint 2
            0x0D, 0xAA, 0x00, 0x00, 0x00, // field 1 fixed32
            0x08, 0x01, // field 1 varint 1
        ];
        let set = parse_unknown(&bytes);
        assert_eq!(
            set.get(1),
            [
                UnknownField::Varint(2),
                UnknownField::Fixed32(0xAA),
                UnknownField::Varint(1),
            ]
        );
        assert_eq!(serialize(&set), bytes);
    }

    #[test]
    fn numbers_are_emitted_ascending() {
        let bytes = [
            0x18, 0x03, // field 3
            0x08, 0x01, // field 1
            0x10, 0x02, // field 2
        ];
        let set = parse_unknown(&bytes);
        assert_eq!(serialize(&set), [0x08, 0x01, 0x10, 0x02, 0x18, 0x03]);
    }

    #[test]
    fn merge_appends() {
        let mut a = parse_unknown(&[0x08, 0x01]);
        let b = parse_unknown(&[0x08, 0x02, 0x10, 0x03]);
        a.merge_from(&b);
        assert_eq!(a.get(1), [UnknownField::Varint(1), UnknownField::Varint(2)]);
        assert_eq!(a.get(2), [UnknownField::Varint(3)]);
    }

    #[test]
    fn message_set_shape() {
        let mut set = UnknownFieldSet::new();
        set.add_length_delimited(4, Bytes::from_static(&[0x42]));
        let mut buf = Vec::new();
        set.write_as_message_set_to(&mut CodedWriter::for_vec(&mut buf))
            .unwrap();
        assert_eq!(buf, [0x0B, 0x10, 0x04, 0x1A, 0x01, 0x42, 0x0C]);
        assert_eq!(set.encoded_len_as_message_set(), buf.len());
    }
}
