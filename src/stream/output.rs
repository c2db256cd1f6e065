use std::io::Write;

use crate::bytestr::ByteString;
use crate::encoding::{encode_varint, encode_zigzag32, encode_zigzag64, make_tag, WireType};
use crate::error::EncodeError;

/// MessageSet item group field number.
pub(crate) const MESSAGE_SET_ITEM: u32 = 1;
/// MessageSet type id field number.
pub(crate) const MESSAGE_SET_TYPE_ID: u32 = 2;
/// MessageSet payload field number.
pub(crate) const MESSAGE_SET_MESSAGE: u32 = 3;

/// A buffered writer emitting the Protobuf wire format.
///
/// Writers are polymorphic over the sink: a growable `Vec<u8>`, a bounded
/// byte slice, or an `io::Write` with an internal scratch buffer. The
/// deterministic flag is sticky and consulted by map serialization.
pub struct CodedWriter<'a> {
    sink: Sink<'a>,
    deterministic: bool,
}

enum Sink<'a> {
    Vec(&'a mut Vec<u8>),
    Slice { buf: &'a mut [u8], pos: usize },
    Stream { writer: &'a mut dyn Write, buf: Vec<u8> },
}

impl<'a> CodedWriter<'a> {
    /// A writer appending to a growable buffer. Writes cannot fail.
    pub fn for_vec(buf: &'a mut Vec<u8>) -> CodedWriter<'a> {
        CodedWriter {
            sink: Sink::Vec(buf),
            deterministic: false,
        }
    }

    /// A bounded writer over an external buffer. Writing past the end fails
    /// with [`EncodeError::OutOfSpace`].
    pub fn for_slice(buf: &'a mut [u8]) -> CodedWriter<'a> {
        CodedWriter {
            sink: Sink::Slice { buf, pos: 0 },
            deterministic: false,
        }
    }

    /// A writer flushing through an external sink, buffered with the default
    /// scratch size.
    pub fn for_writer(writer: &'a mut dyn Write) -> CodedWriter<'a> {
        CodedWriter::for_writer_with_buffer_size(writer, crate::DEFAULT_BUFFER_SIZE)
    }

    pub fn for_writer_with_buffer_size(
        writer: &'a mut dyn Write,
        buffer_size: usize,
    ) -> CodedWriter<'a> {
        CodedWriter {
            sink: Sink::Stream {
                writer,
                buf: Vec::with_capacity(buffer_size.max(1)),
            },
            deterministic: false,
        }
    }

    /// Requests canonical-within-this-binary output: maps serialize in
    /// ascending key order. The flag is sticky for the writer's lifetime.
    pub fn set_deterministic(&mut self, deterministic: bool) {
        self.deterministic = deterministic;
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Remaining capacity of a bounded sink, `None` for growable and
    /// streaming sinks.
    pub fn space_left(&self) -> Option<usize> {
        match &self.sink {
            Sink::Slice { buf, pos } => Some(buf.len() - pos),
            _ => None,
        }
    }

    /// Verifies a bounded sink was filled exactly.
    pub fn check_no_space_left(&self) -> Result<(), EncodeError> {
        match self.space_left() {
            Some(remaining) if remaining > 0 => Err(EncodeError::TrailingSpace { remaining }),
            _ => Ok(()),
        }
    }

    /// Flushes any internally buffered bytes to a streaming sink.
    pub fn flush(&mut self) -> Result<(), EncodeError> {
        if let Sink::Stream { writer, buf } = &mut self.sink {
            if !buf.is_empty() {
                writer.write_all(buf)?;
                buf.clear();
            }
            writer.flush()?;
        }
        Ok(())
    }

    pub fn write_raw_byte(&mut self, byte: u8) -> Result<(), EncodeError> {
        self.write_raw_bytes(&[byte])
    }

    pub fn write_raw_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        match &mut self.sink {
            Sink::Vec(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            Sink::Slice { buf, pos } => {
                let remaining = buf.len() - *pos;
                if bytes.len() > remaining {
                    return Err(EncodeError::OutOfSpace {
                        required: bytes.len(),
                        remaining,
                    });
                }
                buf[*pos..*pos + bytes.len()].copy_from_slice(bytes);
                *pos += bytes.len();
                Ok(())
            }
            Sink::Stream { writer, buf } => {
                if buf.len() + bytes.len() > buf.capacity() {
                    writer.write_all(buf)?;
                    buf.clear();
                }
                if bytes.len() >= buf.capacity() {
                    writer.write_all(bytes)?;
                } else {
                    buf.extend_from_slice(bytes);
                }
                Ok(())
            }
        }
    }

    pub fn write_varint(&mut self, value: u64) -> Result<(), EncodeError> {
        let mut scratch = [0u8; 10];
        let mut remaining = &mut scratch[..];
        encode_varint(value, &mut remaining);
        let written = 10 - remaining.len();
        self.write_raw_bytes(&scratch[..written])
    }

    pub fn write_varint32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_varint(u64::from(value))
    }

    pub fn write_raw_fixed32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_raw_bytes(&value.to_le_bytes())
    }

    pub fn write_raw_fixed64(&mut self, value: u64) -> Result<(), EncodeError> {
        self.write_raw_bytes(&value.to_le_bytes())
    }

    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<(), EncodeError> {
        self.write_varint(u64::from(make_tag(field_number, wire_type)))
    }

    /// Writes a bare length delimiter.
    pub fn write_length(&mut self, len: usize) -> Result<(), EncodeError> {
        self.write_varint(len as u64)
    }

    /// Writes a length delimiter followed by the payload.
    pub fn write_length_delimited(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_length(bytes.len())?;
        self.write_raw_bytes(bytes)
    }

    // Field-typed writers: tag plus payload.

    pub fn write_double(&mut self, field_number: u32, value: f64) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::SixtyFourBit)?;
        self.write_raw_fixed64(value.to_bits())
    }

    pub fn write_float(&mut self, field_number: u32, value: f32) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::ThirtyTwoBit)?;
        self.write_raw_fixed32(value.to_bits())
    }

    pub fn write_int32(&mut self, field_number: u32, value: i32) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::Varint)?;
        // Sign-extended, so negative values always take ten bytes.
        self.write_varint(value as i64 as u64)
    }

    pub fn write_int64(&mut self, field_number: u32, value: i64) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::Varint)?;
        self.write_varint(value as u64)
    }

    pub fn write_uint32(&mut self, field_number: u32, value: u32) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::Varint)?;
        self.write_varint(u64::from(value))
    }

    pub fn write_uint64(&mut self, field_number: u32, value: u64) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::Varint)?;
        self.write_varint(value)
    }

    pub fn write_sint32(&mut self, field_number: u32, value: i32) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::Varint)?;
        self.write_varint(u64::from(encode_zigzag32(value)))
    }

    pub fn write_sint64(&mut self, field_number: u32, value: i64) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::Varint)?;
        self.write_varint(encode_zigzag64(value))
    }

    pub fn write_fixed32(&mut self, field_number: u32, value: u32) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::ThirtyTwoBit)?;
        self.write_raw_fixed32(value)
    }

    pub fn write_fixed64(&mut self, field_number: u32, value: u64) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::SixtyFourBit)?;
        self.write_raw_fixed64(value)
    }

    pub fn write_sfixed32(&mut self, field_number: u32, value: i32) -> Result<(), EncodeError> {
        self.write_fixed32(field_number, value as u32)
    }

    pub fn write_sfixed64(&mut self, field_number: u32, value: i64) -> Result<(), EncodeError> {
        self.write_fixed64(field_number, value as u64)
    }

    pub fn write_bool(&mut self, field_number: u32, value: bool) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::Varint)?;
        self.write_raw_byte(u8::from(value))
    }

    pub fn write_enum(&mut self, field_number: u32, value: i32) -> Result<(), EncodeError> {
        self.write_int32(field_number, value)
    }

    pub fn write_string(&mut self, field_number: u32, value: &str) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::LengthDelimited)?;
        self.write_length_delimited(value.as_bytes())
    }

    pub fn write_bytes(&mut self, field_number: u32, value: &ByteString) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::LengthDelimited)?;
        self.write_length(value.len())?;
        for chunk in value.chunks() {
            self.write_raw_bytes(chunk)?;
        }
        Ok(())
    }

    pub fn write_bytes_slice(
        &mut self,
        field_number: u32,
        value: &[u8],
    ) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::LengthDelimited)?;
        self.write_length_delimited(value)
    }

    /// Writes a length-prefixed submessage: tag, the precomputed payload
    /// length, then whatever `write` emits (which must be exactly `len`
    /// bytes).
    pub fn write_message(
        &mut self,
        field_number: u32,
        len: usize,
        write: impl FnOnce(&mut CodedWriter<'a>) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::LengthDelimited)?;
        self.write_length(len)?;
        write(self)
    }

    /// Writes a group: start tag, body, end tag.
    pub fn write_group(
        &mut self,
        field_number: u32,
        write: impl FnOnce(&mut CodedWriter<'a>) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.write_tag(field_number, WireType::StartGroup)?;
        write(self)?;
        self.write_tag(field_number, WireType::EndGroup)
    }

    /// Writes one MessageSet item: an item group holding the extension
    /// number and a length-prefixed payload of `len` bytes.
    pub fn write_message_set_item(
        &mut self,
        type_id: u32,
        len: usize,
        write: impl FnOnce(&mut CodedWriter<'a>) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        self.write_tag(MESSAGE_SET_ITEM, WireType::StartGroup)?;
        self.write_tag(MESSAGE_SET_TYPE_ID, WireType::Varint)?;
        self.write_varint(u64::from(type_id))?;
        self.write_tag(MESSAGE_SET_MESSAGE, WireType::LengthDelimited)?;
        self.write_length(len)?;
        write(self)?;
        self.write_tag(MESSAGE_SET_ITEM, WireType::EndGroup)
    }
}
