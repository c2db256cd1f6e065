//! Descriptor-driven messages: the reflection engine that serializes,
//! parses, merges, compares, and sizes any message from its descriptor.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::borrow::Cow;
use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;

use crate::bytestr::ByteString;
use crate::descriptor::{FieldDescriptor, FieldType, MessageDescriptor};
use crate::encoding::{encoded_len_varint, make_tag, WireType};
use crate::error::{DecodeError, DecodeErrorKind, EncodeError, UninitializedError};
use crate::extension::ExtensionRegistry;
use crate::field_set::FieldSet;
use crate::stream::{CodedReader, CodedWriter};
use crate::unknown::UnknownFieldSet;
use crate::value::{MapKey, Value};

/// Memoized serialized size; -1 means not yet computed.
///
/// Readers of a message that is no longer being mutated may race only on
/// idempotent recomputation, so relaxed ordering is enough.
struct CachedSize(AtomicI64);

impl CachedSize {
    fn get(&self) -> Option<usize> {
        let size = self.0.load(Ordering::Relaxed);
        (size >= 0).then(|| size as usize)
    }

    fn set(&self, size: usize) {
        self.0.store(size as i64, Ordering::Relaxed);
    }

    fn invalidate(&self) {
        self.0.store(-1, Ordering::Relaxed);
    }
}

impl Default for CachedSize {
    fn default() -> CachedSize {
        CachedSize(AtomicI64::new(-1))
    }
}

impl Clone for CachedSize {
    fn clone(&self) -> CachedSize {
        CachedSize(AtomicI64::new(self.0.load(Ordering::Relaxed)))
    }
}

/// A message instance described entirely by its descriptor.
///
/// A `DynamicMessage` behind `&mut` is a builder; behind `&` it is built:
/// shared references expose no mutation, so concurrent reads of a message
/// nobody is mutating are safe, including the lazily memoized
/// [`DynamicMessage::encoded_len`].
#[derive(Clone)]
pub struct DynamicMessage {
    descriptor: MessageDescriptor,
    fields: FieldSet,
    unknown: UnknownFieldSet,
    cached_size: CachedSize,
}

impl DynamicMessage {
    /// An empty message of the given type.
    pub fn new(descriptor: MessageDescriptor) -> DynamicMessage {
        DynamicMessage {
            descriptor,
            fields: FieldSet::new(),
            unknown: UnknownFieldSet::new(),
            cached_size: CachedSize::default(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Whether no field, extension, or unknown field is present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unknown.is_empty()
    }

    /// Present fields (including extensions) in ascending field-number
    /// order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.fields.iter()
    }

    pub fn has_field(&self, field: &FieldDescriptor) -> bool {
        self.fields.has(field)
    }

    pub fn get_field(&self, field: &FieldDescriptor) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_field_by_name(&self, name: &str) -> Option<&Value> {
        let field = self.descriptor.field_by_name(name)?;
        self.fields.get(&field)
    }

    /// The field's value, or its typed default when absent.
    pub fn get_field_or_default<'a>(&'a self, field: &'a FieldDescriptor) -> Cow<'a, Value> {
        if let Some(value) = self.fields.get(field) {
            return Cow::Borrowed(value);
        }
        if field.is_map() {
            Cow::Owned(Value::Map(Vec::new()))
        } else if field.is_repeated() {
            Cow::Owned(Value::List(Vec::new()))
        } else if let Some(message_type) = field.message_type() {
            Cow::Owned(Value::Message(DynamicMessage::new(message_type)))
        } else {
            Cow::Borrowed(
                field
                    .default_value()
                    .expect("non-message fields always have a default"),
            )
        }
    }

    /// Stores a value, clearing any other member of the field's oneof.
    ///
    /// Panics if the field belongs to another message type or the value's
    /// type does not match.
    pub fn set_field(&mut self, field: &FieldDescriptor, value: Value) {
        self.check_field(field);
        self.cached_size.invalidate();
        self.fields.set(field, value);
    }

    /// Like [`DynamicMessage::set_field`], by field name.
    pub fn set_field_by_name(&mut self, name: &str, value: Value) {
        let field = self
            .descriptor
            .field_by_name(name)
            .unwrap_or_else(|| panic!("{} has no field named {name}", self.descriptor.full_name()));
        self.set_field(&field, value);
    }

    /// Mutable access to the field's value, inserting its empty or default
    /// value when absent.
    pub fn get_field_mut(&mut self, field: &FieldDescriptor) -> &mut Value {
        self.check_field(field);
        self.cached_size.invalidate();
        self.fields.get_or_insert_mut(field)
    }

    pub fn clear_field(&mut self, field: &FieldDescriptor) -> Option<Value> {
        self.cached_size.invalidate();
        self.fields.clear_field(field)
    }

    /// Appends one element to a repeated (non-map) field.
    pub fn add_repeated(&mut self, field: &FieldDescriptor, value: Value) {
        self.check_field(field);
        self.cached_size.invalidate();
        self.fields.add_repeated(field, value);
    }

    /// Inserts or replaces one map entry by key.
    pub fn insert_map_entry(&mut self, field: &FieldDescriptor, key: MapKey, value: Value) {
        self.check_field(field);
        self.cached_size.invalidate();
        self.fields.insert_map_entry(field, key, value);
    }

    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        self.cached_size.invalidate();
        &mut self.unknown
    }

    /// Resets every field, extension, and unknown field.
    pub fn clear(&mut self) {
        self.cached_size.invalidate();
        self.fields.clear();
        self.unknown.clear();
    }

    fn check_field(&self, field: &FieldDescriptor) {
        assert!(
            field.containing_message() == self.descriptor,
            "field {} does not belong to {}",
            field.full_name(),
            self.descriptor.full_name(),
        );
    }

    /// Merges `other` into this message: singular scalars last-wins,
    /// singular messages recursively, repeated fields appended, map entries
    /// upserted, unknown fields appended.
    ///
    /// Panics if the messages have different descriptors.
    pub fn merge_from(&mut self, other: &DynamicMessage) {
        assert!(
            self.descriptor == other.descriptor,
            "cannot merge {} into {}",
            other.descriptor.full_name(),
            self.descriptor.full_name(),
        );
        self.cached_size.invalidate();
        self.fields.merge_from(&other.fields);
        self.unknown.merge_from(&other.unknown);
    }

    /// Whether every required field is present and every present submessage
    /// is recursively initialized.
    pub fn is_initialized(&self) -> bool {
        self.descriptor
            .fields()
            .all(|field| !field.is_required() || self.fields.has(&field))
            && self.fields.is_initialized()
    }

    /// Like [`DynamicMessage::is_initialized`], reporting the path of the
    /// first missing field.
    pub fn check_initialized(&self) -> Result<(), UninitializedError> {
        match self.find_uninitialized(String::new()) {
            Some(path) => Err(UninitializedError::new(path)),
            None => Ok(()),
        }
    }

    fn find_uninitialized(&self, prefix: String) -> Option<String> {
        for field in self.descriptor.fields() {
            if field.is_required() && !self.fields.has(&field) {
                return Some(format!("{prefix}{}", field.name()));
            }
        }
        for (field, value) in self.fields.iter() {
            match value {
                Value::Message(message) => {
                    if let Some(path) =
                        message.find_uninitialized(format!("{prefix}{}.", field.name()))
                    {
                        return Some(path);
                    }
                }
                Value::List(values) => {
                    for (index, value) in values.iter().enumerate() {
                        if let Some(message) = value.as_message() {
                            if let Some(path) = message.find_uninitialized(format!(
                                "{prefix}{}[{index}].",
                                field.name()
                            )) {
                                return Some(path);
                            }
                        }
                    }
                }
                Value::Map(entries) => {
                    for (_, value) in entries {
                        if let Some(message) = value.as_message() {
                            if let Some(path) = message
                                .find_uninitialized(format!("{prefix}{}[].", field.name()))
                            {
                                return Some(path);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    // Serialization.

    /// The exact wire size of this message, memoized until the next
    /// mutation.
    pub fn encoded_len(&self) -> usize {
        if let Some(size) = self.cached_size.get() {
            return size;
        }
        let size = if self.descriptor.message_set_wire_format() {
            self.fields.encoded_len_as_message_set() + self.unknown.encoded_len_as_message_set()
        } else {
            self.fields.encoded_len() + self.unknown.encoded_len()
        };
        self.cached_size.set(size);
        size
    }

    /// Writes this message's fields (no length prefix) to the writer.
    pub fn write_to(&self, writer: &mut CodedWriter<'_>) -> Result<(), EncodeError> {
        self.write_fields(writer)
    }

    /// Body serialization: known fields and unknown fields interleaved in
    /// ascending field-number order (MessageSet items first for MessageSet
    /// messages).
    pub(crate) fn write_fields(&self, writer: &mut CodedWriter<'_>) -> Result<(), EncodeError> {
        if self.descriptor.message_set_wire_format() {
            self.fields.write_as_message_set_to(writer)?;
            return self.unknown.write_as_message_set_to(writer);
        }
        let mut fields = self.fields.iter().peekable();
        let mut unknown_numbers = self.unknown.numbers().peekable();
        loop {
            let next_unknown = unknown_numbers.peek().copied();
            match (fields.peek(), next_unknown) {
                (Some((field, _)), Some(number)) if number < field.number() => {
                    self.write_unknown_number(writer, number)?;
                    unknown_numbers.next();
                }
                (Some(_), _) => {
                    let (field, value) = fields.next().expect("peeked");
                    crate::field_set::write_field_value(writer, field, value)?;
                }
                (None, Some(number)) => {
                    self.write_unknown_number(writer, number)?;
                    unknown_numbers.next();
                }
                (None, None) => return Ok(()),
            }
        }
    }

    fn write_unknown_number(
        &self,
        writer: &mut CodedWriter<'_>,
        number: u32,
    ) -> Result<(), EncodeError> {
        for field in self.unknown.get(number) {
            UnknownFieldSet::write_field(writer, number, field)?;
        }
        Ok(())
    }

    /// Serializes into a fresh buffer.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_fields(&mut CodedWriter::for_vec(&mut buf))
            .expect("writing to a Vec cannot fail");
        buf
    }

    /// Serializes into an immutable byte string of exactly
    /// [`DynamicMessage::encoded_len`] bytes.
    pub fn encode_to_bytestring(&self) -> ByteString {
        ByteString::with_coded_writer(self.encoded_len(), |writer| self.write_fields(writer))
            .expect("encoded_len bytes are exactly the serialized size")
    }

    /// Serializes with a leading length delimiter.
    pub fn encode_length_delimited_to_vec(&self) -> Vec<u8> {
        let len = self.encoded_len();
        let mut buf = Vec::with_capacity(len + encoded_len_varint(len as u64));
        let mut writer = CodedWriter::for_vec(&mut buf);
        writer.write_length(len).expect("writing to a Vec cannot fail");
        self.write_fields(&mut writer)
            .expect("writing to a Vec cannot fail");
        drop(writer);
        buf
    }

    // Parsing.

    /// Parses a message from a contiguous buffer.
    pub fn decode(descriptor: MessageDescriptor, bytes: &[u8]) -> Result<DynamicMessage, DecodeError> {
        DynamicMessage::decode_with_extensions(descriptor, bytes, ExtensionRegistry::empty())
    }

    /// Parses a message, resolving extension field numbers through the
    /// registry.
    pub fn decode_with_extensions(
        descriptor: MessageDescriptor,
        bytes: &[u8],
        extensions: &ExtensionRegistry,
    ) -> Result<DynamicMessage, DecodeError> {
        let mut message = DynamicMessage::new(descriptor);
        let mut reader = CodedReader::for_slice(bytes);
        message.merge_from_reader(&mut reader, extensions)?;
        reader.check_last_tag_was(0)?;
        Ok(message)
    }

    /// Parses a length-prefixed message from a contiguous buffer.
    pub fn decode_length_delimited(
        descriptor: MessageDescriptor,
        bytes: &[u8],
    ) -> Result<DynamicMessage, DecodeError> {
        let mut message = DynamicMessage::new(descriptor);
        let mut reader = CodedReader::for_slice(bytes);
        reader.read_message(|reader| {
            message.merge_from_reader(reader, ExtensionRegistry::empty())
        })?;
        Ok(message)
    }

    /// Parses from a contiguous buffer into this message, merging with its
    /// current contents. On error the successfully parsed prefix remains
    /// applied, so the partial message can be salvaged.
    pub fn merge_from_bytes(
        &mut self,
        bytes: &[u8],
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        let mut reader = CodedReader::for_slice(bytes);
        self.merge_from_reader(&mut reader, extensions)?;
        reader.check_last_tag_was(0)
    }

    /// Reads fields off the reader until a clean end of frame/input or an
    /// end-group tag (left in the reader's `last_tag` for the caller).
    pub fn merge_from_reader(
        &mut self,
        reader: &mut CodedReader<'_>,
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        self.cached_size.invalidate();
        if self.descriptor.message_set_wire_format() {
            return self.merge_message_set(reader, extensions);
        }
        loop {
            let tag = reader.read_tag()?;
            if tag == 0 {
                return Ok(());
            }
            let wire_type = WireType::try_from(tag & 0x07)?;
            if wire_type == WireType::EndGroup {
                return Ok(());
            }
            let number = tag >> 3;
            let field = self
                .descriptor
                .field(number)
                .or_else(|| extensions.find(&self.descriptor, number));
            match field {
                Some(field) => self
                    .merge_field(reader, &field, wire_type, extensions)
                    .map_err(|error| {
                        error.push_path(self.descriptor.full_name(), field.name())
                    })?,
                None => self.unknown.read_field(reader, number, wire_type)?,
            }
        }
    }

    fn merge_field(
        &mut self,
        reader: &mut CodedReader<'_>,
        field: &FieldDescriptor,
        wire_type: WireType,
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        if field.is_map() {
            crate::encoding::check_wire_type(WireType::LengthDelimited, wire_type)?;
            return self.merge_map_entry(reader, field, extensions);
        }

        let declared = field.wire_type();
        if field.is_repeated() && field.field_type().is_packable() {
            // Both the packed and the expanded encoding are accepted no
            // matter which one the schema declares.
            if wire_type == WireType::LengthDelimited && declared != WireType::LengthDelimited {
                return self.merge_packed(reader, field);
            }
            crate::encoding::check_wire_type(declared, wire_type)?;
            return self.merge_scalar(reader, field);
        }

        crate::encoding::check_wire_type(declared, wire_type)?;
        match field.field_type() {
            FieldType::Message => self.merge_message(reader, field, extensions),
            FieldType::Group => self.merge_group(reader, field, extensions),
            _ => self.merge_scalar(reader, field),
        }
    }

    fn merge_packed(
        &mut self,
        reader: &mut CodedReader<'_>,
        field: &FieldDescriptor,
    ) -> Result<(), DecodeError> {
        let len = reader.read_length()?;
        reader.push_limit(len)?;
        let mut result = Ok(());
        loop {
            match reader.is_at_end() {
                Ok(true) => break,
                Ok(false) => {
                    if let Err(error) = self.merge_scalar(reader, field) {
                        result = Err(error);
                        break;
                    }
                }
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
        reader.pop_limit();
        result
    }

    /// Reads one scalar payload and applies it: appended for repeated
    /// fields, stored (last wins, oneof siblings cleared) otherwise.
    fn merge_scalar(
        &mut self,
        reader: &mut CodedReader<'_>,
        field: &FieldDescriptor,
    ) -> Result<(), DecodeError> {
        if field.field_type() == FieldType::Enum {
            let raw = reader.read_varint()?;
            let number = raw as u32 as i32;
            let enum_type = field.enum_type().expect("enum fields have an enum type");
            if enum_type.is_closed() && !enum_type.contains_number(number) {
                // Closed enums route unrecognized numbers to unknown fields.
                self.unknown.add_varint(field.number(), raw);
                return Ok(());
            }
            self.apply_scalar(field, Value::Enum(number));
            return Ok(());
        }
        let value = read_scalar_value(reader, field)?;
        self.apply_scalar(field, value);
        Ok(())
    }

    fn apply_scalar(&mut self, field: &FieldDescriptor, value: Value) {
        if field.is_repeated() {
            self.fields.add_repeated(field, value);
        } else {
            self.fields.set(field, value);
        }
    }

    fn merge_message(
        &mut self,
        reader: &mut CodedReader<'_>,
        field: &FieldDescriptor,
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        let message_type = field.message_type().expect("message fields have a type");
        if field.is_repeated() {
            let mut message = DynamicMessage::new(message_type);
            reader.read_message(|reader| message.merge_from_reader(reader, extensions))?;
            self.fields.add_repeated(field, Value::Message(message));
            Ok(())
        } else {
            let value = self.fields.get_or_insert_mut(field);
            let message = value
                .as_message_mut()
                .expect("message fields store messages");
            reader.read_message(|reader| message.merge_from_reader(reader, extensions))
        }
    }

    fn merge_group(
        &mut self,
        reader: &mut CodedReader<'_>,
        field: &FieldDescriptor,
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        let message_type = field.message_type().expect("group fields have a type");
        if field.is_repeated() {
            let mut message = DynamicMessage::new(message_type);
            reader.read_group(field.number(), |reader| {
                message.merge_from_reader(reader, extensions)
            })?;
            self.fields.add_repeated(field, Value::Message(message));
            Ok(())
        } else {
            let value = self.fields.get_or_insert_mut(field);
            let message = value
                .as_message_mut()
                .expect("group fields store messages");
            reader.read_group(field.number(), |reader| {
                message.merge_from_reader(reader, extensions)
            })
        }
    }

    fn merge_map_entry(
        &mut self,
        reader: &mut CodedReader<'_>,
        field: &FieldDescriptor,
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        let len = reader.read_length()?;
        let data = reader.read_bytes(len)?;
        let entry_type = field.message_type().expect("map fields have an entry type");
        let key_field = entry_type
            .map_entry_key_field()
            .expect("map entries have a key field");
        let value_field = entry_type
            .map_entry_value_field()
            .expect("map entries have a value field");

        if reader.remaining_recursion() == 0 {
            return Err(DecodeErrorKind::RecursionLimitExceeded.into());
        }
        let mut sub = CodedReader::for_bytes(data.clone());
        sub.set_recursion_limit(reader.remaining_recursion() - 1);

        let mut key = None;
        let mut value = None;
        loop {
            let tag = sub.read_tag()?;
            if tag == 0 {
                break;
            }
            let wire_type = WireType::try_from(tag & 0x07)?;
            if tag >> 3 == 1 && wire_type == key_field.wire_type() {
                key = Some(read_scalar_value(&mut sub, &key_field)?);
            } else if tag >> 3 == 2 && wire_type == value_field.wire_type() {
                match value_field.field_type() {
                    FieldType::Message => {
                        let message_type =
                            value_field.message_type().expect("message fields have a type");
                        let mut message = DynamicMessage::new(message_type);
                        sub.read_message(|sub| message.merge_from_reader(sub, extensions))?;
                        value = Some(Value::Message(message));
                    }
                    FieldType::Enum => {
                        let raw = sub.read_varint()?;
                        let number = raw as u32 as i32;
                        let enum_type =
                            value_field.enum_type().expect("enum fields have an enum type");
                        if enum_type.is_closed() && !enum_type.contains_number(number) {
                            // The whole entry is preserved verbatim.
                            self.unknown.add_length_delimited(field.number(), data);
                            return Ok(());
                        }
                        value = Some(Value::Enum(number));
                    }
                    _ => value = Some(read_scalar_value(&mut sub, &value_field)?),
                }
            } else {
                sub.skip_field(tag)?;
            }
        }

        let key = match key {
            Some(key) => MapKey::try_from(key).expect("map keys are scalar"),
            None => MapKey::default_for(key_field.field_type()).expect("validated on pool build"),
        };
        let value = match value {
            Some(value) => value,
            None => match value_field.field_type() {
                FieldType::Message => Value::Message(DynamicMessage::new(
                    value_field.message_type().expect("message fields have a type"),
                )),
                _ => value_field
                    .default_value()
                    .cloned()
                    .expect("non-message fields always have a default"),
            },
        };
        self.fields.insert_map_entry(field, key, value);
        Ok(())
    }

    fn merge_message_set(
        &mut self,
        reader: &mut CodedReader<'_>,
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        loop {
            let tag = reader.read_tag()?;
            if tag == 0 {
                return Ok(());
            }
            let wire_type = WireType::try_from(tag & 0x07)?;
            if wire_type == WireType::EndGroup {
                return Ok(());
            }
            if tag == make_tag(1, WireType::StartGroup) {
                self.merge_message_set_item(reader, extensions)?;
            } else {
                self.unknown.read_field(reader, tag >> 3, wire_type)?;
            }
        }
    }

    fn merge_message_set_item(
        &mut self,
        reader: &mut CodedReader<'_>,
        extensions: &ExtensionRegistry,
    ) -> Result<(), DecodeError> {
        let mut type_id = 0u32;
        let mut payload: Option<Bytes> = None;
        reader.read_group(1, |reader| loop {
            let tag = reader.read_tag()?;
            if tag == 0 || tag & 0x07 == WireType::EndGroup as u32 {
                return Ok(());
            }
            if tag == make_tag(2, WireType::Varint) {
                type_id = reader.read_varint()? as u32;
            } else if tag == make_tag(3, WireType::LengthDelimited) {
                let len = reader.read_length()?;
                payload = Some(reader.read_bytes(len)?);
            } else {
                reader.skip_field(tag)?;
            }
        })?;

        let Some(payload) = payload else { return Ok(()) };
        if type_id == 0 {
            return Ok(());
        }

        match extensions.find(&self.descriptor, type_id) {
            Some(extension) if extension.field_type() == FieldType::Message => {
                if reader.remaining_recursion() == 0 {
                    return Err(DecodeErrorKind::RecursionLimitExceeded.into());
                }
                let message_type = extension
                    .message_type()
                    .expect("message fields have a type");
                let mut sub = CodedReader::for_bytes(payload);
                sub.set_recursion_limit(reader.remaining_recursion() - 1);
                let value = self.fields.get_or_insert_mut(&extension);
                if !matches!(value, Value::Message(_)) {
                    *value = Value::Message(DynamicMessage::new(message_type));
                }
                let message = value
                    .as_message_mut()
                    .expect("message fields store messages");
                message.merge_from_reader(&mut sub, extensions)?;
                sub.check_last_tag_was(0)
            }
            _ => {
                // Unresolvable items are preserved keyed by their type id; a
                // later parse with the extension registered recovers them.
                self.unknown.add_length_delimited(type_id, payload);
                Ok(())
            }
        }
    }
}

/// Reads one non-enum, non-message scalar payload.
fn read_scalar_value(
    reader: &mut CodedReader<'_>,
    field: &FieldDescriptor,
) -> Result<Value, DecodeError> {
    Ok(match field.field_type() {
        FieldType::Double => Value::F64(reader.read_double()?),
        FieldType::Float => Value::F32(reader.read_float()?),
        FieldType::Int32 => Value::I32(reader.read_int32()?),
        FieldType::Int64 => Value::I64(reader.read_int64()?),
        FieldType::Uint32 => Value::U32(reader.read_varint32()?),
        FieldType::Uint64 => Value::U64(reader.read_varint()?),
        FieldType::Sint32 => Value::I32(reader.read_sint32()?),
        FieldType::Sint64 => Value::I64(reader.read_sint64()?),
        FieldType::Fixed32 => Value::U32(reader.read_fixed32()?),
        FieldType::Fixed64 => Value::U64(reader.read_fixed64()?),
        FieldType::Sfixed32 => Value::I32(reader.read_fixed32()? as i32),
        FieldType::Sfixed64 => Value::I64(reader.read_fixed64()? as i64),
        FieldType::Bool => Value::Bool(reader.read_bool()?),
        FieldType::String => {
            let len = reader.read_length()?;
            Value::String(reader.read_string(len)?)
        }
        FieldType::Bytes => {
            let len = reader.read_length()?;
            Value::Bytes(ByteString::from(reader.read_bytes(len)?))
        }
        FieldType::Enum | FieldType::Message | FieldType::Group => {
            unreachable!("handled by the per-category merge paths")
        }
    })
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &DynamicMessage) -> bool {
        self.descriptor == other.descriptor
            && self.fields == other.fields
            && self.unknown == other.unknown
    }
}

impl Eq for DynamicMessage {}

impl Hash for DynamicMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.descriptor.hash(state);
        self.fields.hash(state);
        self.unknown.hash(state);
    }
}

impl fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut message = f.debug_struct(self.descriptor.full_name());
        for (field, value) in self.fields.iter() {
            message.field(field.name(), value);
        }
        if !self.unknown.is_empty() {
            message.field("<unknown>", &self.unknown);
        }
        message.finish()
    }
}
