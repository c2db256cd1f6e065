//! Generic storage of field values keyed by field descriptor.
//!
//! `FieldSet` backs dynamic messages and extensions alike: it holds
//! `(field descriptor, value)` entries in ascending field-number order and
//! knows how to size, write, merge, and compare itself.

use core::hash::{Hash, Hasher};
use std::collections::BTreeMap;

use crate::descriptor::{FieldDescriptor, FieldType, Presence};
use crate::encoding::{encoded_len_varint, encode_zigzag32, encode_zigzag64, key_len};
use crate::error::EncodeError;
use crate::message::DynamicMessage;
use crate::stream::CodedWriter;
use crate::unknown::message_set_item_len;
use crate::value::{MapKey, Value};

#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    entries: BTreeMap<u32, Entry>,
}

#[derive(Clone, Debug)]
struct Entry {
    field: FieldDescriptor,
    value: Value,
}

impl Entry {
    /// Whether this entry participates in serialization and equality.
    ///
    /// Implicit-presence singular fields holding their default, and empty
    /// repeated and map fields, count as absent.
    fn is_present(&self) -> bool {
        match &self.value {
            Value::List(values) => !values.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            value => {
                self.field.presence() != Presence::Implicit
                    || Some(value) != self.field.default_value()
            }
        }
    }
}

impl FieldSet {
    pub fn new() -> FieldSet {
        FieldSet::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Present fields in ascending field-number order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.entries
            .values()
            .filter(|entry| entry.is_present())
            .map(|entry| (&entry.field, &entry.value))
    }

    pub fn has(&self, field: &FieldDescriptor) -> bool {
        self.entries
            .get(&field.number())
            .is_some_and(Entry::is_present)
    }

    pub fn get(&self, field: &FieldDescriptor) -> Option<&Value> {
        self.entries.get(&field.number()).map(|entry| &entry.value)
    }

    /// Stores `value`, clearing the other members of the field's oneof.
    ///
    /// Panics if the value's type does not match the field's.
    pub fn set(&mut self, field: &FieldDescriptor, mut value: Value) {
        check_value(field, &value);
        if let Value::Map(entries) = &mut value {
            dedup_map_entries(entries);
        }
        self.clear_oneof_siblings(field);
        // Implicit-presence scalars normalize the default to absence.
        if !field.is_repeated()
            && field.presence() == Presence::Implicit
            && Some(&value) == field.default_value()
        {
            self.entries.remove(&field.number());
            return;
        }
        self.entries.insert(
            field.number(),
            Entry {
                field: field.clone(),
                value,
            },
        );
    }

    pub fn clear_field(&mut self, field: &FieldDescriptor) -> Option<Value> {
        self.entries
            .remove(&field.number())
            .map(|entry| entry.value)
    }

    /// Mutable access to the stored value, inserting the field's empty or
    /// default value first when absent. Clears oneof siblings like `set`.
    pub fn get_or_insert_mut(&mut self, field: &FieldDescriptor) -> &mut Value {
        self.clear_oneof_siblings(field);
        &mut self
            .entries
            .entry(field.number())
            .or_insert_with(|| Entry {
                field: field.clone(),
                value: empty_value(field),
            })
            .value
    }

    /// Appends one element to a repeated field.
    pub fn add_repeated(&mut self, field: &FieldDescriptor, value: Value) {
        debug_assert!(field.is_repeated() && !field.is_map());
        check_scalar_value(field, &value);
        match self.get_or_insert_mut(field) {
            Value::List(values) => values.push(value),
            _ => unreachable!("repeated fields store lists"),
        }
    }

    /// Replaces the element at `index` of a repeated field.
    ///
    /// Panics if the field holds no list, the index is out of bounds, or the
    /// value's type does not match.
    pub fn set_repeated(&mut self, field: &FieldDescriptor, index: usize, value: Value) {
        debug_assert!(field.is_repeated() && !field.is_map());
        check_scalar_value(field, &value);
        match self.entries.get_mut(&field.number()).map(|entry| &mut entry.value) {
            Some(Value::List(values)) => values[index] = value,
            _ => panic!("no repeated values stored for field {}", field.full_name()),
        }
    }

    /// Number of elements stored for a repeated or map field.
    pub fn repeated_len(&self, field: &FieldDescriptor) -> usize {
        match self.get(field) {
            Some(Value::List(values)) => values.len(),
            Some(Value::Map(entries)) => entries.len(),
            _ => 0,
        }
    }

    /// Inserts or replaces one map entry by key.
    pub fn insert_map_entry(&mut self, field: &FieldDescriptor, key: MapKey, value: Value) {
        debug_assert!(field.is_map());
        match self.get_or_insert_mut(field) {
            Value::Map(entries) => {
                match entries.iter_mut().find(|(existing, _)| *existing == key) {
                    Some((_, existing_value)) => *existing_value = value,
                    None => entries.push((key, value)),
                }
            }
            _ => unreachable!("map fields store maps"),
        }
    }

    fn clear_oneof_siblings(&mut self, field: &FieldDescriptor) {
        if let Some(oneof) = field.containing_oneof() {
            for member in oneof.fields() {
                if member.number() != field.number() {
                    self.entries.remove(&member.number());
                }
            }
        }
    }

    /// Merges another set into this one: scalars last-wins, messages
    /// recursively, repeated fields appended, map entries upserted, oneofs
    /// cleared by the incoming member.
    pub fn merge_from(&mut self, other: &FieldSet) {
        for (field, value) in other.iter() {
            match value {
                Value::List(values) => match self.get_or_insert_mut(field) {
                    Value::List(existing) => existing.extend(values.iter().cloned()),
                    _ => unreachable!("repeated fields store lists"),
                },
                Value::Map(entries) => {
                    for (key, value) in entries {
                        self.insert_map_entry(field, key.clone(), value.clone());
                    }
                }
                Value::Message(message) => {
                    let switching_oneof = field.containing_oneof().is_some()
                        && !matches!(self.get(field), Some(Value::Message(_)));
                    if switching_oneof {
                        self.set(field, value.clone());
                    } else {
                        match self.get_or_insert_mut(field) {
                            Value::Message(existing) => existing.merge_from(message),
                            _ => unreachable!("message fields store messages"),
                        }
                    }
                }
                scalar => self.set(field, scalar.clone()),
            }
        }
    }

    /// Whether every message value in this set is itself initialized.
    /// Presence of this set's own required fields is the caller's check.
    pub fn is_initialized(&self) -> bool {
        self.iter().all(|(_, value)| match value {
            Value::Message(message) => message.is_initialized(),
            Value::List(values) => values
                .iter()
                .all(|value| value.as_message().map_or(true, DynamicMessage::is_initialized)),
            Value::Map(entries) => entries
                .iter()
                .all(|(_, value)| value.as_message().map_or(true, DynamicMessage::is_initialized)),
            _ => true,
        })
    }

    pub fn encoded_len(&self) -> usize {
        self.iter()
            .map(|(field, value)| encoded_len_field_value(field, value))
            .sum()
    }

    pub fn write_to(&self, writer: &mut CodedWriter<'_>) -> Result<(), EncodeError> {
        for (field, value) in self.iter() {
            write_field_value(writer, field, value)?;
        }
        Ok(())
    }

    /// Writes singular message entries in the MessageSet item shape; any
    /// other entry falls back to the regular encoding.
    pub fn write_as_message_set_to(
        &self,
        writer: &mut CodedWriter<'_>,
    ) -> Result<(), EncodeError> {
        for (field, value) in self.iter() {
            match value {
                Value::Message(message) => writer.write_message_set_item(
                    field.number(),
                    message.encoded_len(),
                    |writer| message.write_fields(writer),
                )?,
                other => write_field_value(writer, field, other)?,
            }
        }
        Ok(())
    }

    pub fn encoded_len_as_message_set(&self) -> usize {
        self.iter()
            .map(|(field, value)| match value {
                Value::Message(message) => {
                    message_set_item_len(field.number(), message.encoded_len())
                }
                other => encoded_len_field_value(field, other),
            })
            .sum()
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &FieldSet) -> bool {
        let mut a = self.iter();
        let mut b = other.iter();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some((field_a, value_a)), Some((field_b, value_b))) => {
                    if field_a.number() != field_b.number() || value_a != value_b {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl Eq for FieldSet {}

impl Hash for FieldSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (field, value) in self.iter() {
            field.number().hash(state);
            value.hash(state);
        }
    }
}

/// The value stored when a field is first touched mutably.
fn empty_value(field: &FieldDescriptor) -> Value {
    if field.is_map() {
        Value::Map(Vec::new())
    } else if field.is_repeated() {
        Value::List(Vec::new())
    } else if let Some(message_type) = field.message_type() {
        Value::Message(DynamicMessage::new(message_type))
    } else {
        field
            .default_value()
            .cloned()
            .expect("non-message fields always have a default")
    }
}

fn dedup_map_entries(entries: &mut Vec<(MapKey, Value)>) {
    let mut deduped: Vec<(MapKey, Value)> = Vec::with_capacity(entries.len());
    for (key, value) in entries.drain(..) {
        match deduped.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, existing_value)) => *existing_value = value,
            None => deduped.push((key, value)),
        }
    }
    *entries = deduped;
}

fn check_value(field: &FieldDescriptor, value: &Value) {
    let ok = if field.is_map() {
        matches!(value, Value::Map(_))
    } else if field.is_repeated() {
        match value {
            Value::List(values) => values.iter().all(|v| scalar_value_matches(field, v)),
            _ => false,
        }
    } else {
        scalar_value_matches(field, value)
    };
    assert!(
        ok,
        "value type mismatch for field {} ({:?})",
        field.full_name(),
        field.field_type(),
    );
}

fn check_scalar_value(field: &FieldDescriptor, value: &Value) {
    assert!(
        scalar_value_matches(field, value),
        "value type mismatch for field {} ({:?})",
        field.full_name(),
        field.field_type(),
    );
}

fn scalar_value_matches(field: &FieldDescriptor, value: &Value) -> bool {
    match (field.field_type(), value) {
        (FieldType::Double, Value::F64(_)) => true,
        (FieldType::Float, Value::F32(_)) => true,
        (FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32, Value::I32(_)) => true,
        (FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64, Value::I64(_)) => true,
        (FieldType::Uint32 | FieldType::Fixed32, Value::U32(_)) => true,
        (FieldType::Uint64 | FieldType::Fixed64, Value::U64(_)) => true,
        (FieldType::Bool, Value::Bool(_)) => true,
        (FieldType::String, Value::String(_)) => true,
        (FieldType::Bytes, Value::Bytes(_)) => true,
        (FieldType::Enum, Value::Enum(_)) => true,
        (FieldType::Message | FieldType::Group, Value::Message(message)) => field
            .message_type()
            .is_some_and(|ty| message.descriptor() == &ty),
        _ => false,
    }
}

/// Writes one present field: tag(s) plus payload, including packed runs,
/// maps, submessages, and groups.
pub(crate) fn write_field_value(
    writer: &mut CodedWriter<'_>,
    field: &FieldDescriptor,
    value: &Value,
) -> Result<(), EncodeError> {
    match value {
        Value::Map(entries) => write_map(writer, field, entries),
        Value::List(values) if field.is_packed() => {
            if values.is_empty() {
                return Ok(());
            }
            writer.write_tag(field.number(), crate::encoding::WireType::LengthDelimited)?;
            let len: usize = values
                .iter()
                .map(|value| scalar_payload_len(field.field_type(), value))
                .sum();
            writer.write_length(len)?;
            for value in values {
                write_scalar_payload(writer, field.field_type(), value)?;
            }
            Ok(())
        }
        Value::List(values) => {
            for value in values {
                write_single(writer, field, value)?;
            }
            Ok(())
        }
        single => write_single(writer, field, single),
    }
}

/// Wire size of one present field, mirroring [`write_field_value`].
pub(crate) fn encoded_len_field_value(field: &FieldDescriptor, value: &Value) -> usize {
    match value {
        Value::Map(entries) => entries
            .iter()
            .map(|(key, value)| {
                let len = map_entry_payload_len(field, key, value);
                key_len(field.number()) + encoded_len_varint(len as u64) + len
            })
            .sum(),
        Value::List(values) if field.is_packed() => {
            if values.is_empty() {
                return 0;
            }
            let len: usize = values
                .iter()
                .map(|value| scalar_payload_len(field.field_type(), value))
                .sum();
            key_len(field.number()) + encoded_len_varint(len as u64) + len
        }
        Value::List(values) => values
            .iter()
            .map(|value| single_len(field, value))
            .sum(),
        single => single_len(field, single),
    }
}

fn write_single(
    writer: &mut CodedWriter<'_>,
    field: &FieldDescriptor,
    value: &Value,
) -> Result<(), EncodeError> {
    let number = field.number();
    match (field.field_type(), value) {
        (FieldType::Double, Value::F64(v)) => writer.write_double(number, *v),
        (FieldType::Float, Value::F32(v)) => writer.write_float(number, *v),
        (FieldType::Int32, Value::I32(v)) => writer.write_int32(number, *v),
        (FieldType::Int64, Value::I64(v)) => writer.write_int64(number, *v),
        (FieldType::Uint32, Value::U32(v)) => writer.write_uint32(number, *v),
        (FieldType::Uint64, Value::U64(v)) => writer.write_uint64(number, *v),
        (FieldType::Sint32, Value::I32(v)) => writer.write_sint32(number, *v),
        (FieldType::Sint64, Value::I64(v)) => writer.write_sint64(number, *v),
        (FieldType::Fixed32, Value::U32(v)) => writer.write_fixed32(number, *v),
        (FieldType::Fixed64, Value::U64(v)) => writer.write_fixed64(number, *v),
        (FieldType::Sfixed32, Value::I32(v)) => writer.write_sfixed32(number, *v),
        (FieldType::Sfixed64, Value::I64(v)) => writer.write_sfixed64(number, *v),
        (FieldType::Bool, Value::Bool(v)) => writer.write_bool(number, *v),
        (FieldType::Enum, Value::Enum(v)) => writer.write_enum(number, *v),
        (FieldType::String, Value::String(v)) => writer.write_string(number, v),
        (FieldType::Bytes, Value::Bytes(v)) => writer.write_bytes(number, v),
        (FieldType::Message, Value::Message(message)) => writer
            .write_message(number, message.encoded_len(), |writer| {
                message.write_fields(writer)
            }),
        (FieldType::Group, Value::Message(message)) => {
            writer.write_group(number, |writer| message.write_fields(writer))
        }
        _ => unreachable!("field value variant checked on insertion"),
    }
}

fn single_len(field: &FieldDescriptor, value: &Value) -> usize {
    let number = field.number();
    match (field.field_type(), value) {
        (FieldType::Message, Value::Message(message)) => {
            let len = message.encoded_len();
            key_len(number) + encoded_len_varint(len as u64) + len
        }
        (FieldType::Group, Value::Message(message)) => {
            2 * key_len(number) + message.encoded_len()
        }
        (field_type, value) => key_len(number) + scalar_payload_len(field_type, value),
    }
}

/// Payload size of one scalar value without its tag.
fn scalar_payload_len(field_type: FieldType, value: &Value) -> usize {
    match (field_type, value) {
        (FieldType::Double | FieldType::Fixed64 | FieldType::Sfixed64, _) => 8,
        (FieldType::Float | FieldType::Fixed32 | FieldType::Sfixed32, _) => 4,
        (FieldType::Int32, Value::I32(v)) => encoded_len_varint(*v as i64 as u64),
        (FieldType::Int64, Value::I64(v)) => encoded_len_varint(*v as u64),
        (FieldType::Uint32, Value::U32(v)) => encoded_len_varint(u64::from(*v)),
        (FieldType::Uint64, Value::U64(v)) => encoded_len_varint(*v),
        (FieldType::Sint32, Value::I32(v)) => encoded_len_varint(u64::from(encode_zigzag32(*v))),
        (FieldType::Sint64, Value::I64(v)) => encoded_len_varint(encode_zigzag64(*v)),
        (FieldType::Bool, Value::Bool(_)) => 1,
        (FieldType::Enum, Value::Enum(v)) => encoded_len_varint(*v as i64 as u64),
        (FieldType::String, Value::String(v)) => {
            encoded_len_varint(v.len() as u64) + v.len()
        }
        (FieldType::Bytes, Value::Bytes(v)) => encoded_len_varint(v.len() as u64) + v.len(),
        _ => unreachable!("field value variant checked on insertion"),
    }
}

fn write_scalar_payload(
    writer: &mut CodedWriter<'_>,
    field_type: FieldType,
    value: &Value,
) -> Result<(), EncodeError> {
    match (field_type, value) {
        (FieldType::Double, Value::F64(v)) => writer.write_raw_fixed64(v.to_bits()),
        (FieldType::Float, Value::F32(v)) => writer.write_raw_fixed32(v.to_bits()),
        (FieldType::Int32, Value::I32(v)) => writer.write_varint(*v as i64 as u64),
        (FieldType::Int64, Value::I64(v)) => writer.write_varint(*v as u64),
        (FieldType::Uint32, Value::U32(v)) => writer.write_varint(u64::from(*v)),
        (FieldType::Uint64, Value::U64(v)) => writer.write_varint(*v),
        (FieldType::Sint32, Value::I32(v)) => {
            writer.write_varint(u64::from(encode_zigzag32(*v)))
        }
        (FieldType::Sint64, Value::I64(v)) => writer.write_varint(encode_zigzag64(*v)),
        (FieldType::Bool, Value::Bool(v)) => writer.write_raw_byte(u8::from(*v)),
        (FieldType::Enum, Value::Enum(v)) => writer.write_varint(*v as i64 as u64),
        (FieldType::Fixed32, Value::U32(v)) => writer.write_raw_fixed32(*v),
        (FieldType::Fixed64, Value::U64(v)) => writer.write_raw_fixed64(*v),
        (FieldType::Sfixed32, Value::I32(v)) => writer.write_raw_fixed32(*v as u32),
        (FieldType::Sfixed64, Value::I64(v)) => writer.write_raw_fixed64(*v as u64),
        _ => unreachable!("field value variant checked on insertion"),
    }
}

fn write_map(
    writer: &mut CodedWriter<'_>,
    field: &FieldDescriptor,
    entries: &[(MapKey, Value)],
) -> Result<(), EncodeError> {
    if writer.is_deterministic() && entries.len() > 1 {
        let mut sorted: Vec<&(MapKey, Value)> = entries.iter().collect();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (key, value) in sorted {
            write_map_entry(writer, field, key, value)?;
        }
        Ok(())
    } else {
        for (key, value) in entries {
            write_map_entry(writer, field, key, value)?;
        }
        Ok(())
    }
}

fn write_map_entry(
    writer: &mut CodedWriter<'_>,
    field: &FieldDescriptor,
    key: &MapKey,
    value: &Value,
) -> Result<(), EncodeError> {
    let entry_type = field.message_type().expect("map fields have an entry type");
    let key_field = entry_type
        .map_entry_key_field()
        .expect("map entries have a key field");
    let value_field = entry_type
        .map_entry_value_field()
        .expect("map entries have a value field");

    let len = map_entry_payload_len(field, key, value);
    writer.write_tag(field.number(), crate::encoding::WireType::LengthDelimited)?;
    writer.write_length(len)?;
    let key_value = Value::from(key.clone());
    if !map_component_is_default(&key_field, &key_value) {
        write_single(writer, &key_field, &key_value)?;
    }
    if !map_component_is_default(&value_field, value) {
        write_single(writer, &value_field, value)?;
    }
    Ok(())
}

fn map_entry_payload_len(field: &FieldDescriptor, key: &MapKey, value: &Value) -> usize {
    let entry_type = field.message_type().expect("map fields have an entry type");
    let key_field = entry_type
        .map_entry_key_field()
        .expect("map entries have a key field");
    let value_field = entry_type
        .map_entry_value_field()
        .expect("map entries have a value field");

    let key_value = Value::from(key.clone());
    let mut len = 0;
    if !map_component_is_default(&key_field, &key_value) {
        len += single_len(&key_field, &key_value);
    }
    if !map_component_is_default(&value_field, value) {
        len += single_len(&value_field, value);
    }
    len
}

/// Default key and value components of a map entry are omitted on the wire.
fn map_component_is_default(field: &FieldDescriptor, value: &Value) -> bool {
    match value {
        Value::Message(message) => message.is_empty(),
        value => Some(value) == field.default_value(),
    }
}
