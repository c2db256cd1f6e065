//! The runtime descriptor graph.
//!
//! Descriptors are built once from [`def`] inputs and are immutable for the
//! life of the process. The graph is cyclic (messages contain fields of
//! their own type), so nodes live in arenas inside a shared pool and every
//! cross-reference is a stable index; the public handle types pair the pool
//! with an index and resolve lazily.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::encoding::WireType;
use crate::error::DescriptorError;
use crate::value::Value;

pub mod def;
mod pool;

pub use def::{EnumDef, EnumValueDef, FieldDef, FileDef, Label, MessageDef, OneofDef};

/// Schema syntax revision of a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    #[default]
    Proto3,
    Editions,
}

/// The eighteen logical field types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Group,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl FieldType {
    /// The wire type a singular value of this field type encodes with.
    pub fn wire_type(self) -> WireType {
        match self {
            FieldType::Int32
            | FieldType::Int64
            | FieldType::Uint32
            | FieldType::Uint64
            | FieldType::Sint32
            | FieldType::Sint64
            | FieldType::Bool
            | FieldType::Enum => WireType::Varint,
            FieldType::Fixed64 | FieldType::Sfixed64 | FieldType::Double => WireType::SixtyFourBit,
            FieldType::Fixed32 | FieldType::Sfixed32 | FieldType::Float => WireType::ThirtyTwoBit,
            FieldType::String | FieldType::Bytes | FieldType::Message => {
                WireType::LengthDelimited
            }
            FieldType::Group => WireType::StartGroup,
        }
    }

    /// Whether repeated values of this type may use the packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(
            self,
            FieldType::String | FieldType::Bytes | FieldType::Message | FieldType::Group
        )
    }
}

/// How presence is tracked for a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// Tracked presence bit (proto2 singular, proto3 singular message).
    Explicit,
    /// No presence: the zero value and absence are indistinguishable
    /// (proto3 singular scalar, and all repeated and map fields).
    Implicit,
    /// Member of a declared oneof.
    OneofMember,
    /// Proto3 `optional`: sole member of a synthetic oneof.
    SyntheticOneof,
}

/// Cardinality of a field, mirroring [`Label`] after validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
}

pub(crate) enum TypeRef {
    Message(usize),
    Enum(usize),
}

pub(crate) struct PoolInner {
    pub(crate) files: Vec<FileInner>,
    pub(crate) messages: Vec<MessageInner>,
    pub(crate) fields: Vec<FieldInner>,
    pub(crate) oneofs: Vec<OneofInner>,
    pub(crate) enums: Vec<EnumInner>,
    pub(crate) types_by_name: HashMap<String, TypeRef>,
    /// Every extension field in the pool.
    pub(crate) extensions: Vec<usize>,
}

pub(crate) struct FileInner {
    pub(crate) name: String,
    pub(crate) package: String,
    pub(crate) syntax: Syntax,
    pub(crate) messages: Vec<usize>,
    pub(crate) enums: Vec<usize>,
    pub(crate) dependencies: Vec<String>,
}

pub(crate) struct MessageInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) file: usize,
    pub(crate) parent: Option<usize>,
    /// Declaration order.
    pub(crate) fields: Vec<usize>,
    pub(crate) fields_by_number: BTreeMap<u32, usize>,
    pub(crate) fields_by_name: HashMap<String, usize>,
    pub(crate) oneofs: Vec<usize>,
    pub(crate) nested_messages: Vec<usize>,
    pub(crate) nested_enums: Vec<usize>,
    pub(crate) extension_ranges: Vec<(u32, u32)>,
    pub(crate) message_set_wire_format: bool,
    pub(crate) map_entry: bool,
}

pub(crate) struct FieldInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) number: u32,
    pub(crate) field_type: FieldType,
    pub(crate) cardinality: Cardinality,
    pub(crate) packed: bool,
    pub(crate) presence: Presence,
    /// The message this field belongs to; for extensions, the extendee.
    pub(crate) containing_message: usize,
    pub(crate) oneof: Option<usize>,
    pub(crate) message_type: Option<usize>,
    pub(crate) enum_type: Option<usize>,
    /// Typed default; `None` for message and group fields.
    pub(crate) default: Option<Value>,
    pub(crate) is_extension: bool,
}

pub(crate) struct OneofInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) message: usize,
    pub(crate) fields: Vec<usize>,
    pub(crate) synthetic: bool,
}

pub(crate) struct EnumValueInner {
    pub(crate) name: String,
    pub(crate) number: i32,
}

pub(crate) struct EnumInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    #[allow(dead_code)]
    pub(crate) file: usize,
    pub(crate) values: Vec<EnumValueInner>,
    /// Closed enums (proto2) reject unknown numbers at parse time.
    pub(crate) closed: bool,
}

/// A built descriptor graph shared by all handles into it.
#[derive(Clone)]
pub struct DescriptorPool {
    inner: Arc<PoolInner>,
}

impl DescriptorPool {
    /// Resolves a set of schema files into an immutable descriptor graph.
    pub fn from_files(files: Vec<FileDef>) -> Result<DescriptorPool, DescriptorError> {
        pool::build(files).map(|inner| DescriptorPool {
            inner: Arc::new(inner),
        })
    }

    pub fn files(&self) -> impl Iterator<Item = FileDescriptor> + '_ {
        (0..self.inner.files.len()).map(move |index| FileDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    /// Looks up a message type by its fully qualified name.
    pub fn message_by_name(&self, full_name: &str) -> Option<MessageDescriptor> {
        match self.inner.types_by_name.get(full_name)? {
            TypeRef::Message(index) => Some(MessageDescriptor {
                inner: self.inner.clone(),
                index: *index,
            }),
            TypeRef::Enum(_) => None,
        }
    }

    /// Looks up an enum type by its fully qualified name.
    pub fn enum_by_name(&self, full_name: &str) -> Option<EnumDescriptor> {
        match self.inner.types_by_name.get(full_name)? {
            TypeRef::Enum(index) => Some(EnumDescriptor {
                inner: self.inner.clone(),
                index: *index,
            }),
            TypeRef::Message(_) => None,
        }
    }

    /// Every extension field declared anywhere in this pool.
    pub fn extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.inner.extensions.iter().map(move |&index| FieldDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }
}

impl fmt::Debug for DescriptorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorPool")
            .field("files", &self.inner.files.len())
            .field("messages", &self.inner.messages.len())
            .finish()
    }
}

macro_rules! handle_identity {
    ($name:ident) => {
        impl PartialEq for $name {
            fn eq(&self, other: &$name) -> bool {
                Arc::ptr_eq(&self.inner, &other.inner) && self.index == other.index
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (Arc::as_ptr(&self.inner) as usize).hash(state);
                self.index.hash(state);
            }
        }
    };
}

/// A handle to one file in a pool.
#[derive(Clone)]
pub struct FileDescriptor {
    inner: Arc<PoolInner>,
    index: usize,
}

handle_identity!(FileDescriptor);

impl FileDescriptor {
    fn get(&self) -> &FileInner {
        &self.inner.files[self.index]
    }

    pub fn name(&self) -> &str {
        &self.get().name
    }

    pub fn package(&self) -> &str {
        &self.get().package
    }

    pub fn syntax(&self) -> Syntax {
        self.get().syntax
    }

    pub fn messages(&self) -> impl Iterator<Item = MessageDescriptor> + '_ {
        self.get().messages.iter().map(move |&index| MessageDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = EnumDescriptor> + '_ {
        self.get().enums.iter().map(move |&index| EnumDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    pub fn dependencies(&self) -> &[String] {
        &self.get().dependencies
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDescriptor({})", self.name())
    }
}

/// A handle to one message type in a pool.
#[derive(Clone)]
pub struct MessageDescriptor {
    pub(crate) inner: Arc<PoolInner>,
    pub(crate) index: usize,
}

handle_identity!(MessageDescriptor);

impl MessageDescriptor {
    fn get(&self) -> &MessageInner {
        &self.inner.messages[self.index]
    }

    pub fn name(&self) -> &str {
        &self.get().name
    }

    pub fn full_name(&self) -> &str {
        &self.get().full_name
    }

    pub fn file(&self) -> FileDescriptor {
        FileDescriptor {
            inner: self.inner.clone(),
            index: self.get().file,
        }
    }

    pub fn syntax(&self) -> Syntax {
        self.inner.files[self.get().file].syntax
    }

    pub fn parent_message(&self) -> Option<MessageDescriptor> {
        self.get().parent.map(|index| MessageDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.get().fields.iter().map(move |&index| FieldDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    pub fn field(&self, number: u32) -> Option<FieldDescriptor> {
        self.get()
            .fields_by_number
            .get(&number)
            .map(|&index| FieldDescriptor {
                inner: self.inner.clone(),
                index,
            })
    }

    pub fn field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.get()
            .fields_by_name
            .get(name)
            .map(|&index| FieldDescriptor {
                inner: self.inner.clone(),
                index,
            })
    }

    /// All oneofs, declared ones first, synthetic ones after.
    pub fn oneofs(&self) -> impl Iterator<Item = OneofDescriptor> + '_ {
        self.get().oneofs.iter().map(move |&index| OneofDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    pub fn nested_messages(&self) -> impl Iterator<Item = MessageDescriptor> + '_ {
        self.get()
            .nested_messages
            .iter()
            .map(move |&index| MessageDescriptor {
                inner: self.inner.clone(),
                index,
            })
    }

    pub fn nested_enums(&self) -> impl Iterator<Item = EnumDescriptor> + '_ {
        self.get().nested_enums.iter().map(move |&index| EnumDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    pub fn extension_ranges(&self) -> &[(u32, u32)] {
        &self.get().extension_ranges
    }

    /// Whether `number` falls in one of this message's extension ranges.
    pub fn is_extension_number(&self, number: u32) -> bool {
        self.get()
            .extension_ranges
            .iter()
            .any(|&(start, end)| (start..=end).contains(&number))
    }

    pub fn message_set_wire_format(&self) -> bool {
        self.get().message_set_wire_format
    }

    pub fn is_map_entry(&self) -> bool {
        self.get().map_entry
    }

    /// Key field of a map entry message.
    pub fn map_entry_key_field(&self) -> Option<FieldDescriptor> {
        if !self.is_map_entry() {
            return None;
        }
        self.field(1)
    }

    /// Value field of a map entry message.
    pub fn map_entry_value_field(&self) -> Option<FieldDescriptor> {
        if !self.is_map_entry() {
            return None;
        }
        self.field(2)
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageDescriptor({})", self.full_name())
    }
}

/// A handle to one field (or extension) in a pool.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) inner: Arc<PoolInner>,
    pub(crate) index: usize,
}

handle_identity!(FieldDescriptor);

impl FieldDescriptor {
    fn get(&self) -> &FieldInner {
        &self.inner.fields[self.index]
    }

    pub fn name(&self) -> &str {
        &self.get().name
    }

    pub fn full_name(&self) -> &str {
        &self.get().full_name
    }

    pub fn number(&self) -> u32 {
        self.get().number
    }

    pub fn field_type(&self) -> FieldType {
        self.get().field_type
    }

    pub fn cardinality(&self) -> Cardinality {
        self.get().cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.get().cardinality == Cardinality::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.get().cardinality == Cardinality::Required
    }

    /// Whether repeated values of this field use the packed encoding when
    /// serialized.
    pub fn is_packed(&self) -> bool {
        self.get().packed
    }

    pub fn is_packable(&self) -> bool {
        self.is_repeated() && self.field_type().is_packable()
    }

    pub fn presence(&self) -> Presence {
        self.get().presence
    }

    pub fn is_extension(&self) -> bool {
        self.get().is_extension
    }

    /// The message this field belongs to. For extensions this is the
    /// extended message.
    pub fn containing_message(&self) -> MessageDescriptor {
        MessageDescriptor {
            inner: self.inner.clone(),
            index: self.get().containing_message,
        }
    }

    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        self.get().oneof.map(|index| OneofDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    pub fn message_type(&self) -> Option<MessageDescriptor> {
        self.get().message_type.map(|index| MessageDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    pub fn enum_type(&self) -> Option<EnumDescriptor> {
        self.get().enum_type.map(|index| EnumDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    /// Whether this is a map field: a repeated message field whose type is a
    /// map entry.
    pub fn is_map(&self) -> bool {
        self.is_repeated()
            && self
                .message_type()
                .is_some_and(|message| message.is_map_entry())
    }

    /// The default for absent singular values; `None` for message and group
    /// fields.
    pub fn default_value(&self) -> Option<&Value> {
        self.get().default.as_ref()
    }

    /// The wire type of one value of this field (ignoring packing).
    pub fn wire_type(&self) -> WireType {
        self.get().field_type.wire_type()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldDescriptor({})", self.full_name())
    }
}

/// A handle to one oneof in a pool.
#[derive(Clone)]
pub struct OneofDescriptor {
    inner: Arc<PoolInner>,
    index: usize,
}

handle_identity!(OneofDescriptor);

impl OneofDescriptor {
    fn get(&self) -> &OneofInner {
        &self.inner.oneofs[self.index]
    }

    pub fn name(&self) -> &str {
        &self.get().name
    }

    pub fn full_name(&self) -> &str {
        &self.get().full_name
    }

    pub fn containing_message(&self) -> MessageDescriptor {
        MessageDescriptor {
            inner: self.inner.clone(),
            index: self.get().message,
        }
    }

    /// Member fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.get().fields.iter().map(move |&index| FieldDescriptor {
            inner: self.inner.clone(),
            index,
        })
    }

    /// Whether this oneof was synthesized for a proto3 `optional` field.
    pub fn is_synthetic(&self) -> bool {
        self.get().synthetic
    }
}

impl fmt::Debug for OneofDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OneofDescriptor({})", self.full_name())
    }
}

/// A handle to one enum type in a pool.
#[derive(Clone)]
pub struct EnumDescriptor {
    inner: Arc<PoolInner>,
    index: usize,
}

handle_identity!(EnumDescriptor);

impl EnumDescriptor {
    fn get(&self) -> &EnumInner {
        &self.inner.enums[self.index]
    }

    pub fn name(&self) -> &str {
        &self.get().name
    }

    pub fn full_name(&self) -> &str {
        &self.get().full_name
    }

    /// Values as `(name, number)` pairs in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.get()
            .values
            .iter()
            .map(|value| (value.name.as_str(), value.number))
    }

    /// The name of the first value declared with `number`.
    pub fn value_name(&self, number: i32) -> Option<&str> {
        self.get()
            .values
            .iter()
            .find(|value| value.number == number)
            .map(|value| value.name.as_str())
    }

    pub fn value_number(&self, name: &str) -> Option<i32> {
        self.get()
            .values
            .iter()
            .find(|value| value.name == name)
            .map(|value| value.number)
    }

    pub fn contains_number(&self, number: i32) -> bool {
        self.get().values.iter().any(|value| value.number == number)
    }

    /// The number of the first declared value.
    pub fn default_number(&self) -> i32 {
        self.get().values.first().map_or(0, |value| value.number)
    }

    /// Closed enums (proto2 files) route unknown numbers to unknown fields
    /// at parse time; open enums store them as-is.
    pub fn is_closed(&self) -> bool {
        self.get().closed
    }
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumDescriptor({})", self.full_name())
    }
}
