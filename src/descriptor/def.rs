//! Plain-data inputs for building a descriptor pool.
//!
//! These mirror the shape of compiled schema descriptors: a schema compiler
//! (or hand-written test fixture) produces `*Def` values, and
//! [`DescriptorPool::from_files`](crate::descriptor::DescriptorPool::from_files)
//! resolves them into the immutable descriptor graph.

use crate::descriptor::{FieldType, Syntax};
use crate::value::Value;

/// One schema file.
#[derive(Clone, Debug, Default)]
pub struct FileDef {
    pub name: String,
    pub package: String,
    pub syntax: Syntax,
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
    /// Extensions declared at file scope.
    pub extensions: Vec<FieldDef>,
    /// Names of files this one imports.
    pub dependencies: Vec<String>,
}

impl FileDef {
    pub fn new(name: impl Into<String>) -> FileDef {
        FileDef {
            name: name.into(),
            ..FileDef::default()
        }
    }
}

/// One message type.
#[derive(Clone, Debug, Default)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub oneofs: Vec<OneofDef>,
    pub nested_messages: Vec<MessageDef>,
    pub nested_enums: Vec<EnumDef>,
    /// Inclusive `(start, end)` field number ranges open for extension.
    pub extension_ranges: Vec<(u32, u32)>,
    /// Extensions declared inside this message.
    pub extensions: Vec<FieldDef>,
    pub message_set_wire_format: bool,
    pub map_entry: bool,
}

impl MessageDef {
    pub fn new(name: impl Into<String>) -> MessageDef {
        MessageDef {
            name: name.into(),
            ..MessageDef::default()
        }
    }

    /// A synthetic map entry message: field 1 is the key, field 2 the value.
    pub fn map_entry(name: impl Into<String>, key: FieldDef, value: FieldDef) -> MessageDef {
        MessageDef {
            name: name.into(),
            fields: vec![key, value],
            map_entry: true,
            ..MessageDef::default()
        }
    }
}

/// One oneof declaration. Fields join it through
/// [`FieldDef::in_oneof`].
#[derive(Clone, Debug, Default)]
pub struct OneofDef {
    pub name: String,
}

impl OneofDef {
    pub fn new(name: impl Into<String>) -> OneofDef {
        OneofDef { name: name.into() }
    }
}

/// Cardinality of a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Label {
    #[default]
    Optional,
    /// Proto2 only.
    Required,
    Repeated,
}

/// One field, regular or extension.
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: String,
    pub number: u32,
    pub field_type: FieldType,
    /// Full name of the message or enum type, for those field types.
    pub type_name: String,
    pub label: Label,
    /// Explicit `[packed = ...]` option; `None` takes the syntax default.
    pub packed: Option<bool>,
    /// Index into the containing message's `oneofs`.
    pub oneof_index: Option<usize>,
    /// Proto3 explicit-presence marker; builds a synthetic oneof.
    pub proto3_optional: bool,
    /// Proto2 custom default. Enum defaults are given as `Value::Enum`.
    pub default: Option<Value>,
    /// Full name of the extended message; non-empty exactly for extensions.
    pub extendee: String,
}

impl FieldDef {
    pub fn scalar(name: impl Into<String>, number: u32, field_type: FieldType) -> FieldDef {
        debug_assert!(!matches!(
            field_type,
            FieldType::Message | FieldType::Group | FieldType::Enum
        ));
        FieldDef::with_type(name, number, field_type, String::new())
    }

    pub fn message(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> FieldDef {
        FieldDef::with_type(name, number, FieldType::Message, type_name.into())
    }

    pub fn group(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> FieldDef {
        FieldDef::with_type(name, number, FieldType::Group, type_name.into())
    }

    pub fn enumeration(
        name: impl Into<String>,
        number: u32,
        type_name: impl Into<String>,
    ) -> FieldDef {
        FieldDef::with_type(name, number, FieldType::Enum, type_name.into())
    }

    fn with_type(
        name: impl Into<String>,
        number: u32,
        field_type: FieldType,
        type_name: String,
    ) -> FieldDef {
        FieldDef {
            name: name.into(),
            number,
            field_type,
            type_name,
            label: Label::Optional,
            packed: None,
            oneof_index: None,
            proto3_optional: false,
            default: None,
            extendee: String::new(),
        }
    }

    pub fn repeated(mut self) -> FieldDef {
        self.label = Label::Repeated;
        self
    }

    pub fn required(mut self) -> FieldDef {
        self.label = Label::Required;
        self
    }

    pub fn packed(mut self, packed: bool) -> FieldDef {
        self.packed = Some(packed);
        self
    }

    pub fn in_oneof(mut self, index: usize) -> FieldDef {
        self.oneof_index = Some(index);
        self
    }

    pub fn proto3_optional(mut self) -> FieldDef {
        self.proto3_optional = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> FieldDef {
        self.default = Some(default);
        self
    }

    pub fn extending(mut self, extendee: impl Into<String>) -> FieldDef {
        self.extendee = extendee.into();
        self
    }
}

/// One enum type.
#[derive(Clone, Debug, Default)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<EnumValueDef>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> EnumDef {
        EnumDef {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i32) -> EnumDef {
        self.values.push(EnumValueDef {
            name: name.into(),
            number,
        });
        self
    }
}

/// One enum value.
#[derive(Clone, Debug)]
pub struct EnumValueDef {
    pub name: String,
    pub number: i32,
}
