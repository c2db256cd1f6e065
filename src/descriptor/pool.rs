//! Two-pass construction of the descriptor arena.
//!
//! Pass one allocates every node and records full names; pass two resolves
//! type references, extendees, packed policy, presence rules, and defaults.
//! Cycles are fine because cross-references are arena indices.

use std::collections::{BTreeMap, HashMap};

use crate::descriptor::def::{EnumDef, FieldDef, FileDef, Label, MessageDef};
use crate::descriptor::{
    Cardinality, EnumInner, EnumValueInner, FieldInner, FieldType, FileInner, MessageInner,
    OneofInner, PoolInner, Presence, Syntax, TypeRef,
};
use crate::encoding::is_valid_field_number;
use crate::error::DescriptorError;
use crate::value::Value;

struct Pending {
    field: usize,
    type_name: String,
    extendee: String,
    default: Option<Value>,
    packed: Option<bool>,
    syntax: Syntax,
}

pub(crate) fn build(files: Vec<FileDef>) -> Result<PoolInner, DescriptorError> {
    let mut pool = PoolInner {
        files: Vec::new(),
        messages: Vec::new(),
        fields: Vec::new(),
        oneofs: Vec::new(),
        enums: Vec::new(),
        types_by_name: HashMap::new(),
        extensions: Vec::new(),
    };
    let mut pending = Vec::new();

    for file in &files {
        let file_index = pool.files.len();
        pool.files.push(FileInner {
            name: file.name.clone(),
            package: file.package.clone(),
            syntax: file.syntax,
            messages: Vec::new(),
            enums: Vec::new(),
            dependencies: file.dependencies.clone(),
        });
        let prefix = if file.package.is_empty() {
            String::new()
        } else {
            format!("{}.", file.package)
        };
        for message in &file.messages {
            let index = add_message(
                &mut pool,
                &mut pending,
                message,
                file_index,
                None,
                &prefix,
                file.syntax,
            )?;
            pool.files[file_index].messages.push(index);
        }
        for enum_def in &file.enums {
            let index = add_enum(&mut pool, enum_def, file_index, &prefix, file.syntax)?;
            pool.files[file_index].enums.push(index);
        }
        for extension in &file.extensions {
            add_extension(&mut pool, &mut pending, extension, &prefix, file.syntax)?;
        }
    }

    resolve(&mut pool, pending)?;
    Ok(pool)
}

fn add_message(
    pool: &mut PoolInner,
    pending: &mut Vec<Pending>,
    def: &MessageDef,
    file: usize,
    parent: Option<usize>,
    prefix: &str,
    syntax: Syntax,
) -> Result<usize, DescriptorError> {
    if def.name.is_empty() {
        return Err(DescriptorError::new("message with empty name"));
    }
    let full_name = format!("{prefix}{}", def.name);
    if pool.types_by_name.contains_key(&full_name) {
        return Err(DescriptorError::new(format!(
            "duplicate type name: {full_name}"
        )));
    }

    let message_index = pool.messages.len();
    pool.messages.push(MessageInner {
        name: def.name.clone(),
        full_name: full_name.clone(),
        file,
        parent,
        fields: Vec::new(),
        fields_by_number: BTreeMap::new(),
        fields_by_name: HashMap::new(),
        oneofs: Vec::new(),
        nested_messages: Vec::new(),
        nested_enums: Vec::new(),
        extension_ranges: def.extension_ranges.clone(),
        message_set_wire_format: def.message_set_wire_format,
        map_entry: def.map_entry,
    });
    pool.types_by_name
        .insert(full_name.clone(), TypeRef::Message(message_index));

    for &(start, end) in &def.extension_ranges {
        if start > end || !is_valid_field_number(start) || !is_valid_field_number(end) {
            return Err(DescriptorError::new(format!(
                "{full_name}: invalid extension range {start}..{end}"
            )));
        }
    }

    for oneof_def in &def.oneofs {
        let oneof_index = pool.oneofs.len();
        pool.oneofs.push(OneofInner {
            name: oneof_def.name.clone(),
            full_name: format!("{full_name}.{}", oneof_def.name),
            message: message_index,
            fields: Vec::new(),
            synthetic: false,
        });
        pool.messages[message_index].oneofs.push(oneof_index);
    }

    for field_def in &def.fields {
        add_field(pool, pending, field_def, message_index, def, &full_name, syntax)?;
    }

    // Every declared oneof must have gained at least one member.
    for index in 0..def.oneofs.len() {
        let oneof_index = pool.messages[message_index].oneofs[index];
        if pool.oneofs[oneof_index].fields.is_empty() {
            return Err(DescriptorError::new(format!(
                "{}: oneof has no fields",
                pool.oneofs[oneof_index].full_name
            )));
        }
    }

    if def.map_entry {
        validate_map_entry(def, &full_name)?;
    }

    let nested_prefix = format!("{full_name}.");
    for nested in &def.nested_messages {
        let index = add_message(
            pool,
            pending,
            nested,
            file,
            Some(message_index),
            &nested_prefix,
            syntax,
        )?;
        pool.messages[message_index].nested_messages.push(index);
    }
    for enum_def in &def.nested_enums {
        let index = add_enum(pool, enum_def, file, &nested_prefix, syntax)?;
        pool.messages[message_index].nested_enums.push(index);
    }
    for extension in &def.extensions {
        add_extension(pool, pending, extension, &nested_prefix, syntax)?;
    }

    Ok(message_index)
}

fn add_field(
    pool: &mut PoolInner,
    pending: &mut Vec<Pending>,
    def: &FieldDef,
    message_index: usize,
    message_def: &MessageDef,
    message_full_name: &str,
    syntax: Syntax,
) -> Result<(), DescriptorError> {
    let context = format!("{message_full_name}.{}", def.name);
    validate_field_def(def, &context, syntax)?;

    if message_def.map_entry && def.oneof_index.is_some() {
        return Err(DescriptorError::new(format!(
            "{context}: map entry fields may not join a oneof"
        )));
    }

    let oneof = match def.oneof_index {
        Some(index) => {
            let oneofs = &pool.messages[message_index].oneofs;
            let oneof_index = *oneofs.get(index).ok_or_else(|| {
                DescriptorError::new(format!("{context}: oneof index {index} out of range"))
            })?;
            if def.label == Label::Repeated {
                return Err(DescriptorError::new(format!(
                    "{context}: repeated fields may not join a oneof"
                )));
            }
            Some(oneof_index)
        }
        None => None,
    };

    let field_index = pool.fields.len();
    pool.fields.push(FieldInner {
        name: def.name.clone(),
        full_name: context.clone(),
        number: def.number,
        field_type: def.field_type,
        cardinality: cardinality_of(def.label),
        packed: false,
        presence: Presence::Implicit,
        containing_message: message_index,
        oneof,
        message_type: None,
        enum_type: None,
        default: None,
        is_extension: false,
    });

    let message = &mut pool.messages[message_index];
    if message
        .fields_by_number
        .insert(def.number, field_index)
        .is_some()
    {
        return Err(DescriptorError::new(format!(
            "{context}: duplicate field number {}",
            def.number
        )));
    }
    if message
        .fields_by_name
        .insert(def.name.clone(), field_index)
        .is_some()
    {
        return Err(DescriptorError::new(format!(
            "{context}: duplicate field name"
        )));
    }
    message.fields.push(field_index);

    if let Some(oneof_index) = oneof {
        pool.oneofs[oneof_index].fields.push(field_index);
    }

    if def.proto3_optional {
        let oneof_index = pool.oneofs.len();
        pool.oneofs.push(OneofInner {
            name: format!("_{}", def.name),
            full_name: format!("{message_full_name}._{}", def.name),
            message: message_index,
            fields: vec![field_index],
            synthetic: true,
        });
        pool.messages[message_index].oneofs.push(oneof_index);
        pool.fields[field_index].oneof = Some(oneof_index);
    }

    pending.push(Pending {
        field: field_index,
        type_name: def.type_name.clone(),
        extendee: String::new(),
        default: def.default.clone(),
        packed: def.packed,
        syntax,
    });
    Ok(())
}

fn add_extension(
    pool: &mut PoolInner,
    pending: &mut Vec<Pending>,
    def: &FieldDef,
    prefix: &str,
    syntax: Syntax,
) -> Result<(), DescriptorError> {
    let context = format!("{prefix}{}", def.name);
    validate_field_def(def, &context, syntax)?;
    if def.extendee.is_empty() {
        return Err(DescriptorError::new(format!(
            "{context}: extension without extendee"
        )));
    }
    if def.oneof_index.is_some() || def.proto3_optional {
        return Err(DescriptorError::new(format!(
            "{context}: extensions may not join a oneof"
        )));
    }

    let field_index = pool.fields.len();
    pool.fields.push(FieldInner {
        name: def.name.clone(),
        full_name: context,
        number: def.number,
        field_type: def.field_type,
        cardinality: cardinality_of(def.label),
        packed: false,
        presence: Presence::Implicit,
        // Re-pointed at the extendee during resolution.
        containing_message: usize::MAX,
        oneof: None,
        message_type: None,
        enum_type: None,
        default: None,
        is_extension: true,
    });
    pool.extensions.push(field_index);

    pending.push(Pending {
        field: field_index,
        type_name: def.type_name.clone(),
        extendee: def.extendee.clone(),
        default: def.default.clone(),
        packed: def.packed,
        syntax,
    });
    Ok(())
}

fn validate_field_def(
    def: &FieldDef,
    context: &str,
    syntax: Syntax,
) -> Result<(), DescriptorError> {
    if def.name.is_empty() {
        return Err(DescriptorError::new("field with empty name"));
    }
    if !is_valid_field_number(def.number) {
        return Err(DescriptorError::new(format!(
            "{context}: invalid field number {}",
            def.number
        )));
    }
    if def.label == Label::Required && syntax != Syntax::Proto2 {
        return Err(DescriptorError::new(format!(
            "{context}: required fields exist only in proto2"
        )));
    }
    if def.field_type == FieldType::Group && syntax != Syntax::Proto2 {
        return Err(DescriptorError::new(format!(
            "{context}: group fields exist only in proto2"
        )));
    }
    if def.proto3_optional && syntax != Syntax::Proto3 {
        return Err(DescriptorError::new(format!(
            "{context}: proto3_optional outside proto3"
        )));
    }
    if def.proto3_optional && (def.oneof_index.is_some() || def.label == Label::Repeated) {
        return Err(DescriptorError::new(format!(
            "{context}: proto3_optional field may not be repeated or in a oneof"
        )));
    }
    if def.packed == Some(true)
        && !(def.label == Label::Repeated && def.field_type.is_packable())
    {
        return Err(DescriptorError::new(format!(
            "{context}: packed applies only to repeated primitive fields"
        )));
    }
    let needs_type_name = matches!(
        def.field_type,
        FieldType::Message | FieldType::Group | FieldType::Enum
    );
    if needs_type_name == def.type_name.is_empty() {
        return Err(DescriptorError::new(format!(
            "{context}: type name {} for field type {:?}",
            if needs_type_name { "missing" } else { "unexpected" },
            def.field_type
        )));
    }
    Ok(())
}

fn validate_map_entry(def: &MessageDef, full_name: &str) -> Result<(), DescriptorError> {
    let err = |reason: &str| {
        Err(DescriptorError::new(format!("{full_name}: {reason}")))
    };
    if def.fields.len() != 2 {
        return err("map entry must have exactly a key and a value field");
    }
    let key = &def.fields[0];
    let value = &def.fields[1];
    if key.number != 1 || value.number != 2 {
        return err("map entry key must be field 1 and value field 2");
    }
    if key.label == Label::Repeated || value.label == Label::Repeated {
        return err("map entry fields may not be repeated");
    }
    if crate::value::MapKey::default_for(key.field_type).is_none() {
        return err("map key must be an integral, bool, or string type");
    }
    Ok(())
}

fn cardinality_of(label: Label) -> Cardinality {
    match label {
        Label::Optional => Cardinality::Optional,
        Label::Required => Cardinality::Required,
        Label::Repeated => Cardinality::Repeated,
    }
}

fn resolve(pool: &mut PoolInner, pending: Vec<Pending>) -> Result<(), DescriptorError> {
    for p in pending {
        let context = pool.fields[p.field].full_name.clone();
        let field_type = pool.fields[p.field].field_type;
        let cardinality = pool.fields[p.field].cardinality;

        let mut message_type = None;
        let mut enum_type = None;
        let mut default = None;

        match field_type {
            FieldType::Message | FieldType::Group => {
                match pool.types_by_name.get(&p.type_name) {
                    Some(TypeRef::Message(index)) => message_type = Some(*index),
                    _ => {
                        return Err(DescriptorError::new(format!(
                            "{context}: unresolved message type {}",
                            p.type_name
                        )))
                    }
                }
                if p.default.is_some() {
                    return Err(DescriptorError::new(format!(
                        "{context}: message fields cannot have a default"
                    )));
                }
            }
            FieldType::Enum => {
                let index = match pool.types_by_name.get(&p.type_name) {
                    Some(TypeRef::Enum(index)) => *index,
                    _ => {
                        return Err(DescriptorError::new(format!(
                            "{context}: unresolved enum type {}",
                            p.type_name
                        )))
                    }
                };
                enum_type = Some(index);
                let number = match p.default {
                    Some(Value::Enum(number)) => {
                        if !pool.enums[index].values.iter().any(|v| v.number == number) {
                            return Err(DescriptorError::new(format!(
                                "{context}: default {number} is not a value of {}",
                                pool.enums[index].full_name
                            )));
                        }
                        number
                    }
                    Some(_) => {
                        return Err(DescriptorError::new(format!(
                            "{context}: enum default must be an enum value"
                        )))
                    }
                    None => pool.enums[index].values.first().map_or(0, |v| v.number),
                };
                default = Some(Value::Enum(number));
            }
            _ => {
                let zero = Value::default_for(field_type)
                    .expect("scalar field types always have a zero value");
                let value = match p.default {
                    Some(value) => {
                        if core::mem::discriminant(&value) != core::mem::discriminant(&zero) {
                            return Err(DescriptorError::new(format!(
                                "{context}: default value type does not match field type"
                            )));
                        }
                        value
                    }
                    None => zero,
                };
                default = Some(value);
            }
        }

        let is_extension = pool.fields[p.field].is_extension;
        let mut containing_message = pool.fields[p.field].containing_message;
        if is_extension {
            let extendee_index = match pool.types_by_name.get(&p.extendee) {
                Some(TypeRef::Message(index)) => *index,
                _ => {
                    return Err(DescriptorError::new(format!(
                        "{context}: unresolved extendee {}",
                        p.extendee
                    )))
                }
            };
            let number = pool.fields[p.field].number;
            let in_range = pool.messages[extendee_index]
                .extension_ranges
                .iter()
                .any(|&(start, end)| (start..=end).contains(&number));
            if !in_range {
                return Err(DescriptorError::new(format!(
                    "{context}: field number {number} is not in an extension range of {}",
                    pool.messages[extendee_index].full_name
                )));
            }
            containing_message = extendee_index;
        }

        let packed = cardinality == Cardinality::Repeated
            && field_type.is_packable()
            && p.packed.unwrap_or(p.syntax != Syntax::Proto2);

        let oneof = pool.fields[p.field].oneof;
        let synthetic = oneof.is_some_and(|index| pool.oneofs[index].synthetic);
        let presence = if cardinality == Cardinality::Repeated {
            Presence::Implicit
        } else if synthetic {
            Presence::SyntheticOneof
        } else if oneof.is_some() {
            Presence::OneofMember
        } else if p.syntax != Syntax::Proto3 {
            Presence::Explicit
        } else if matches!(field_type, FieldType::Message | FieldType::Group) {
            Presence::Explicit
        } else {
            Presence::Implicit
        };

        let field = &mut pool.fields[p.field];
        field.message_type = message_type;
        field.enum_type = enum_type;
        field.default = default;
        field.containing_message = containing_message;
        field.packed = packed;
        field.presence = presence;
    }
    Ok(())
}

fn add_enum(
    pool: &mut PoolInner,
    def: &EnumDef,
    file: usize,
    prefix: &str,
    syntax: Syntax,
) -> Result<usize, DescriptorError> {
    if def.name.is_empty() {
        return Err(DescriptorError::new("enum with empty name"));
    }
    let full_name = format!("{prefix}{}", def.name);
    if pool.types_by_name.contains_key(&full_name) {
        return Err(DescriptorError::new(format!(
            "duplicate type name: {full_name}"
        )));
    }
    if def.values.is_empty() {
        return Err(DescriptorError::new(format!(
            "{full_name}: enum with no values"
        )));
    }
    if syntax == Syntax::Proto3 && def.values[0].number != 0 {
        return Err(DescriptorError::new(format!(
            "{full_name}: the first proto3 enum value must be zero"
        )));
    }

    let index = pool.enums.len();
    pool.enums.push(EnumInner {
        name: def.name.clone(),
        full_name: full_name.clone(),
        file,
        values: def
            .values
            .iter()
            .map(|value| EnumValueInner {
                name: value.name.clone(),
                number: value.number,
            })
            .collect(),
        closed: syntax == Syntax::Proto2,
    });
    pool.types_by_name.insert(full_name, TypeRef::Enum(index));
    Ok(index)
}

#[cfg(test)]
mod tests {
    use crate::descriptor::{
        DescriptorPool, EnumDef, FieldDef, FieldType, FileDef, Label, MessageDef, OneofDef,
        Presence, Syntax,
    };
    use crate::value::Value;

    fn proto3_file() -> FileDef {
        let mut file = FileDef::new("test.proto");
        file.package = "test".into();
        file.syntax = Syntax::Proto3;
        file
    }

    #[test]
    fn builds_and_resolves_cross_references() {
        let mut file = proto3_file();
        let mut node = MessageDef::new("Node");
        node.fields.push(FieldDef::scalar("id", 1, FieldType::Int32));
        // Self-referential: the graph is cyclic.
        node.fields
            .push(FieldDef::message("next", 2, "test.Node").repeated());
        file.messages.push(node);

        let pool = DescriptorPool::from_files(vec![file]).unwrap();
        let node = pool.message_by_name("test.Node").unwrap();
        assert_eq!(node.full_name(), "test.Node");
        let next = node.field_by_name("next").unwrap();
        assert_eq!(next.message_type().unwrap(), node);
        assert_eq!(next.number(), 2);
        assert!(next.is_repeated());
        assert_eq!(node.field(1).unwrap().name(), "id");
        assert!(node.field(3).is_none());
    }

    #[test]
    fn packed_policy_follows_syntax() {
        let mut file = proto3_file();
        let mut message = MessageDef::new("M");
        message
            .fields
            .push(FieldDef::scalar("a", 1, FieldType::Int32).repeated());
        message
            .fields
            .push(FieldDef::scalar("b", 2, FieldType::Int32).repeated().packed(false));
        message
            .fields
            .push(FieldDef::scalar("c", 3, FieldType::String).repeated());
        file.messages.push(message);

        let mut file2 = FileDef::new("test2.proto");
        file2.package = "test2".into();
        file2.syntax = Syntax::Proto2;
        let mut message2 = MessageDef::new("M");
        message2
            .fields
            .push(FieldDef::scalar("a", 1, FieldType::Int32).repeated());
        message2
            .fields
            .push(FieldDef::scalar("b", 2, FieldType::Int32).repeated().packed(true));
        file2.messages.push(message2);

        let pool = DescriptorPool::from_files(vec![file, file2]).unwrap();
        let m = pool.message_by_name("test.M").unwrap();
        assert!(m.field(1).unwrap().is_packed());
        assert!(!m.field(2).unwrap().is_packed());
        // Strings never pack.
        assert!(!m.field(3).unwrap().is_packed());

        let m2 = pool.message_by_name("test2.M").unwrap();
        assert!(!m2.field(1).unwrap().is_packed());
        assert!(m2.field(2).unwrap().is_packed());
    }

    #[test]
    fn presence_rules() {
        let mut file = proto3_file();
        let mut message = MessageDef::new("M");
        message.oneofs.push(OneofDef::new("choice"));
        message
            .fields
            .push(FieldDef::scalar("implicit", 1, FieldType::Int32));
        message
            .fields
            .push(FieldDef::scalar("explicit", 2, FieldType::Int32).proto3_optional());
        message
            .fields
            .push(FieldDef::scalar("member", 3, FieldType::Int32).in_oneof(0));
        message
            .fields
            .push(FieldDef::message("sub", 4, "test.M"));
        message
            .fields
            .push(FieldDef::scalar("rep", 5, FieldType::Int32).repeated());
        file.messages.push(message);

        let pool = DescriptorPool::from_files(vec![file]).unwrap();
        let m = pool.message_by_name("test.M").unwrap();
        assert_eq!(m.field(1).unwrap().presence(), Presence::Implicit);
        assert_eq!(m.field(2).unwrap().presence(), Presence::SyntheticOneof);
        assert_eq!(m.field(3).unwrap().presence(), Presence::OneofMember);
        assert_eq!(m.field(4).unwrap().presence(), Presence::Explicit);
        assert_eq!(m.field(5).unwrap().presence(), Presence::Implicit);

        // The synthetic oneof exists, carries one field, and follows the
        // declared oneof.
        let oneofs: Vec<_> = m.oneofs().collect();
        assert_eq!(oneofs.len(), 2);
        assert!(!oneofs[0].is_synthetic());
        assert!(oneofs[1].is_synthetic());
        assert_eq!(oneofs[1].name(), "_explicit");
        assert_eq!(oneofs[1].fields().count(), 1);
        assert_eq!(
            m.field(2).unwrap().containing_oneof().unwrap(),
            oneofs[1]
        );
    }

    #[test]
    fn enum_defaults_and_closedness() {
        let mut file = FileDef::new("test.proto");
        file.package = "test".into();
        file.syntax = Syntax::Proto2;
        file.enums
            .push(EnumDef::new("Color").value("RED", 5).value("GREEN", 6));
        let mut message = MessageDef::new("M");
        message
            .fields
            .push(FieldDef::enumeration("color", 1, "test.Color"));
        message.fields.push(
            FieldDef::enumeration("other", 2, "test.Color").with_default(Value::Enum(6)),
        );
        file.messages.push(message);

        let pool = DescriptorPool::from_files(vec![file]).unwrap();
        let color = pool.enum_by_name("test.Color").unwrap();
        assert!(color.is_closed());
        assert_eq!(color.default_number(), 5);
        assert_eq!(color.value_name(6), Some("GREEN"));
        assert_eq!(color.value_number("RED"), Some(5));
        assert!(!color.contains_number(7));

        let m = pool.message_by_name("test.M").unwrap();
        assert_eq!(m.field(1).unwrap().default_value(), Some(&Value::Enum(5)));
        assert_eq!(m.field(2).unwrap().default_value(), Some(&Value::Enum(6)));
    }

    #[test]
    fn extensions_must_land_in_a_declared_range() {
        let mut file = FileDef::new("test.proto");
        file.package = "test".into();
        file.syntax = Syntax::Proto2;
        let mut base = MessageDef::new("Base");
        base.fields.push(FieldDef::scalar("id", 1, FieldType::Int32));
        base.extension_ranges.push((100, 199));
        file.messages.push(base);
        file.extensions
            .push(FieldDef::scalar("ext", 150, FieldType::String).extending("test.Base"));

        let pool = DescriptorPool::from_files(vec![file.clone()]).unwrap();
        let ext = pool.extensions().next().unwrap();
        assert!(ext.is_extension());
        assert_eq!(ext.containing_message().full_name(), "test.Base");
        assert_eq!(ext.number(), 150);

        file.extensions[0] = FieldDef::scalar("ext", 250, FieldType::String).extending("test.Base");
        assert!(DescriptorPool::from_files(vec![file]).is_err());
    }

    #[test]
    fn map_fields_are_detected() {
        let mut file = proto3_file();
        let mut message = MessageDef::new("M");
        message.nested_messages.push(MessageDef::map_entry(
            "CountsEntry",
            FieldDef::scalar("key", 1, FieldType::String),
            FieldDef::scalar("value", 2, FieldType::Int64),
        ));
        message
            .fields
            .push(FieldDef::message("counts", 1, "test.M.CountsEntry").repeated());
        file.messages.push(message);

        let pool = DescriptorPool::from_files(vec![file]).unwrap();
        let m = pool.message_by_name("test.M").unwrap();
        let counts = m.field(1).unwrap();
        assert!(counts.is_map());
        let entry = counts.message_type().unwrap();
        assert!(entry.is_map_entry());
        assert_eq!(
            entry.map_entry_key_field().unwrap().field_type(),
            FieldType::String
        );
        assert_eq!(
            entry.map_entry_value_field().unwrap().field_type(),
            FieldType::Int64
        );
    }

    #[test]
    fn rejections() {
        // Duplicate field numbers.
        let mut file = proto3_file();
        let mut message = MessageDef::new("M");
        message.fields.push(FieldDef::scalar("a", 1, FieldType::Int32));
        message.fields.push(FieldDef::scalar("b", 1, FieldType::Int32));
        file.messages.push(message);
        assert!(DescriptorPool::from_files(vec![file]).is_err());

        // Reserved field number.
        let mut file = proto3_file();
        let mut message = MessageDef::new("M");
        message
            .fields
            .push(FieldDef::scalar("a", 19500, FieldType::Int32));
        file.messages.push(message);
        assert!(DescriptorPool::from_files(vec![file]).is_err());

        // Required outside proto2.
        let mut file = proto3_file();
        let mut message = MessageDef::new("M");
        let mut field = FieldDef::scalar("a", 1, FieldType::Int32);
        field.label = Label::Required;
        message.fields.push(field);
        file.messages.push(message);
        assert!(DescriptorPool::from_files(vec![file]).is_err());

        // Unresolved type name.
        let mut file = proto3_file();
        let mut message = MessageDef::new("M");
        message
            .fields
            .push(FieldDef::message("sub", 1, "test.Missing"));
        file.messages.push(message);
        assert!(DescriptorPool::from_files(vec![file]).is_err());

        // First proto3 enum value must be zero.
        let mut file = proto3_file();
        file.enums.push(EnumDef::new("E").value("ONE", 1));
        assert!(DescriptorPool::from_files(vec![file]).is_err());
    }
}
