//! Registry of extension fields consulted during parsing.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::descriptor::{DescriptorPool, FieldDescriptor, MessageDescriptor};
use crate::error::DescriptorError;

/// Maps `(extendee full name, field number)` to the extension's descriptor.
///
/// Parsers consult the registry for field numbers that fall in a message's
/// extension ranges; unregistered extension payloads are preserved in the
/// unknown-field set and can be recovered by re-parsing once registered.
///
/// Registries are append-only. Share one per process (or per subsystem) and
/// populate it before parsing starts.
#[derive(Clone, Debug, Default)]
pub struct ExtensionRegistry {
    by_target: HashMap<(String, u32), FieldDescriptor>,
}

impl ExtensionRegistry {
    pub fn new() -> ExtensionRegistry {
        ExtensionRegistry::default()
    }

    /// The shared empty registry, for parsers that resolve no extensions.
    pub fn empty() -> &'static ExtensionRegistry {
        static EMPTY: OnceLock<ExtensionRegistry> = OnceLock::new();
        EMPTY.get_or_init(ExtensionRegistry::new)
    }

    /// Registers one extension field.
    pub fn register(&mut self, extension: FieldDescriptor) -> Result<(), DescriptorError> {
        if !extension.is_extension() {
            return Err(DescriptorError::new(format!(
                "{} is not an extension",
                extension.full_name()
            )));
        }
        let key = (
            extension.containing_message().full_name().to_owned(),
            extension.number(),
        );
        if let Some(existing) = self.by_target.get(&key) {
            if *existing != extension {
                return Err(DescriptorError::new(format!(
                    "conflicting extensions of {} for field number {}: {} and {}",
                    key.0,
                    key.1,
                    existing.full_name(),
                    extension.full_name()
                )));
            }
            return Ok(());
        }
        self.by_target.insert(key, extension);
        Ok(())
    }

    /// Registers every extension declared in the pool.
    pub fn register_pool(&mut self, pool: &DescriptorPool) -> Result<(), DescriptorError> {
        for extension in pool.extensions() {
            self.register(extension)?;
        }
        Ok(())
    }

    /// Finds the extension of `message` with the given field number.
    pub fn find(&self, message: &MessageDescriptor, number: u32) -> Option<FieldDescriptor> {
        // Cheap negative check before the string allocation.
        if !message.is_extension_number(number) {
            return None;
        }
        self.by_target
            .get(&(message.full_name().to_owned(), number))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_target.len()
    }
}
