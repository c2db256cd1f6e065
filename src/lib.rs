//! A descriptor-driven Protocol Buffers runtime core.
//!
//! `protodyn` implements the binary wire format and the reflection layer
//! that together encode, decode, compare, and merge structured messages
//! whose schema is known only at runtime:
//!
//! - [`encoding`] holds the allocation-free codec primitives (varints,
//!   ZigZag, fixed-width values, tags).
//! - [`stream`] wraps them in [`CodedReader`]/[`CodedWriter`] with framing,
//!   recursion and size guards, and a deterministic-output mode.
//! - [`descriptor`] is the immutable runtime schema graph, built from plain
//!   [`descriptor::def`] inputs produced by a schema compiler.
//! - [`DynamicMessage`] drives generic serialize/parse/equals/hash/merge
//!   over any descriptor-backed message, preserving unknown fields and
//!   resolving extensions through an [`ExtensionRegistry`].
//!
//! Schema compilation from `.proto` source and generated message types are
//! out of scope; this crate is the runtime those layers sit on.

pub mod bytestr;
pub mod descriptor;
pub mod encoding;
mod error;
pub mod extension;
pub mod field_set;
pub mod message;
pub mod stream;
pub mod text;
pub mod unknown;
pub mod utf8;
pub mod value;

pub use crate::bytestr::ByteString;
pub use crate::descriptor::DescriptorPool;
pub use crate::error::{
    DecodeError, DecodeErrorKind, DescriptorError, EncodeError, UninitializedError,
};
pub use crate::extension::ExtensionRegistry;
pub use crate::field_set::FieldSet;
pub use crate::message::DynamicMessage;
pub use crate::stream::{CodedReader, CodedWriter};
pub use crate::unknown::{UnknownField, UnknownFieldSet};
pub use crate::value::{MapKey, Value};

/// Nested messages and groups a reader will enter before failing.
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// Total bytes a stream-backed reader will consume before failing.
pub const DEFAULT_SIZE_LIMIT: usize = i32::MAX as usize;

/// Scratch buffer size for stream-backed readers and writers.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
