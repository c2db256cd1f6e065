//! Buffered readers and writers for the wire format.
//!
//! [`CodedWriter`] and [`CodedReader`] wrap the codec primitives in
//! [`crate::encoding`] with sink/source plumbing, length-delimited framing,
//! and the recursion and size guards that make parsing untrusted input safe.

mod input;
mod output;

pub use input::CodedReader;
pub use output::CodedWriter;
