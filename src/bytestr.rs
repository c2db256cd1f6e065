//! Immutable byte strings with cheap substring and concatenation.
//!
//! [`ByteString`] wraps `bytes::Bytes` leaves in a rope: concatenations above
//! a copy threshold build a tree instead of copying, and readers iterate leaf
//! chunks in order without flattening.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Bound, RangeBounds};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::EncodeError;
use crate::stream::CodedWriter;

/// Concatenations with a combined length under this copy into a flat leaf.
const CONCAT_BY_COPY_LEN: usize = 128;

/// Tree depth at which a rope is rebuilt balanced from its leaves.
const REBALANCE_DEPTH: usize = 48;

/// An immutable, shareable byte sequence.
///
/// Cloning and substring are cheap. `concat` is cheap for large inputs,
/// building a balanced tree that equality, ordering, hashing, and iteration
/// all traverse without flattening.
#[derive(Clone, Default)]
pub struct ByteString {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Leaf(Bytes),
    Rope(Arc<Rope>),
}

impl Default for Repr {
    fn default() -> Repr {
        Repr::Leaf(Bytes::new())
    }
}

struct Rope {
    left: ByteString,
    right: ByteString,
    len: usize,
    depth: usize,
}

impl ByteString {
    /// The empty byte string.
    pub fn new() -> ByteString {
        ByteString::default()
    }

    /// Copies a slice into a new byte string.
    pub fn copy_from_slice(bytes: &[u8]) -> ByteString {
        Bytes::copy_from_slice(bytes).into()
    }

    /// Copies a sequence of slices into a single new byte string.
    pub fn copy_from_slices<'a>(slices: impl IntoIterator<Item = &'a [u8]>) -> ByteString {
        let mut buf = Vec::new();
        for slice in slices {
            buf.extend_from_slice(slice);
        }
        Bytes::from(buf).into()
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Leaf(bytes) => bytes.len(),
            Repr::Rope(rope) => rope.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn depth(&self) -> usize {
        match &self.repr {
            Repr::Leaf(_) => 0,
            Repr::Rope(rope) => rope.depth,
        }
    }

    /// Returns the byte at `index`.
    ///
    /// Panics if `index` is out of bounds.
    pub fn byte_at(&self, index: usize) -> u8 {
        match &self.repr {
            Repr::Leaf(bytes) => bytes[index],
            Repr::Rope(rope) => {
                assert!(index < rope.len, "index {index} out of bounds");
                let left_len = rope.left.len();
                if index < left_len {
                    rope.left.byte_at(index)
                } else {
                    rope.right.byte_at(index - left_len)
                }
            }
        }
    }

    /// Returns the concatenation of `self` and `other`.
    ///
    /// Short results are copied flat; longer ones share both inputs through a
    /// rope node, rebalanced when the tree grows deep.
    pub fn concat(&self, other: &ByteString) -> ByteString {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let len = self.len() + other.len();
        if len < CONCAT_BY_COPY_LEN {
            let mut buf = Vec::with_capacity(len);
            for chunk in self.chunks() {
                buf.extend_from_slice(chunk);
            }
            for chunk in other.chunks() {
                buf.extend_from_slice(chunk);
            }
            return Bytes::from(buf).into();
        }
        let rope = ByteString {
            repr: Repr::Rope(Arc::new(Rope {
                left: self.clone(),
                right: other.clone(),
                len,
                depth: self.depth().max(other.depth()) + 1,
            })),
        };
        if rope.depth() > REBALANCE_DEPTH {
            rope.rebalance()
        } else {
            rope
        }
    }

    fn rebalance(&self) -> ByteString {
        fn collect(s: &ByteString, leaves: &mut Vec<Bytes>) {
            match &s.repr {
                Repr::Leaf(bytes) => leaves.push(bytes.clone()),
                Repr::Rope(rope) => {
                    collect(&rope.left, leaves);
                    collect(&rope.right, leaves);
                }
            }
        }

        fn build(leaves: &[Bytes]) -> ByteString {
            match leaves {
                [] => ByteString::new(),
                [leaf] => leaf.clone().into(),
                _ => {
                    let mid = leaves.len() / 2;
                    let left = build(&leaves[..mid]);
                    let right = build(&leaves[mid..]);
                    ByteString {
                        repr: Repr::Rope(Arc::new(Rope {
                            len: left.len() + right.len(),
                            depth: left.depth().max(right.depth()) + 1,
                            left,
                            right,
                        })),
                    }
                }
            }
        }

        let mut leaves = Vec::new();
        collect(self, &mut leaves);
        build(&leaves)
    }

    /// Returns the sub-string covered by `range` without copying leaf data.
    ///
    /// Panics if the range is out of bounds.
    pub fn substring(&self, range: impl RangeBounds<usize>) -> ByteString {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.len(),
        };
        assert!(start <= end && end <= self.len(), "range out of bounds");
        self.substring_inner(start, end)
    }

    fn substring_inner(&self, start: usize, end: usize) -> ByteString {
        if start == end {
            return ByteString::new();
        }
        match &self.repr {
            Repr::Leaf(bytes) => bytes.slice(start..end).into(),
            Repr::Rope(rope) => {
                let left_len = rope.left.len();
                if end <= left_len {
                    rope.left.substring_inner(start, end)
                } else if start >= left_len {
                    rope.right.substring_inner(start - left_len, end - left_len)
                } else {
                    rope.left
                        .substring_inner(start, left_len)
                        .concat(&rope.right.substring_inner(0, end - left_len))
                }
            }
        }
    }

    /// Iterates the leaf chunks of this byte string in order.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks { stack: vec![self] }
    }

    /// Flattens into a single contiguous `Bytes`. Zero-copy when the string
    /// is already a single leaf.
    pub fn to_bytes(&self) -> Bytes {
        match &self.repr {
            Repr::Leaf(bytes) => bytes.clone(),
            Repr::Rope(_) => Bytes::from(self.to_vec()),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        for chunk in self.chunks() {
            buf.extend_from_slice(chunk);
        }
        buf
    }

    /// Returns whether the contents are well-formed UTF-8, validating across
    /// chunk boundaries without flattening.
    pub fn is_valid_utf8(&self) -> bool {
        // Carries the incomplete trailing character of each chunk into the
        // next one.
        let mut pending = [0u8; 4];
        let mut pending_len = 0usize;
        for mut chunk in self.chunks() {
            if pending_len > 0 {
                while pending_len < 4 && !chunk.is_empty() {
                    pending[pending_len] = chunk[0];
                    pending_len += 1;
                    chunk = &chunk[1..];
                    match core::str::from_utf8(&pending[..pending_len]) {
                        Ok(_) => {
                            pending_len = 0;
                            break;
                        }
                        Err(e) if e.error_len().is_some() => return false,
                        Err(_) => {}
                    }
                }
                if pending_len == 4 {
                    return false;
                }
                if pending_len > 0 {
                    continue;
                }
            }
            match core::str::from_utf8(chunk) {
                Ok(_) => {}
                Err(e) => {
                    if e.error_len().is_some() {
                        return false;
                    }
                    let valid = e.valid_up_to();
                    pending_len = chunk.len() - valid;
                    pending[..pending_len].copy_from_slice(&chunk[valid..]);
                }
            }
        }
        pending_len == 0
    }

    /// Encodes into a buffer of exactly `len` bytes through a bounded coded
    /// writer, and freezes the result.
    ///
    /// Fails if `write` overflows the buffer, errors, or leaves space unused.
    pub fn with_coded_writer(
        len: usize,
        write: impl FnOnce(&mut CodedWriter<'_>) -> Result<(), EncodeError>,
    ) -> Result<ByteString, EncodeError> {
        let mut buf = vec![0u8; len];
        let mut writer = CodedWriter::for_slice(&mut buf);
        write(&mut writer)?;
        writer.check_no_space_left()?;
        Ok(Bytes::from(buf).into())
    }
}

impl From<Bytes> for ByteString {
    fn from(bytes: Bytes) -> ByteString {
        ByteString {
            repr: Repr::Leaf(bytes),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(bytes: Vec<u8>) -> ByteString {
        Bytes::from(bytes).into()
    }
}

impl From<String> for ByteString {
    fn from(s: String) -> ByteString {
        Bytes::from(s.into_bytes()).into()
    }
}

impl From<&str> for ByteString {
    fn from(s: &str) -> ByteString {
        ByteString::copy_from_slice(s.as_bytes())
    }
}

impl From<&[u8]> for ByteString {
    fn from(bytes: &[u8]) -> ByteString {
        ByteString::copy_from_slice(bytes)
    }
}

/// Iterator over the leaf chunks of a [`ByteString`].
pub struct Chunks<'a> {
    stack: Vec<&'a ByteString>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        while let Some(node) = self.stack.pop() {
            match &node.repr {
                Repr::Leaf(bytes) => {
                    if !bytes.is_empty() {
                        return Some(bytes);
                    }
                }
                Repr::Rope(rope) => {
                    self.stack.push(&rope.right);
                    self.stack.push(&rope.left);
                }
            }
        }
        None
    }
}

impl PartialEq for ByteString {
    fn eq(&self, other: &ByteString) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut a = self.chunks();
        let mut b = other.chunks();
        let mut left: &[u8] = &[];
        let mut right: &[u8] = &[];
        loop {
            if left.is_empty() {
                left = match a.next() {
                    Some(chunk) => chunk,
                    None => return right.is_empty() && b.next().is_none(),
                };
            }
            if right.is_empty() {
                right = match b.next() {
                    Some(chunk) => chunk,
                    None => return false,
                };
            }
            let n = left.len().min(right.len());
            if left[..n] != right[..n] {
                return false;
            }
            left = &left[n..];
            right = &right[n..];
        }
    }
}

impl Eq for ByteString {}

impl Ord for ByteString {
    fn cmp(&self, other: &ByteString) -> Ordering {
        let mut a = self.chunks();
        let mut b = other.chunks();
        let mut left: &[u8] = &[];
        let mut right: &[u8] = &[];
        loop {
            if left.is_empty() {
                left = a.next().unwrap_or(&[]);
            }
            if right.is_empty() {
                right = b.next().unwrap_or(&[]);
            }
            match (left.is_empty(), right.is_empty()) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (false, false) => {}
            }
            let n = left.len().min(right.len());
            match left[..n].cmp(&right[..n]) {
                Ordering::Equal => {
                    left = &left[n..];
                    right = &right[n..];
                }
                unequal => return unequal,
            }
        }
    }
}

impl PartialOrd for ByteString {
    fn partial_cmp(&self, other: &ByteString) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ByteString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Byte-at-a-time so equal contents hash identically regardless of
        // chunk boundaries.
        state.write_usize(self.len());
        for chunk in self.chunks() {
            for &byte in chunk {
                state.write_u8(byte);
            }
        }
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b\"{}\"", crate::text::escape_bytes(&self.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rope_of(parts: &[&[u8]]) -> ByteString {
        let mut out = ByteString::new();
        for part in parts {
            // Concat leaf-by-leaf without triggering the copy threshold by
            // building rope nodes directly through long inputs.
            out = out.concat(&ByteString::copy_from_slice(part));
        }
        out
    }

    #[test]
    fn concat_under_threshold_copies_flat() {
        let a = ByteString::from("hello, ");
        let b = ByteString::from("world");
        let joined = a.concat(&b);
        assert!(matches!(joined.repr, Repr::Leaf(_)));
        assert_eq!(joined.to_vec(), b"hello, world");
        assert_eq!(joined.len(), 12);
    }

    #[test]
    fn concat_over_threshold_builds_rope() {
        let a = ByteString::copy_from_slice(&[b'a'; 100]);
        let b = ByteString::copy_from_slice(&[b'b'; 100]);
        let joined = a.concat(&b);
        assert!(matches!(joined.repr, Repr::Rope(_)));
        assert_eq!(joined.len(), 200);
        assert_eq!(joined.byte_at(0), b'a');
        assert_eq!(joined.byte_at(99), b'a');
        assert_eq!(joined.byte_at(100), b'b');
        assert_eq!(joined.byte_at(199), b'b');

        let chunks: Vec<&[u8]> = joined.chunks().collect();
        assert_eq!(chunks, vec![&[b'a'; 100][..], &[b'b'; 100][..]]);
    }

    #[test]
    fn empty_sides_short_circuit() {
        let a = ByteString::from("abc");
        assert_eq!(ByteString::new().concat(&a), a);
        assert_eq!(a.concat(&ByteString::new()), a);
    }

    #[test]
    fn equality_ignores_shape() {
        let flat = ByteString::copy_from_slice(&[7u8; 300]);
        let rope = ByteString::copy_from_slice(&[7u8; 100])
            .concat(&ByteString::copy_from_slice(&[7u8; 200]));
        assert_eq!(flat, rope);

        use std::collections::hash_map::DefaultHasher;
        let hash = |b: &ByteString| {
            let mut h = DefaultHasher::new();
            b.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&flat), hash(&rope));

        let different = ByteString::copy_from_slice(&[8u8; 300]);
        assert_ne!(flat, different);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = ByteString::from("abc");
        let b = ByteString::from("abd");
        let prefix = ByteString::from("ab");
        assert!(a < b);
        assert!(prefix < a);
        assert_eq!(a.cmp(&a), Ordering::Equal);

        let long_a = ByteString::copy_from_slice(&[1u8; 200])
            .concat(&ByteString::copy_from_slice(&[2u8; 200]));
        let long_b = ByteString::copy_from_slice(&[1u8; 400]);
        assert!(long_a > long_b);
    }

    #[test]
    fn substring_shares_leaves() {
        let base = ByteString::copy_from_slice(b"0123456789");
        assert_eq!(base.substring(2..5).to_vec(), b"234");
        assert_eq!(base.substring(..).to_vec(), b"0123456789");
        assert_eq!(base.substring(9..9).len(), 0);

        let rope = ByteString::copy_from_slice(&[b'x'; 150])
            .concat(&ByteString::copy_from_slice(&[b'y'; 150]));
        let cross = rope.substring(140..160);
        assert_eq!(cross.to_vec(), [&[b'x'; 10][..], &[b'y'; 10][..]].concat());
    }

    #[test]
    fn deep_concat_rebalances() {
        let mut rope = ByteString::copy_from_slice(&[0u8; 200]);
        for i in 0..200u8 {
            rope = rope.concat(&ByteString::copy_from_slice(&[i; 130]));
        }
        assert!(rope.depth() <= REBALANCE_DEPTH);
        assert_eq!(rope.len(), 200 + 200 * 130);
        assert_eq!(rope.byte_at(200), 0);
        assert_eq!(rope.byte_at(rope.len() - 1), 199);
    }

    #[test]
    fn utf8_validation_across_chunks() {
        // Split a multi-byte character across leaves.
        let emoji = "🚀".as_bytes();
        let padding = [b'a'; 200];
        let left = ByteString::copy_from_slices([&padding[..], &emoji[..2]]);
        let right = ByteString::copy_from_slices([&emoji[2..], &padding[..]]);
        assert!(left.concat(&right).is_valid_utf8());

        let truncated = ByteString::copy_from_slices([&padding[..], &emoji[..2]]);
        assert!(!truncated.is_valid_utf8());

        let invalid = ByteString::copy_from_slice(&[0xFF; 200])
            .concat(&ByteString::copy_from_slice(b"abc"));
        assert!(!invalid.is_valid_utf8());
    }

    #[test]
    fn chunk_iteration_skips_empty_leaves() {
        let rope = rope_of(&[&[b'a'; 150], b"", &[b'b'; 150]]);
        let total: usize = rope.chunks().map(<[u8]>::len).sum();
        assert_eq!(total, 300);
        assert!(rope.chunks().all(|c| !c.is_empty()));
    }
}
