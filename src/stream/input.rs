use core::cmp::min;
use std::io::Read;

use bytes::Bytes;

use crate::encoding::varint::decode_varint_slice;
use crate::encoding::{decode_zigzag32, decode_zigzag64, make_tag, split_tag, WireType};
use crate::error::{DecodeError, DecodeErrorKind};

/// A buffered reader over the Protobuf wire format.
///
/// Readers are polymorphic over the source: a borrowed slice, a shared
/// [`Bytes`] buffer (which supports aliased zero-copy reads), a scatter of
/// contiguous buffers, or an `io::Read` refilled through an internal buffer.
///
/// Length-delimited framing is a stack of byte limits: entering a submessage
/// pushes `pos + len` as the new limit, [`CodedReader::read_tag`] reports a
/// clean end of message (tag 0) on reaching it, and popping restores the
/// enclosing frame. Recursion depth and (for stream sources) total bytes are
/// bounded to defend against malicious input.
pub struct CodedReader<'a> {
    source: Source<'a>,
    /// Total bytes consumed since construction.
    pos: usize,
    /// Absolute position the current frame may not read past; `usize::MAX`
    /// when unframed.
    limit: usize,
    limit_stack: Vec<usize>,
    recursion_depth: u32,
    recursion_limit: u32,
    size_limit: usize,
    last_tag: u32,
    aliasing: bool,
}

enum Source<'a> {
    Slice {
        buf: &'a [u8],
        offset: usize,
    },
    Shared {
        buf: Bytes,
        offset: usize,
    },
    Scatter {
        chunks: Vec<&'a [u8]>,
        index: usize,
        offset: usize,
    },
    Stream {
        reader: &'a mut dyn Read,
        buf: Box<[u8]>,
        start: usize,
        end: usize,
        total_read: usize,
        eof: bool,
    },
}

impl<'a> Source<'a> {
    /// The contiguous bytes available without refilling.
    fn chunk(&self) -> &[u8] {
        match self {
            Source::Slice { buf, offset } => &buf[*offset..],
            Source::Shared { buf, offset } => &buf[*offset..],
            Source::Scatter {
                chunks,
                index,
                offset,
            } => chunks.get(*index).map_or(&[][..], |chunk| &chunk[*offset..]),
            Source::Stream { buf, start, end, .. } => &buf[*start..*end],
        }
    }

    fn consume(&mut self, n: usize) {
        match self {
            Source::Slice { offset, .. }
            | Source::Shared { offset, .. }
            | Source::Scatter { offset, .. } => *offset += n,
            Source::Stream { start, .. } => *start += n,
        }
    }

    /// Makes the current chunk non-empty if more input exists. Returns false
    /// at end of input.
    fn refill(&mut self, size_limit: usize) -> Result<bool, DecodeError> {
        loop {
            if !self.chunk().is_empty() {
                return Ok(true);
            }
            match self {
                Source::Slice { .. } | Source::Shared { .. } => return Ok(false),
                Source::Scatter { chunks, index, offset } => {
                    if *index >= chunks.len() {
                        return Ok(false);
                    }
                    *index += 1;
                    *offset = 0;
                }
                Source::Stream {
                    reader,
                    buf,
                    start,
                    end,
                    total_read,
                    eof,
                } => {
                    if *eof {
                        return Ok(false);
                    }
                    *start = 0;
                    *end = 0;
                    let n = reader.read(buf)?;
                    if n == 0 {
                        *eof = true;
                        return Ok(false);
                    }
                    *total_read += n;
                    if *total_read > size_limit {
                        return Err(DecodeErrorKind::SizeLimitExceeded.into());
                    }
                    *end = n;
                }
            }
        }
    }
}

impl<'a> CodedReader<'a> {
    fn from_source(source: Source<'a>) -> CodedReader<'a> {
        CodedReader {
            source,
            pos: 0,
            limit: usize::MAX,
            limit_stack: Vec::new(),
            recursion_depth: 0,
            recursion_limit: crate::DEFAULT_RECURSION_LIMIT,
            size_limit: crate::DEFAULT_SIZE_LIMIT,
            last_tag: 0,
            aliasing: false,
        }
    }

    /// A reader over a borrowed contiguous buffer.
    pub fn for_slice(buf: &'a [u8]) -> CodedReader<'a> {
        CodedReader::from_source(Source::Slice { buf, offset: 0 })
    }

    /// A reader over a shared buffer. With aliasing enabled, `bytes` payloads
    /// are returned as zero-copy views of it.
    pub fn for_bytes(buf: Bytes) -> CodedReader<'a> {
        CodedReader::from_source(Source::Shared { buf, offset: 0 })
    }

    /// A reader over a scatter of contiguous buffers, consumed in order.
    pub fn for_chunks(chunks: impl IntoIterator<Item = &'a [u8]>) -> CodedReader<'a> {
        CodedReader::from_source(Source::Scatter {
            chunks: chunks.into_iter().collect(),
            index: 0,
            offset: 0,
        })
    }

    /// A reader refilling from an external source through an internal buffer
    /// of the default size. The size limit applies to stream sources.
    pub fn for_reader(reader: &'a mut dyn Read) -> CodedReader<'a> {
        CodedReader::for_reader_with_buffer_size(reader, crate::DEFAULT_BUFFER_SIZE)
    }

    pub fn for_reader_with_buffer_size(
        reader: &'a mut dyn Read,
        buffer_size: usize,
    ) -> CodedReader<'a> {
        CodedReader::from_source(Source::Stream {
            reader,
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            start: 0,
            end: 0,
            total_read: 0,
            eof: false,
        })
    }

    /// Replaces the recursion limit used for nested messages and groups.
    pub fn set_recursion_limit(&mut self, limit: u32) {
        self.recursion_limit = limit;
    }

    /// Replaces the total-bytes limit enforced on stream sources.
    pub fn set_size_limit(&mut self, limit: usize) {
        self.size_limit = limit;
    }

    /// Allows `bytes` payloads to alias the underlying buffer when it is
    /// known immutable (a [`CodedReader::for_bytes`] source).
    pub fn enable_aliasing(&mut self, aliasing: bool) {
        self.aliasing = aliasing;
    }

    /// Total bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The last tag returned by [`CodedReader::read_tag`], 0 after a clean
    /// end of input or frame.
    pub fn last_tag(&self) -> u32 {
        self.last_tag
    }

    /// Recursion levels still available to nested parsers.
    pub fn remaining_recursion(&self) -> u32 {
        self.recursion_limit.saturating_sub(self.recursion_depth)
    }

    /// Bytes left in the current frame, `None` when unframed.
    pub fn bytes_until_limit(&self) -> Option<usize> {
        (self.limit != usize::MAX).then(|| self.limit - self.pos)
    }

    /// Whether the current frame (or the whole input) is fully consumed.
    pub fn is_at_end(&mut self) -> Result<bool, DecodeError> {
        if self.pos == self.limit {
            return Ok(true);
        }
        if self.limit != usize::MAX {
            return Ok(false);
        }
        Ok(!self.source.refill(self.size_limit)?)
    }

    /// Starts a length-delimited frame of `len` bytes at the current
    /// position.
    pub fn push_limit(&mut self, len: usize) -> Result<(), DecodeError> {
        let new_limit = self
            .pos
            .checked_add(len)
            .ok_or(DecodeErrorKind::Truncated)?;
        // A frame may not claim more bytes than its enclosing frame holds.
        if new_limit > self.limit {
            return Err(DecodeErrorKind::Truncated.into());
        }
        self.limit_stack.push(self.limit);
        self.limit = new_limit;
        Ok(())
    }

    /// Ends the innermost frame, restoring the enclosing limit.
    ///
    /// Panics if no frame is active; limits are balanced by construction in
    /// the framing helpers.
    pub fn pop_limit(&mut self) {
        self.limit = self
            .limit_stack
            .pop()
            .expect("pop_limit called without a matching push_limit");
    }

    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        if self.pos == self.limit {
            return Err(DecodeErrorKind::Truncated.into());
        }
        if !self.source.refill(self.size_limit)? {
            return Err(DecodeErrorKind::Truncated.into());
        }
        let byte = self.source.chunk()[0];
        self.source.consume(1);
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), DecodeError> {
        if self.limit != usize::MAX && out.len() > self.limit - self.pos {
            return Err(DecodeErrorKind::Truncated.into());
        }
        let mut filled = 0;
        while filled < out.len() {
            if !self.source.refill(self.size_limit)? {
                return Err(DecodeErrorKind::Truncated.into());
            }
            let chunk = self.source.chunk();
            let n = min(chunk.len(), out.len() - filled);
            out[filled..filled + n].copy_from_slice(&chunk[..n]);
            self.source.consume(n);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }

    fn skip_raw_bytes(&mut self, mut n: usize) -> Result<(), DecodeError> {
        if self.limit != usize::MAX && n > self.limit - self.pos {
            return Err(DecodeErrorKind::Truncated.into());
        }
        while n > 0 {
            if !self.source.refill(self.size_limit)? {
                return Err(DecodeErrorKind::Truncated.into());
            }
            let take = min(self.source.chunk().len(), n);
            self.source.consume(take);
            self.pos += take;
            n -= take;
        }
        Ok(())
    }

    /// Reads a varint, up to ten bytes.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let chunk = self.source.chunk();
        let cap = if self.limit == usize::MAX {
            chunk.len()
        } else {
            min(chunk.len(), self.limit - self.pos)
        };
        let chunk = &chunk[..cap];
        if !chunk.is_empty() && (chunk.len() > 10 || chunk[chunk.len() - 1] < 0x80) {
            let (value, advance) = decode_varint_slice(chunk)?;
            self.source.consume(advance);
            self.pos += advance;
            Ok(value)
        } else {
            self.read_varint_slow()
        }
    }

    #[inline(never)]
    #[cold]
    fn read_varint_slow(&mut self) -> Result<u64, DecodeError> {
        let mut value = 0u64;
        for count in 0..10 {
            let byte = self.read_byte()?;
            value |= u64::from(byte & 0x7F) << (count * 7);
            if byte <= 0x7F {
                if count == 9 && byte >= 0x02 {
                    return Err(DecodeErrorKind::InvalidVarint.into());
                }
                return Ok(value);
            }
        }
        Err(DecodeErrorKind::InvalidVarint.into())
    }

    pub fn read_varint32(&mut self) -> Result<u32, DecodeError> {
        // Truncation matches the 32-bit readers of the reference runtimes.
        Ok(self.read_varint()? as u32)
    }

    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        let mut bytes = [0u8; 8];
        self.read_exact(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn read_float(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    pub fn read_int32(&mut self) -> Result<i32, DecodeError> {
        Ok(self.read_varint()? as i32)
    }

    pub fn read_int64(&mut self) -> Result<i64, DecodeError> {
        Ok(self.read_varint()? as i64)
    }

    pub fn read_sint32(&mut self) -> Result<i32, DecodeError> {
        Ok(decode_zigzag32(self.read_varint()? as u32))
    }

    pub fn read_sint64(&mut self) -> Result<i64, DecodeError> {
        Ok(decode_zigzag64(self.read_varint()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_varint()? != 0)
    }

    /// Reads a length delimiter, rejecting values above `i32::MAX`.
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let length = self.read_varint()?;
        if length > i32::MAX as u64 {
            return Err(DecodeErrorKind::NegativeLength.into());
        }
        Ok(length as usize)
    }

    /// Reads `len` raw bytes, aliasing the source buffer when enabled.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        if self.limit != usize::MAX && len > self.limit - self.pos {
            return Err(DecodeErrorKind::Truncated.into());
        }
        if self.aliasing {
            if let Source::Shared { buf, offset } = &mut self.source {
                if buf.len() - *offset < len {
                    return Err(DecodeErrorKind::Truncated.into());
                }
                let bytes = buf.slice(*offset..*offset + len);
                *offset += len;
                self.pos += len;
                return Ok(bytes);
            }
        }
        let mut out = vec![0u8; len];
        self.read_exact(&mut out)?;
        Ok(Bytes::from(out))
    }

    /// Reads a `len`-byte UTF-8 string.
    pub fn read_string(&mut self, len: usize) -> Result<String, DecodeError> {
        let mut out = vec![0u8; len];
        self.read_exact(&mut out)?;
        String::from_utf8(out).map_err(|_| DecodeErrorKind::InvalidUtf8.into())
    }

    /// Reads the next field tag.
    ///
    /// Returns 0 on a clean end of the current frame or, when unframed, of
    /// the input. Tags with field number 0, a reserved field number, or an
    /// inexpressible wire type fail.
    pub fn read_tag(&mut self) -> Result<u32, DecodeError> {
        if self.pos == self.limit {
            self.last_tag = 0;
            return Ok(0);
        }
        if !self.source.refill(self.size_limit)? {
            if self.limit != usize::MAX {
                return Err(DecodeErrorKind::Truncated.into());
            }
            self.last_tag = 0;
            return Ok(0);
        }
        let value = self.read_varint()?;
        if value > u64::from(u32::MAX) {
            return Err(DecodeErrorKind::InvalidTag {
                field_number: (value >> 3) as u32,
            }
            .into());
        }
        let tag = value as u32;
        split_tag(tag)?;
        self.last_tag = tag;
        Ok(tag)
    }

    /// Verifies the last tag read. Used after group bodies and at end of
    /// parse: `expected` is the matching end-group tag, or 0 for end of
    /// input.
    pub fn check_last_tag_was(&self, expected: u32) -> Result<(), DecodeError> {
        if self.last_tag == expected {
            Ok(())
        } else if self.last_tag == 0 {
            Err(DecodeErrorKind::Truncated.into())
        } else {
            Err(DecodeErrorKind::UnexpectedEndGroupTag.into())
        }
    }

    fn enter_recursion(&mut self) -> Result<(), DecodeError> {
        if self.recursion_depth >= self.recursion_limit {
            return Err(DecodeErrorKind::RecursionLimitExceeded.into());
        }
        self.recursion_depth += 1;
        Ok(())
    }

    fn exit_recursion(&mut self) {
        self.recursion_depth -= 1;
    }

    /// Reads a length-prefixed submessage: `parse` runs inside the new frame
    /// and must consume it exactly, looping until [`CodedReader::read_tag`]
    /// returns 0.
    pub fn read_message<F>(&mut self, parse: F) -> Result<(), DecodeError>
    where
        F: FnOnce(&mut CodedReader<'a>) -> Result<(), DecodeError>,
    {
        let len = self.read_length()?;
        self.enter_recursion()?;
        self.push_limit(len)?;
        let mut result = parse(self);
        if result.is_ok() {
            if self.last_tag != 0 {
                result = Err(DecodeErrorKind::UnexpectedEndGroupTag.into());
            } else if self.pos != self.limit {
                result = Err(DecodeErrorKind::Truncated.into());
            }
        }
        self.pop_limit();
        self.exit_recursion();
        result
    }

    /// Reads a group body: `parse` loops until it sees an end-group tag,
    /// which must carry `field_number`.
    pub fn read_group<F>(&mut self, field_number: u32, parse: F) -> Result<(), DecodeError>
    where
        F: FnOnce(&mut CodedReader<'a>) -> Result<(), DecodeError>,
    {
        self.enter_recursion()?;
        let result = parse(self).and_then(|()| {
            self.check_last_tag_was(make_tag(field_number, WireType::EndGroup))
        });
        self.exit_recursion();
        result
    }

    /// Skips over the payload of the field with the given tag.
    pub fn skip_field(&mut self, tag: u32) -> Result<(), DecodeError> {
        let (field_number, wire_type) = split_tag(tag)?;
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::SixtyFourBit => self.skip_raw_bytes(8)?,
            WireType::ThirtyTwoBit => self.skip_raw_bytes(4)?,
            WireType::LengthDelimited => {
                let len = self.read_length()?;
                self.skip_raw_bytes(len)?;
            }
            WireType::StartGroup => {
                self.enter_recursion()?;
                let result = self.skip_message().and_then(|()| {
                    self.check_last_tag_was(make_tag(field_number, WireType::EndGroup))
                });
                self.exit_recursion();
                result?;
            }
            WireType::EndGroup => {
                return Err(DecodeErrorKind::UnexpectedEndGroupTag.into());
            }
        }
        Ok(())
    }

    /// Skips fields until end of frame/input or an end-group tag, which is
    /// left in [`CodedReader::last_tag`] for the caller to check.
    pub fn skip_message(&mut self) -> Result<(), DecodeError> {
        loop {
            let tag = self.read_tag()?;
            if tag == 0 || tag & 0x07 == WireType::EndGroup as u32 {
                return Ok(());
            }
            self.skip_field(tag)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_reads() {
        let bytes = [
            0x08, 0x96, 0x01, // int32 field 1 = 150
            0x12, 0x07, b't', b'e', b's', b't', b'i', b'n', b'g', // string field 2
        ];
        let mut r = CodedReader::for_slice(&bytes);
        assert_eq!(r.read_tag().unwrap(), 0x08);
        assert_eq!(r.read_int32().unwrap(), 150);
        assert_eq!(r.read_tag().unwrap(), 0x12);
        let len = r.read_length().unwrap();
        assert_eq!(r.read_string(len).unwrap(), "testing");
        assert_eq!(r.read_tag().unwrap(), 0);
        r.check_last_tag_was(0).unwrap();
    }

    #[test]
    fn zigzag_reads() {
        let bytes = [0x08, 0x01];
        let mut r = CodedReader::for_slice(&bytes);
        r.read_tag().unwrap();
        assert_eq!(r.read_sint32().unwrap(), -1);
    }

    #[test]
    fn packed_frame_via_limits() {
        // S3: repeated packed int32 field 4 = [1, 2, 3].
        let bytes = [0x22, 0x03, 0x01, 0x02, 0x03];
        let mut r = CodedReader::for_slice(&bytes);
        assert_eq!(r.read_tag().unwrap(), 0x22);
        let len = r.read_length().unwrap();
        r.push_limit(len).unwrap();
        let mut values = Vec::new();
        while !r.is_at_end().unwrap() {
            values.push(r.read_int32().unwrap());
        }
        r.pop_limit();
        assert_eq!(values, [1, 2, 3]);
        assert_eq!(r.read_tag().unwrap(), 0);
    }

    #[test]
    fn nested_limit_may_not_exceed_parent() {
        let bytes = [0x0A, 0x0A, 0x00, 0x00];
        let mut r = CodedReader::for_slice(&bytes);
        r.read_tag().unwrap();
        let len = r.read_length().unwrap();
        assert_eq!(len, 10);
        r.push_limit(4).unwrap();
        // Inner frame claims more than the enclosing four bytes.
        let err = r.push_limit(5).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::Truncated);
    }

    #[test]
    fn truncated_payloads() {
        let mut r = CodedReader::for_slice(&[0x12, 0x07, b'a']);
        r.read_tag().unwrap();
        let len = r.read_length().unwrap();
        assert_eq!(
            r.read_string(len).unwrap_err().kind(),
            &DecodeErrorKind::Truncated
        );

        let mut r = CodedReader::for_slice(&[0x0D, 0x01, 0x02]);
        r.read_tag().unwrap();
        assert_eq!(
            r.read_fixed32().unwrap_err().kind(),
            &DecodeErrorKind::Truncated
        );
    }

    #[test]
    fn malformed_varint() {
        let mut bytes = vec![0x08];
        bytes.extend_from_slice(&[0xFF; 10]);
        bytes.push(0x00);
        let mut r = CodedReader::for_slice(&bytes);
        r.read_tag().unwrap();
        assert_eq!(
            r.read_varint().unwrap_err().kind(),
            &DecodeErrorKind::InvalidVarint
        );
    }

    #[test]
    fn invalid_tags() {
        // Field number 0.
        let mut r = CodedReader::for_slice(&[0x00]);
        assert!(matches!(
            r.read_tag().unwrap_err().kind(),
            DecodeErrorKind::InvalidTag { field_number: 0 }
        ));

        // Reserved field number 19000 with varint wire type.
        let mut buf = Vec::new();
        crate::encoding::encode_varint(u64::from(19000u32 << 3), &mut buf);
        let mut r = CodedReader::for_slice(&buf);
        assert!(matches!(
            r.read_tag().unwrap_err().kind(),
            DecodeErrorKind::InvalidTag {
                field_number: 19000
            }
        ));

        // Wire type 7.
        let mut r = CodedReader::for_slice(&[0x0F]);
        assert!(matches!(
            r.read_tag().unwrap_err().kind(),
            DecodeErrorKind::InvalidWireTypeValue { value: 7 }
        ));
    }

    #[test]
    fn negative_length_rejected() {
        let mut buf = vec![0x12];
        crate::encoding::encode_varint(u64::from(u32::MAX), &mut buf);
        let mut r = CodedReader::for_slice(&buf);
        r.read_tag().unwrap();
        assert_eq!(
            r.read_length().unwrap_err().kind(),
            &DecodeErrorKind::NegativeLength
        );
    }

    #[test]
    fn skip_honors_groups() {
        let bytes = [
            0x0B, // field 1 start group
            0x10, 0x04, // field 2 varint 4
            0x1A, 0x01, 0x42, // field 3 bytes
            0x0C, // field 1 end group
            0x08, 0x01, // field 1 varint 1
        ];
        let mut r = CodedReader::for_slice(&bytes);
        let tag = r.read_tag().unwrap();
        assert_eq!(tag, 0x0B);
        r.skip_field(tag).unwrap();
        assert_eq!(r.read_tag().unwrap(), 0x08);
        assert_eq!(r.read_varint().unwrap(), 1);
    }

    #[test]
    fn mismatched_end_group() {
        let bytes = [
            0x0B, // field 1 start group
            0x14, // field 2 end group
        ];
        let mut r = CodedReader::for_slice(&bytes);
        let tag = r.read_tag().unwrap();
        assert_eq!(
            r.skip_field(tag).unwrap_err().kind(),
            &DecodeErrorKind::UnexpectedEndGroupTag
        );
    }

    #[test]
    fn recursion_limit_on_nested_groups() {
        let mut bytes = Vec::new();
        for _ in 0..200 {
            bytes.push(0x0B);
        }
        for _ in 0..200 {
            bytes.push(0x0C);
        }
        let mut r = CodedReader::for_slice(&bytes);
        let tag = r.read_tag().unwrap();
        assert_eq!(
            r.skip_field(tag).unwrap_err().kind(),
            &DecodeErrorKind::RecursionLimitExceeded
        );

        let mut r = CodedReader::for_slice(&bytes);
        r.set_recursion_limit(300);
        let tag = r.read_tag().unwrap();
        r.skip_field(tag).unwrap();
    }

    #[test]
    fn scatter_source_spans_chunks() {
        let bytes = [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i'];
        // Split in awkward places, including mid-varint.
        let chunks: Vec<&[u8]> = vec![&bytes[..2], &[], &bytes[2..4], &bytes[4..]];
        let mut r = CodedReader::for_chunks(chunks);
        assert_eq!(r.read_tag().unwrap(), 0x08);
        assert_eq!(r.read_int32().unwrap(), 150);
        assert_eq!(r.read_tag().unwrap(), 0x12);
        let len = r.read_length().unwrap();
        assert_eq!(r.read_string(len).unwrap(), "hi");
        assert_eq!(r.read_tag().unwrap(), 0);
    }

    #[test]
    fn stream_source_refills() {
        let mut bytes = vec![0x08, 0x96, 0x01, 0x12, 0x05];
        bytes.extend_from_slice(b"abcde");
        let mut cursor = std::io::Cursor::new(bytes);
        let mut r = CodedReader::for_reader_with_buffer_size(&mut cursor, 2);
        assert_eq!(r.read_tag().unwrap(), 0x08);
        assert_eq!(r.read_int32().unwrap(), 150);
        assert_eq!(r.read_tag().unwrap(), 0x12);
        let len = r.read_length().unwrap();
        assert_eq!(r.read_string(len).unwrap(), "abcde");
        assert_eq!(r.read_tag().unwrap(), 0);
    }

    #[test]
    fn stream_size_limit() {
        let bytes = [0x08, 0x01].repeat(32);
        let mut cursor = std::io::Cursor::new(bytes);
        let mut r = CodedReader::for_reader_with_buffer_size(&mut cursor, 8);
        r.set_size_limit(16);
        let mut err = None;
        for _ in 0..64 {
            match r.read_tag().and_then(|_| r.read_varint()) {
                Ok(_) => {}
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert_eq!(
            err.expect("size limit not hit").kind(),
            &DecodeErrorKind::SizeLimitExceeded
        );
    }

    #[test]
    fn aliased_bytes_share_the_source() {
        let mut payload = vec![0x12, 0x04];
        payload.extend_from_slice(b"data");
        let buf = Bytes::from(payload);
        let mut r = CodedReader::for_bytes(buf.clone());
        r.enable_aliasing(true);
        r.read_tag().unwrap();
        let len = r.read_length().unwrap();
        let bytes = r.read_bytes(len).unwrap();
        assert_eq!(&bytes[..], b"data");
        // Aliased: same backing allocation, offset by the two header bytes.
        assert_eq!(bytes.as_ptr() as usize, buf.as_ptr() as usize + 2);
    }

    #[test]
    fn read_message_requires_full_consumption() {
        // Submessage claims three bytes but the parser stops after one field.
        let bytes = [0x0A, 0x03, 0x08, 0x01, 0x00];
        let mut r = CodedReader::for_slice(&bytes);
        r.read_tag().unwrap();
        let result = r.read_message(|r| {
            let tag = r.read_tag()?;
            assert_eq!(tag, 0x08);
            r.read_varint()?;
            Ok(())
        });
        // Parser returned without reading to the end of the frame; the frame
        // still had the trailing zero tag to consume.
        assert!(result.is_err());
    }
}
