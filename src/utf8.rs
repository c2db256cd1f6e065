//! UTF-8 validation and UTF-16 transcoding support for string fields.

use core::char;
use core::cmp::Ordering;
use core::fmt;
use std::error::Error;

/// Returns whether `bytes` is well-formed UTF-8 per RFC 3629: no over-long
/// sequences, no surrogate code points, nothing beyond U+10FFFF.
#[inline]
pub fn is_valid_utf8(bytes: &[u8]) -> bool {
    core::str::from_utf8(bytes).is_ok()
}

/// A UTF-16 code unit sequence contained a surrogate without its pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnpairedSurrogate {
    index: usize,
    unit: u16,
}

impl UnpairedSurrogate {
    /// Index of the offending code unit.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The offending code unit.
    pub fn unit(&self) -> u16 {
        self.unit
    }
}

impl fmt::Display for UnpairedSurrogate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unpaired surrogate {:#06X} at code unit {}",
            self.unit, self.index
        )
    }
}

impl Error for UnpairedSurrogate {}

/// Returns the exact number of bytes the UTF-16 code unit sequence occupies
/// once encoded as UTF-8, or the position of the first unpaired surrogate.
pub fn encoded_len_utf16(units: &[u16]) -> Result<usize, UnpairedSurrogate> {
    let mut len = 0usize;
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        if unit < 0x80 {
            len += 1;
        } else if unit < 0x800 {
            len += 2;
        } else if (0xD800..0xDC00).contains(&unit) {
            match units.get(i + 1) {
                Some(&low) if (0xDC00..0xE000).contains(&low) => {
                    len += 4;
                    i += 1;
                }
                _ => return Err(UnpairedSurrogate { index: i, unit }),
            }
        } else if (0xDC00..0xE000).contains(&unit) {
            return Err(UnpairedSurrogate { index: i, unit });
        } else {
            len += 3;
        }
        i += 1;
    }
    Ok(len)
}

/// Converts a UTF-16 code unit sequence to UTF-8, replacing unpaired
/// surrogates with U+FFFD.
///
/// This is the fallback for payloads that fail [`encoded_len_utf16`]; the
/// substitution means the bytes will not round-trip, which is logged once per
/// call so the producer can be fixed.
pub fn utf16_to_utf8_lossy(units: &[u16]) -> String {
    let mut lossy = false;
    let out: String = char::decode_utf16(units.iter().copied())
        .map(|r| {
            r.unwrap_or_else(|_| {
                lossy = true;
                char::REPLACEMENT_CHARACTER
            })
        })
        .collect();
    if lossy {
        log::warn!(
            "UTF-16 input contained unpaired surrogates; converted lossily, \
             the encoded string will not round-trip"
        );
    }
    out
}

/// Compares two strings by their UTF-16 code unit sequences.
///
/// This differs from byte order for supplementary-plane characters, which
/// sort between U+DFFF and U+E000 here. Deterministic map serialization
/// orders string keys this way for cross-runtime byte compatibility.
pub fn cmp_utf16(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_rejects_malformed_sequences() {
        assert!(is_valid_utf8(b"testing"));
        assert!(is_valid_utf8("héllo ⚙ 🚀".as_bytes()));
        assert!(is_valid_utf8(&[]));
        // Bare continuation byte.
        assert!(!is_valid_utf8(&[0x80]));
        // Over-long encoding of '/'.
        assert!(!is_valid_utf8(&[0xC0, 0xAF]));
        // Encoded surrogate U+D800.
        assert!(!is_valid_utf8(&[0xED, 0xA0, 0x80]));
        // Beyond U+10FFFF.
        assert!(!is_valid_utf8(&[0xF4, 0x90, 0x80, 0x80]));
        // Truncated four byte sequence.
        assert!(!is_valid_utf8(&[0xF0, 0x9F, 0x9A]));
    }

    #[test]
    fn utf16_lengths() {
        fn len_of(s: &str) -> usize {
            let units: Vec<u16> = s.encode_utf16().collect();
            encoded_len_utf16(&units).unwrap()
        }

        assert_eq!(len_of(""), 0);
        assert_eq!(len_of("testing"), 7);
        assert_eq!(len_of("héllo"), "héllo".len());
        assert_eq!(len_of("⚙"), 3);
        assert_eq!(len_of("🚀"), 4);
        assert_eq!(len_of("a⚙🚀"), 8);
    }

    #[test]
    fn unpaired_surrogates_detected() {
        // Lone high surrogate.
        let err = encoded_len_utf16(&[0x0041, 0xD800]).unwrap_err();
        assert_eq!(err.index(), 1);
        assert_eq!(err.unit(), 0xD800);
        // Lone low surrogate.
        assert!(encoded_len_utf16(&[0xDC00]).is_err());
        // High surrogate followed by a non-surrogate.
        assert!(encoded_len_utf16(&[0xD800, 0x0041]).is_err());
        // A valid pair is fine.
        assert_eq!(encoded_len_utf16(&[0xD83D, 0xDE80]).unwrap(), 4);
    }

    #[test]
    fn lossy_conversion_substitutes() {
        assert_eq!(utf16_to_utf8_lossy(&[0x0068, 0x0069]), "hi");
        assert_eq!(utf16_to_utf8_lossy(&[0xD800]), "\u{FFFD}");
    }

    #[test]
    fn utf16_order_differs_from_byte_order() {
        // U+FF61 (unit 0xFF61) sorts before U+1F680 (units 0xD83D 0xDE80) in
        // UTF-8 byte order, but after it in UTF-16 code unit order.
        let bmp = "\u{FF61}";
        let supplementary = "\u{1F680}";
        assert!(bmp.as_bytes() < supplementary.as_bytes());
        assert_eq!(cmp_utf16(bmp, supplementary), Ordering::Greater);
        assert_eq!(cmp_utf16("a", "b"), Ordering::Less);
        assert_eq!(cmp_utf16("a", "a"), Ordering::Equal);
    }
}
