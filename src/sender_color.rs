//! Deterministic per-sender username colors.
//!
//! Every sender is mapped to one of eight fixed color buckets,
//! computed purely from the sender's user ID so that a given user
//! always shows up in the same color, across rooms and across restarts.

/// One of the eight username color buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorBucket {
    Username1,
    Username2,
    Username3,
    Username4,
    Username5,
    Username6,
    Username7,
    Username8,
}

impl ColorBucket {
    /// All buckets, in order.
    pub const ALL: [ColorBucket; 8] = [
        Self::Username1,
        Self::Username2,
        Self::Username3,
        Self::Username4,
        Self::Username5,
        Self::Username6,
        Self::Username7,
        Self::Username8,
    ];

    /// Returns the 1-based index of this bucket (1 through 8).
    pub const fn index(self) -> u8 {
        match self {
            Self::Username1 => 1,
            Self::Username2 => 2,
            Self::Username3 => 3,
            Self::Username4 => 4,
            Self::Username5 => 5,
            Self::Username6 => 6,
            Self::Username7 => 7,
            Self::Username8 => 8,
        }
    }

    /// Returns the conventional username color for this bucket as `0xRRGGBB`.
    pub const fn rgb(self) -> u32 {
        match self {
            Self::Username1 => 0x368BD6,
            Self::Username2 => 0xAC3BA8,
            Self::Username3 => 0x03B381,
            Self::Username4 => 0xE64F7A,
            Self::Username5 => 0xFF812D,
            Self::Username6 => 0x2DC2C5,
            Self::Username7 => 0x5C56F5,
            Self::Username8 => 0x74D12C,
        }
    }
}

/// Returns the color bucket for the given sender ID.
///
/// The hash is the classic `hash * 31 + c` string hash over UTF-16 code units,
/// with 32-bit signed wraparound. Its absolute value is taken in 64 bits,
/// so even `i32::MIN` reduces to a valid bucket.
pub fn bucket_for(sender_id: &str) -> ColorBucket {
    if sender_id.is_empty() {
        return ColorBucket::Username1;
    }
    let hash = sender_id.encode_utf16().fold(0i32, |hash, unit| {
        (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    });
    let slot = i64::from(hash).abs() % 8;
    ColorBucket::ALL[slot as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference hash, written the long way with an explicit 32-bit truncation.
    fn reference_hash(s: &str) -> i32 {
        let mut hash: i64 = 0;
        for unit in s.encode_utf16() {
            hash = (hash * 31 + i64::from(unit)) as i32 as i64;
        }
        hash as i32
    }

    #[test]
    fn empty_sender_uses_first_bucket() {
        assert_eq!(bucket_for(""), ColorBucket::Username1);
    }

    #[test]
    fn same_sender_always_gets_same_bucket() {
        for id in ["@alice:example.org", "@bob:matrix.org", "@\u{1F600}:example.org"] {
            let first = bucket_for(id);
            for _ in 0..10 {
                assert_eq!(bucket_for(id), first);
            }
        }
    }

    #[test]
    fn bucket_matches_reference_hash() {
        for id in ["a", "@alice:example.org", "@carol:server.tld", "\u{00e9}\u{00e8}", "x".repeat(200).as_str()] {
            let expected = (i64::from(reference_hash(id)).abs() % 8 + 1) as u8;
            assert_eq!(bucket_for(id).index(), expected, "sender {id:?}");
        }
    }

    #[test]
    fn single_char_sender() {
        // 'a' = 97, 97 % 8 = 1, so bucket 2.
        assert_eq!(bucket_for("a"), ColorBucket::Username2);
        // 'h' = 104, 104 % 8 = 0, so bucket 1.
        assert_eq!(bucket_for("h"), ColorBucket::Username1);
    }

    #[test]
    fn hashing_uses_utf16_code_units() {
        // U+1F600 is the surrogate pair 0xD83D 0xDE00.
        let expected = {
            let hash = 0xD83Di32.wrapping_mul(31).wrapping_add(0xDE00);
            (i64::from(hash).abs() % 8 + 1) as u8
        };
        assert_eq!(bucket_for("\u{1F600}").index(), expected);
    }

    #[test]
    fn index_is_always_in_range() {
        for n in 0..500 {
            let id = format!("@user{n}:example.org");
            let index = bucket_for(&id).index();
            assert!((1..=8).contains(&index));
        }
    }

    #[test]
    fn min_hash_still_yields_a_valid_bucket() {
        // This sender id hashes to exactly `i32::MIN`, whose absolute value overflows an `i32`.
        assert_eq!(bucket_for("polygenelubricants"), ColorBucket::Username1);
    }
}
