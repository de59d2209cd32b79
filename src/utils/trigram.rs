use std::collections::BTreeSet;

/// A trigram is a 3-byte sequence stored as u32 (only lower 24 bits used)
pub type Trigram = u32;

/// Marks the start of a word so prefixes get their own trigrams
pub const WORD_START: u8 = 0x02;
/// Marks the end of a word
pub const WORD_END: u8 = 0x03;

/// Convert 3 bytes to a trigram
#[inline]
pub fn bytes_to_trigram(b0: u8, b1: u8, b2: u8) -> Trigram {
    ((b0 as u32) << 16) | ((b1 as u32) << 8) | (b2 as u32)
}

/// Convert trigram back to bytes
#[cfg(test)]
fn trigram_to_bytes(t: Trigram) -> [u8; 3] {
    [
        ((t >> 16) & 0xFF) as u8,
        ((t >> 8) & 0xFF) as u8,
        (t & 0xFF) as u8,
    ]
}

/// Extract the unique trigrams of a (case-folded) word.
///
/// The word is padded with [`WORD_START`] and [`WORD_END`] before the
/// 3-byte windows are taken, so "a" yields one trigram and a word shares
/// its boundary trigrams only with words that start or end the same way.
pub fn trigramize(word: &str) -> BTreeSet<Trigram> {
    let bytes = word.as_bytes();
    if bytes.is_empty() {
        return BTreeSet::new();
    }

    let mut padded = Vec::with_capacity(bytes.len() + 2);
    padded.push(WORD_START);
    padded.extend_from_slice(bytes);
    padded.push(WORD_END);

    padded
        .windows(3)
        .map(|w| bytes_to_trigram(w[0], w[1], w[2]))
        .collect()
}

/// Number of trigrams two sets have in common
pub fn trigram_overlap(a: &BTreeSet<Trigram>, b: &BTreeSet<Trigram>) -> usize {
    a.intersection(b).count()
}
