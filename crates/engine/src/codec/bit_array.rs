//! Fixed-width integers packed into 64-bit words, as found in chunk `data` long arrays.
//!
//! Two word layouts exist in the wild. Since MC 1.16 an entry never straddles two words and the
//! unused high bits of each word are padding (`Aligned`). Older worlds pack entries back to back
//! so an entry may continue in the next word (`Spanning`). Both go through the same
//! [`BitPackedArray`] and are selected with [`PackingFormat`].

use crate::error::DecodeError;

/// Which word layout a packed array uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PackingFormat {
    /// Entries never cross a word boundary (MC 1.16 and later).
    #[default]
    Aligned,
    /// Entries are contiguous and may cross word boundaries (MC 1.15 and earlier).
    Spanning,
}

impl PackingFormat {
    /// Number of words needed for `len` entries of `bits` bits.
    pub fn word_count(self, bits: u32, len: usize) -> usize {
        match self {
            PackingFormat::Aligned => Aligned::word_count(bits, len),
            PackingFormat::Spanning => Spanning::word_count(bits, len),
        }
    }

    fn read(self, words: &[u64], bits: u32, index: usize) -> u64 {
        match self {
            PackingFormat::Aligned => Aligned::read(words, bits, index),
            PackingFormat::Spanning => Spanning::read(words, bits, index),
        }
    }

    fn write(self, words: &mut [u64], bits: u32, index: usize, value: u64) {
        match self {
            PackingFormat::Aligned => Aligned::write(words, bits, index, value),
            PackingFormat::Spanning => Spanning::write(words, bits, index, value),
        }
    }
}

/// One word layout. Implementors are stateless; `bits` is always in `1..=32` and `index` is
/// always in bounds when these are called.
trait WordLayout {
    fn word_count(bits: u32, len: usize) -> usize;
    fn read(words: &[u64], bits: u32, index: usize) -> u64;
    fn write(words: &mut [u64], bits: u32, index: usize, value: u64);
}

struct Aligned;

impl WordLayout for Aligned {
    fn word_count(bits: u32, len: usize) -> usize {
        len.div_ceil(64 / bits as usize)
    }

    fn read(words: &[u64], bits: u32, index: usize) -> u64 {
        let per_word = 64 / bits as usize;
        let word = words[index / per_word];
        let offset = (index % per_word) as u32 * bits;
        (word >> offset) & mask(bits)
    }

    fn write(words: &mut [u64], bits: u32, index: usize, value: u64) {
        let per_word = 64 / bits as usize;
        let word = &mut words[index / per_word];
        let offset = (index % per_word) as u32 * bits;
        *word &= !(mask(bits) << offset);
        *word |= (value & mask(bits)) << offset;
    }
}

struct Spanning;

impl WordLayout for Spanning {
    fn word_count(bits: u32, len: usize) -> usize {
        (len * bits as usize).div_ceil(64)
    }

    fn read(words: &[u64], bits: u32, index: usize) -> u64 {
        let start = index * bits as usize;
        let first = start >> 6;
        let last = (start + bits as usize - 1) >> 6;
        let offset = (start & 63) as u32;
        if first == last {
            (words[first] >> offset) & mask(bits)
        } else {
            ((words[first] >> offset) | (words[last] << (64 - offset))) & mask(bits)
        }
    }

    fn write(words: &mut [u64], bits: u32, index: usize, value: u64) {
        let value = value & mask(bits);
        let start = index * bits as usize;
        let first = start >> 6;
        let last = (start + bits as usize - 1) >> 6;
        let offset = (start & 63) as u32;
        words[first] = (words[first] & !(mask(bits) << offset)) | (value << offset);
        if first != last {
            let low_bits = 64 - offset;
            let high_bits = bits - low_bits;
            words[last] = (words[last] >> high_bits << high_bits) | (value >> low_bits);
        }
    }
}

#[inline]
const fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

/// A read-only sequence of `len` integers, each `bits_per_entry` bits wide.
///
/// An array with no backing words is the single-entry-palette shortcut: every index reads 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPackedArray {
    bits: u32,
    len: usize,
    words: Vec<u64>,
    format: PackingFormat,
}

impl BitPackedArray {
    /// Wrap `words` as a packed array of `len` entries.
    ///
    /// Fails if `bits_per_entry` is outside `1..=32` or if the length of `words` differs from
    /// what `format` requires for `len` entries.
    pub fn new(
        bits_per_entry: u8,
        len: usize,
        words: Vec<u64>,
        format: PackingFormat,
    ) -> Result<Self, DecodeError> {
        if !(1..=32).contains(&bits_per_entry) {
            return Err(DecodeError::BitsPerEntry(bits_per_entry));
        }
        let bits = bits_per_entry as u32;
        let expected = format.word_count(bits, len);
        if words.len() != expected {
            return Err(DecodeError::WordCount {
                expected,
                actual: words.len(),
            });
        }
        Ok(Self {
            bits,
            len,
            words,
            format,
        })
    }

    /// Wrap a signed NBT long array (the on-disk representation) without copying bit patterns.
    pub fn from_longs(
        bits_per_entry: u8,
        len: usize,
        longs: &[i64],
        format: PackingFormat,
    ) -> Result<Self, DecodeError> {
        let words = longs.iter().map(|&l| l as u64).collect();
        Self::new(bits_per_entry, len, words, format)
    }

    /// Pack `values` into a fresh array. Values wider than `bits_per_entry` are truncated.
    pub fn pack(
        bits_per_entry: u8,
        values: &[u32],
        format: PackingFormat,
    ) -> Result<Self, DecodeError> {
        if !(1..=32).contains(&bits_per_entry) {
            return Err(DecodeError::BitsPerEntry(bits_per_entry));
        }
        let bits = bits_per_entry as u32;
        let mut words = vec![0u64; format.word_count(bits, values.len())];
        for (i, &v) in values.iter().enumerate() {
            format.write(&mut words, bits, i, v as u64);
        }
        Ok(Self {
            bits,
            len: values.len(),
            words,
            format,
        })
    }

    /// Read the entry at `index`.
    pub fn get(&self, index: usize) -> Result<u32, DecodeError> {
        if index >= self.len {
            return Err(DecodeError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(self.format.read(&self.words, self.bits, index) as u32)
    }

    /// All entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).map(move |i| self.format.read(&self.words, self.bits, i) as u32)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bits_per_entry(&self) -> u8 {
        self.bits as u8
    }

    pub fn format(&self) -> PackingFormat {
        self.format
    }

    /// Backing words as signed longs, ready to be written back out as an NBT long array.
    pub fn to_longs(&self) -> Vec<i64> {
        self.words.iter().map(|&w| w as i64).collect()
    }
}
