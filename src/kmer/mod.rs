//! Two-bit nucleotide encoding and sliding-window k-mer streams.
//!
//! Symbols are encoded as `A = 0`, `C = 1`, `T = 2`, `G = 3`, which are bits one and two
//! of their ASCII codes. A k-mer is stored in the low `2k` bits of a `u64` with its first
//! symbol in the most significant position, so `k` is limited to 32.

use crate::error::{Error, Result};

pub const MIN_K: usize = 3;
pub const MAX_K: usize = 32;

const SYMBOLS: [u8; 4] = *b"ACTG";

pub fn encode_symbol(symbol: u8) -> Option<u8> {
    match symbol {
        b'A' | b'C' | b'T' | b'G' => Some((symbol >> 1) & 0b11),
        _ => None,
    }
}

pub fn decode_symbol(code: u8) -> char {
    SYMBOLS[usize::from(code & 0b11)] as char
}

pub fn check_k(k: usize) -> Result<()> {
    if (MIN_K..=MAX_K).contains(&k) {
        Ok(())
    } else {
        Err(Error::UnsupportedK(k))
    }
}

/// The number of distinct (k-1)-mers, i.e. `4^(k-1)`.
pub fn node_space(k: usize) -> u64 {
    1 << (2 * (k - 1))
}

fn node_mask(k: usize) -> u64 {
    node_space(k) - 1
}

/// The (k-1)-mer formed by the first k-1 symbols of a k-mer.
pub fn prefix(kmer: u64) -> u64 {
    kmer >> 2
}

/// The (k-1)-mer formed by the last k-1 symbols of a k-mer.
pub fn suffix(kmer: u64, k: usize) -> u64 {
    kmer & node_mask(k)
}

/// Decodes the `length` low-order symbols of `value`, most significant first.
pub fn decode_packed(value: u64, length: usize) -> String {
    (0..length)
        .rev()
        .map(|index| decode_symbol((value >> (2 * index)) as u8))
        .collect()
}

/// Lazy stream over the k-mers of a sequence.
///
/// Each step masks the window to its last k-1 symbols before shifting in the next one, so
/// every item is a full k-mer: with k = 3, "ACTG" yields ACT = 6 and CTG = 27.
///
/// The whole sequence is validated when the stream is created, so iteration itself cannot fail.
/// Cloning a fresh stream restarts it.
#[derive(Debug, Clone)]
pub struct KmerStream<'sequence> {
    sequence: &'sequence [u8],
    k: usize,
    window: u64,
    next_index: usize,
}

impl<'sequence> KmerStream<'sequence> {
    pub fn new(sequence: &'sequence [u8], k: usize) -> Result<Self> {
        check_k(k)?;

        let mut window = 0;
        for (position, &symbol) in sequence.iter().enumerate() {
            let code = encode_symbol(symbol).ok_or(Error::InvalidSymbol {
                symbol: symbol as char,
                position,
            })?;
            if position < k - 1 {
                window = (window << 2) | u64::from(code);
            }
        }

        Ok(Self {
            sequence,
            k,
            window,
            next_index: k - 1,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

impl Iterator for KmerStream<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        let symbol = *self.sequence.get(self.next_index)?;
        // Validated in `new`.
        let code = u64::from((symbol >> 1) & 0b11);
        self.window = ((self.window & node_mask(self.k)) << 2) | code;
        self.next_index += 1;
        Some(self.window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sequence.len().saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for KmerStream<'_> {}
