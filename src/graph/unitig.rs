//! Nucleotide storage of compacted nodes.

use compact_genome::{
    implementation::{alphabets::dna_alphabet::DnaAlphabet, DefaultGenome},
    interface::alphabet::Alphabet,
};
use traitsequence::interface::Sequence;

use crate::error::{Error, Result};

/// The nucleotides spelled by a contracted chain of (k-1)-mers.
pub type Unitig = DefaultGenome<DnaAlphabet>;

/// Converts upper-case nucleotides into a genome.
pub fn genome_from_ascii(sequence: &[u8]) -> Result<Unitig> {
    sequence
        .iter()
        .enumerate()
        .map(|(position, &symbol)| {
            DnaAlphabet::ascii_to_character(symbol).map_err(|_| Error::InvalidSymbol {
                symbol: symbol as char,
                position,
            })
        })
        .collect()
}

pub fn genome_ascii(unitig: &Unitig) -> impl '_ + Iterator<Item = u8> {
    unitig.iter().cloned().map(DnaAlphabet::character_to_ascii)
}

pub fn genome_to_string(unitig: &Unitig) -> String {
    genome_ascii(unitig).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::{genome_ascii, genome_from_ascii, genome_to_string};
    use crate::error::Error;

    #[test]
    fn keeps_long_sequences() {
        let sequence = "ACGTTGCAACGTTGCAACGTTGCAACGTTGCAGGGTTTAAACCC";
        let unitig = genome_from_ascii(sequence.as_bytes()).unwrap();
        assert_eq!(genome_to_string(&unitig), sequence);
        assert_eq!(genome_ascii(&unitig).skip(40).collect::<Vec<_>>(), b"ACCC");
    }

    #[test]
    fn rejects_gaps() {
        assert!(matches!(
            genome_from_ascii(b"AC-GT"),
            Err(Error::InvalidSymbol {
                symbol: '-',
                position: 2
            })
        ));
    }
}
