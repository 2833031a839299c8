use crate::{
    error::{Error, Result},
    graph::{
        unitig::{genome_ascii, Unitig},
        NodeId,
    },
    kmer::{decode_packed, decode_symbol},
};

/// Turns node paths back into nucleotide strings.
pub struct SequenceDecoder<'unitigs> {
    k: usize,
    unitigs: &'unitigs [Unitig],
}

impl<'unitigs> SequenceDecoder<'unitigs> {
    pub fn new(k: usize, unitigs: &'unitigs [Unitig]) -> Self {
        Self { k, unitigs }
    }

    /// Decodes the first node completely and then appends what each further node adds
    /// beyond its (k-2)-symbol overlap with its predecessor.
    pub fn decode(&self, path: &[NodeId]) -> Result<String> {
        let overlap = self.k - 2;
        let mut result = String::new();

        for (offset, &node) in path.iter().enumerate() {
            match node {
                NodeId::Kmer(value) if offset == 0 => {
                    result.push_str(&decode_packed(value, self.k - 1))
                }
                NodeId::Kmer(value) => result.push(decode_symbol(value as u8)),
                NodeId::Unitig(index) => {
                    let symbols = self
                        .unitigs
                        .get(index as usize)
                        .ok_or(Error::UnknownNode(node))?;
                    let skip = if offset == 0 { 0 } else { overlap };
                    result.extend(genome_ascii(symbols).skip(skip).map(char::from));
                }
                NodeId::Start | NodeId::End => return Err(Error::SentinelInPath),
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::SequenceDecoder;
    use crate::{
        capacity::BuildStrategy,
        error::Error,
        graph::{builder::build_graph, compaction::compact, unitig::genome_to_string, NodeId},
        kmer::{prefix, suffix, KmerStream},
        progress::NoProgress,
    };

    #[test]
    fn single_node() {
        let decoder = SequenceDecoder::new(5, &[]);
        let kmer = KmerStream::new(b"GATTA", 5).unwrap().next().unwrap();
        assert_eq!(
            decoder.decode(&[NodeId::Kmer(prefix(kmer))]).unwrap(),
            "GATT"
        );
        assert_eq!(decoder.decode(&[]).unwrap(), "");
    }

    #[test]
    fn kmer_path_reconstructs_sequence() {
        let sequence = "GATTACACCGTGGGTACAGTTTAGACA";
        let k = 6;
        let kmers: Vec<_> = KmerStream::new(sequence.as_bytes(), k).unwrap().collect();
        let mut path = vec![NodeId::Kmer(prefix(kmers[0]))];
        path.extend(kmers.iter().map(|&kmer| NodeId::Kmer(suffix(kmer, k))));
        let decoder = SequenceDecoder::new(k, &[]);
        assert_eq!(decoder.decode(&path).unwrap(), sequence);
    }

    #[test]
    fn unitig_path_reconstructs_sequence() {
        let built = build_graph(
            &["ACGTA", "ACGCA"],
            3,
            1,
            BuildStrategy::Streaming,
            &mut NoProgress,
        )
        .unwrap();
        let compacted = compact(&built.graph, &mut NoProgress).unwrap();
        let find = |symbols: &str| {
            let index = compacted
                .unitigs()
                .iter()
                .position(|unitig| genome_to_string(unitig) == symbols)
                .unwrap();
            NodeId::Unitig(index as u32)
        };
        let decoder = SequenceDecoder::new(3, compacted.unitigs());
        assert_eq!(
            decoder.decode(&[find("ACG"), find("GTA")]).unwrap(),
            "ACGTA"
        );
        assert_eq!(
            decoder.decode(&[find("ACG"), find("GCA")]).unwrap(),
            "ACGCA"
        );
    }

    #[test]
    fn sentinels_cannot_be_decoded() {
        let decoder = SequenceDecoder::new(3, &[]);
        assert!(matches!(
            decoder.decode(&[NodeId::Kmer(1), NodeId::End]),
            Err(Error::SentinelInPath)
        ));
    }
}
