use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("genome IO error: {0}")]
    GenomeIO(#[from] compact_genome::io::error::IOError),

    #[error("model serialisation error: {0}")]
    ModelSerialisation(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("model deserialisation error: {0}")]
    ModelDeserialisation(#[from] ciborium::de::Error<std::io::Error>),

    #[error("the model file has format {found:?}, but {expected:?} was expected")]
    ModelFormat { found: String, expected: String },

    #[error("logger initialisation error: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("invalid symbol {symbol:?} at position {position}, expected one of A, C, T, G")]
    InvalidSymbol { symbol: char, position: usize },

    #[error("k = {0} is not supported, k must be in [3, 32]")]
    UnsupportedK(usize),

    #[error("the number of positional bins must be at least one")]
    ZeroBins,

    #[error("{stage} requires {required} bytes, but only {available} bytes are available")]
    ResourceExceeded {
        stage: &'static str,
        required: u128,
        available: u64,
    },

    #[error("the model is empty")]
    EmptyModel,

    #[error("node {0:?} is not part of the model")]
    UnknownNode(crate::graph::NodeId),

    #[error("a sentinel node cannot be decoded into nucleotides")]
    SentinelInPath,
}
