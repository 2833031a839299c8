use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dbgsample::sampler::BinSelection;
use log::LevelFilter;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// The amount of log output.
    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand)]
pub enum CliCommands {
    /// Learn a transition model from a set of sequences.
    CreateModel(CreateModelCommand),

    /// Generate sequences from a transition model.
    Generate(GenerateCommand),
}

#[derive(Args)]
pub struct CreateModelCommand {
    /// The sequences to learn from.
    #[arg(long)]
    pub input_fasta: PathBuf,

    /// Where to write the model.
    #[arg(long)]
    pub output: PathBuf,

    /// The k-mer length, between 3 and 32.
    #[arg(short, default_value_t = 7)]
    pub k: usize,

    /// The number of positional bins of the transition matrix.
    #[arg(long, default_value_t = 1)]
    pub bins: usize,

    /// The memory budget in bytes. Defaults to the memory available on the system.
    #[arg(long)]
    pub memory_limit: Option<u64>,

    /// Skip characters that are not A, C, G or T, e.g. alignment gaps.
    #[arg(long)]
    pub skip_unknown_characters: bool,

    /// Convert lower case characters to upper case.
    #[arg(long)]
    pub capitalise_characters: bool,
}

#[derive(Args)]
pub struct GenerateCommand {
    /// The model created with `create-model`.
    #[arg(long)]
    pub model: PathBuf,

    /// Where to write the generated sequences as FASTA.
    #[arg(long)]
    pub output: PathBuf,

    /// The number of sequences to generate.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub samples: usize,

    #[arg(long, default_value_t = 0)]
    pub random_seed: u64,

    /// Walks that have not reached the end of a sequence after this many steps are truncated.
    #[arg(long, default_value_t = 1_000_000)]
    pub max_rounds: usize,

    #[arg(long, value_enum, default_value_t = CliBinSelection::Marginal)]
    pub bin_selection: CliBinSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliBinSelection {
    /// Use the transitions of the first positional bin.
    First,
    /// Average the transitions over all positional bins.
    Marginal,
}

impl From<CliBinSelection> for BinSelection {
    fn from(value: CliBinSelection) -> Self {
        match value {
            CliBinSelection::First => BinSelection::First,
            CliBinSelection::Marginal => BinSelection::Marginal,
        }
    }
}
