use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
};

use clap::Parser;
use cli::{Cli, CliCommands, CreateModelCommand, GenerateCommand};
use compact_genome::{
    implementation::{
        alphabets::dna_alphabet::DnaAlphabet, handle_sequence_store::HandleSequenceStore,
        DefaultGenome, DefaultSubGenome,
    },
    interface::{
        alphabet::Alphabet, sequence::GenomeSequence, sequence_store::SequenceStore,
    },
    io::fasta::{read_fasta_file, write_fasta_file, FastaRecord},
};
use dbgsample::{
    capacity::MemoryBudget,
    error::Result,
    graph::unitig::genome_from_ascii,
    pipeline::{estimate_model, generate_sequences, PipelineConfig},
    progress::LogProgress,
    sampler::{CancellationToken, SamplerConfig},
    transition::TransitionModel,
};
use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

mod cli;

fn main() {
    let cli = Cli::parse();

    if let Err(error) = run(cli) {
        println!("Error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    TermLogger::init(
        cli.log_level,
        ConfigBuilder::new().build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    match cli.command {
        CliCommands::CreateModel(create_model_command) => create_model(create_model_command),
        CliCommands::Generate(generate_command) => generate(generate_command),
    }
}

fn create_model(create_model_command: CreateModelCommand) -> Result<()> {
    // Load sequences.
    let mut sequence_store =
        HandleSequenceStore::<DnaAlphabet, DefaultGenome<_>, DefaultSubGenome<_>>::new();
    let records = read_fasta_file(
        &create_model_command.input_fasta,
        &mut sequence_store,
        create_model_command.skip_unknown_characters,
        create_model_command.capitalise_characters,
    )?;
    let sequences: Vec<Vec<u8>> = records
        .iter()
        .map(|record| {
            sequence_store
                .get(&record.sequence_handle)
                .iter()
                .map(|character| DnaAlphabet::character_to_ascii(character.clone()))
                .collect()
        })
        .collect();
    info!(
        "Loaded {} sequences with {} nucleotides from {:?}",
        sequences.len(),
        sequences.iter().map(Vec::len).sum::<usize>(),
        create_model_command.input_fasta
    );

    // Create model.
    let memory_budget = create_model_command
        .memory_limit
        .map(MemoryBudget::new)
        .unwrap_or_else(MemoryBudget::detect_or_default);
    let config = PipelineConfig {
        k: create_model_command.k,
        bins: create_model_command.bins,
        memory_budget,
    };
    let model = estimate_model(&sequences, &config, &mut LogProgress::default())?;

    // Write model.
    let mut output = BufWriter::new(File::create(&create_model_command.output)?);
    model.write(&mut output)?;
    output.flush()?;
    info!("Wrote model to {:?}", create_model_command.output);

    Ok(())
}

fn generate(generate_command: GenerateCommand) -> Result<()> {
    // Load model.
    let mut input = BufReader::new(File::open(&generate_command.model)?);
    let model = TransitionModel::read(&mut input)?;

    // Initialise random number generator.
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(generate_command.random_seed);

    let config = SamplerConfig {
        samples: generate_command.samples,
        max_rounds: generate_command.max_rounds,
        bin_selection: generate_command.bin_selection.into(),
    };
    let generated = generate_sequences(
        &model,
        config,
        &mut rng,
        &CancellationToken::default(),
        &mut LogProgress::default(),
    )?;

    let records = generated
        .into_iter()
        .enumerate()
        .map(|(index, generated)| {
            Ok(FastaRecord {
                id: format!("Sequence_{index}"),
                comment: String::new(),
                sequence_handle: genome_from_ascii(generated.sequence.as_bytes())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    write_fasta_file(
        &generate_command.output,
        &records,
        &HandleSequenceStore::<DnaAlphabet, DefaultGenome<_>, DefaultSubGenome<_>>::new(),
    )?;
    info!(
        "Wrote {} sequences to {:?}",
        records.len(),
        generate_command.output
    );

    Ok(())
}
