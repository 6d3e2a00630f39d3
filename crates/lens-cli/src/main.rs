//! EVM bytecode feature extractor.
//!
//! Usage:
//!   evm-lens 0x6080604052348015600f57600080fd5b
//!   evm-lens contracts.txt --workers 8 --format jsonl > features.jsonl
//!   evm-lens contract.bin --disasm
//!   evm-lens corpus/*.txt --summary 25 --format text

mod report;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use lens_core::mapped_file::hex_lines;
use lens_core::{
    par_map_ordered, ExtractorConfig, FeatureExtractor, Fork, MappedFile, OpcodeHistogram, Sample,
    UnknownOpcodePolicy,
};

use report::OutputFormat;

#[derive(Parser)]
#[command(name = "evm-lens")]
#[command(about = "Opcode-level feature extraction and risk scoring for EVM bytecode")]
struct Cli {
    /// Hex literals (starting with 0x) or paths to raw bytecode / hex corpus files
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Path to an extractor config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Batch worker count (default: available cores - 1)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Opcode table fork (frontier .. london)
    #[arg(long)]
    fork: Option<Fork>,

    /// What to do with undefined opcodes: stop or invalid
    #[arg(long)]
    unknown_opcodes: Option<UnknownOpcodePolicy>,

    /// Fill the memory access features
    #[arg(long)]
    memory_features: bool,

    /// Output format: json, jsonl or text
    #[arg(short, long, default_value = "jsonl")]
    format: OutputFormat,

    /// Print the disassembly listing instead of features
    #[arg(long)]
    disasm: bool,

    /// Print the N most common mnemonics across all inputs instead of features
    #[arg(long, num_args = 0..=1, default_missing_value = "20", value_name = "N")]
    summary: Option<usize>,
}

/// An input kept alive for the duration of the run; samples borrow from it.
enum Source {
    Hex(String),
    File { path: PathBuf, file: MappedFile },
}

impl Source {
    fn load(input: &str) -> Result<Self> {
        if input.starts_with("0x") || input.starts_with("0X") {
            return Ok(Source::Hex(input.to_string()));
        }
        let path = Path::new(input).to_path_buf();
        let file = MappedFile::open(&path)?;
        if file.is_empty() {
            log::warn!("{} is empty", path.display());
        }
        Ok(Source::File { path, file })
    }

    fn push_samples<'a>(&'a self, out: &mut Vec<Sample<'a, String>>) {
        match self {
            Source::Hex(text) => out.push(Sample::new(text.clone(), text)),
            Source::File { path, file } => match file.hex_corpus() {
                Some(text) => {
                    let before = out.len();
                    out.extend(
                        hex_lines(text).map(|(line, hex)| Sample::new(format!("{}:{}", path.display(), line), hex)),
                    );
                    log::debug!("{}: {} hex samples", path.display(), out.len() - before);
                }
                None => out.push(Sample::new(path.display().to_string(), file.bytes())),
            },
        }
    }
}

fn build_config(cli: &Cli) -> Result<ExtractorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            ExtractorConfig::load(path)?
        }
        None => ExtractorConfig::default(),
    };

    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }
    if let Some(fork) = cli.fork {
        config.fork = fork;
    }
    if let Some(policy) = cli.unknown_opcodes {
        config.unknown_opcodes = policy;
    }
    if cli.memory_features {
        config.memory_features = true;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    let workers = config.worker_count();
    let extractor = FeatureExtractor::new(config);

    let sources = cli
        .inputs
        .iter()
        .map(|input| Source::load(input))
        .collect::<Result<Vec<_>>>()?;

    let mut samples = Vec::new();
    for source in &sources {
        source.push_samples(&mut samples);
    }
    log::info!("Loaded {} samples from {} inputs", samples.len(), sources.len());

    if samples.is_empty() {
        log::warn!("No samples to process");
        return Ok(());
    }

    if cli.disasm {
        for sample in &samples {
            report::print_listing(&sample.label, &extractor.decode(sample.bytecode));
        }
    }

    if let Some(top) = cli.summary {
        let count = samples.len();
        let histograms = par_map_ordered(samples, workers, |sample| {
            OpcodeHistogram::from_program(&extractor.decode(sample.bytecode))
        })?;
        let mut corpus = OpcodeHistogram::new();
        for hist in &histograms {
            corpus.merge(hist);
        }
        report::print_summary(count, &corpus, top, cli.format);
        return Ok(());
    }

    if !cli.disasm {
        let rows = extractor.extract_batch_with(samples, workers)?;
        report::print_features(&rows, cli.format);
    }

    Ok(())
}
