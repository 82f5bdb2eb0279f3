//! spec-decode CLI
//!
//! Command-line interface for speculative decoding over bigram tables.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use candle_core::Device;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spec_decode::engine::sampler::from_config;
use spec_decode::model::bigram::DEFAULT_TENSOR_NAME;
use spec_decode::{
    generate_autoregressive, BigramModel, RecordingTracer, SamplingConfig, SpeculativeConfig,
    SpeculativeEngine,
};

#[derive(Parser)]
#[command(name = "spec-decode")]
#[command(about = "Speculative decoding with a drafter and a target model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a continuation of a token prompt
    Generate {
        /// Drafter: a .safetensors table or a whitespace-separated token corpus
        #[arg(short, long)]
        drafter: PathBuf,

        /// Target: a .safetensors table or a whitespace-separated token corpus
        #[arg(short = 'T', long)]
        target: PathBuf,

        /// Vocabulary size, required when building a model from a corpus
        #[arg(long)]
        vocab_size: Option<usize>,

        /// Add-k smoothing for corpus-built models
        #[arg(long, default_value = "0.1")]
        smoothing: f32,

        /// Tensor name inside safetensors files
        #[arg(long, default_value = DEFAULT_TENSOR_NAME)]
        tensor_name: String,

        /// Prompt token ids, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        prompt: Vec<u32>,

        /// JSON file with a speculative configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Tokens drafted per round
        #[arg(short = 'k', long)]
        gamma: Option<usize>,

        /// Maximum new tokens to generate
        #[arg(short = 'n', long)]
        max_tokens: Option<usize>,

        /// End-of-sequence ids, comma separated
        #[arg(long, value_delimiter = ',')]
        eos: Option<Vec<u32>>,

        /// Pad id
        #[arg(long)]
        pad: Option<u32>,

        /// Reuse incremental model state between passes
        #[arg(long)]
        use_cache: bool,

        /// Resample rejections from the raw target distribution
        #[arg(long)]
        skip_sample_adjustment: bool,

        /// Start drafting right away instead of taking the first token from the target
        #[arg(long)]
        no_first_target: bool,

        /// Temperature for sampling (0 = greedy)
        #[arg(short, long, default_value = "0.0")]
        temperature: f32,

        /// Top-k filtering (0 = disabled)
        #[arg(long, default_value = "0")]
        top_k: usize,

        /// Top-p filtering (1.0 = disabled)
        #[arg(long, default_value = "1.0")]
        top_p: f32,

        /// Seed for sampling; the acceptance test gets a seed derived from it
        #[arg(short, long)]
        seed: Option<u64>,

        /// Also run the target alone and compare
        #[arg(long)]
        compare: bool,

        /// Print every round to stderr as JSON
        #[arg(long)]
        trace: bool,

        /// Print the full result as JSON instead of bare token ids
        #[arg(long)]
        json: bool,
    },

    /// Build a bigram table from a token corpus and save it as safetensors
    BuildTable {
        /// Whitespace-separated token corpus
        #[arg(short, long)]
        corpus: PathBuf,

        /// Vocabulary size
        #[arg(long)]
        vocab_size: usize,

        /// Add-k smoothing
        #[arg(long, default_value = "0.1")]
        smoothing: f32,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Tensor name inside the file
        #[arg(long, default_value = DEFAULT_TENSOR_NAME)]
        tensor_name: String,
    },
}

/// Read a whitespace-separated list of token ids.
fn read_corpus(path: &Path) -> Result<Vec<u32>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus {}", path.display()))?;
    content
        .split_whitespace()
        .map(|t| {
            t.parse::<u32>()
                .with_context(|| format!("Invalid token '{}' in {}", t, path.display()))
        })
        .collect()
}

/// Load a model from a safetensors table, or build one from a corpus.
fn load_model(
    path: &Path,
    tensor_name: &str,
    vocab_size: Option<usize>,
    smoothing: f32,
    device: &Device,
) -> Result<BigramModel> {
    let is_table = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("safetensors"));
    if is_table {
        return BigramModel::from_safetensors(path, tensor_name, device)
            .with_context(|| format!("Failed to load table from {}", path.display()));
    }

    let vocab_size = vocab_size.context("--vocab-size is required for corpus-built models")?;
    let corpus = read_corpus(path)?;
    Ok(BigramModel::from_corpus(&corpus, vocab_size, smoothing, device)?)
}

fn format_tokens(tokens: &[u32]) -> String {
    tokens
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let device = Device::Cpu;

    match cli.command {
        Commands::Generate {
            drafter,
            target,
            vocab_size,
            smoothing,
            tensor_name,
            prompt,
            config,
            gamma,
            max_tokens,
            eos,
            pad,
            use_cache,
            skip_sample_adjustment,
            no_first_target,
            temperature,
            top_k,
            top_p,
            seed,
            compare,
            trace,
            json,
        } => {
            let drafter = load_model(&drafter, &tensor_name, vocab_size, smoothing, &device)?;
            let target = load_model(&target, &tensor_name, vocab_size, smoothing, &device)?;

            let mut spec_config = match &config {
                Some(path) => SpeculativeConfig::from_file(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => SpeculativeConfig::default(),
            };
            if let Some(gamma) = gamma {
                spec_config.num_speculative_tokens = gamma;
            }
            if let Some(max_tokens) = max_tokens {
                spec_config.max_new_tokens = max_tokens;
            }
            if let Some(eos) = eos {
                spec_config.eos_token_ids = eos;
            }
            if let Some(pad) = pad {
                spec_config.pad_token_id = pad;
            }
            spec_config.use_cache |= use_cache;
            spec_config.skip_sample_adjustment |= skip_sample_adjustment;
            if no_first_target {
                spec_config.first_target = false;
            }
            if let Some(seed) = seed {
                spec_config = spec_config.seed_from_sampling(seed);
            }

            let sampling = SamplingConfig {
                temperature,
                top_k,
                top_p,
                seed,
            };

            let mut recorder = RecordingTracer::new();
            let gen_start = Instant::now();
            let output = {
                let mut engine = SpeculativeEngine::new(&drafter, &target, spec_config.clone())?;
                if trace {
                    engine = engine.with_tracer(&mut recorder);
                }
                let mut strategy = from_config(&sampling);
                engine.generate(&prompt, &mut strategy)?
            };
            let gen_time = gen_start.elapsed();

            if trace {
                for event in recorder.events() {
                    eprintln!("{}", serde_json::to_string(event)?);
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", format_tokens(&output.tokens));
            }

            eprintln!("\n--- Stats ---");
            eprintln!("Time: {:.3}s", gen_time.as_secs_f64());
            eprintln!("Tokens generated: {}", output.tokens.len());
            eprintln!("Finish reason: {:?}", output.finish_reason);
            eprintln!("Rounds: {}", output.stats.rounds);
            eprintln!(
                "Acceptance: {}/{} ({:.1}%)",
                output.stats.accepted,
                output.stats.drafted,
                output.acceptance_rate * 100.0
            );
            eprintln!(
                "Target passes: {} ({:.2} tokens/pass)",
                output.stats.target_passes,
                output.stats.tokens_per_target_pass()
            );

            if compare {
                let mut strategy = from_config(&sampling);
                let baseline =
                    generate_autoregressive(&target, &prompt, &spec_config, &mut strategy)?;

                eprintln!("\n--- Target only ---");
                eprintln!("{}", format_tokens(&baseline.tokens));
                eprintln!("Target passes: {}", baseline.stats.target_passes);
                eprintln!(
                    "Identical output: {}",
                    if baseline.tokens == output.tokens { "yes" } else { "no" }
                );
            }
        }

        Commands::BuildTable {
            corpus,
            vocab_size,
            smoothing,
            output,
            tensor_name,
        } => {
            let tokens = read_corpus(&corpus)?;
            let model = BigramModel::from_corpus(&tokens, vocab_size, smoothing, &device)?;
            model
                .save_safetensors(&output, &tensor_name)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!(
                tokens = tokens.len(),
                vocab_size,
                "Saved bigram table to {}",
                output.display()
            );
        }
    }

    Ok(())
}
