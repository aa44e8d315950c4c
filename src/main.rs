//! Fraud Simulator - Main Entry Point
//!
//! Generates synthetic transactions, derives classifier features and scores
//! single transactions or bulk CSV files with the pre-trained model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fraud_simulator::{
    bulk,
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    metrics::PredictionLog,
    models::{FeatureSchema, FraudDetector, OnnxScorer},
    FeaturePipeline, TransactionGenerator,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fraud-simulator")]
#[command(about = "Synthetic fraud transaction generator and scorer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic transactions and print them
    Generate {
        /// Number of transactions
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Draw every transaction from the fraud regime
        #[arg(long, conflicts_with = "fraud_rate")]
        fraud: bool,

        /// Share of transactions drawn from the fraud regime
        #[arg(long)]
        fraud_rate: Option<f64>,

        /// Use this customer id instead of sampling one
        #[arg(long)]
        customer_id: Option<u64>,

        /// Seed for a reproducible stream
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Derive the classifier feature matrix from a transaction CSV
    Features {
        /// Input CSV with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score every row of a transaction CSV
    Score {
        /// Input CSV with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate and score transactions one at a time, then summarize
    Simulate {
        /// Number of transactions
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,

        /// Share of transactions drawn from the fraud regime
        #[arg(long)]
        fraud_rate: Option<f64>,

        /// Seed for a reproducible stream
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One JSON object per line
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, from_file) = match &cli.config {
        Some(path) => (AppConfig::load_from_path(path)?, true),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => (AppConfig::load()?, true),
        None => (AppConfig::default(), false),
    };

    init_logging(&config)?;
    if !from_file {
        warn!("No configuration file found, using defaults");
    }

    match cli.command {
        Commands::Generate {
            count,
            fraud,
            fraud_rate,
            customer_id,
            seed,
            format,
        } => {
            let fraud_rate = if fraud {
                1.0
            } else {
                fraud_rate.unwrap_or(config.generator.fraud_rate)
            };
            let mut generator = make_generator(seed.or(config.generator.seed))?;
            let records = generator.generate_mixed_for(customer_id, count, fraud_rate)?;

            let stdout = io::stdout();
            match format {
                OutputFormat::Json => {
                    let mut out = BufWriter::new(stdout.lock());
                    for record in &records {
                        serde_json::to_writer(&mut out, record)?;
                        writeln!(out)?;
                    }
                    out.flush()?;
                }
                OutputFormat::Csv => bulk::write_records(&records, stdout.lock())?,
            }

            info!(count = records.len(), fraud_rate, "Transactions generated");
        }

        Commands::Features { input, output } => {
            let schema = load_schema(&config)?;
            let pipeline = FeaturePipeline::from_schema(&schema);

            let bulk_input = bulk::read_transactions(open_input(&input)?)?;
            let matrix = pipeline.transform(&bulk_input.records)?;
            bulk::write_features(&matrix, open_output(output.as_deref())?)?;

            info!(rows = matrix.len(), "Feature matrix written");
        }

        Commands::Score { input, output } => {
            let detector = load_detector(&config)?;

            let bulk_input = bulk::read_transactions(open_input(&input)?)?;
            let probabilities = detector.predict_fraud(&bulk_input.records)?;
            bulk::write_scored(&bulk_input, &probabilities, open_output(output.as_deref())?)?;

            let flagged = probabilities
                .iter()
                .filter(|&&p| p >= config.detection.risk_levels.high)
                .count();
            info!(rows = probabilities.len(), flagged, "Bulk scoring complete");
        }

        Commands::Simulate {
            count,
            fraud_rate,
            seed,
        } => {
            let detector = load_detector(&config)?;
            let fraud_rate = fraud_rate.unwrap_or(config.generator.fraud_rate);
            let mut generator = make_generator(seed.or(config.generator.seed))?;
            let mut log = PredictionLog::new();

            info!(count, fraud_rate, "Starting simulation");

            for tx in generator.generate_mixed(count, fraud_rate)? {
                let scored = detector.score_transaction(&tx, &config.detection.risk_levels)?;
                info!(
                    customer_id = scored.customer_id,
                    amount_usd = scored.amount_usd,
                    ip_country = %scored.ip_country,
                    is_fraud = scored.is_fraud,
                    probability = scored.probability,
                    risk_level = ?scored.risk_level,
                    "Transaction scored"
                );
                log.record(scored);
            }

            log.print_summary();
        }
    }

    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fraud_simulator={}", config.logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn make_generator(seed: Option<u64>) -> Result<TransactionGenerator> {
    let generator = match seed {
        Some(seed) => {
            info!(seed, "Using seeded generator");
            TransactionGenerator::from_seed(seed)?
        }
        None => TransactionGenerator::from_entropy()?,
    };
    Ok(generator)
}

fn load_schema(config: &AppConfig) -> Result<FeatureSchema> {
    let path = Path::new(&config.artifacts.schema_path);
    if path.exists() {
        FeatureSchema::load(path)
    } else {
        warn!(path = %path.display(), "Feature schema not found, using built-in v1 schema");
        Ok(FeatureSchema::default())
    }
}

fn load_detector(config: &AppConfig) -> Result<FraudDetector> {
    let schema = load_schema(config)?;
    let scorer = OnnxScorer::load(&config.artifacts.model_path, config.artifacts.onnx_threads)?;
    FraudDetector::new(schema, Arc::new(scorer))
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}
