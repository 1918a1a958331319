use anyhow::Context;
use captcha_ocr::{Dataset, ImageCleaner, Predictor, ServerConfig, TrainConfig, Trainer};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "captcha-ocr")]
#[command(about = "Train and run a four-digit CAPTCHA recognizer")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fit classifier weights from a directory of images named after their digits
    Train(TrainArgs),
    /// Print the digits shown in one or more images
    Predict(PredictArgs),
    /// Serve predictions over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory of training images, e.g. img/0193.png
    #[arg(long, env = "CAPTCHA_DATA_DIR", default_value = "img")]
    pub data: PathBuf,

    /// Where to write the trained weights
    #[arg(long, env = "CAPTCHA_WEIGHTS", default_value = "digit_cnn.safetensors")]
    pub output: PathBuf,

    #[arg(long, default_value = "15")]
    pub epochs: usize,

    #[arg(long, default_value = "64")]
    pub batch_size: usize,

    #[arg(long, default_value = "0.001")]
    pub learning_rate: f64,

    /// Seed for shuffling and initialisation (random if not set)
    #[arg(long, env = "CAPTCHA_SEED")]
    pub seed: Option<u64>,

    /// Optional JSON file receiving per-epoch loss and accuracy
    #[arg(long)]
    pub history: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Trained weights produced by `train`
    #[arg(long, env = "CAPTCHA_WEIGHTS", default_value = "digit_cnn.safetensors")]
    pub weights: PathBuf,

    /// Images to recognize
    #[arg(required = true)]
    pub images: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "CAPTCHA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "CAPTCHA_PORT", default_value = "9292")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 1MB)
    #[arg(long, env = "CAPTCHA_MAX_FILE_SIZE", default_value = "1048576")]
    pub max_file_size: usize,

    /// Trained weights produced by `train`
    #[arg(long, env = "CAPTCHA_WEIGHTS", default_value = "digit_cnn.safetensors")]
    pub weights: PathBuf,
}

impl From<&TrainArgs> for TrainConfig {
    fn from(args: &TrainArgs) -> Self {
        Self {
            epochs: args.epochs,
            batch_size: args.batch_size,
            learning_rate: args.learning_rate,
            seed: args.seed,
        }
    }
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            weights_path: args.weights,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Train(args) => train(&args),
        Command::Predict(args) => predict(&args),
        Command::Serve(args) => {
            tracing::info!("Starting captcha-ocr v{}", env!("CARGO_PKG_VERSION"));
            captcha_ocr::server::run(ServerConfig::from(args)).await
        }
    }
}

fn train(args: &TrainArgs) -> anyhow::Result<()> {
    let dataset = Dataset::from_dir(&args.data, &ImageCleaner::default())
        .with_context(|| format!("building dataset from {}", args.data.display()))?;

    let outcome = Trainer::from_config(TrainConfig::from(args)).train(&dataset)?;
    outcome.weights.save(&args.output)?;

    if let Some(path) = &args.history {
        let report = serde_json::to_string_pretty(&outcome.history)?;
        std::fs::write(path, report)
            .with_context(|| format!("writing training history to {}", path.display()))?;
    }

    tracing::info!(
        "Training finished, final accuracy {:.4}",
        outcome.final_accuracy()
    );
    Ok(())
}

fn predict(args: &PredictArgs) -> anyhow::Result<()> {
    let predictor = Predictor::from_file(&args.weights)?;

    for path in &args.images {
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        let result = predictor.predict(&image)?;
        println!("{}: {}", path.display(), result);
    }
    Ok(())
}
