use clap::{Parser, Subcommand};
use codecstack::logging::{init_logging, LogFormat, LogLevel};
use codecstack::{ArrayBuf, Buffer, Codec, CodecRegistry, CodecStack, DType};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "codecstack", about = "Encode and decode data through a stack of codecs")]
struct Cli {
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file through the stack
    Encode {
        /// Stack description (JSON): a stack config, a codec config, or a list of codec configs
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decode a file through the stack, in reverse order
    Decode {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Encode a file, decode it back into an input-sized buffer and compare digests
    Roundtrip {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        /// Optionally write the round-tripped bytes here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Resolve a stack description and print its canonical configuration
    Config {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the registered codec ids
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);
    let registry = CodecRegistry::default();

    match cli.command {

        // ── Encode ───────────────────────────────────────────────────────────
        Commands::Encode { config, input, output } => {
            let stack = load(&registry, &config)?;
            let data = std::fs::read(&input)?;
            let encoded = stack.encode(Buffer::Bytes(data))?;
            std::fs::write(&output, encoded.as_bytes())?;
            println!("Encoded {} → {} ({} B)", input.display(), output.display(), encoded.len());
        }

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { config, input, output } => {
            let stack = load(&registry, &config)?;
            let data = std::fs::read(&input)?;
            let decoded = stack.decode(Buffer::Bytes(data))?;
            std::fs::write(&output, decoded.as_bytes())?;
            println!("Decoded {} → {} ({} B)", input.display(), output.display(), decoded.len());
        }

        // ── Roundtrip ────────────────────────────────────────────────────────
        Commands::Roundtrip { config, input, output } => {
            let stack = load(&registry, &config)?;
            let data = std::fs::read(&input)?;
            let encoded = stack.encode(Buffer::Bytes(data.clone()))?;
            let encoded_len = encoded.len();
            let mut roundtripped = ArrayBuf::zeros(DType::U8, vec![data.len()]);
            stack.decode_into(encoded, &mut roundtripped)?;

            let before = blake3::hash(&data);
            let after  = blake3::hash(roundtripped.as_bytes());
            println!("Stack     {stack}");
            println!("  Input    {:>12} B  {}", data.len(), hex::encode(before.as_bytes()));
            println!("  Encoded  {:>12} B", encoded_len);
            println!("  Output   {:>12} B  {}", roundtripped.nbytes(), hex::encode(after.as_bytes()));

            if let Some(output) = output {
                std::fs::write(&output, roundtripped.as_bytes())?;
            }
            if before != after {
                return Err("round-tripped data does not match the input".into());
            }
            println!("Roundtrip OK");
        }

        // ── Config ───────────────────────────────────────────────────────────
        Commands::Config { config } => {
            let stack = load(&registry, &config)?;
            println!("{}", stack.get_config().to_json_pretty()?);
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List => {
            for id in registry.ids() {
                println!("{id}");
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn load(registry: &CodecRegistry, path: &Path) -> Result<CodecStack, Box<dyn std::error::Error>> {
    let stack = registry.load_stack(path)?;
    info!(path = %path.display(), members = stack.len(), "loaded stack");
    Ok(stack)
}
