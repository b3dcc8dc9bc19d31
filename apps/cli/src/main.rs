use std::path::PathBuf;

use anyhow::{Context, Result};
use biosx_core::session::{ExtractConfig, ExtractSession, LegacyCodecKind};
use biosx_core::{ExtractError, ExtractReport, PackedOrder, ScanStrategy};
use clap::{Parser, ValueEnum};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "UEFI / Phoenix firmware image extractor", long_about = None)]
struct Args {
    /// Firmware image to extract
    image: PathBuf,

    /// Offset to start scanning at, in hex (e.g. 7F0000 or 0x7F0000)
    #[arg(value_parser = parse_hex)]
    start: Option<usize>,

    /// Load settings from a TOML file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory leaves are written below
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Codec for compression type 1
    #[arg(long, value_enum)]
    codec: Option<CodecArg>,

    /// External decompressor program and arguments (for --codec external)
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    external: Option<Vec<String>>,

    /// Byte order of packed section headers
    #[arg(long, value_enum)]
    section_order: Option<SectionOrderArg>,

    /// Maximum container nesting depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// How to look for the next container after unrecognized bytes
    #[arg(long, value_enum)]
    scan: Option<ScanArg>,

    /// Step used by the stride scan, in hex
    #[arg(long, value_parser = parse_hex)]
    stride: Option<usize>,

    /// Print the listing without writing any files
    #[arg(long)]
    dry_run: bool,

    /// Save the effective configuration to this TOML file
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CodecArg {
    Efi,
    Tiano,
    Lzss,
    External,
}

impl From<CodecArg> for LegacyCodecKind {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Efi => LegacyCodecKind::Efi,
            CodecArg::Tiano => LegacyCodecKind::Tiano,
            CodecArg::Lzss => LegacyCodecKind::Lzss,
            CodecArg::External => LegacyCodecKind::External,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SectionOrderArg {
    LenThenType,
    TypeThenLen,
}

impl From<SectionOrderArg> for PackedOrder {
    fn from(arg: SectionOrderArg) -> Self {
        match arg {
            SectionOrderArg::LenThenType => PackedOrder::LenThenType,
            SectionOrderArg::TypeThenLen => PackedOrder::TypeThenLen,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScanArg {
    Signature,
    Stride,
}

impl From<ScanArg> for ScanStrategy {
    fn from(arg: ScanArg) -> Self {
        match arg {
            ScanArg::Signature => ScanStrategy::Signature,
            ScanArg::Stride => ScanStrategy::Stride,
        }
    }
}

fn parse_hex(s: &str) -> Result<usize, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    usize::from_str_radix(digits, 16).map_err(|e| format!("invalid hex offset '{}': {}", s, e))
}

/// Build the effective configuration: file first, then flags.
fn build_config(args: &Args) -> Result<ExtractConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExtractConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output_dir = output.display().to_string();
    }
    if let Some(codec) = args.codec {
        config.legacy_codec = codec.into();
    }
    if let Some(command) = &args.external {
        config.external_command = Some(command.clone());
    }
    if let Some(order) = args.section_order {
        config.section_order = order.into();
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(scan) = args.scan {
        config.scan = scan.into();
    }
    if let Some(stride) = args.stride {
        config.stride = stride;
    }
    if args.dry_run {
        config.write_files = false;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<ExtractReport> {
    let config = build_config(args)?;
    if let Some(path) = &args.write_config {
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        info!(path = %path.display(), "Configuration saved");
    }

    let session = ExtractSession::new(config);
    let report = session
        .run(&args.image, args.start.unwrap_or(0))
        .with_context(|| format!("Failed to extract {}", args.image.display()))?;
    Ok(report)
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match run(&args) {
        Ok(report) => print!("{}", report.to_text()),
        Err(e) => {
            if matches!(e.downcast_ref::<ExtractError>(), Some(ExtractError::NoContainer)) {
                error!("No recognizable firmware container in {}", args.image.display());
            } else {
                error!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}
