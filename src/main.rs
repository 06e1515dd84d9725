use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use neurostride::app::{install_signal_handlers, lifecycle_events, spawn_event_logger};
use neurostride::{
    EngineHandle, EventBus, EventFilter, ExerciseMode, FrameSource, JsonLinesSource,
    MotionEngine, NeuroStrideConfig, SessionOrchestrator, ValgusConfig,
};

/// Event bus capacity; observers are local and drain quickly
const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "neurostride")]
#[command(about = "Exercise form analysis from pose keypoint streams")]
#[command(version)]
#[command(long_about = "Reads pose keypoint frames as JSON lines, computes joint angles, \
knee valgus, squat depth and gait width, counts repetitions, and writes one JSON report \
line per tick followed by a session summary.")]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "neurostride.toml",
        help = "Path to TOML configuration file"
    )]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without processing input")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Append logs to a file in addition to stderr")]
    log_file: Option<String>,

    /// Input file, `-` for stdin
    #[arg(short, long, default_value = "-", help = "JSON-lines command file, or - for stdin")]
    input: String,

    /// Starting exercise mode, overriding the configuration
    #[arg(short, long, value_enum, help = "Exercise mode to start in")]
    mode: Option<ExerciseMode>,

    /// Use the strict knee valgus ratios
    #[arg(long, help = "Use strict knee valgus ratios (0.7 / 0.8)")]
    strict_valgus: bool,

    /// Fail on the first undecodable input line
    #[arg(long, help = "Abort on undecodable input instead of skipping the line")]
    strict_input: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args)?;

    info!("Starting NeuroStride v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match NeuroStrideConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(mode) = args.mode {
        config.engine.mode = mode;
    }
    if args.strict_valgus {
        config.valgus = ValgusConfig::strict();
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let engine = MotionEngine::new(config).map_err(|e| {
        error!("Failed to create motion engine: {}", e);
        e
    })?;

    let event_bus = EventBus::with_debug_logging(EVENT_BUS_CAPACITY);
    let mut orchestrator = SessionOrchestrator::new(EngineHandle::new(engine), event_bus.clone())
        .with_strict_input(args.strict_input);

    let shutdown = orchestrator.shutdown_handle();
    install_signal_handlers(shutdown.clone());
    // Presence events fire on every subject change; only trace them when debugging
    let filter = if args.debug {
        EventFilter::All
    } else {
        lifecycle_events()
    };
    let logger = spawn_event_logger(&event_bus, filter, shutdown.token().clone());

    let mut source: Box<dyn FrameSource> = if args.input == "-" {
        info!("Reading commands from stdin");
        Box::new(JsonLinesSource::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&args.input)
            .await
            .with_context(|| format!("Failed to open input file {}", args.input))?;
        info!("Reading commands from {}", args.input);
        Box::new(JsonLinesSource::new(file))
    };

    let mut stdout = tokio::io::stdout();
    let result = orchestrator.run(source.as_mut(), &mut stdout).await;

    // Stop the logger and any signal listeners
    shutdown.token().cancel();
    let _ = logger.await;

    match result {
        Ok(summary) => {
            info!(
                "Session {} complete: {} reps, accuracy {}",
                summary.session_id,
                summary.stats.total,
                summary
                    .accuracy_percent
                    .map(|a| format!("{}%", a))
                    .unwrap_or_else(|| "-".to_string())
            );
            Ok(())
        }
        Err(e) => {
            error!("Session failed: {}", e);
            Err(e.into())
        }
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("neurostride={}", log_level)));

    // stdout carries the report stream, so logs go to stderr
    let (writer, guard) = match args.log_file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (
                BoxMakeWriter::new(std::io::stderr.and(non_blocking)),
                Some(guard),
            )
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = args.log_file.is_none();

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# NeuroStride Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Override any key with NEUROSTRIDE_<SECTION>__<KEY>");
    println!("# e.g. NEUROSTRIDE_ENGINE__MODE=walk");
    println!();

    let rendered = toml::to_string_pretty(&NeuroStrideConfig::default())
        .context("Failed to render default configuration")?;
    println!("{}", rendered);
    Ok(())
}
