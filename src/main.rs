// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use epubtrans::app_config::{self, Config, TranslationProvider};
use epubtrans::app_controller::{Controller, FileOutcome};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a book or every book in a directory (default command)
    Translate(TranslateArgs),

    /// Delete all saved progress and cached chunk translations
    Clear,

    /// Show the saved progress and cache statistics
    Stats,

    /// Generate shell completions for epubtrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Default)]
struct TranslateArgs {
    /// Input EPUB file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Directory for the translated book (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// API key; repeat the flag to rotate across several keys
    #[arg(
        short = 'k',
        long = "api-key",
        env = "EPUBTRANS_API_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    api_keys: Vec<String>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'ar', 'he')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Maximum simultaneous requests per chapter
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Maximum chunk size in characters
    #[arg(long)]
    max_chunk_size: Option<usize>,

    /// Attempts per chunk before keeping the original text
    #[arg(long)]
    max_retries: Option<u32>,
}

/// epubtrans - resumable EPUB translation with AI
///
/// Translates every chapter of an EPUB book with a remote AI model, caching
/// each translated chunk so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "epubtrans")]
#[command(version)]
#[command(about = "Resumable AI-powered EPUB translation")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "epubtrans translates EPUB books chapter by chapter using AI providers.
Translated chunks and chapter progress are stored in a local database, so a run
that is interrupted resumes from the last completed chapter.

EXAMPLES:
    epubtrans -k KEY1 -k KEY2 book.epub          # Translate with two rotating API keys
    epubtrans -f book.epub                       # Force overwrite an existing output
    epubtrans -p anthropic -m claude-3-haiku-20240307 book.epub
    epubtrans -s en -t he book.epub              # Translate from English to Hebrew
    epubtrans --log-level debug /books/          # Process an entire directory
    epubtrans stats                              # Show saved progress
    epubtrans clear                              # Forget all progress and cached chunks
    epubtrans completions bash > epubtrans.bash  # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. API keys may also be given through the
    EPUBTRANS_API_KEYS environment variable (comma or newline separated).

SUPPORTED PROVIDERS:
    gemini    - Google Gemini API (default: gemini-2.0-flash)
    anthropic - Anthropic Claude API")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    translate: TranslateArgs,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌",
            Level::Warn => "🚧",
            Level::Info => " ",
            Level::Debug => "🔍",
            Level::Trace => "📋",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Accept everything; the effective level is set through set_max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level((&level).into());
    }

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "epubtrans", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Clear) => {
            let config = load_config(&cli.config_path, cli.log_level.as_ref())?;
            Controller::with_config(config)?.clear_state().await
        }
        Some(Commands::Stats) => {
            let config = load_config(&cli.config_path, cli.log_level.as_ref())?;
            print_stats(&Controller::with_config(config)?).await
        }
        Some(Commands::Translate(args)) => run_translate(args, &cli.config_path, cli.log_level.as_ref()).await,
        None => run_translate(cli.translate, &cli.config_path, cli.log_level.as_ref()).await,
    }
}

/// Load the configuration file, creating it with defaults when absent
fn load_config(config_path: &str, log_level: Option<&CliLogLevel>) -> Result<Config> {
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    // Command line wins over the file
    match log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level((&config.log_level).into()),
    }

    Ok(config)
}

/// Apply command line overrides to the loaded configuration
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.model = model.clone();
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(max_concurrency) = options.max_concurrency {
        config.translation.max_concurrency = max_concurrency;
    }
    if let Some(max_chunk_size) = options.max_chunk_size {
        config.translation.max_chunk_size = max_chunk_size;
    }
    if let Some(max_retries) = options.max_retries {
        config.translation.max_retries = max_retries;
    }

    // Environment values may be newline separated as well
    let keys: Vec<String> = options
        .api_keys
        .iter()
        .flat_map(|k| k.lines())
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if !keys.is_empty() {
        config.translation.api_keys = keys;
    }
}

async fn run_translate(options: TranslateArgs, config_path: &str, log_level: Option<&CliLogLevel>) -> Result<()> {
    let input_path = options
        .input_path
        .clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

    let mut config = load_config(config_path, log_level)?;
    apply_overrides(&mut config, &options);
    config.validate().context("Configuration validation failed")?;

    info!(
        "Using {} ({}) with {} API key(s)",
        config.translation.provider.display_name(),
        config.translation.get_model(),
        config.translation.credentials().len()
    );

    let controller = Controller::with_config(config)?;

    if input_path.is_file() {
        let output_dir = match &options.output_dir {
            Some(dir) => dir.clone(),
            None => input_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        };
        if let FileOutcome::Translated { output_path, .. } =
            controller.run(input_path, output_dir, options.force_overwrite).await?
        {
            info!("Translated book saved to {:?}", output_path);
        }
    } else if input_path.is_dir() {
        let summary = controller.run_folder(input_path, options.force_overwrite).await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} book(s) failed to translate", summary.failed));
        }
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    }

    Ok(())
}

async fn print_stats(controller: &Controller) -> Result<()> {
    let stats = controller.stats().await?;
    println!("Cached chunks:      {}", stats.chunk_count);
    println!("Untranslated (fallback) chunks: {}", stats.fallback_count);
    match (&stats.progress, stats.progress_updated_at) {
        (Some(progress), updated_at) => {
            println!("Document:           {}", progress.document_name);
            println!("Next chapter index: {}", progress.next_chapter_index);
            if let Some(updated_at) = updated_at {
                println!("Last progress:      {}", updated_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"));
            }
        }
        (None, _) => println!("No saved progress"),
    }
    Ok(())
}
