// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use paperglot::app_config::{self, Config, TranslationProvider};
use paperglot::app_controller::{Controller, LOG_FILE, ProjectLayout, RunOptions};
use paperglot::file_utils::FileManager;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    OpenAI,
    Anthropic,
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
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
    /// Translate a LaTeX project (default command)
    Translate(TranslateArgs),

    /// Generate shell completions for paperglot
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// LaTeX project directory or single .tex file
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Target language code (e.g., 'zh', 'ja', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Only prepare and compile the project, without translating
    #[arg(long)]
    skip_translation: bool,

    /// Translate without compiling the result
    #[arg(long)]
    skip_compile: bool,
}

/// paperglot - LaTeX paper translation with AI
///
/// Translates the prose of a LaTeX project while keeping math, citations,
/// references, tables and code byte-for-byte intact.
#[derive(Parser, Debug)]
#[command(name = "paperglot")]
#[command(version)]
#[command(about = "AI-powered LaTeX paper translation tool")]
#[command(long_about = "paperglot copies a LaTeX project into a sandbox, masks everything that must not be translated, \
translates the prose chunk by chunk with a translate/critique/fix loop, restores the masked spans and compiles the result with XeLaTeX.

EXAMPLES:
    paperglot ./my-paper                        # Translate using default config
    paperglot -t ja ./my-paper                  # Translate into Japanese
    paperglot -p ollama -m qwen2.5:14b main.tex # Use a local model
    paperglot --skip-compile ./my-paper         # Translate sources only
    paperglot completions bash > paperglot.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. OPENAI_API_KEY, ANTHROPIC_API_KEY,
    OPENAI_BASE_URL and MODEL_NAME override the file.

OUTPUT:
    <output>/<name>/source_<lang>/   translated sources
    <output>/<name>/logs/            translation.log and terminology.json
    <output>/<name>/paper_<lang>.pdf compiled paper")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// LaTeX project directory or single .tex file
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Target language code (e.g., 'zh', 'ja', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Only prepare and compile the project, without translating
    #[arg(long)]
    skip_translation: bool,

    /// Translate without compiling the result
    #[arg(long)]
    skip_compile: bool,
}

/// Log file shared by the logger once a run knows its log directory
static LOG_FILE_SINK: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

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

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }

    // @appends: Log lines to translation.log from now on
    fn attach_file(path: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        *LOG_FILE_SINK.lock() = Some(file);
        Ok(())
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );

            if let Some(file) = LOG_FILE_SINK.lock().as_mut() {
                let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "{} - {} - {} - {}", stamp, record.target(), record.level(), record.args());
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(file) = LOG_FILE_SINK.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    // Handle subcommands
    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "paperglot", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => {
            // Default behavior - use top-level args
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

            let translate_args = TranslateArgs {
                input_path,
                provider: cli.provider,
                model: cli.model,
                target_language: cli.target_language,
                config_path: cli.config_path,
                log_level: cli.log_level,
                output_dir: cli.output_dir,
                skip_translation: cli.skip_translation,
                skip_compile: cli.skip_compile,
            };
            run_translate(translate_args).await
        }
    }
}

/// Load the configuration and apply environment and CLI overrides
fn load_config(options: &TranslateArgs) -> Result<Config> {
    let mut config = Config::load_or_create(Path::new(&options.config_path))?;
    config.apply_env_overrides();

    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }

    if let Some(model) = &options.model {
        let active = config.translation.provider.clone();
        if let Some(provider_config) = config.translation.provider_config_mut(&active) {
            provider_config.model = model.clone();
        }
    }

    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }

    // Update log level in config if specified via command line
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(config_log_level.to_level_filter());
    }

    let config = load_config(&options)?;
    log::set_max_level(config.log_level.to_level_filter());

    if !options.input_path.exists() {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    let layout = ProjectLayout::new(&options.input_path, &options.output_dir, &config.target_language)?;
    FileManager::ensure_dir(&layout.log_dir)?;
    CustomLogger::attach_file(&layout.log_dir.join(LOG_FILE))?;

    info!(
        "Translating {:?} into {} with {} ({})",
        options.input_path,
        config.target_language,
        config.translation.provider.display_name(),
        config.translation.get_model()
    );

    let controller = Controller::with_config(config)?;
    let run = controller
        .run(RunOptions {
            input_path: options.input_path.clone(),
            output_dir: options.output_dir.clone(),
            skip_translation: options.skip_translation,
            skip_compile: options.skip_compile,
        })
        .await;

    match run {
        Ok(summary) => {
            if summary.stats.fallbacks() > 0 {
                info!(
                    "{} chunks were left untranslated; see {:?}",
                    summary.stats.fallbacks(),
                    layout.log_dir.join(LOG_FILE)
                );
            }
            match &summary.pdf {
                Some(pdf) => info!("Success: {:?}", pdf),
                None => info!("Translated sources: {:?}", summary.layout.sandbox),
            }
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            Err(e)
        }
    }
}
