use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::file_utils::FileManager;
use crate::latex::masker::{Masker, MaskingMode};
use crate::latex::metadata::extract_metadata;
use crate::latex::rules::MaskingRules;
use crate::project::compiler::{self, Compiler};
use crate::project::walker;
use crate::translation::orchestrator::{DocumentTranslator, PipelineStats, ProgressCallback};
use crate::translation::pipeline::PipelineConfig;
use crate::translation::services::LlmServices;
use crate::translation::terminology::TerminologyMap;

// @module: Application controller for LaTeX project translation

/// File name of the saved glossary inside the log directory
pub const TERMINOLOGY_FILE: &str = "terminology.json";

/// File name of the run log inside the log directory
pub const LOG_FILE: &str = "translation.log";

/// Where one project's artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    // @field: <output>/<name>
    pub root: PathBuf,
    // @field: Working copy that gets translated in place
    pub sandbox: PathBuf,
    pub log_dir: PathBuf,
    // @field: Final PDF location
    pub pdf_path: PathBuf,
}

impl ProjectLayout {
    /// Layout for `input` under `output_dir`
    pub fn new(input: &Path, output_dir: &Path, target_language: &str) -> Result<Self> {
        let name = input
            .file_stem()
            .or_else(|| input.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty() && n != ".")
            .or_else(|| {
                std::fs::canonicalize(input)
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            })
            .ok_or_else(|| anyhow!("Cannot derive a project name from {:?}", input))?;

        let root = output_dir.join(&name);
        Ok(Self {
            sandbox: root.join(format!("source_{}", target_language)),
            log_dir: root.join("logs"),
            pdf_path: root.join(format!("paper_{}.pdf", target_language)),
            root,
        })
    }
}

/// What to run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Project directory or single `.tex` file
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub skip_translation: bool,
    pub skip_compile: bool,
}

/// Result of translating one file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub masking_mode: MaskingMode,
    pub masked_spans: usize,
    pub missing_tokens: usize,
    pub stats: PipelineStats,
}

/// Result of a whole run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub layout: ProjectLayout,
    pub main_tex: PathBuf,
    pub terminology_terms: usize,
    pub files: Vec<FileReport>,
    pub stats: PipelineStats,
    /// Published PDF, when compilation ran and succeeded
    pub pdf: Option<PathBuf>,
    pub duration: Duration,
}

/// Main application controller for LaTeX paper translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    services: LlmServices,
    masker: Masker,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let services = LlmServices::from_config(&config);
        Ok(Self::with_services(config, services))
    }

    /// Controller over explicitly built services
    pub fn with_services(config: Config, services: LlmServices) -> Self {
        let masker = Masker::new(MaskingRules::from(&config.masking));
        Self {
            config,
            services,
            masker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Copy the input into a fresh sandbox
    pub fn prepare_sandbox(&self, input: &Path, layout: &ProjectLayout) -> Result<usize> {
        if !input.exists() {
            return Err(anyhow!("Input path does not exist: {:?}", input));
        }

        if input.is_dir() {
            let input_abs = std::fs::canonicalize(input).with_context(|| format!("Cannot resolve {:?}", input))?;
            FileManager::ensure_dir(&layout.root)?;
            let root_abs = std::fs::canonicalize(&layout.root)?;
            if root_abs.starts_with(&input_abs) {
                return Err(anyhow!(
                    "Output directory {:?} lies inside the input project {:?}",
                    layout.root,
                    input
                ));
            }
        }

        FileManager::reset_dir(&layout.sandbox)?;
        FileManager::ensure_dir(&layout.log_dir)?;

        if input.is_dir() {
            let copied = FileManager::copy_dir(input, &layout.sandbox)?;
            info!("Copied {} files into {:?}", copied, layout.sandbox);
            Ok(copied)
        } else {
            let file_name = input
                .file_name()
                .ok_or_else(|| anyhow!("Input has no file name: {:?}", input))?;
            FileManager::copy_file(input, layout.sandbox.join(file_name))?;
            Ok(1)
        }
    }

    /// Build, save and return the glossary for the project
    pub async fn build_terminology(&self, main_tex: &Path, log_dir: &Path) -> Result<TerminologyMap> {
        let source = FileManager::read_lossy(main_tex)?;
        let metadata = extract_metadata(&source);
        if let Some(title) = &metadata.title {
            info!("Paper title: {}", title);
        }

        let terminology = match &metadata.abstract_text {
            Some(abstract_text) => self.services.generate_terminology(abstract_text).await,
            None => {
                warn!("No abstract found, translating without a glossary");
                TerminologyMap::new()
            }
        };
        info!("Terminology: {} terms", terminology.len());
        terminology.save(&log_dir.join(TERMINOLOGY_FILE))?;
        Ok(terminology)
    }

    fn chunk_progress_bar(multi_progress: &MultiProgress, file: &Path) -> ProgressBar {
        let progress_bar = multi_progress.add(ProgressBar::new(0));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message(
            file.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        progress_bar
    }

    /// Translate one file of the sandbox in place
    pub async fn translate_file(
        &self,
        path: &Path,
        terminology: &TerminologyMap,
        multi_progress: &MultiProgress,
    ) -> Result<FileReport> {
        let source = FileManager::read_lossy(path)?;
        let progress_bar = Self::chunk_progress_bar(multi_progress, path);
        let bar = progress_bar.clone();
        let progress: ProgressCallback = Arc::new(move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        });

        let pipeline = &self.config.pipeline;
        let translator = DocumentTranslator::new(
            &self.services,
            PipelineConfig::from(pipeline),
            pipeline.max_chunk_chars,
            pipeline.concurrent_chunks,
        )
        .with_progress(progress);

        let result = translator.translate_latex(&self.masker, &source, terminology).await;
        progress_bar.finish_and_clear();

        FileManager::write_to_file(path, &result.text)?;
        if result.masking_mode == MaskingMode::Fallback {
            warn!(
                "{:?} could not be parsed as LaTeX; only math was protected, references and environments were translated as prose",
                path
            );
        }
        info!("Translated {:?}: {}", path, result.stats.summary());

        Ok(FileReport {
            path: path.to_path_buf(),
            masking_mode: result.masking_mode,
            masked_spans: result.masked_spans,
            missing_tokens: result.missing_tokens.len(),
            stats: result.stats,
        })
    }

    /// Run the main workflow: sandbox, glossary, translation, compilation
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(options, &multi_progress).await
    }

    async fn run_with_progress(&self, options: RunOptions, multi_progress: &MultiProgress) -> Result<RunSummary> {
        let start_time = Instant::now();
        let layout = ProjectLayout::new(&options.input_path, &options.output_dir, &self.config.target_language)?;
        self.prepare_sandbox(&options.input_path, &layout)?;

        let main_tex = walker::find_main_tex(&layout.sandbox)?
            .ok_or_else(|| anyhow!("No .tex file with \\documentclass found in {:?}", options.input_path))?;
        info!("Main file: {:?}", main_tex);

        let mut terminology_terms = 0;
        let files = Mutex::new(Vec::new());

        if options.skip_translation {
            info!("Skipping translation");
        } else {
            let terminology = self.build_terminology(&main_tex, &layout.log_dir).await?;
            terminology_terms = terminology.len();

            let terminology = &terminology;
            let files_ref = &files;
            walker::walk(&layout.sandbox, &main_tex, move |file| async move {
                let report = self.translate_file(&file, terminology, multi_progress).await?;
                files_ref.lock().push(report);
                Ok(())
            })
            .await;
        }

        let files = files.into_inner();
        let mut stats = PipelineStats::default();
        for report in &files {
            stats.merge(&report.stats);
        }
        let missing: usize = files.iter().map(|f| f.missing_tokens).sum();
        if missing > 0 {
            warn!("{} masked spans were lost across the project", missing);
        }

        let pdf = if self.config.compile.enabled && !options.skip_compile {
            self.compile(&layout, &main_tex).await?
        } else {
            debug!("Compilation disabled");
            None
        };

        let summary = RunSummary {
            layout,
            main_tex,
            terminology_terms,
            files,
            stats,
            pdf,
            duration: start_time.elapsed(),
        };
        info!(
            "Done in {}: {} files, {}",
            Self::format_duration(summary.duration),
            summary.files.len(),
            summary.stats.summary()
        );
        Ok(summary)
    }

    /// Prepare fonts and compile; a failed compilation is not an error
    async fn compile(&self, layout: &ProjectLayout, main_tex: &Path) -> Result<Option<PathBuf>> {
        let settings = &self.config.compile;
        if settings.cjk_fonts {
            compiler::sanitize_project(&layout.sandbox)?;
            compiler::inject_fonts(main_tex)?;
        }

        let outcome = Compiler::new(&settings.engine_command, Duration::from_secs(settings.timeout_secs))
            .compile(main_tex)
            .await;
        if !outcome.success {
            warn!("Compilation failed, translated sources remain in {:?}", layout.sandbox);
            debug!("Compiler output:\n{}", outcome.output);
            return Ok(None);
        }

        match outcome.pdf_path {
            Some(pdf) => {
                compiler::publish_pdf(&pdf, &layout.pdf_path)?;
                info!("PDF written to {:?}", layout.pdf_path);
                Ok(Some(layout.pdf_path.clone()))
            }
            None => {
                warn!("Compiler reported success but produced no PDF");
                Ok(None)
            }
        }
    }

    // @formats: Duration as "1h 2m 3s" / "2m 3s" / "3.4s"
    fn format_duration(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{:.1}s", duration.as_secs_f64())
        }
    }
}
