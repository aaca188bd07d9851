/*!
 * Preparing a translated project for XeLaTeX and compiling it.
 *
 * CJK output needs `xeCJK` and a CJK font set; packages that pin the
 * document fonts conflict with it and are commented out first.
 */

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::file_utils::FileManager;

/// Prefix of every line disabled by sanitizing
pub const SANITIZED_MARKER: &str = "% PAPERGLOT_SANITIZED: ";

/// First line of the injected font block
const FONT_BLOCK_HEADER: &str = "% --- paperglot CJK font setup ---";

/// Packages that take over the main font, optionally with options
const CONFLICTING_PACKAGES: [&str; 13] = [
    "times", "palatino", "mathptmx", "newtxtext", "newtxmath", "helvet", "avant", "courier", "chancery",
    "bookman", "newcent", "charter", "fourier",
];

/// Lines that load a conflicting package or set `\pdfoutput`
static CONFLICT_LINE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    let mut patterns: Vec<String> = CONFLICTING_PACKAGES
        .iter()
        .map(|name| format!(r"\\usepackage\s*(?:\[[^\]]*\])?\s*\{{{}\}}", name))
        .collect();
    patterns.push(r"\\usepackage\s*\[T1\]\s*\{fontenc\}".to_string());
    patterns.push(r"\\usepackage\s*\[utf8\]\s*\{inputenc\}".to_string());
    patterns.push(r"\\pdfoutput\s*=\s*\d+".to_string());

    patterns
        .into_iter()
        .map(|pattern| {
            Regex::new(&format!(r"(?m)^([ \t]*)({}.*)$", pattern)).expect("Invalid font conflict regex")
        })
        .collect()
});

static DOCUMENTCLASS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\documentclass\s*(?:\[.*?\])?\s*\{[^}]*\}").expect("Invalid documentclass regex")
});

/// Comment out font settings that break xeCJK
pub fn sanitize_tex_content(content: &str) -> String {
    let replacement = format!("${{1}}{}${{2}}", SANITIZED_MARKER);
    CONFLICT_LINE_REGEXES
        .iter()
        .fold(content.to_string(), |text, regex| {
            regex.replace_all(&text, replacement.as_str()).into_owned()
        })
}

/// Sanitize every `.tex`, `.sty` and `.cls` file under `project_dir`
///
/// Returns the number of files changed. Unreadable files are skipped.
pub fn sanitize_project(project_dir: &Path) -> Result<usize> {
    info!("Sanitizing font usage in {:?}", project_dir);
    let mut changed = 0;
    for path in FileManager::find_files(project_dir, &["tex", "sty", "cls"])? {
        let content = match FileManager::read_lossy(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to sanitize {:?}: {}", path, e);
                continue;
            }
        };
        let sanitized = sanitize_tex_content(&content);
        if sanitized != content {
            FileManager::write_to_file(&path, &sanitized)?;
            debug!("Sanitized {:?}", path);
            changed += 1;
        }
    }
    Ok(changed)
}

/// Font block for the current platform
pub fn font_block() -> String {
    let fonts = if cfg!(target_os = "macos") {
        "\\setCJKmainfont[BoldFont=Songti SC Bold, ItalicFont=Songti SC Light]{Songti SC}\n\
         \\setCJKsansfont{Heiti SC}\n\
         \\setCJKmonofont{STFangsong}\n"
    } else {
        "\\setCJKmainfont{SimSun}\n\
         \\setCJKsansfont{SimHei}\n\
         \\setCJKmonofont{FangSong}\n"
    };
    format!("\n{}\n\\usepackage{{xeCJK}}\n{}% ---\n", FONT_BLOCK_HEADER, fonts)
}

/// Insert the font block after `\documentclass`, or at the top without one
///
/// Returns `None` when the block is already present.
pub fn inject_fonts_into(content: &str) -> Option<String> {
    if content.contains(FONT_BLOCK_HEADER) {
        return None;
    }
    let block = font_block();
    match DOCUMENTCLASS_REGEX.find(content) {
        Some(m) => {
            let mut text = String::with_capacity(content.len() + block.len());
            text.push_str(&content[..m.end()]);
            text.push_str(&block);
            text.push_str(&content[m.end()..]);
            Some(text)
        }
        None => {
            warn!("Could not find \\documentclass to inject fonts, prepending instead");
            Some(format!("{}{}", block, content))
        }
    }
}

/// Inject the font block into the main file on disk
pub fn inject_fonts(main_tex: &Path) -> Result<()> {
    let content = FileManager::read_lossy(main_tex)?;
    match inject_fonts_into(&content) {
        Some(injected) => {
            FileManager::write_to_file(main_tex, &injected)?;
            info!("Injected font settings into {:?}", main_tex);
        }
        None => debug!("Font settings already present in {:?}", main_tex),
    }
    Ok(())
}

/// Outcome of one compiler run
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub success: bool,
    /// PDF produced next to the main file, when compilation succeeded
    pub pdf_path: Option<PathBuf>,
    /// Combined stdout and stderr, or the reason the run failed
    pub output: String,
}

impl CompileOutcome {
    fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            pdf_path: None,
            output: output.into(),
        }
    }
}

/// Runs `latexmk` with XeLaTeX
#[derive(Debug, Clone)]
pub struct Compiler {
    command: String,
    timeout: Duration,
}

impl Compiler {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    fn args(main_file: &str) -> Vec<String> {
        vec![
            "-xelatex".to_string(),
            "-interaction=nonstopmode".to_string(),
            "-file-line-error".to_string(),
            "-halt-on-error".to_string(),
            main_file.to_string(),
        ]
    }

    /// Compile `main_tex` inside its own directory; failures are reported, not raised
    pub async fn compile(&self, main_tex: &Path) -> CompileOutcome {
        let Some(file_name) = main_tex.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return CompileOutcome::failed(format!("Not a file: {:?}", main_tex));
        };
        let work_dir = main_tex.parent().unwrap_or_else(|| Path::new("."));
        info!("Compiling {} in {:?}", file_name, work_dir);

        let child = Command::new(&self.command)
            .args(Self::args(&file_name))
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("Failed to run {}: {}", self.command, e);
                return CompileOutcome::failed(e.to_string());
            }
            Err(_) => {
                error!("Compilation timed out after {:?}", self.timeout);
                return CompileOutcome::failed("Timeout");
            }
        };

        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if !output.status.success() {
            error!("Compilation failed ({})", output.status);
            let log_path = main_tex.with_extension("log");
            if log_path.exists() {
                info!("Log file available at {:?}", log_path);
            }
            return CompileOutcome::failed(text);
        }

        let pdf = main_tex.with_extension("pdf");
        info!("Compilation successful");
        CompileOutcome {
            success: true,
            pdf_path: pdf.exists().then_some(pdf),
            output: text,
        }
    }
}

/// Copy the compiled PDF to its final location
pub fn publish_pdf(pdf: &Path, destination: &Path) -> Result<()> {
    FileManager::copy_file(pdf, destination)
        .with_context(|| format!("Failed to publish PDF to {:?}", destination))
}
