/*!
 * Common test utilities for the paperglot test suite
 */

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use paperglot::errors::{ProviderError, TranslationError};
use paperglot::providers::mock::{MockProvider, MockRequest};
use paperglot::translation::{ChunkServices, CritiqueVerdict, TerminologyMap};

/// Routes library logs through the test harness; safe to call repeatedly
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file, with parent directories, under `dir`
pub fn create_test_file(dir: &Path, relative: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(relative);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

pub const MAIN_TEX: &str = r#"\documentclass[11pt]{article}
\usepackage{times}
\usepackage{amsmath}
\title{Sparse Attention at Scale}
\begin{document}
\maketitle
\begin{abstract}
We study sparse attention in transformer models.
\end{abstract}

\input{sections/intro}
\include{sections/method}

\end{document}
"#;

pub const INTRO_TEX: &str = r#"\section{Introduction}
Attention costs $O(n^2)$ in the sequence length~\cite{vaswani2017}.
See Figure~\ref{fig:overview} for an overview.

\begin{figure*}[t]
\centering
\includegraphics[width=\linewidth]{overview.pdf}
\caption{Overview of the model.}
\label{fig:overview}
\end{figure*}
"#;

pub const METHOD_TEX: &str = r#"\section{Method}
We minimise
\begin{equation}
\mathcal{L} = \sum_i \ell(x_i)
\end{equation}
using the following code.

\begin{lstlisting}[language=Python]
loss = sum(l(x) for x in batch)  # 100% of $budget$
\end{lstlisting}

\begin{align*}
a &= b \\
c &= d
\end{align*}
"#;

pub const PREAMBLE_TEX: &str = r#"\documentclass{article}
\newcommand{\beq}{\begin{equation}}
\newcommand{\eeq}{\end{equation}}
\newcommand*{\R}[1][n]{\mathbb{R}^{#1}}
\renewcommand\vec[1]{\mathbf{#1}}
\newenvironment{sketch}{\begin{proof}[Sketch]}{\end{proof}}
\makeatletter
\def\@pair#1#2{(#1, #2)}
\makeatother
\begin{document}
As shown by \cite{knuth} in Table~\ref{tab:a}, $x$ holds.
\end{document}
"#;

/// Writes a small three-file paper and returns its directory
pub fn create_latex_project() -> Result<TempDir> {
    let dir = create_temp_dir()?;
    create_test_file(dir.path(), "main.tex", MAIN_TEX)?;
    create_test_file(dir.path(), "sections/intro.tex", INTRO_TEX)?;
    create_test_file(dir.path(), "sections/method.tex", METHOD_TEX)?;
    create_test_file(dir.path(), "notes.tex", "Unreferenced draft.\n")?;
    Ok(dir)
}

/// Answers every service prompt like a well-behaved model
pub fn cooperative_answer(request: &MockRequest) -> String {
    if request.system.contains("QA critic") {
        r#"{"safe": true, "syntax_valid": true, "quality_pass": true, "errors": []}"#.to_string()
    } else if request.system.contains("exact terminology") {
        "```json\n{\"sparse attention\": \"稀疏注意力\"}\n```".to_string()
    } else {
        format!("【译】{}", request.prompt)
    }
}

/// Answers translations but rejects every one of them
pub fn unsatisfiable_answer(request: &MockRequest) -> String {
    if request.system.contains("QA critic") {
        r#"{"safe": false, "syntax_valid": true, "quality_pass": false, "errors": ["mistranslated"]}"#.to_string()
    } else {
        format!("【译】{}", request.prompt)
    }
}

/// Mock provider behaving like a cooperative model
pub fn cooperative_provider() -> MockProvider {
    MockProvider::working().with_custom_response(cooperative_answer)
}

/// Scripted service double for network-free pipeline tests
#[derive(Default)]
pub struct ScriptedServices {
    /// Translation to return; `None` simulates an outage
    pub translation: Option<String>,
    /// Verdicts handed out in order; once empty every critique fails
    pub verdicts: Mutex<VecDeque<CritiqueVerdict>>,
    /// Repair output; `None` makes the repair service error
    pub repair_output: Option<String>,
    pub translate_calls: Mutex<usize>,
    pub critique_calls: Mutex<usize>,
    pub repair_calls: Mutex<usize>,
}

impl ScriptedServices {
    pub fn translating(text: &str) -> Self {
        Self {
            translation: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_verdicts(mut self, verdicts: Vec<CritiqueVerdict>) -> Self {
        self.verdicts = Mutex::new(verdicts.into());
        self
    }

    pub fn with_repair(mut self, text: &str) -> Self {
        self.repair_output = Some(text.to_string());
        self
    }
}

#[async_trait]
impl ChunkServices for ScriptedServices {
    async fn translate(&self, _chunk: &str, _terminology: &TerminologyMap) -> Result<String, TranslationError> {
        *self.translate_calls.lock() += 1;
        self.translation
            .clone()
            .ok_or_else(|| ProviderError::ConnectionError("scripted outage".to_string()).into())
    }

    async fn critique(&self, _original: &str, _translated: &str) -> Result<CritiqueVerdict, TranslationError> {
        *self.critique_calls.lock() += 1;
        Ok(self
            .verdicts
            .lock()
            .pop_front()
            .unwrap_or_else(|| CritiqueVerdict::failing(vec!["scripted failure".to_string()])))
    }

    async fn repair(
        &self,
        _original: &str,
        _failed: &str,
        _errors: &[String],
        _terminology: &TerminologyMap,
    ) -> Result<String, TranslationError> {
        *self.repair_calls.lock() += 1;
        self.repair_output
            .clone()
            .ok_or_else(|| ProviderError::ApiError { status_code: 400, message: "scripted".to_string() }.into())
    }
}
