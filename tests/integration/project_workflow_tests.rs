/*!
 * Whole-project runs through the controller
 */

use anyhow::Result;
use std::fs;
use std::path::Path;

use paperglot::app_config::Config;
use paperglot::app_controller::{Controller, RunOptions, TERMINOLOGY_FILE};
use paperglot::latex::MaskingMode;
use paperglot::project::compiler::SANITIZED_MARKER;
use paperglot::providers::LlmClient;
use paperglot::providers::mock::MockProvider;
use paperglot::translation::{LlmServices, TerminologyMap};

use crate::common::{
    INTRO_TEX, MAIN_TEX, METHOD_TEX, cooperative_provider, create_latex_project, create_temp_dir, create_test_file,
    init_test_logging,
};

fn controller(provider: MockProvider, compile: bool) -> Controller {
    init_test_logging();
    let mut config = Config::default();
    config.compile.enabled = compile;
    config.compile.engine_command = "paperglot-missing-engine".to_string();
    let services = LlmServices::with_client(LlmClient::Mock(provider), &config).with_retry(0, 1);
    Controller::with_services(config, services)
}

fn options(input: &Path, output: &Path) -> RunOptions {
    RunOptions {
        input_path: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        skip_translation: false,
        skip_compile: false,
    }
}

#[tokio::test]
async fn test_run_cooperativeModel_shouldTranslateReachableFilesOnly() -> Result<()> {
    let project = create_latex_project()?;
    let output = create_temp_dir()?;

    let summary = controller(cooperative_provider(), false)
        .run(options(project.path(), output.path()))
        .await?;

    assert_eq!(summary.files.len(), 3);
    assert_eq!(summary.terminology_terms, 1);
    assert_eq!(summary.stats.fallbacks(), 0);
    assert!(summary.pdf.is_none());
    assert!(summary.main_tex.ends_with("main.tex"));

    let sandbox = &summary.layout.sandbox;
    let intro = fs::read_to_string(sandbox.join("sections/intro.tex"))?;
    assert!(intro.starts_with("【译】"));
    assert!(intro.contains("$O(n^2)$"));
    assert!(intro.contains("\\cite{vaswani2017}"));

    let method = fs::read_to_string(sandbox.join("sections/method.tex"))?;
    assert!(method.contains("loss = sum(l(x) for x in batch)  # 100% of $budget$"));

    let main = fs::read_to_string(sandbox.join("main.tex"))?;
    assert!(main.contains("\\input{sections/intro}"));
    assert!(main.contains("\\include{sections/method}"));

    assert_eq!(fs::read_to_string(sandbox.join("notes.tex"))?, "Unreferenced draft.\n");
    assert_eq!(fs::read_to_string(project.path().join("sections/intro.tex"))?, INTRO_TEX);
    Ok(())
}

#[tokio::test]
async fn test_run_shouldSaveTerminologyNextToLogs() -> Result<()> {
    let project = create_latex_project()?;
    let output = create_temp_dir()?;

    let summary = controller(cooperative_provider(), false)
        .run(options(project.path(), output.path()))
        .await?;

    let terms = TerminologyMap::load(&summary.layout.log_dir.join(TERMINOLOGY_FILE))?;
    assert_eq!(terms.get("sparse attention"), Some("稀疏注意力"));
    Ok(())
}

#[tokio::test]
async fn test_run_skipTranslation_shouldCopyProjectVerbatim() -> Result<()> {
    let project = create_latex_project()?;
    let output = create_temp_dir()?;
    let provider = cooperative_provider();

    let summary = controller(provider.clone(), false)
        .run(RunOptions {
            skip_translation: true,
            ..options(project.path(), output.path())
        })
        .await?;

    assert!(summary.files.is_empty());
    assert_eq!(provider.request_count(), 0);
    assert_eq!(fs::read_to_string(summary.layout.sandbox.join("main.tex"))?, MAIN_TEX);
    assert_eq!(fs::read_to_string(summary.layout.sandbox.join("sections/method.tex"))?, METHOD_TEX);
    Ok(())
}

#[tokio::test]
async fn test_run_providerDown_shouldFinishWithSourcesUnchanged() -> Result<()> {
    let project = create_latex_project()?;
    let output = create_temp_dir()?;

    let summary = controller(MockProvider::failing(), false)
        .run(options(project.path(), output.path()))
        .await?;

    assert_eq!(summary.terminology_terms, 0);
    assert_eq!(summary.stats.verified, 0);
    assert!(summary.stats.service_fallbacks > 0);
    assert_eq!(fs::read_to_string(summary.layout.sandbox.join("sections/intro.tex"))?, INTRO_TEX);
    Ok(())
}

#[tokio::test]
async fn test_run_missingCompiler_shouldPrepareFontsAndReturnNoPdf() -> Result<()> {
    let project = create_latex_project()?;
    let output = create_temp_dir()?;

    let summary = controller(cooperative_provider(), true)
        .run(RunOptions {
            skip_translation: true,
            ..options(project.path(), output.path())
        })
        .await?;

    assert!(summary.pdf.is_none());
    assert!(!summary.layout.pdf_path.exists());

    let main = fs::read_to_string(summary.layout.sandbox.join("main.tex"))?;
    assert!(main.contains(&format!("{}\\usepackage{{times}}", SANITIZED_MARKER)));
    assert!(main.contains("\\usepackage{xeCJK}"));
    let class_end = main.find("\\documentclass[11pt]{article}").map(|i| i + "\\documentclass[11pt]{article}".len());
    let xecjk = main.find("\\usepackage{xeCJK}");
    assert!(class_end.is_some() && xecjk.is_some() && class_end < xecjk);
    Ok(())
}

#[tokio::test]
async fn test_run_singleFileInput_shouldTranslateThatFile() -> Result<()> {
    let dir = create_temp_dir()?;
    let output = create_temp_dir()?;
    let paper = create_test_file(
        dir.path(),
        "draft.tex",
        "\\documentclass{article}\n\\begin{document}\nHello $x$.\n\\end{document}\n",
    )?;

    let summary = controller(cooperative_provider(), false)
        .run(options(&paper, output.path()))
        .await?;

    assert_eq!(summary.files.len(), 1);
    assert!(summary.layout.root.ends_with("draft"));
    let translated = fs::read_to_string(summary.layout.sandbox.join("draft.tex"))?;
    assert!(translated.contains("$x$"));
    assert!(translated.contains("【译】"));
    Ok(())
}

#[tokio::test]
async fn test_run_outputInsideInput_shouldRefuse() -> Result<()> {
    let project = create_latex_project()?;
    let nested_output = project.path().join("out");

    let result = controller(cooperative_provider(), false)
        .run(options(project.path(), &nested_output))
        .await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_run_unparsableFile_shouldReportFallbackForThatFileOnly() -> Result<()> {
    let dir = create_temp_dir()?;
    let output = create_temp_dir()?;
    create_test_file(
        dir.path(),
        "main.tex",
        "\\documentclass{article}\n\\begin{document}\nSee \\cite{a}.\n\\input{broken}\n\\end{document}\n",
    )?;
    create_test_file(dir.path(), "broken.tex", "Stray } brace near $x^2$.\n")?;

    let summary = controller(cooperative_provider(), false)
        .run(options(dir.path(), output.path()))
        .await?;

    let modes: Vec<(bool, MaskingMode)> = summary
        .files
        .iter()
        .map(|report| (report.path.ends_with("broken.tex"), report.masking_mode))
        .collect();
    assert_eq!(modes, vec![(false, MaskingMode::Structural), (true, MaskingMode::Fallback)]);
    Ok(())
}
