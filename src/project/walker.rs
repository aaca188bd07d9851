/*!
 * Project traversal: main file discovery and the include graph.
 *
 * Files are visited depth-first in preorder starting from the main file,
 * following `\input{...}` and `\include{...}`. Every file is processed at
 * most once, even when included from several places or in a cycle.
 */

use anyhow::Result;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;

/// Include commands and their file argument
static INCLUDE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:input|include)\s*\{([^}]+)\}").expect("Invalid include regex"));

/// Main file names preferred over other candidates, lower case
const PREFERRED_MAIN_FILES: [&str; 3] = ["main.tex", "paper.tex", "article.tex"];

/// Locate the root document of a project
///
/// Every `.tex` file containing `\documentclass` is a candidate. A preferred
/// name wins, otherwise the first candidate in path order.
pub fn find_main_tex(project_dir: &Path) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for path in FileManager::find_files(project_dir, &["tex"])? {
        match FileManager::read_lossy(&path) {
            Ok(content) if content.contains("\\documentclass") => candidates.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable file {:?}: {}", path, e),
        }
    }

    for preferred in PREFERRED_MAIN_FILES {
        let found = candidates.iter().find(|candidate| {
            candidate
                .file_name()
                .map(|name| name.to_string_lossy().to_lowercase() == preferred)
                .unwrap_or(false)
        });
        if let Some(found) = found {
            return Ok(Some(found.clone()));
        }
    }

    Ok(candidates.into_iter().next())
}

/// Resolve an include argument to an existing file
///
/// `.tex` is appended when missing. The including file's directory is tried
/// before the project root.
pub fn resolve_include(project_root: &Path, current_file: &Path, include: &str) -> Option<PathBuf> {
    let include = include.trim();
    let candidate = if include.ends_with(".tex") {
        include.to_string()
    } else {
        format!("{}.tex", include)
    };

    let current_dir = current_file.parent().unwrap_or(project_root);
    [current_dir.join(&candidate), project_root.join(&candidate)]
        .into_iter()
        .find(|path| path.is_file())
}

/// Drop a `%` comment from a line, keeping escaped `\%`
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'%' => return &line[..i],
            _ => i += 1,
        }
    }
    line
}

/// Include arguments of a source, commented-out ones excluded
pub fn find_includes(content: &str) -> Vec<String> {
    content
        .lines()
        .map(strip_comment)
        .flat_map(|line| {
            INCLUDE_REGEX
                .captures_iter(line)
                .map(|caps| caps[1].trim().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn visit_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Resolved children of one file, in source order
fn children_of(project_root: &Path, file: &Path) -> Vec<PathBuf> {
    let content = match FileManager::read_lossy(file) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot scan {:?} for includes: {}", file, e);
            return Vec::new();
        }
    };

    find_includes(&content)
        .into_iter()
        .filter_map(|include| {
            let resolved = resolve_include(project_root, file, &include);
            if resolved.is_none() {
                warn!("Could not resolve include: {} in {:?}", include, file);
            }
            resolved
        })
        .collect()
}

/// Files reachable from `entry`, in visiting order
pub fn include_order(project_root: &Path, entry: &Path) -> Vec<PathBuf> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![entry.to_path_buf()];

    while let Some(file) = stack.pop() {
        if !visited.insert(visit_key(&file)) {
            continue;
        }
        stack.extend(children_of(project_root, &file).into_iter().rev());
        order.push(file);
    }
    order
}

/// Visit every reachable file and hand it to `process`
///
/// Includes are read after `process` returns, so they reflect the file as
/// it is on disk then. A failing file is logged and the walk continues.
/// Returns the number of files processed successfully.
pub async fn walk<F, Fut>(project_root: &Path, entry: &Path, mut process: F) -> usize
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut visited = HashSet::new();
    let mut stack = vec![entry.to_path_buf()];
    let mut processed = 0;

    while let Some(file) = stack.pop() {
        if !visited.insert(visit_key(&file)) {
            continue;
        }

        info!("Processing: {:?}", file);
        match process(file.clone()).await {
            Ok(()) => processed += 1,
            Err(e) => error!("Error processing {:?}: {:#}", file, e),
        }

        if file.is_file() {
            stack.extend(children_of(project_root, &file).into_iter().rev());
        }
    }
    processed
}
