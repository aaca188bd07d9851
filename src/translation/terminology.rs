/*!
 * Document-wide terminology glossary.
 *
 * The map is built once per run from the paper's abstract and shared
 * read-only by every chunk pipeline.
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::file_utils::FileManager;

/// Source term to target term
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminologyMap {
    terms: BTreeMap<String, String>,
}

impl TerminologyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.terms.insert(source.into(), target.into());
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.terms.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pretty JSON object, non-ASCII kept as-is
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.terms).unwrap_or_else(|_| "{}".to_string())
    }

    /// Build from a JSON value, keeping string-to-string pairs only
    pub fn from_json_value(value: &serde_json::Value) -> Self {
        let mut map = Self::new();
        if let Some(object) = value.as_object() {
            for (source, target) in object {
                if let Some(target) = target.as_str() {
                    let (source, target) = (source.trim(), target.trim());
                    if !source.is_empty() && !target.is_empty() {
                        map.insert(source, target);
                    }
                }
            }
        }
        map
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize terminology")?;
        FileManager::write_to_file(path, &json)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = FileManager::read_lossy(path)?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse terminology file: {:?}", path))
    }
}

impl FromIterator<(String, String)> for TerminologyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}
