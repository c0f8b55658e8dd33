//! Configuration surface: a flat map of string properties, plus the names of
//! the per-tool report path properties for one language.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{CovmergeError, Result};
use crate::parsers::Format;

/// Property names under which each coverage tool's report patterns are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageConfiguration {
    language_key: String,
    ncover3_property: String,
    opencover_property: String,
    dotcover_property: String,
    visual_studio_property: String,
}

impl CoverageConfiguration {
    pub fn new(language_key: &str) -> Self {
        let key = |tool: &str| format!("sonar.{language_key}.{tool}.reportsPaths");
        Self {
            language_key: language_key.to_string(),
            ncover3_property: key("ncover3"),
            opencover_property: key("opencover"),
            dotcover_property: key("dotcover"),
            visual_studio_property: key("vscoveragexml"),
        }
    }

    pub fn language_key(&self) -> &str {
        &self.language_key
    }

    pub fn ncover3_property(&self) -> &str {
        &self.ncover3_property
    }

    pub fn opencover_property(&self) -> &str {
        &self.opencover_property
    }

    pub fn dotcover_property(&self) -> &str {
        &self.dotcover_property
    }

    pub fn visual_studio_property(&self) -> &str {
        &self.visual_studio_property
    }

    /// The property holding report patterns for `format`.
    pub fn property(&self, format: Format) -> &str {
        match format {
            Format::NCover3 => &self.ncover3_property,
            Format::OpenCover => &self.opencover_property,
            Format::DotCover => &self.dotcover_property,
            Format::VisualStudio => &self.visual_studio_property,
        }
    }
}

/// String-keyed analysis properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    properties: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load properties from a TOML file. Top-level keys are property names;
    /// values may be strings, numbers, booleans, or arrays of strings (joined
    /// with commas).
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CovmergeError::io(path, e))?;
        Self::from_toml(&content).map_err(|e| match e {
            CovmergeError::Config(msg) => {
                CovmergeError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| CovmergeError::Config(e.to_string()))?;

        let mut settings = Settings::new();
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        toml::Value::String(s) => Ok(s),
                        other => Err(CovmergeError::Config(format!(
                            "property '{key}' must contain only strings, found {}",
                            other.type_str()
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?
                    .join(","),
                other => {
                    return Err(CovmergeError::Config(format!(
                        "property '{key}' has unsupported type {}",
                        other.type_str()
                    )))
                }
            };
            settings.set(&key, &value);
        }
        Ok(settings)
    }

    /// Apply a `key=value` definition, as passed on the command line.
    pub fn define(&mut self, definition: &str) -> Result<()> {
        let (key, value) = definition.split_once('=').ok_or_else(|| {
            CovmergeError::Config(format!("expected key=value, got '{definition}'"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CovmergeError::Config(format!(
                "empty property name in '{definition}'"
            )));
        }
        self.set(key, value.trim());
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Comma-separated values of `key`, trimmed, with empty entries dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
