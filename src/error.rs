use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovmergeError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("XML error in '{}' at line {line}: {source}", file.display())]
    Xml {
        file: PathBuf,
        line: usize,
        source: quick_xml::Error,
    },

    #[error("{message} in '{}' at line {line}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid wildcard pattern: {0}")]
    WildcardPattern(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown coverage format: '{0}'. Supported: ncover3, opencover, dotcover, vscoveragexml")]
    UnknownFormat(String),
}

impl CovmergeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CovmergeError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CovmergeError>;
