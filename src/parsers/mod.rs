pub mod dotcover;
pub mod ncover3;
pub mod opencover;
pub mod visual_studio;
pub(crate) mod xml;

use std::fs;
use std::path::Path;

use crate::error::{CovmergeError, Result};
use crate::files::FileService;
use crate::model::Coverage;

/// Every report parser implements this trait.
pub trait CoverageParser {
    /// Parse report bytes read from `report` into `coverage`.
    fn parse_bytes(&self, report: &Path, input: &[u8], coverage: &mut Coverage) -> Result<()>;

    /// Read `report` from disk and parse it into `coverage`.
    fn parse(&self, report: &Path, coverage: &mut Coverage) -> Result<()> {
        let input = fs::read(report).map_err(|e| CovmergeError::io(report, e))?;
        self.parse_bytes(report, &input, coverage)
    }
}

/// Supported coverage tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Format {
    NCover3,
    OpenCover,
    DotCover,
    VisualStudio,
}

impl Format {
    pub const ALL: [Format; 4] = [
        Format::NCover3,
        Format::OpenCover,
        Format::DotCover,
        Format::VisualStudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::NCover3 => "ncover3",
            Format::OpenCover => "opencover",
            Format::DotCover => "dotcover",
            Format::VisualStudio => "vscoveragexml",
        }
    }

    /// Parse `report` with this tool's parser.
    pub fn parse(&self, files: &FileService, report: &Path, coverage: &mut Coverage) -> Result<()> {
        match self {
            Format::NCover3 => ncover3::NCover3Parser::new(files).parse(report, coverage),
            Format::OpenCover => opencover::OpenCoverParser::new(files).parse(report, coverage),
            Format::DotCover => dotcover::DotCoverParser::new(files).parse(report, coverage),
            Format::VisualStudio => {
                visual_studio::VisualStudioParser::new(files).parse(report, coverage)
            }
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CovmergeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ncover3" => Ok(Format::NCover3),
            "opencover" => Ok(Format::OpenCover),
            "dotcover" => Ok(Format::DotCover),
            "vscoveragexml" | "visualstudio" => Ok(Format::VisualStudio),
            _ => Err(CovmergeError::UnknownFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier attached to branch points read from `report`.
pub(crate) fn coverage_identifier(report: &Path) -> String {
    report.to_string_lossy().into_owned()
}
