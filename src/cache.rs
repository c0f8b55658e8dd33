//! Per-run cache of parsed reports, so a report matched by several patterns
//! (or several runs of the aggregator) is parsed once while it is unchanged.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{CovmergeError, Result};
use crate::files::FileService;
use crate::model::Coverage;
use crate::parsers::Format;

/// Source of parsed per-report coverage.
pub trait ReportCache {
    /// Coverage of `report` as parsed by `format`, parsing only on a miss.
    fn read_or_parse(
        &mut self,
        format: Format,
        files: &FileService,
        report: &Path,
    ) -> Result<&Coverage>;
}

/// Identity of a report file's contents at the time it was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| CovmergeError::io(path, e))?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct CachedReport {
    fingerprint: Fingerprint,
    coverage: Coverage,
}

/// In-memory `ReportCache` keyed by tool and canonical report path.
#[derive(Debug, Default)]
pub struct CoverageCache {
    entries: HashMap<(Format, PathBuf), CachedReport>,
    parsed: usize,
    reused: usize,
}

impl CoverageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of reports actually parsed.
    pub fn parsed(&self) -> usize {
        self.parsed
    }

    /// Number of lookups served without parsing.
    pub fn reused(&self) -> usize {
        self.reused
    }

    fn parse(format: Format, files: &FileService, report: &Path) -> Result<Coverage> {
        log::info!("Parsing the {format} report '{}'", report.display());
        let mut coverage = Coverage::new();
        format.parse(files, report, &mut coverage)?;
        Ok(coverage)
    }
}

impl ReportCache for CoverageCache {
    fn read_or_parse(
        &mut self,
        format: Format,
        files: &FileService,
        report: &Path,
    ) -> Result<&Coverage> {
        let fingerprint = Fingerprint::of(report)?;
        let canonical = fs::canonicalize(report).unwrap_or_else(|_| report.to_path_buf());

        match self.entries.entry((format, canonical)) {
            Entry::Occupied(mut entry) => {
                if entry.get().fingerprint == fingerprint {
                    log::debug!("Reusing the already parsed report '{}'", report.display());
                    self.reused += 1;
                    return Ok(&entry.into_mut().coverage);
                }
                match Self::parse(format, files, report) {
                    Ok(coverage) => {
                        self.parsed += 1;
                        entry.insert(CachedReport {
                            fingerprint,
                            coverage,
                        });
                        Ok(&entry.into_mut().coverage)
                    }
                    Err(e) => {
                        entry.remove();
                        Err(e)
                    }
                }
            }
            Entry::Vacant(entry) => {
                let coverage = Self::parse(format, files, report)?;
                self.parsed += 1;
                Ok(&entry
                    .insert(CachedReport {
                        fingerprint,
                        coverage,
                    })
                    .coverage)
            }
        }
    }
}
