//! Read models over an aggregated `Coverage`: per-file summaries, totals and
//! the JSON document handed to downstream reporting.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::model::{rate, BranchCoverage, Coverage, FileSummary};

/// Totals across every file of a `Coverage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_files: u64,
    pub total_lines: u64,
    pub covered_lines: u64,
    pub total_conditions: u64,
    pub covered_conditions: u64,
}

impl ReportSummary {
    #[must_use]
    pub fn line_rate(&self) -> f64 {
        rate(self.covered_lines, self.total_lines)
    }

    #[must_use]
    pub fn condition_rate(&self) -> f64 {
        rate(self.covered_conditions, self.total_conditions)
    }
}

/// Summary of a single file.
pub fn summarize_file(coverage: &Coverage, file: &Path) -> FileSummary {
    let (total_lines, covered_lines) = coverage
        .hits(file)
        .map(|lines| {
            let covered = lines.values().filter(|&&hits| hits > 0).count();
            (lines.len() as u64, covered as u64)
        })
        .unwrap_or((0, 0));

    let branches = coverage.branch_coverage(file);
    FileSummary {
        path: file.to_path_buf(),
        total_lines,
        covered_lines,
        total_conditions: branches.iter().map(|b| u64::from(b.conditions)).sum(),
        covered_conditions: branches.iter().map(|b| u64::from(b.covered_conditions)).sum(),
    }
}

/// One summary per file, ordered by path.
pub fn summarize(coverage: &Coverage) -> Vec<FileSummary> {
    coverage
        .files()
        .into_iter()
        .map(|file| summarize_file(coverage, file))
        .collect()
}

pub fn totals(files: &[FileSummary]) -> ReportSummary {
    files.iter().fold(ReportSummary::default(), |mut acc, f| {
        acc.total_files += 1;
        acc.total_lines += f.total_lines;
        acc.covered_lines += f.covered_lines;
        acc.total_conditions += f.total_conditions;
        acc.covered_conditions += f.covered_conditions;
        acc
    })
}

/// Serializable view of one file's coverage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub lines: BTreeMap<u32, u64>,
    pub branches: Vec<BranchCoverage>,
}

/// Serializable view of a whole `Coverage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Export {
    pub summary: ReportSummary,
    pub files: Vec<ExportedFile>,
}

pub fn export(coverage: &Coverage) -> Export {
    let files = coverage
        .files()
        .into_iter()
        .map(|file| ExportedFile {
            path: file.to_path_buf(),
            lines: coverage.hits(file).cloned().unwrap_or_default(),
            branches: coverage.branch_coverage(file),
        })
        .collect();
    Export {
        summary: totals(&summarize(coverage)),
        files,
    }
}

/// Format sorted line numbers into compact range notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_line_ranges(lines: &[u32]) -> String {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if line == *end + 1 => *end = line,
            _ => ranges.push((line, line)),
        }
    }

    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
