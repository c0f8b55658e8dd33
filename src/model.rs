//! Canonical in-memory representation of coverage data, independent of the
//! tool that produced it. Parsers feed a `Coverage`; the aggregator merges
//! one `Coverage` per report into a single grand total.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::branch;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// One outgoing edge of a conditional, as recorded by a single report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BranchPoint {
    pub file: PathBuf,
    pub line: u32,
    pub start_offset: u32,
    pub end_offset: u32,
    /// Which outgoing edge of the conditional this is.
    pub path: u32,
    pub hits: u64,
    /// The report (or assembly) this point was read from.
    pub coverage_identifier: String,
}

impl BranchPoint {
    /// Two points share a position when they agree on line, offsets and edge.
    pub fn position(&self) -> (u32, u32, u32, u32) {
        (self.line, self.start_offset, self.end_offset, self.path)
    }
}

/// Condition coverage derived for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BranchCoverage {
    pub line: u32,
    pub conditions: u32,
    pub covered_conditions: u32,
}

/// Per-file line hits and raw branch points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coverage {
    hits: HashMap<PathBuf, BTreeMap<u32, u64>>,
    branch_points: HashMap<PathBuf, Vec<BranchPoint>>,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hits` executions of `line`. Repeated calls accumulate.
    pub fn add_hits(&mut self, file: &Path, line: u32, hits: u64) {
        let lines = match self.hits.get_mut(file) {
            Some(lines) => lines,
            None => self.hits.entry(file.to_path_buf()).or_default(),
        };
        let entry = lines.entry(line).or_insert(0);
        *entry = entry.saturating_add(hits);
    }

    /// Append a raw branch point. Duplicates are kept until read.
    pub fn add(&mut self, point: BranchPoint) {
        match self.branch_points.get_mut(&point.file) {
            Some(points) => points.push(point),
            None => {
                self.branch_points.insert(point.file.clone(), vec![point]);
            }
        }
    }

    /// Every file with at least one line hit or branch point.
    pub fn files(&self) -> BTreeSet<&Path> {
        self.hits
            .keys()
            .chain(self.branch_points.keys())
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.branch_points.is_empty()
    }

    /// Line hits for `file`, ordered by line number.
    pub fn hits(&self, file: &Path) -> Option<&BTreeMap<u32, u64>> {
        self.hits.get(file)
    }

    pub fn branch_points(&self, file: &Path) -> &[BranchPoint] {
        self.branch_points
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Condition coverage for `file`, computed from the raw points on demand.
    pub fn branch_coverage(&self, file: &Path) -> Vec<BranchCoverage> {
        branch::branch_coverage(self.branch_points(file))
    }

    /// Fold `other` into `self`: hits are summed, branch points appended.
    /// `other` is left untouched.
    pub fn merge_with(&mut self, other: &Coverage) {
        for (file, lines) in &other.hits {
            for (&line, &hits) in lines {
                self.add_hits(file, line, hits);
            }
        }
        for points in other.branch_points.values() {
            for point in points {
                self.add(point.clone());
            }
        }
    }
}

/// Per-file summary row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub total_lines: u64,
    pub covered_lines: u64,
    pub total_conditions: u64,
    pub covered_conditions: u64,
}

impl FileSummary {
    #[must_use]
    pub fn line_rate(&self) -> f64 {
        rate(self.covered_lines, self.total_lines)
    }

    #[must_use]
    pub fn condition_rate(&self) -> f64 {
        rate(self.covered_conditions, self.total_conditions)
    }
}
