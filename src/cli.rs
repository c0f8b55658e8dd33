//! Command handler functions for the covmerge CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::aggregate::CoverageAggregator;
use crate::cache::CoverageCache;
use crate::config::{CoverageConfiguration, Settings};
use crate::files::{FileIndex, FileService, LANGUAGES};
use crate::model::Coverage;
use crate::report;
use crate::wildcard::WildcardPatternFileProvider;

/// Inputs of one analysis run.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Directory relative report patterns are resolved against.
    pub base_dir: PathBuf,
    /// Directory scanned for source files (defaults to `base_dir`).
    pub sources: Option<PathBuf>,
    /// Language key of the analysed sources.
    pub language: String,
    /// Optional TOML file of properties.
    pub config: Option<PathBuf>,
    /// `key=value` property overrides.
    pub defines: Vec<String>,
}

pub fn load_settings(config: Option<&Path>, defines: &[String]) -> Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::load(path)?,
        None => Settings::new(),
    };
    for definition in defines {
        settings.define(definition)?;
    }
    Ok(settings)
}

/// Index the sources, then aggregate every configured report.
pub fn aggregate(analysis: &Analysis) -> Result<Coverage> {
    if !LANGUAGES.iter().any(|(key, _)| *key == analysis.language) {
        let known: Vec<_> = LANGUAGES.iter().map(|(key, _)| *key).collect();
        bail!(
            "Unknown language '{}'. Supported: {}",
            analysis.language,
            known.join(", ")
        );
    }

    let settings = load_settings(analysis.config.as_deref(), &analysis.defines)?;
    let config = CoverageConfiguration::new(&analysis.language);

    let sources = analysis.sources.as_deref().unwrap_or(&analysis.base_dir);
    let index = FileIndex::scan(sources)
        .with_context(|| format!("Failed to index sources under {}", sources.display()))?;
    let files = FileService::new(&index, &analysis.language);

    let aggregator = CoverageAggregator::new(&config, &settings, &files);
    if !aggregator.has_coverage_property() {
        log::info!(
            "No coverage report property is set for language '{}'",
            analysis.language
        );
    }

    let provider = WildcardPatternFileProvider::new(&analysis.base_dir);
    let mut cache = CoverageCache::new();
    let coverage = aggregator.aggregate(&provider, &mut cache)?;
    log::info!(
        "Imported coverage for {} files from {} reports",
        coverage.files().len(),
        cache.parsed()
    );
    Ok(coverage)
}

pub fn cmd_summary(coverage: &Coverage) -> Result<String> {
    let summary = report::totals(&report::summarize(coverage));

    let mut out = String::new();
    writeln!(out, "Files:       {}", summary.total_files)?;
    writeln!(
        out,
        "Lines:       {}/{} ({:.1}%)",
        summary.covered_lines,
        summary.total_lines,
        summary.line_rate() * 100.0
    )?;
    if summary.total_conditions > 0 {
        writeln!(
            out,
            "Conditions:  {}/{} ({:.1}%)",
            summary.covered_conditions,
            summary.total_conditions,
            summary.condition_rate() * 100.0
        )?;
    }
    Ok(out)
}

pub fn cmd_files(coverage: &Coverage, sort_by_coverage: bool) -> Result<String> {
    let mut files = report::summarize(coverage);
    if files.is_empty() {
        return Ok("No coverage data.\n".to_string());
    }

    if sort_by_coverage {
        files.sort_by(|a, b| a.line_rate().total_cmp(&b.line_rate()));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8} {:>11}",
        "FILE", "LINES", "COVERED", "RATE", "CONDITIONS"
    )?;
    writeln!(out, "{}", "-".repeat(99))?;
    for f in &files {
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>7.1}% {:>11}",
            f.path.display(),
            f.total_lines,
            f.covered_lines,
            f.line_rate() * 100.0,
            format!("{}/{}", f.covered_conditions, f.total_conditions),
        )?;
    }
    Ok(out)
}

pub fn cmd_lines(coverage: &Coverage, source_file: &str, uncovered: bool) -> Result<String> {
    let file = find_file(coverage, source_file)?;
    let lines = coverage.hits(file).cloned().unwrap_or_default();

    if uncovered {
        let missed: Vec<u32> = lines
            .iter()
            .filter(|(_, hits)| **hits == 0)
            .map(|(&line, _)| line)
            .collect();
        if missed.is_empty() {
            return Ok(format!(
                "All instrumentable lines are covered in '{}'\n",
                file.display()
            ));
        }
        let mut out = String::new();
        writeln!(out, "Uncovered lines in '{}':", file.display())?;
        writeln!(out, "  {}", report::format_line_ranges(&missed))?;
        writeln!(out, "  ({} lines)", missed.len())?;
        return Ok(out);
    }

    let branches = coverage.branch_coverage(file);
    let mut out = String::new();
    writeln!(out, "{:>6}  {:>10}  {:>10}", "LINE", "HITS", "CONDITIONS")?;
    writeln!(out, "{}", "-".repeat(32))?;
    for (line, hits) in &lines {
        let marker = if *hits > 0 { "✓" } else { "✗" };
        let conditions = branches
            .iter()
            .find(|b| b.line == *line)
            .map(|b| format!("{}/{}", b.covered_conditions, b.conditions))
            .unwrap_or_default();
        writeln!(out, "{line:>6}  {hits:>10}  {conditions:>10}  {marker}")?;
    }
    Ok(out)
}

pub fn cmd_export(coverage: &Coverage, pretty: bool) -> Result<String> {
    let export = report::export(coverage);
    let mut json = if pretty {
        serde_json::to_string_pretty(&export)?
    } else {
        serde_json::to_string(&export)?
    };
    json.push('\n');
    Ok(json)
}

/// Look a file up by its full path, or by a unique trailing path.
fn find_file<'a>(coverage: &'a Coverage, source_file: &str) -> Result<&'a Path> {
    let wanted = Path::new(source_file);
    let files = coverage.files();
    if let Some(file) = files.iter().find(|f| **f == wanted) {
        return Ok(*file);
    }
    let matches: Vec<&Path> = files.into_iter().filter(|f| f.ends_with(wanted)).collect();
    match matches.as_slice() {
        [file] => Ok(*file),
        [] => bail!("No coverage data for '{source_file}'"),
        _ => bail!(
            "'{source_file}' matches {} files; use a longer path",
            matches.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BranchPoint;

    fn sample() -> Coverage {
        let mut coverage = Coverage::new();
        let main = Path::new("/project/src/Main.cs");
        coverage.add_hits(main, 1, 5);
        coverage.add_hits(main, 2, 3);
        coverage.add_hits(main, 3, 0);
        coverage.add_hits(main, 4, 0);
        let lib = Path::new("/project/src/Lib.cs");
        coverage.add_hits(lib, 1, 10);
        coverage.add_hits(lib, 2, 10);
        for (path, hits) in [(0, 4), (1, 0)] {
            coverage.add(BranchPoint {
                file: main.to_path_buf(),
                line: 2,
                start_offset: 3,
                end_offset: 9,
                path,
                hits,
                coverage_identifier: "report.xml".to_string(),
            });
        }
        coverage
    }

    #[test]
    fn test_cmd_summary() {
        let out = cmd_summary(&sample()).unwrap();
        assert!(out.contains("Files:       2"));
        assert!(out.contains("Lines:       4/6"));
        assert!(out.contains("66.7%"));
        assert!(out.contains("Conditions:  1/2"));
    }

    #[test]
    fn test_cmd_files_sorted_by_coverage() {
        let out = cmd_files(&sample(), true).unwrap();
        let main_pos = out.find("Main.cs").unwrap();
        let lib_pos = out.find("Lib.cs").unwrap();
        assert!(main_pos < lib_pos);
        assert!(out.contains("100.0%"));
        assert!(out.contains("50.0%"));
    }

    #[test]
    fn test_cmd_files_empty() {
        let out = cmd_files(&Coverage::new(), false).unwrap();
        assert!(out.contains("No coverage data."));
    }

    #[test]
    fn test_cmd_lines() {
        let out = cmd_lines(&sample(), "src/Main.cs", false).unwrap();
        assert!(out.contains("LINE"));
        assert!(out.contains("1/2"));
        assert!(out.contains("✓"));
        assert!(out.contains("✗"));
    }

    #[test]
    fn test_cmd_lines_uncovered() {
        let out = cmd_lines(&sample(), "/project/src/Main.cs", true).unwrap();
        assert!(out.contains("3-4"));
        assert!(out.contains("(2 lines)"));

        let out = cmd_lines(&sample(), "Lib.cs", true).unwrap();
        assert!(out.contains("All instrumentable lines are covered"));
    }

    #[test]
    fn test_cmd_lines_no_data() {
        assert!(cmd_lines(&sample(), "Missing.cs", false).is_err());
    }

    #[test]
    fn test_cmd_export() {
        let out = cmd_export(&sample(), false).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["summary"]["total_files"], 2);
    }

    #[test]
    fn test_aggregate_rejects_unknown_language() {
        let analysis = Analysis {
            base_dir: PathBuf::from("."),
            sources: None,
            language: "cobol".to_string(),
            config: None,
            defines: vec![],
        };
        let err = aggregate(&analysis).unwrap_err();
        assert!(err.to_string().contains("Unknown language 'cobol'"));
    }
}
