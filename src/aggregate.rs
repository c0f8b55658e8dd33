use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::cache::ReportCache;
use crate::config::{CoverageConfiguration, Settings};
use crate::error::Result;
use crate::files::FileService;
use crate::model::Coverage;
use crate::parsers::Format;
use crate::wildcard::WildcardPatternFileProvider;

/// Collects every configured coverage report into one `Coverage`.
pub struct CoverageAggregator<'a> {
    config: &'a CoverageConfiguration,
    settings: &'a Settings,
    files: &'a FileService,
}

impl<'a> CoverageAggregator<'a> {
    pub fn new(
        config: &'a CoverageConfiguration,
        settings: &'a Settings,
        files: &'a FileService,
    ) -> Self {
        Self {
            config,
            settings,
            files,
        }
    }

    /// True when at least one tool has report patterns configured.
    pub fn has_coverage_property(&self) -> bool {
        Format::ALL
            .iter()
            .any(|&format| self.settings.has_key(self.config.property(format)))
    }

    /// Parse and merge every report matched by the configured patterns.
    ///
    /// A pattern matching nothing and a report that fails to parse are
    /// logged as warnings and skipped. Only an invalid pattern is an error.
    pub fn aggregate(
        &self,
        provider: &WildcardPatternFileProvider,
        cache: &mut dyn ReportCache,
    ) -> Result<Coverage> {
        let mut coverage = Coverage::new();
        for format in Format::ALL {
            let property = self.config.property(format);
            let patterns = self.settings.get_list(property);
            if patterns.is_empty() {
                log::debug!("No {format} reports configured ('{property}' is not set)");
                continue;
            }
            let total = self.aggregate_format(format, &patterns, provider, cache)?;
            coverage.merge_with(&total);
        }
        Ok(coverage)
    }

    fn aggregate_format(
        &self,
        format: Format,
        patterns: &[String],
        provider: &WildcardPatternFileProvider,
        cache: &mut dyn ReportCache,
    ) -> Result<Coverage> {
        let mut reports = BTreeSet::new();
        for pattern in patterns {
            let matched = provider.list_files(pattern)?;
            if matched.is_empty() {
                log::warn!(
                    "Could not find any {format} coverage report matching the pattern '{pattern}' in '{}'",
                    provider.base_dir().display()
                );
            }
            reports.extend(
                matched
                    .into_iter()
                    .map(|report| fs::canonicalize(&report).unwrap_or(report)),
            );
        }

        // A report matched by several patterns still counts once.
        let mut total = Coverage::new();
        for report in &reports {
            self.merge_report(format, report, cache, &mut total);
        }
        Ok(total)
    }

    fn merge_report(
        &self,
        format: Format,
        report: &Path,
        cache: &mut dyn ReportCache,
        total: &mut Coverage,
    ) {
        match cache.read_or_parse(format, self.files, report) {
            Ok(coverage) => total.merge_with(coverage),
            Err(e) => {
                log::warn!(
                    "Could not import the {format} coverage report '{}' because '{e}'",
                    report.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CoverageCache;
    use crate::files::FileIndex;

    fn files() -> FileService {
        let mut index = FileIndex::new();
        index.add("/project/src/Foo.cs", "cs");
        FileService::new(&index, "cs")
    }

    #[test]
    fn test_has_coverage_property() {
        let config = CoverageConfiguration::new("cs");
        let files = files();
        let mut settings = Settings::new();
        assert!(!CoverageAggregator::new(&config, &settings, &files).has_coverage_property());

        settings.set("sonar.cs.dotcover.reportsPaths", "x.html");
        assert!(CoverageAggregator::new(&config, &settings, &files).has_coverage_property());

        let other = CoverageConfiguration::new("vbnet");
        assert!(!CoverageAggregator::new(&other, &settings, &files).has_coverage_property());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let config = CoverageConfiguration::new("cs");
        let files = files();
        let mut settings = Settings::new();
        settings.set("sonar.cs.opencover.reportsPaths", "*/../x.xml");

        let dir = tempfile::tempdir().unwrap();
        let provider = WildcardPatternFileProvider::new(dir.path());
        let mut cache = CoverageCache::new();
        let result = CoverageAggregator::new(&config, &settings, &files).aggregate(&provider, &mut cache);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_report_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xml"), "<CoverageSession><broken></CoverageSession>").unwrap();
        fs::write(
            dir.path().join("b.xml"),
            r#"<CoverageSession><File uid="1" fullPath="/project/src/Foo.cs"/><SequencePoint vc="1" sl="2" fileid="1"/></CoverageSession>"#,
        )
        .unwrap();

        let config = CoverageConfiguration::new("cs");
        let files = files();
        let mut settings = Settings::new();
        settings.set("sonar.cs.opencover.reportsPaths", "*.xml, missing/*.xml");

        let provider = WildcardPatternFileProvider::new(dir.path());
        let mut cache = CoverageCache::new();
        let coverage = CoverageAggregator::new(&config, &settings, &files)
            .aggregate(&provider, &mut cache)
            .unwrap();

        assert_eq!(coverage.hits(Path::new("/project/src/Foo.cs")).unwrap()[&2], 1);
        assert_eq!(cache.parsed(), 1);
    }
}
