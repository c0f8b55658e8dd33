/// Parser for dotCover HTML reports (one report per source file).
///
/// The page title holds the source file path, and an inline script calls
/// `highlightRanges([...])` with one entry per statement:
///
///   [startLine, startColumn, endLine, endColumn, 'class']
///
/// where the class is `c` (covered), `p` (partially covered) or `n` (not
/// covered). Each entry counts towards its start line.
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::xml::line_at;
use super::CoverageParser;
use crate::error::{CovmergeError, Result};
use crate::files::FileService;
use crate::model::Coverage;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").unwrap());

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[\s*(\d+)\s*,\s*\d+\s*,\s*\d+\s*,\s*\d+\s*,\s*['"]?(\w+)['"]?\s*\]"#).unwrap()
});

const HIGHLIGHT_FUNCTION: &str = "highlightRanges";

pub struct DotCoverParser<'a> {
    files: &'a FileService,
}

impl<'a> DotCoverParser<'a> {
    pub fn new(files: &'a FileService) -> Self {
        Self { files }
    }
}

impl CoverageParser for DotCoverParser<'_> {
    fn parse_bytes(&self, report: &Path, input: &[u8], coverage: &mut Coverage) -> Result<()> {
        let content = String::from_utf8_lossy(input);
        let error = |offset: usize, message: String| CovmergeError::Parse {
            file: report.to_path_buf(),
            line: line_at(input, offset),
            message,
        };

        let title = TITLE_RE
            .captures(&content)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| error(0, "The report does not contain a <title> element".to_string()))?;
        let source = quick_xml::escape::unescape(title.as_str().trim())
            .map_err(|e| error(title.start(), format!("Invalid title \"{}\": {e}", title.as_str())))?;

        let Some(file) = self.files.resolve(&source) else {
            return Ok(());
        };

        let start = content.find(HIGHLIGHT_FUNCTION).ok_or_else(|| {
            error(
                content.len(),
                format!("The report does not contain the '{HIGHLIGHT_FUNCTION}' function"),
            )
        })?;

        for caps in RANGE_RE.captures_iter(&content[start..]) {
            let offset = start + caps.get(0).map_or(0, |m| m.start());
            let line: u32 = caps[1].parse().map_err(|_| {
                error(offset, format!("Expected an integer instead of \"{}\" for the line", &caps[1]))
            })?;
            let hits = match caps[2].to_lowercase().as_str() {
                "c" | "p" => 1,
                "n" => 0,
                other => {
                    return Err(error(
                        offset,
                        format!(
                            "Unsupported coverage class \"{other}\", expected one of \"c\", \"p\" or \"n\""
                        ),
                    ))
                }
            };
            coverage.add_hits(&file, line, hits);
        }

        Ok(())
    }
}
