/// Parser for Visual Studio `.coveragexml` reports (the XML export of a
/// `.coverage` file).
///
/// Structure:
///   <results>
///     <modules>
///       <module name="App.dll" ...>
///         <functions>
///           <function name="Run" ...>
///             <ranges>
///               <range source_id="0" covered="yes" start_line="9" start_column="13"
///                      end_line="9" end_column="30" />
///             </ranges>
///           </function>
///         </functions>
///         <source_files>
///           <source_file id="0" path="C:\project\src\Foo.cs" />
///         </source_files>
///       </module>
///     </modules>
///   </results>
///
/// Source ids are scoped to their module and the source files are listed
/// after the ranges, so ranges are collected per module and flushed when
/// the module closes. A line is hit when any range covering it is `yes` or
/// `partial`. Single-line ranges with columns also become branch points,
/// one per distinct column span on the line.
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use quick_xml::events::Event;

use super::xml::XmlReport;
use super::{coverage_identifier, CoverageParser};
use crate::error::Result;
use crate::files::FileService;
use crate::model::{BranchPoint, Coverage};

/// Longest `start_line..=end_line` span accepted for one range.
const MAX_RANGE_LINES: u32 = 100_000;

pub struct VisualStudioParser<'a> {
    files: &'a FileService,
}

impl<'a> VisualStudioParser<'a> {
    pub fn new(files: &'a FileService) -> Self {
        Self { files }
    }
}

#[derive(Debug)]
struct Range {
    source_id: String,
    covered: bool,
    start_line: u32,
    end_line: u32,
    columns: Option<(u32, u32)>,
}

#[derive(Debug, Default)]
struct Module {
    ranges: Vec<Range>,
    sources: HashMap<String, String>,
}

impl CoverageParser for VisualStudioParser<'_> {
    fn parse_bytes(&self, report: &Path, input: &[u8], coverage: &mut Coverage) -> Result<()> {
        let mut xml = XmlReport::new(report, input);
        xml.root("results")?;

        let identifier = coverage_identifier(report);
        let mut module = Module::default();

        loop {
            match xml.next()? {
                Event::Eof => break,
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"range" => {
                        let source_id = xml.required_attr(e, "source_id")?;
                        let covered = match xml.required_attr(e, "covered")?.as_str() {
                            "yes" | "partial" => true,
                            "no" => false,
                            other => {
                                return Err(xml.error(format!(
                                    "Unsupported \"covered\" value \"{other}\", expected one of \"yes\", \"partial\" or \"no\""
                                )))
                            }
                        };
                        let start_line: u32 = xml.required_int(e, "start_line")?;
                        let end_line: u32 = xml.required_int(e, "end_line")?;
                        if end_line < start_line {
                            return Err(xml.error(format!(
                                "The end_line {end_line} is before the start_line {start_line}"
                            )));
                        }
                        if end_line - start_line >= MAX_RANGE_LINES {
                            return Err(xml.error(format!(
                                "The range from line {start_line} to {end_line} spans more than {MAX_RANGE_LINES} lines"
                            )));
                        }
                        let start_column: Option<u32> = xml.optional_int(e, "start_column")?;
                        let end_column: Option<u32> = xml.optional_int(e, "end_column")?;
                        module.ranges.push(Range {
                            source_id,
                            covered,
                            start_line,
                            end_line,
                            columns: start_column.zip(end_column),
                        });
                    }
                    b"source_file" => {
                        let id = xml.required_attr(e, "id")?;
                        let path = xml.required_attr(e, "path")?;
                        module.sources.insert(id, path);
                    }
                    _ => {}
                },
                Event::End(ref e) if e.local_name().as_ref() == b"module" => {
                    self.flush(std::mem::take(&mut module), &identifier, coverage);
                }
                _ => {}
            }
        }
        self.flush(module, &identifier, coverage);

        Ok(())
    }
}

impl VisualStudioParser<'_> {
    fn flush(&self, module: Module, identifier: &str, coverage: &mut Coverage) {
        let mut by_source: BTreeMap<&str, Vec<&Range>> = BTreeMap::new();
        for range in &module.ranges {
            by_source.entry(range.source_id.as_str()).or_default().push(range);
        }

        for (source_id, ranges) in by_source {
            let Some(raw_path) = module.sources.get(source_id) else {
                log::debug!("Skipping {} ranges of unknown source id '{source_id}'", ranges.len());
                continue;
            };
            let Some(file) = self.files.resolve(raw_path) else {
                continue;
            };

            let mut lines: BTreeMap<u32, bool> = BTreeMap::new();
            let mut spans: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
            for range in ranges {
                for line in range.start_line..=range.end_line {
                    *lines.entry(line).or_insert(false) |= range.covered;
                }

                let Some(columns) = range.columns else {
                    continue;
                };
                if range.start_line != range.end_line {
                    continue;
                }
                let line_spans = spans.entry(range.start_line).or_default();
                let path = match line_spans.iter().position(|s| *s == columns) {
                    Some(index) => index,
                    None => {
                        line_spans.push(columns);
                        line_spans.len() - 1
                    }
                };
                coverage.add(BranchPoint {
                    file: file.clone(),
                    line: range.start_line,
                    start_offset: columns.0,
                    end_offset: columns.1,
                    path: path as u32,
                    hits: u64::from(range.covered),
                    coverage_identifier: identifier.to_string(),
                });
            }

            for (line, covered) in lines {
                coverage.add_hits(&file, line, u64::from(covered));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FileIndex;
    use crate::model::BranchCoverage;

    fn files() -> FileService {
        let mut index = FileIndex::new();
        index.add("/project/src/Foo.cs", "cs");
        index.add("/project/src/Bar.cs", "cs");
        FileService::new(&index, "cs")
    }

    fn parse(input: &[u8]) -> Result<Coverage> {
        let files = files();
        let mut coverage = Coverage::new();
        VisualStudioParser::new(&files).parse_bytes(
            Path::new("vs.coveragexml"),
            input,
            &mut coverage,
        )?;
        Ok(coverage)
    }

    #[test]
    fn test_parse_visual_studio() {
        let coverage = parse(include_bytes!("../../tests/fixtures/visual_studio.coveragexml")).unwrap();

        let foo = coverage.hits(Path::new("/project/src/Foo.cs")).unwrap();
        assert_eq!(foo[&9], 1);
        assert_eq!(foo[&10], 0);
        // Partial counts as covered; multi-line ranges cover every line.
        assert_eq!(foo[&12], 1);
        assert_eq!(foo[&13], 1);
        assert_eq!(foo[&14], 1);
        // Covered by one range, missed by another.
        assert_eq!(foo[&20], 1);

        // Source id 0 of the second module is Bar.cs, not Foo.cs.
        let bar = coverage.hits(Path::new("/project/src/Bar.cs")).unwrap();
        assert_eq!(bar.len(), 2);
        assert_eq!(bar[&3], 1);
        assert_eq!(bar[&4], 0);
    }

    #[test]
    fn test_branch_points_from_ranges() {
        let coverage = parse(include_bytes!("../../tests/fixtures/visual_studio.coveragexml")).unwrap();
        let foo = Path::new("/project/src/Foo.cs");

        assert_eq!(
            coverage.branch_coverage(foo),
            vec![BranchCoverage {
                line: 20,
                conditions: 2,
                covered_conditions: 1,
            }]
        );
    }

    #[test]
    fn test_unindexed_source_is_skipped() {
        let coverage = parse(include_bytes!("../../tests/fixtures/visual_studio.coveragexml")).unwrap();
        assert_eq!(coverage.files().len(), 2);
    }

    #[test]
    fn test_invalid_covered_value() {
        let input = br#"<results>
  <modules>
    <module>
      <range source_id="0" covered="maybe" start_line="1" end_line="1" />
    </module>
  </modules>
</results>"#;
        let err = parse(input).unwrap_err().to_string();
        assert!(err.contains(
            "Unsupported \"covered\" value \"maybe\", expected one of \"yes\", \"partial\" or \"no\""
        ));
        assert!(err.contains("vs.coveragexml"));
        assert!(err.contains("at line 4"), "{err}");
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let input = br#"<results>
  <modules>
    <module>
      <range source_id="0" covered="yes" start_line="9" end_line="3" />
    </module>
  </modules>
</results>"#;
        let err = parse(input).unwrap_err().to_string();
        assert!(err.contains("The end_line 3 is before the start_line 9"), "{err}");
        assert!(err.contains("at line 4"), "{err}");
    }

    #[test]
    fn test_huge_range_is_rejected() {
        let input = br#"<results>
  <modules>
    <module>
      <range source_id="0" covered="yes" start_line="1" end_line="4294967295" />
      <source_file id="0" path="/project/src/Foo.cs" />
    </module>
  </modules>
</results>"#;
        let err = parse(input).unwrap_err().to_string();
        assert!(err.contains("spans more than 100000 lines"), "{err}");
    }

    #[test]
    fn test_wrong_root() {
        let err = parse(b"<CoverageSession />").unwrap_err();
        assert!(err
            .to_string()
            .contains("Expected \"results\" as the root element instead of \"CoverageSession\""));
    }
}
