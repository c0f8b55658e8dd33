/// Parser for OpenCover XML reports.
///
/// Structure:
///   <CoverageSession>
///     <Modules>
///       <Module hash="..." skippedDueTo="...">
///         <Files>
///           <File uid="1" fullPath="C:\project\src\Foo.cs" />
///         </Files>
///         <Classes><Class><Methods><Method>
///           <FileRef uid="1" />
///           <SequencePoints>
///             <SequencePoint vc="2" sl="9" sc="5" el="9" ec="20" fileid="1" />
///           </SequencePoints>
///           <BranchPoints>
///             <BranchPoint vc="1" sl="9" offset="2" offsetend="4" path="0" fileid="1" />
///           </BranchPoints>
///         </Method></Methods></Class></Classes>
///       </Module>
///     </Modules>
///   </CoverageSession>
///
/// Modules carrying `skippedDueTo` were not instrumented and are ignored.
/// Points without a `fileid` belong to the enclosing method's `FileRef`.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;

use super::xml::XmlReport;
use super::{coverage_identifier, CoverageParser};
use crate::error::Result;
use crate::files::FileService;
use crate::model::{BranchPoint, Coverage};

pub struct OpenCoverParser<'a> {
    files: &'a FileService,
}

impl<'a> OpenCoverParser<'a> {
    pub fn new(files: &'a FileService) -> Self {
        Self { files }
    }
}

impl CoverageParser for OpenCoverParser<'_> {
    fn parse_bytes(&self, report: &Path, input: &[u8], coverage: &mut Coverage) -> Result<()> {
        let mut xml = XmlReport::new(report, input);
        xml.root("CoverageSession")?;

        let identifier = coverage_identifier(report);
        let mut files: HashMap<String, PathBuf> = HashMap::new();
        let mut file_ref: Option<String> = None;
        let mut skipped_module = false;

        loop {
            let event = xml.next()?;
            let is_start = matches!(event, Event::Start(_));
            match event {
                Event::Eof => break,
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"Module" => {
                        if is_start {
                            skipped_module = xml.attr(e, "skippedDueTo")?.is_some();
                            if skipped_module {
                                log::debug!("Skipping a module of '{}' not instrumented by OpenCover", report.display());
                            }
                        }
                    }
                    _ if skipped_module => {}
                    b"File" => {
                        let uid = xml.required_attr(e, "uid")?;
                        let full_path = xml.required_attr(e, "fullPath")?;
                        if let Some(path) = self.files.resolve(&full_path) {
                            files.insert(uid, path);
                        }
                    }
                    b"Method" => file_ref = None,
                    b"FileRef" => file_ref = Some(xml.required_attr(e, "uid")?),
                    b"SequencePoint" => {
                        let hits: u64 = xml.required_int(e, "vc")?;
                        let line: u32 = xml.required_int(e, "sl")?;
                        let file_id = xml.attr(e, "fileid")?.or_else(|| file_ref.clone());
                        match file_id.as_ref().and_then(|id| files.get(id)) {
                            Some(path) => coverage.add_hits(path, line, hits),
                            None => log::trace!(
                                "Skipping sequence point at line {line} of unindexed file {file_id:?}"
                            ),
                        }
                    }
                    b"BranchPoint" => {
                        let hits: u64 = xml.required_int(e, "vc")?;
                        let line: u32 = xml.required_int(e, "sl")?;
                        let start_offset: u32 = xml.required_int(e, "offset")?;
                        let end_offset: u32 = xml.required_int(e, "offsetend")?;
                        let path: u32 = xml.required_int(e, "path")?;
                        let file_id = xml.attr(e, "fileid")?.or_else(|| file_ref.clone());
                        match file_id.as_ref().and_then(|id| files.get(id)) {
                            Some(file) => coverage.add(BranchPoint {
                                file: file.clone(),
                                line,
                                start_offset,
                                end_offset,
                                path,
                                hits,
                                coverage_identifier: identifier.clone(),
                            }),
                            None => log::trace!(
                                "Skipping branch point at line {line} of unindexed file {file_id:?}"
                            ),
                        }
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"Module" => skipped_module = false,
                    b"Method" => file_ref = None,
                    _ => {}
                },
                _ => {}
            }
        }

        Ok(())
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
        index.add("/work/project/src/Deterministic.cs", "cs");
        FileService::new(&index, "cs")
    }

    fn parse(input: &[u8]) -> Result<Coverage> {
        let files = files();
        let mut coverage = Coverage::new();
        OpenCoverParser::new(&files).parse_bytes(Path::new("opencover.xml"), input, &mut coverage)?;
        Ok(coverage)
    }

    #[test]
    fn test_parse_opencover() {
        let coverage = parse(include_bytes!("../../tests/fixtures/opencover.xml")).unwrap();

        let foo = coverage.hits(Path::new("/project/src/Foo.cs")).unwrap();
        assert_eq!(foo[&9], 2);
        assert_eq!(foo[&10], 0);
        // Getter and setter compiled to the same line are summed.
        assert_eq!(foo[&14], 3);

        // Points without fileid fall back to the method's FileRef.
        let bar = coverage.hits(Path::new("/project/src/Bar.cs")).unwrap();
        assert_eq!(bar[&5], 1);
    }

    #[test]
    fn test_branch_points() {
        let coverage = parse(include_bytes!("../../tests/fixtures/opencover.xml")).unwrap();
        let foo = Path::new("/project/src/Foo.cs");

        let points = coverage.branch_points(foo);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].line, 9);
        assert_eq!(points[0].start_offset, 2);
        assert_eq!(points[0].end_offset, 4);
        assert_eq!(points[0].path, 0);
        assert_eq!(points[0].hits, 2);
        assert_eq!(points[0].coverage_identifier, "opencover.xml");

        assert_eq!(
            coverage.branch_coverage(foo),
            vec![BranchCoverage {
                line: 9,
                conditions: 2,
                covered_conditions: 1,
            }]
        );
    }

    #[test]
    fn test_skipped_module_is_ignored() {
        let coverage = parse(include_bytes!("../../tests/fixtures/opencover.xml")).unwrap();
        // The skipped module references Foo.cs line 99.
        let foo = coverage.hits(Path::new("/project/src/Foo.cs")).unwrap();
        assert!(!foo.contains_key(&99));
    }

    #[test]
    fn test_deterministic_path_is_resolved() {
        let coverage = parse(include_bytes!("../../tests/fixtures/opencover.xml")).unwrap();
        let hits = coverage
            .hits(Path::new("/work/project/src/Deterministic.cs"))
            .unwrap();
        assert_eq!(hits[&3], 4);
    }

    #[test]
    fn test_unindexed_file_is_skipped() {
        let coverage = parse(include_bytes!("../../tests/fixtures/opencover.xml")).unwrap();
        assert_eq!(coverage.files().len(), 3);
    }

    #[test]
    fn test_wrong_root() {
        let err = parse(b"<coverage />").unwrap_err();
        assert!(err
            .to_string()
            .contains("Expected \"CoverageSession\" as the root element"));
    }

    #[test]
    fn test_missing_branch_offset() {
        let input = br#"<CoverageSession>
  <File uid="1" fullPath="/project/src/Foo.cs" />
  <BranchPoint vc="1" sl="9" offsetend="4" path="0" fileid="1" />
</CoverageSession>"#;
        let err = parse(input).unwrap_err().to_string();
        assert!(err.contains("Missing attribute \"offset\" in element <BranchPoint>"));
        assert!(err.contains("at line 3"), "{err}");
    }

    #[test]
    fn test_malformed_xml() {
        let input = b"<CoverageSession><Modules></CoverageSession>";
        assert!(parse(input).is_err());
    }
}
