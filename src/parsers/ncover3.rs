/// Parser for NCover 3 `.nccov` reports.
///
/// Structure:
///   <coverage exportversion="3" ...>
///     <documents>
///       <doc id="1" url="C:\project\src\Foo.cs" />
///     </documents>
///     <module ...>
///       <method ...>
///         <seqpnt vc="3" l="12" doc="1" excluded="false" ... />
///       </method>
///     </module>
///   </coverage>
///
/// Sequence points carry the visit count (`vc`) of the source line `l` in
/// the document `doc`. Excluded points are ignored.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;

use super::xml::XmlReport;
use super::CoverageParser;
use crate::error::Result;
use crate::files::FileService;
use crate::model::Coverage;

pub struct NCover3Parser<'a> {
    files: &'a FileService,
}

impl<'a> NCover3Parser<'a> {
    pub fn new(files: &'a FileService) -> Self {
        Self { files }
    }
}

impl CoverageParser for NCover3Parser<'_> {
    fn parse_bytes(&self, report: &Path, input: &[u8], coverage: &mut Coverage) -> Result<()> {
        let mut xml = XmlReport::new(report, input);

        let root = xml.root("coverage")?;
        let version = xml.required_attr(&root, "exportversion")?;
        if version.trim() != "3" {
            return Err(xml.error(format!(
                "Expected \"3\" instead of \"{version}\" for the \"exportversion\" attribute"
            )));
        }

        let mut documents: HashMap<String, PathBuf> = HashMap::new();

        loop {
            match xml.next()? {
                Event::Eof => break,
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"doc" => {
                        let id = xml.required_attr(e, "id")?;
                        let url = xml.required_attr(e, "url")?;
                        if let Some(path) = self.files.resolve(&url) {
                            documents.insert(id, path);
                        }
                    }
                    b"seqpnt" => {
                        if xml.attr(e, "excluded")?.as_deref() == Some("true") {
                            continue;
                        }
                        let doc = xml.required_attr(e, "doc")?;
                        let line: u32 = xml.required_int(e, "l")?;
                        let hits: u64 = xml.required_int(e, "vc")?;
                        match documents.get(&doc) {
                            Some(path) => coverage.add_hits(path, line, hits),
                            None => log::trace!(
                                "Skipping sequence point at line {line} of unindexed document '{doc}'"
                            ),
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        Ok(())
    }
}
