#![no_main]
use std::path::Path;

use covmerge::files::{FileIndex, FileService};
use covmerge::model::Coverage;
use covmerge::parsers::ncover3::NCover3Parser;
use covmerge::parsers::opencover::OpenCoverParser;
use covmerge::parsers::visual_studio::VisualStudioParser;
use covmerge::parsers::CoverageParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut index = FileIndex::new();
    index.add("/project/src/Foo.cs", "cs");
    let files = FileService::new(&index, "cs");
    let report = Path::new("fuzz.xml");

    // Parsers must not panic on any input.
    let _ = NCover3Parser::new(&files).parse_bytes(report, data, &mut Coverage::new());
    let _ = OpenCoverParser::new(&files).parse_bytes(report, data, &mut Coverage::new());
    let _ = VisualStudioParser::new(&files).parse_bytes(report, data, &mut Coverage::new());
});
