#![no_main]
use std::path::Path;

use covmerge::files::{FileIndex, FileService};
use covmerge::model::Coverage;
use covmerge::parsers::dotcover::DotCoverParser;
use covmerge::parsers::CoverageParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut index = FileIndex::new();
    index.add("/project/src/Foo.cs", "cs");
    let files = FileService::new(&index, "cs");

    // Parser must not panic on any input.
    let mut coverage = Coverage::new();
    let _ = DotCoverParser::new(&files).parse_bytes(Path::new("fuzz.html"), data, &mut coverage);
});
