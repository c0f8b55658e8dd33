//! Shared reader for the XML report dialects: root tag checks, mandatory
//! attributes and error positions expressed as line numbers.

use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{CovmergeError, Result};

pub(crate) struct XmlReport<'a> {
    reader: Reader<&'a [u8]>,
    input: &'a [u8],
    file: &'a Path,
    event_start: usize,
}

impl<'a> XmlReport<'a> {
    pub fn new(file: &'a Path, input: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        Self {
            reader,
            input,
            file,
            event_start: 0,
        }
    }

    pub fn next(&mut self) -> Result<Event<'a>> {
        self.event_start = self.reader.buffer_position();
        match self.reader.read_event() {
            Ok(event) => Ok(event),
            Err(source) => Err(CovmergeError::Xml {
                file: self.file.to_path_buf(),
                line: self.line(),
                source,
            }),
        }
    }

    /// Read up to the first element and check that it is `<name>`.
    pub fn root(&mut self, name: &str) -> Result<BytesStart<'a>> {
        loop {
            match self.next()? {
                Event::Start(e) | Event::Empty(e) => {
                    if e.local_name().as_ref() == name.as_bytes() {
                        return Ok(e);
                    }
                    let found = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    return Err(self.error(format!(
                        "Expected \"{name}\" as the root element instead of \"{found}\""
                    )));
                }
                Event::Eof => {
                    return Err(self.error(format!("Missing root element \"{name}\"")));
                }
                _ => {}
            }
        }
    }

    pub fn attr(&self, e: &BytesStart, name: &str) -> Result<Option<String>> {
        let attr = e
            .try_get_attribute(name)
            .map_err(|err| self.xml_error(err.into()))?;
        match attr {
            Some(attr) => {
                let value = attr.unescape_value().map_err(|err| self.xml_error(err))?;
                Ok(Some(value.into_owned()))
            }
            None => Ok(None),
        }
    }

    pub fn required_attr(&self, e: &BytesStart, name: &str) -> Result<String> {
        self.attr(e, name)?.ok_or_else(|| {
            let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
            self.error(format!("Missing attribute \"{name}\" in element <{tag}>"))
        })
    }

    pub fn required_int<T: FromStr>(&self, e: &BytesStart, name: &str) -> Result<T> {
        let value = self.required_attr(e, name)?;
        self.int(name, &value)
    }

    pub fn optional_int<T: FromStr>(&self, e: &BytesStart, name: &str) -> Result<Option<T>> {
        match self.attr(e, name)? {
            Some(value) => self.int(name, &value).map(Some),
            None => Ok(None),
        }
    }

    fn int<T: FromStr>(&self, name: &str, value: &str) -> Result<T> {
        value.trim().parse().map_err(|_| {
            self.error(format!(
                "Expected an integer instead of \"{value}\" for the attribute \"{name}\""
            ))
        })
    }

    pub fn error(&self, message: String) -> CovmergeError {
        CovmergeError::Parse {
            file: self.file.to_path_buf(),
            line: self.line(),
            message,
        }
    }

    fn xml_error(&self, source: quick_xml::Error) -> CovmergeError {
        CovmergeError::Xml {
            file: self.file.to_path_buf(),
            line: self.line(),
            source,
        }
    }

    /// 1-based line of the event most recently read.
    fn line(&self) -> usize {
        let start = self.event_start.min(self.input.len());
        let skipped = self.input[start..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        line_at(self.input, start + skipped)
    }
}

/// 1-based line containing byte `offset`.
pub(crate) fn line_at(input: &[u8], offset: usize) -> usize {
    let end = offset.min(input.len());
    input[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
