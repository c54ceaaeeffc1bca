//! Newline-delimited JSON reading.
//!
//! `JsonlReader` is a one-pass iterator over the objects in a JSONL file.
//! Blank lines are ignored; lines that are not valid UTF-8 or not a JSON
//! object are skipped and counted. Only I/O failures surface as errors.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::models::{LoadReport, RawRecord};

#[derive(Debug)]
pub struct JsonlReader<R> {
    reader: R,
    line: Vec<u8>,
    source: String,
    parsed: usize,
    malformed: usize,
}

impl JsonlReader<BufReader<File>> {
    /// Open a JSONL file for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file {}", path.display()))?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(BufReader::with_capacity(1 << 20, file), source))
    }
}

impl<R: BufRead> JsonlReader<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader,
            line: Vec::new(),
            source: source.into(),
            parsed: 0,
            malformed: 0,
        }
    }

    pub fn parsed(&self) -> usize {
        self.parsed
    }

    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Counts so far; complete once the iterator is exhausted.
    pub fn report(&self) -> LoadReport {
        LoadReport {
            source: self.source.clone(),
            parsed: self.parsed,
            malformed: self.malformed,
        }
    }
}

impl<R: BufRead> Iterator for JsonlReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("Failed to read from {}", self.source)),
                    )
                }
            }
            let line = self.line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_slice::<serde_json::Value>(line)
                .ok()
                .and_then(|value| RawRecord::try_from(value).ok());
            match record {
                Some(record) => {
                    self.parsed += 1;
                    return Some(Ok(record));
                }
                None => self.malformed += 1,
            }
        }
    }
}
