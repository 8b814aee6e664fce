//! Line-oriented reader for externally acquired channel pairs
//!
//! Each tick consumes one line holding the two raw readings, separated by a
//! comma, a tab or spaces. Blank lines and `#` comments are skipped, as is a
//! non-numeric first line (a header). End of input reports
//! [`EcgError::SourceExhausted`].

use ecg_core::{ChannelPair, ChannelSource, EcgError, EcgResult};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

pub struct LiveChannelPair {
    reader: Box<dyn BufRead + Send>,
    line: String,
    line_number: u64,
    name: String,
}

impl LiveChannelPair {
    pub fn new(reader: impl BufRead + Send + 'static, name: impl Into<String>) -> Self {
        Self {
            reader: Box::new(reader),
            line: String::new(),
            line_number: 0,
            name: name.into(),
        }
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), "stdin")
    }

    pub fn open(path: impl AsRef<Path>) -> EcgResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| EcgError::SourceError {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }

    /// Lines consumed so far
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

fn parse_pair(line: &str) -> Result<ChannelPair<f32>, String> {
    let mut fields = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty());

    let mut next = |label: &str| -> Result<f32, String> {
        let field = fields.next().ok_or_else(|| format!("missing {} value", label))?;
        field
            .parse::<f32>()
            .map_err(|e| format!("bad {} value {:?}: {}", label, field, e))
    };

    Ok(ChannelPair::new(next("lead1")?, next("lead2")?))
}

impl ChannelSource for LiveChannelPair {
    fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|e| EcgError::SourceError {
                    message: format!("{}: {}", self.name, e),
                })?;
            if read == 0 {
                return Err(EcgError::SourceExhausted);
            }
            self.line_number += 1;

            let line = self.line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match parse_pair(line) {
                Ok(pair) => return Ok(pair),
                Err(_) if self.line_number == 1 => {
                    debug!(source = %self.name, header = line, "Skipping header line");
                }
                Err(message) => {
                    return Err(EcgError::SourceError {
                        message: format!("{} line {}: {}", self.name, self.line_number, message),
                    })
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
