//! Record emission
//!
//! The pipeline hands every finished [`LeadRecord`] to a [`RecordEmitter`]
//! together with its tick index. Emitters own the encoding; the pipeline
//! never formats records itself.

use ecg_core::{EcgError, EcgResult, LeadRecord};
use serde::Serialize;
use std::io::{self, Write};

/// Consumer of one record per tick
pub trait RecordEmitter {
    /// Deliver the record produced at `tick`
    fn emit(&mut self, tick: u64, record: &LeadRecord) -> EcgResult<()>;

    /// Push out anything buffered
    fn flush(&mut self) -> EcgResult<()> {
        Ok(())
    }
}

impl<E: RecordEmitter + ?Sized> RecordEmitter for &mut E {
    fn emit(&mut self, tick: u64, record: &LeadRecord) -> EcgResult<()> {
        (**self).emit(tick, record)
    }

    fn flush(&mut self) -> EcgResult<()> {
        (**self).flush()
    }
}

impl<E: RecordEmitter + ?Sized> RecordEmitter for Box<E> {
    fn emit(&mut self, tick: u64, record: &LeadRecord) -> EcgResult<()> {
        (**self).emit(tick, record)
    }

    fn flush(&mut self) -> EcgResult<()> {
        (**self).flush()
    }
}

fn io_error(e: io::Error) -> EcgError {
    match e.kind() {
        io::ErrorKind::BrokenPipe => EcgError::EmitterClosed,
        _ => EcgError::EmitError {
            message: e.to_string(),
        },
    }
}

/// Delimited text, one line per tick: `tick,lead1,lead2,lead3,avr,avl,avf`
pub struct DelimitedEmitter<W: Write> {
    writer: W,
    delimiter: char,
    header: bool,
    header_written: bool,
}

impl<W: Write> DelimitedEmitter<W> {
    /// Comma-separated with a header line
    pub fn csv(writer: W) -> Self {
        Self::new(writer, ',', true)
    }

    pub fn new(writer: W, delimiter: char, header: bool) -> Self {
        Self {
            writer,
            delimiter,
            header,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    fn write_header(&mut self) -> io::Result<()> {
        write!(self.writer, "tick")?;
        for name in LeadRecord::FIELD_NAMES {
            write!(self.writer, "{}{}", self.delimiter, name)?;
        }
        writeln!(self.writer)
    }

    fn write_line(&mut self, tick: u64, record: &LeadRecord) -> io::Result<()> {
        if self.header && !self.header_written {
            self.write_header()?;
            self.header_written = true;
        }
        write!(self.writer, "{}", tick)?;
        for value in record.values() {
            write!(self.writer, "{}{}", self.delimiter, value)?;
        }
        writeln!(self.writer)
    }
}

impl<W: Write> RecordEmitter for DelimitedEmitter<W> {
    fn emit(&mut self, tick: u64, record: &LeadRecord) -> EcgResult<()> {
        self.write_line(tick, record).map_err(io_error)
    }

    fn flush(&mut self) -> EcgResult<()> {
        self.writer.flush().map_err(io_error)
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    tick: u64,
    #[serde(flatten)]
    record: &'a LeadRecord,
}

/// Newline-delimited JSON objects keyed by the boundary field names
pub struct JsonLinesEmitter<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W: Write> RecordEmitter for JsonLinesEmitter<W> {
    fn emit(&mut self, tick: u64, record: &LeadRecord) -> EcgResult<()> {
        serde_json::to_writer(&mut self.writer, &JsonLine { tick, record }).map_err(|e| {
            if e.is_io() {
                io_error(e.into())
            } else {
                EcgError::EmitError {
                    message: e.to_string(),
                }
            }
        })?;
        self.writer.write_all(b"\n").map_err(io_error)
    }

    fn flush(&mut self) -> EcgResult<()> {
        self.writer.flush().map_err(io_error)
    }
}

/// Collects records in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryEmitter {
    records: Vec<(u64, LeadRecord)>,
    capacity: Option<usize>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports [`EcgError::EmitterClosed`] once `capacity` records are held
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    pub fn records(&self) -> &[(u64, LeadRecord)] {
        &self.records
    }

    pub fn last(&self) -> Option<&LeadRecord> {
        self.records.last().map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordEmitter for MemoryEmitter {
    fn emit(&mut self, tick: u64, record: &LeadRecord) -> EcgResult<()> {
        if self.capacity.is_some_and(|cap| self.records.len() >= cap) {
            return Err(EcgError::EmitterClosed);
        }
        self.records.push((tick, *record));
        Ok(())
    }
}
