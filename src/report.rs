//! CSV report of one run.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Result;
use crate::reconcile::OutcomeSink;
use crate::types::ReconciliationOutcome;

pub const REPORT_FIELDS: [&str; 7] = [
    "Device",
    "Role",
    "Interface",
    "Type",
    "IP Address (Nautobot)",
    "IP Address (Device)",
    "Actions",
];

/// Writes the header up front, then rows as they are recorded.  Each
/// batch is flushed so an interrupted run still leaves a usable file.
pub struct CsvReport<W: Write> {
    writer: W,
    rows: usize,
}

impl CsvReport<BufWriter<File>> {
    /// Creates `Report_<timestamp>.csv` in `dir`.
    pub fn create(dir: &Path) -> Result<(Self, PathBuf)> {
        let name = chrono::Local::now()
            .format("Report_%d-%m-%Y-%H:%M:%S.csv")
            .to_string();
        let path = dir.join(name);
        let file = File::create(&path)?;
        info!("Writing report to {}", path.display());
        Ok((Self::new(BufWriter::new(file))?, path))
    }
}

impl<W: Write> CsvReport<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        write_record(&mut writer, &REPORT_FIELDS)?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutcomeSink for CsvReport<W> {
    fn record(&mut self, outcomes: &[ReconciliationOutcome]) -> Result<()> {
        for outcome in outcomes {
            write_record(&mut self.writer, &outcome.record())?;
            self.rows += 1;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn write_record<S: AsRef<str>>(writer: &mut impl Write, fields: &[S]) -> std::io::Result<()> {
    let line = fields
        .iter()
        .map(|f| escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\r\n")
}

/// RFC 4180 quoting.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
