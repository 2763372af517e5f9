use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::db::models::{MarketRow, LEDGER_HEADER};
use crate::error::{AppError, Result};
use crate::types::{Market, MarketId};

/// Durable, append-only record of every market ever detected.
pub trait MarketLedger: Send {
    /// Ids of all recorded markets.
    fn known_ids(&self) -> Result<HashSet<MarketId>>;

    /// Append `markets` after the existing rows. Never rewrites prior rows.
    fn append(&mut self, markets: &[Market]) -> Result<()>;
}

/// Ledger kept as a CSV file with columns `id,shortName,url,datedetected`.
/// The file must exist before the watcher starts; a zero-byte file is
/// accepted and gets its header on the first append.
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// All rows in file order.
    pub fn rows(&self) -> Result<Vec<MarketRow>> {
        let file = self.open_existing(OpenOptions::new().read(true))?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut rows = Vec::new();
        for row in reader.deserialize::<MarketRow>() {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn open_existing(&self, opts: &OpenOptions) -> Result<File> {
        opts.open(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::Store(format!(
                "{} does not exist; create it with the header line \"{}\"",
                self.path.display(),
                LEDGER_HEADER.join(","),
            )),
            _ => AppError::Io(e),
        })
    }
}

impl MarketLedger for CsvLedger {
    fn known_ids(&self) -> Result<HashSet<MarketId>> {
        Ok(self.rows()?.into_iter().map(|r| r.id).collect())
    }

    fn append(&mut self, markets: &[Market]) -> Result<()> {
        if markets.is_empty() {
            return Ok(());
        }

        let mut file = self.open_existing(OpenOptions::new().read(true).append(true))?;
        let len = file.metadata()?.len();
        let needs_header = len == 0;
        // a hand-edited file may lack the final newline; without one the
        // first record would be glued onto the last existing line
        if len > 0 && !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(LEDGER_HEADER)?;
        }
        for market in markets {
            writer.serialize(MarketRow::from(market))?;
        }
        writer.flush()?;

        debug!(rows = markets.len(), path = %self.path.display(), "Ledger append flushed");
        Ok(())
    }
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
