//! In-memory dataset and its CSV reader/writer.
//!
//! The first row is the header and is never touched by the pipeline. Rows
//! may have differing lengths; they are written back exactly as held.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub type Row = Vec<String>;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Header row followed by data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Number of rows after the header.
    pub fn data_len(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Parses CSV text. Used by [`Table::read_csv`] and handy in tests.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_owned).collect());
        }
        Ok(Self { rows })
    }

    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path).map_err(|source| TableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file).map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), rows = table.rows.len(), "Read input table");
        Ok(table)
    }

    /// Serialises all rows, header included.
    pub fn to_writer<W: std::io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes the table to `path` in one step: the CSV goes to a temporary
    /// file next to the target, which then replaces it.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let write_err = |source: std::io::Error| TableError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        debug!(tmp = %tmp.path().display(), "Writing output table to temp file");
        self.to_writer(tmp.as_file_mut())
            .map_err(|source| TableError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        info!(path = %path.display(), rows = self.rows.len(), "Wrote output table");
        Ok(())
    }
}
