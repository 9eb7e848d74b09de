//! Delimited text loading
//!
//! Each line maps positionally onto a [`RecordSchema`]. A malformed line
//! halts the load with [`ClassifierError::SchemaMismatch`] carrying its line
//! number; no partial row set is returned.

use crate::error::{ClassifierError, Result};
use crate::schema::{Record, RecordSchema};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Options for reading delimited files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Field delimiter byte
    pub delimiter: u8,
    /// Skip the first line
    pub has_header: bool,
    /// Honour `"` quoting; off by default since free text routinely contains quotes
    pub quoting: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            has_header: false,
            quoting: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tab-delimited, header-less; the layout of the sentiment data
    pub fn sentiment() -> Self {
        Self::default()
    }

    /// Tab-delimited with a header line; the layout of the issue data
    pub fn issues() -> Self {
        Self::default().with_header(true)
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_quoting(mut self, quoting: bool) -> Self {
        self.quoting = quoting;
        self
    }
}

/// Whether loaded rows must carry the label column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelColumn {
    Required,
    /// The label column may be absent or empty (rows to predict)
    Optional,
}

/// Reads delimited files into schema-typed records
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    options: LoadOptions,
}

impl DataLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load labelled rows from a file
    pub fn load(&self, path: impl AsRef<Path>, schema: &RecordSchema) -> Result<Vec<Record>> {
        self.load_with(path, schema, LabelColumn::Required)
    }

    /// Load rows to predict; the label column may be missing
    pub fn load_unlabeled(&self, path: impl AsRef<Path>, schema: &RecordSchema) -> Result<Vec<Record>> {
        self.load_with(path, schema, LabelColumn::Optional)
    }

    fn load_with(
        &self,
        path: impl AsRef<Path>,
        schema: &RecordSchema,
        label: LabelColumn,
    ) -> Result<Vec<Record>> {
        let start = Instant::now();
        let path = path.as_ref();
        let file = File::open(path)?;
        let records = self.read(file, schema, label)?;
        info!(
            path = %path.display(),
            rows = records.len(),
            schema = schema.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "data loaded"
        );
        Ok(records)
    }

    /// Read records from any reader. Line numbers in errors are 1-based and
    /// count the header line when present.
    pub fn read<R: Read>(&self, reader: R, schema: &RecordSchema, label: LabelColumn) -> Result<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(self.options.has_header)
            .quoting(self.options.quoting)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        let mut row = csv::StringRecord::new();
        while reader.read_record(&mut row)? {
            let line = row.position().map(|p| p.line() as usize).unwrap_or(records.len() + 1);
            let cells: Vec<&str> = row.iter().collect();
            let record = match label {
                LabelColumn::Required => schema.parse_row(&cells, line)?,
                LabelColumn::Optional => schema.parse_unlabeled_row(&cells, line)?,
            };
            records.push(record);
        }

        if records.is_empty() {
            return Err(ClassifierError::InvalidInput("file contains no data rows".into()));
        }
        debug!(rows = records.len(), "rows parsed");
        Ok(records)
    }
}

/// Load labelled rows from a delimited file
pub fn load_records(
    path: impl AsRef<Path>,
    schema: &RecordSchema,
    options: &LoadOptions,
) -> Result<Vec<Record>> {
    DataLoader::new(options.clone()).load(path, schema)
}
