//! Column-oriented row sets
//!
//! A [`Frame`] is what flows between pipeline stages: every stage reads named
//! input columns and appends its output columns, leaving existing columns
//! untouched. Rows are never reordered or dropped.

use crate::error::{ClassifierError, Result};
use crate::feature_engineering::SparseVector;
use crate::schema::{FieldType, FieldValue, Record, RecordSchema};

/// A single typed column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<String>),
    Boolean(Vec<bool>),
    Category(Vec<String>),
    /// Label keys; `None` for values with no key in the fitted mapping
    Key(Vec<Option<u32>>),
    Vector(Vec<SparseVector>),
    Scalar(Vec<f64>),
    /// One score per class per row
    Scores(Vec<Vec<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Boolean(v) => v.len(),
            Column::Category(v) => v.len(),
            Column::Key(v) => v.len(),
            Column::Vector(v) => v.len(),
            Column::Scalar(v) => v.len(),
            Column::Scores(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Text(_) => "text",
            Column::Boolean(_) => "boolean",
            Column::Category(_) => "category",
            Column::Key(_) => "key",
            Column::Vector(_) => "vector",
            Column::Scalar(_) => "scalar",
            Column::Scores(_) => "scores",
        }
    }
}

/// Whether the label field must be present when building a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Training / evaluation rows: every row must carry a label
    Required,
    /// Inference rows: the label is dropped even if present
    Ignore,
}

/// Ordered set of equally long named columns
#[derive(Debug, Clone, Default)]
pub struct Frame {
    n_rows: usize,
    columns: Vec<(String, Column)>,
}

impl Frame {
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            columns: Vec::new(),
        }
    }

    /// Build a frame from schema-aligned records. Ignored fields are skipped.
    /// Row numbers in errors are 1-based positions within `records`.
    pub fn from_records(schema: &RecordSchema, records: &[Record], policy: LabelPolicy) -> Result<Self> {
        let require_label = policy == LabelPolicy::Required;
        for (i, record) in records.iter().enumerate() {
            schema.validate_record(record, i + 1, require_label)?;
        }

        let label_idx = schema.label_index();
        let mut frame = Frame::new(records.len());

        for (idx, field) in schema.fields().iter().enumerate() {
            if idx == label_idx && !require_label {
                continue;
            }
            let column = match field.field_type {
                FieldType::Ignored => continue,
                FieldType::Text => Column::Text(
                    records
                        .iter()
                        .map(|r| match &r.values()[idx] {
                            FieldValue::Text(s) => s.clone(),
                            _ => String::new(),
                        })
                        .collect(),
                ),
                FieldType::Boolean => Column::Boolean(
                    records
                        .iter()
                        .map(|r| matches!(r.values()[idx], FieldValue::Bool(true)))
                        .collect(),
                ),
                FieldType::Categorical => Column::Category(
                    records
                        .iter()
                        .map(|r| match &r.values()[idx] {
                            FieldValue::Category(s) => s.clone(),
                            _ => String::new(),
                        })
                        .collect(),
                ),
            };
            frame.insert(field.name.clone(), column)?;
        }

        Ok(frame)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Add or replace a column
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.n_rows {
            return Err(ClassifierError::ShapeError {
                expected: format!("{} rows in column '{}'", self.n_rows, name),
                actual: format!("{} rows", column.len()),
            });
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| ClassifierError::schema(format!("column '{}' not found", name)))
    }

    pub fn text(&self, name: &str) -> Result<&[String]> {
        match self.column(name)? {
            Column::Text(v) => Ok(v),
            other => Err(type_error(name, "text", other)),
        }
    }

    pub fn keys(&self, name: &str) -> Result<&[Option<u32>]> {
        match self.column(name)? {
            Column::Key(v) => Ok(v),
            other => Err(type_error(name, "key", other)),
        }
    }

    pub fn vectors(&self, name: &str) -> Result<&[SparseVector]> {
        match self.column(name)? {
            Column::Vector(v) => Ok(v),
            other => Err(type_error(name, "vector", other)),
        }
    }

    pub fn scalars(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Scalar(v) => Ok(v),
            other => Err(type_error(name, "scalar", other)),
        }
    }

    pub fn scores(&self, name: &str) -> Result<&[Vec<f64>]> {
        match self.column(name)? {
            Column::Scores(v) => Ok(v),
            other => Err(type_error(name, "scores", other)),
        }
    }

    pub fn categories(&self, name: &str) -> Result<&[String]> {
        match self.column(name)? {
            Column::Category(v) => Ok(v),
            other => Err(type_error(name, "category", other)),
        }
    }

    pub fn booleans(&self, name: &str) -> Result<&[bool]> {
        match self.column(name)? {
            Column::Boolean(v) => Ok(v),
            other => Err(type_error(name, "boolean", other)),
        }
    }
}

fn type_error(name: &str, expected: &str, found: &Column) -> ClassifierError {
    ClassifierError::schema(format!(
        "column '{}' expected {}, found {}",
        name,
        expected,
        found.type_name()
    ))
}
