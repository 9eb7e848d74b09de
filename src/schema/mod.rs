//! Record schema
//!
//! Typed, positional row definitions. A [`RecordSchema`] names each field,
//! its semantic type, and which field (if any) carries the label. Every other
//! component treats it as the shape contract for the rows it consumes.

use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Free text, featurized
    Text,
    /// Boolean value (`0`/`1`, `true`/`false`)
    Boolean,
    /// Categorical string value
    Categorical,
    /// Read and validated for presence, otherwise unused (e.g. an ID column)
    Ignored,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Categorical => "categorical",
            FieldType::Ignored => "ignored",
        };
        f.write_str(name)
    }
}

/// One positional field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Kind of classification task a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Boolean label
    Binary,
    /// Categorical label
    MultiClass,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Binary => f.write_str("binary"),
            TaskKind::MultiClass => f.write_str("multiclass"),
        }
    }
}

/// Ordered field list plus label designation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SchemaParts")]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldSpec>,
    label: String,
}

/// Unvalidated wire form; decoding goes through [`RecordSchema::new`]
#[derive(Deserialize)]
struct SchemaParts {
    name: String,
    fields: Vec<FieldSpec>,
    label: String,
}

impl TryFrom<SchemaParts> for RecordSchema {
    type Error = ClassifierError;

    fn try_from(parts: SchemaParts) -> Result<Self> {
        RecordSchema::new(parts.name, parts.fields, parts.label)
    }
}

impl RecordSchema {
    /// Create a schema, validating that the label field exists and has a label type
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let schema = Self {
            name: name.into(),
            fields,
            label,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(ClassifierError::ConfigError("schema has no fields".into()));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ClassifierError::ConfigError(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }
        let label = self.label_field()?;
        if !matches!(label.field_type, FieldType::Boolean | FieldType::Categorical) {
            return Err(ClassifierError::ConfigError(format!(
                "label field '{}' must be boolean or categorical, found {}",
                label.name, label.field_type
            )));
        }
        if self.text_fields().next().is_none() {
            return Err(ClassifierError::ConfigError(
                "schema needs at least one text field".into(),
            ));
        }
        Ok(())
    }

    /// Sentiment preset: `SentimentText` (text), `Sentiment` (boolean label)
    pub fn sentiment() -> Self {
        Self {
            name: "sentiment".to_string(),
            fields: vec![
                FieldSpec::new("SentimentText", FieldType::Text),
                FieldSpec::new("Sentiment", FieldType::Boolean),
            ],
            label: "Sentiment".to_string(),
        }
    }

    /// Issue triage preset: `ID`, `Area` (categorical label), `Title`, `Description`
    pub fn github_issues() -> Self {
        Self {
            name: "github_issues".to_string(),
            fields: vec![
                FieldSpec::new("ID", FieldType::Ignored),
                FieldSpec::new("Area", FieldType::Categorical),
                FieldSpec::new("Title", FieldType::Text),
                FieldSpec::new("Description", FieldType::Text),
            ],
            label: "Area".to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn label_name(&self) -> &str {
        &self.label
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn label_index(&self) -> usize {
        // validated at construction
        self.index_of(&self.label).unwrap_or(0)
    }

    pub fn label_field(&self) -> Result<&FieldSpec> {
        self.field(&self.label).ok_or_else(|| {
            ClassifierError::ConfigError(format!("label field '{}' not in schema", self.label))
        })
    }

    /// Text fields in declared order; this order fixes feature concatenation
    pub fn text_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.field_type == FieldType::Text)
    }

    pub fn task_kind(&self) -> TaskKind {
        match self.fields[self.label_index()].field_type {
            FieldType::Boolean => TaskKind::Binary,
            _ => TaskKind::MultiClass,
        }
    }

    /// Stable fingerprint of names, types and label, used to reject incompatible archives
    pub fn fingerprint(&self) -> u64 {
        let mut buf = String::new();
        for field in &self.fields {
            buf.push_str(&field.name);
            buf.push(':');
            buf.push_str(&field.field_type.to_string());
            buf.push(';');
        }
        buf.push_str("label=");
        buf.push_str(&self.label);
        xxh3_64(buf.as_bytes())
    }

    /// Start building a record for this schema
    pub fn record(&self) -> RecordBuilder<'_> {
        RecordBuilder::new(self)
    }

    /// Parse one raw row (already split into columns) into a typed record.
    /// `row` is the 1-based line number used in error messages.
    pub fn parse_row<S: AsRef<str>>(&self, cells: &[S], row: usize) -> Result<Record> {
        if cells.len() != self.fields.len() {
            return Err(ClassifierError::schema_at(
                row,
                format!("expected {} columns, found {}", self.fields.len(), cells.len()),
            ));
        }
        let values = self
            .fields
            .iter()
            .zip(cells.iter())
            .map(|(field, cell)| FieldValue::parse(field, cell.as_ref(), row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Record { values })
    }

    /// Parse a row for prediction. The label column may be omitted; when
    /// present its cell is not parsed. Either way it becomes [`FieldValue::Missing`].
    pub fn parse_unlabeled_row<S: AsRef<str>>(&self, cells: &[S], row: usize) -> Result<Record> {
        let n = self.fields.len();
        let omitted = cells.len() + 1 == n;
        if cells.len() != n && !omitted {
            return Err(ClassifierError::schema_at(
                row,
                format!("expected {} or {} columns, found {}", n - 1, n, cells.len()),
            ));
        }
        let label_idx = self.label_index();
        let mut values = Vec::with_capacity(n);
        for (i, field) in self.fields.iter().enumerate() {
            if i == label_idx {
                values.push(FieldValue::Missing);
                continue;
            }
            let j = if omitted && i > label_idx { i - 1 } else { i };
            values.push(FieldValue::parse(field, cells[j].as_ref(), row)?);
        }
        Ok(Record { values })
    }

    /// Check a record's shape and field types against this schema.
    /// When `require_label` is false the label slot may be [`FieldValue::Missing`].
    pub fn validate_record(&self, record: &Record, row: usize, require_label: bool) -> Result<()> {
        if record.values.len() != self.fields.len() {
            return Err(ClassifierError::schema_at(
                row,
                format!(
                    "expected {} fields, found {}",
                    self.fields.len(),
                    record.values.len()
                ),
            ));
        }
        let label_idx = self.label_index();
        for (i, (field, value)) in self.fields.iter().zip(record.values.iter()).enumerate() {
            let ok = match (field.field_type, value) {
                (_, FieldValue::Missing) => i != label_idx || !require_label,
                (FieldType::Text, FieldValue::Text(_)) => true,
                (FieldType::Boolean, FieldValue::Bool(_)) => true,
                (FieldType::Categorical, FieldValue::Category(_)) => true,
                (FieldType::Ignored, _) => true,
                _ => false,
            };
            if !ok {
                return Err(ClassifierError::schema_at(
                    row,
                    format!(
                        "field '{}' expects {}, found {}",
                        field.name,
                        field.field_type,
                        value.kind()
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// One typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Category(String),
    Missing,
}

impl FieldValue {
    fn parse(field: &FieldSpec, raw: &str, row: usize) -> Result<Self> {
        match field.field_type {
            FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldType::Categorical => Ok(FieldValue::Category(raw.trim().to_string())),
            FieldType::Ignored => Ok(FieldValue::Text(raw.to_string())),
            FieldType::Boolean => parse_bool(raw).map(FieldValue::Bool).ok_or_else(|| {
                ClassifierError::schema_at(
                    row,
                    format!("field '{}': cannot parse '{}' as boolean", field.name, raw),
                )
            }),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Category(_) => "categorical",
            FieldValue::Missing => "missing",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Boolean cell syntax: `1`/`0`, `true`/`false`, `yes`/`no`
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// A row whose values are positionally aligned with a [`RecordSchema`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<FieldValue>,
}

impl Record {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn get(&self, idx: usize) -> Option<&FieldValue> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds records by field name; unset fields are [`FieldValue::Missing`]
pub struct RecordBuilder<'a> {
    schema: &'a RecordSchema,
    values: Vec<FieldValue>,
    error: Option<ClassifierError>,
}

impl<'a> RecordBuilder<'a> {
    fn new(schema: &'a RecordSchema) -> Self {
        Self {
            schema,
            values: vec![FieldValue::Missing; schema.len()],
            error: None,
        }
    }

    fn set(mut self, name: &str, value: FieldValue) -> Self {
        match self.schema.index_of(name) {
            Some(idx) => self.values[idx] = value,
            None => {
                if self.error.is_none() {
                    self.error = Some(ClassifierError::schema(format!(
                        "unknown field '{}' for schema '{}'",
                        name,
                        self.schema.name()
                    )));
                }
            }
        }
        self
    }

    pub fn text(self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, FieldValue::Text(value.into()))
    }

    pub fn boolean(self, name: &str, value: bool) -> Self {
        self.set(name, FieldValue::Bool(value))
    }

    pub fn category(self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, FieldValue::Category(value.into()))
    }

    pub fn build(self) -> Result<Record> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Record {
                values: self.values,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let sentiment = RecordSchema::sentiment();
        assert_eq!(sentiment.task_kind(), TaskKind::Binary);
        assert_eq!(sentiment.label_index(), 1);

        let issues = RecordSchema::github_issues();
        assert_eq!(issues.task_kind(), TaskKind::MultiClass);
        let text: Vec<&str> = issues.text_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(text, vec!["Title", "Description"]);
    }

    #[test]
    fn test_parse_row() {
        let schema = RecordSchema::sentiment();
        let record = schema.parse_row(&["Wow... Loved this place.", "1"], 1).unwrap();
        assert_eq!(record.get(1), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_parse_row_wrong_column_count() {
        let schema = RecordSchema::github_issues();
        let err = schema.parse_row(&["1", "area-ui", "title"], 7).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::SchemaMismatch { row: Some(7), .. }
        ));
    }

    #[test]
    fn test_parse_row_bad_boolean() {
        let schema = RecordSchema::sentiment();
        let err = schema.parse_row(&["text", "maybe"], 2).unwrap_err();
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_parse_unlabeled_row() {
        let schema = RecordSchema::github_issues();
        let record = schema.parse_unlabeled_row(&["7", "Crash on save", "It crashes"], 3).unwrap();
        assert_eq!(record.get(1), Some(&FieldValue::Missing));
        assert_eq!(record.get(2), Some(&FieldValue::Text("Crash on save".into())));

        let record = schema
            .parse_unlabeled_row(&["7", "", "Crash on save", "It crashes"], 3)
            .unwrap();
        assert_eq!(record.get(1), Some(&FieldValue::Missing));
        assert!(schema.parse_unlabeled_row(&["7", "x"], 3).is_err());
    }

    #[test]
    fn test_unlabeled_row_ignores_malformed_label() {
        let schema = RecordSchema::sentiment();
        assert!(schema.parse_row(&["Loved it", "maybe"], 4).is_err());
        let record = schema.parse_unlabeled_row(&["Loved it", "maybe"], 4).unwrap();
        assert_eq!(record.get(0), Some(&FieldValue::Text("Loved it".into())));
        assert_eq!(record.get(1), Some(&FieldValue::Missing));
    }

    #[test]
    fn test_builder_and_validation() {
        let schema = RecordSchema::github_issues();
        let record = schema
            .record()
            .text("Title", "Entity Framework crashes")
            .text("Description", "When connecting to the database, EF is crashing")
            .build()
            .unwrap();
        assert!(schema.validate_record(&record, 1, false).is_ok());
        assert!(schema.validate_record(&record, 1, true).is_err());

        let err = schema.record().text("Body", "x").build().unwrap_err();
        assert!(err.to_string().contains("Body"));
    }

    #[test]
    fn test_fingerprint_distinguishes_schemas() {
        assert_ne!(
            RecordSchema::sentiment().fingerprint(),
            RecordSchema::github_issues().fingerprint()
        );
        assert_eq!(
            RecordSchema::sentiment().fingerprint(),
            RecordSchema::sentiment().fingerprint()
        );
    }

    #[test]
    fn test_decoding_validates_schema() {
        let json = serde_json::to_string(&RecordSchema::github_issues()).unwrap();
        let decoded: RecordSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, RecordSchema::github_issues());

        let bad_label = json.replace("\"label\":\"Area\"", "\"label\":\"Nope\"");
        assert_ne!(bad_label, json);
        assert!(serde_json::from_str::<RecordSchema>(&bad_label).is_err());

        let no_fields = r#"{"name":"empty","fields":[],"label":"x"}"#;
        assert!(serde_json::from_str::<RecordSchema>(no_fields).is_err());
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let result = RecordSchema::new(
            "bad",
            vec![
                FieldSpec::new("text", FieldType::Text),
                FieldSpec::new("label", FieldType::Text),
            ],
            "label",
        );
        assert!(result.is_err());
    }
}
