//! Label encoding
//!
//! Boolean labels pass through as keys `0`/`1`. Categorical labels are mapped
//! to dense integer keys in first-seen order over the training rows; the
//! mapping is frozen after fit, and values it has never seen get no key.

use crate::data::Column;
use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frozen value <-> key mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMapping {
    values: Vec<String>,
    keys: BTreeMap<String, u32>,
}

impl KeyMapping {
    /// Assign keys in order of first appearance
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut mapping = Self {
            values: Vec::new(),
            keys: BTreeMap::new(),
        };
        for value in values {
            if !mapping.keys.contains_key(value) {
                mapping.keys.insert(value.to_string(), mapping.values.len() as u32);
                mapping.values.push(value.to_string());
            }
        }
        mapping
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn key_of(&self, value: &str) -> Option<u32> {
        self.keys.get(value).copied()
    }

    /// Inverse mapping, used only on output
    pub fn value_of(&self, key: u32) -> Result<&str> {
        self.values
            .get(key as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| ClassifierError::UnknownLabel(format!("key {}", key)))
    }

    /// Values in key order
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Unfit label encoding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelEncoding {
    /// Boolean label, keys 0 (false) and 1 (true)
    Identity,
    /// Categorical label, value -> key learned from training rows
    ValueToKey,
}

impl LabelEncoding {
    pub fn fit(&self, column: &Column) -> Result<FittedLabelEncoder> {
        match (self, column) {
            (LabelEncoding::Identity, Column::Boolean(_)) => Ok(FittedLabelEncoder::Boolean),
            (LabelEncoding::ValueToKey, Column::Category(values)) => {
                let mapping = KeyMapping::from_values(values.iter().map(|s| s.as_str()));
                if mapping.is_empty() {
                    return Err(ClassifierError::training(
                        "label_encoder",
                        "no label values in training rows",
                    ));
                }
                Ok(FittedLabelEncoder::Categorical(mapping))
            }
            (_, other) => Err(ClassifierError::schema(format!(
                "label encoding {:?} cannot consume a {} column",
                self,
                other.type_name()
            ))),
        }
    }
}

/// Fitted label encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedLabelEncoder {
    Boolean,
    Categorical(KeyMapping),
}

impl FittedLabelEncoder {
    pub fn n_classes(&self) -> usize {
        match self {
            FittedLabelEncoder::Boolean => 2,
            FittedLabelEncoder::Categorical(mapping) => mapping.len(),
        }
    }

    pub fn mapping(&self) -> Option<&KeyMapping> {
        match self {
            FittedLabelEncoder::Boolean => None,
            FittedLabelEncoder::Categorical(mapping) => Some(mapping),
        }
    }

    /// Encode a label column; unseen categories become `None`
    pub fn transform(&self, column: &Column) -> Result<Column> {
        match (self, column) {
            (FittedLabelEncoder::Boolean, Column::Boolean(values)) => Ok(Column::Key(
                values.iter().map(|&b| Some(u32::from(b))).collect(),
            )),
            (FittedLabelEncoder::Categorical(mapping), Column::Category(values)) => Ok(Column::Key(
                values.iter().map(|v| mapping.key_of(v)).collect(),
            )),
            (_, other) => Err(ClassifierError::schema(format!(
                "label encoder cannot consume a {} column",
                other.type_name()
            ))),
        }
    }
}
