//! Frozen feature schema of a trained model.
//!
//! Column order is authoritative: every feature vector, attribution row and
//! model input is laid out in this order. Categorical fields were one-hot
//! encoded at training time as `<field>_<category>` columns; the mapping from
//! field to its categories is resolved once here so per-request lookups are
//! plain hash probes.

use std::collections::{HashMap, HashSet};

use crate::error::SchemaError;

/// Categorical columns one-hot encoded by the training pipeline.
pub const DEFAULT_CATEGORICAL_FIELDS: &[&str] = &[
    "stand",
    "p_throws",
    "pitch_type",
    "home_team",
    "away_team",
    "inning",
    "month",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Numeric,
    OneHot { field: String, category: String },
}

#[derive(Debug)]
pub struct FeatureSchema {
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
    index: HashMap<String, usize>,
    groups: HashMap<String, HashMap<String, usize>>,
}

impl FeatureSchema {
    pub fn new<I, S>(columns: Vec<String>, categorical_fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }

        // Longest prefix wins so e.g. `pitch_type_FF` never lands in a `pitch` group.
        let mut fields: Vec<String> = categorical_fields
            .into_iter()
            .map(|f| f.as_ref().to_string())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        fields.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut kinds = Vec::with_capacity(columns.len());
        let mut groups: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (i, name) in columns.iter().enumerate() {
            let hit = fields.iter().find_map(|field| {
                name.strip_prefix(field.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|category| !category.is_empty())
                    .map(|category| (field.clone(), category.to_string()))
            });
            match hit {
                Some((field, category)) => {
                    groups
                        .entry(field.clone())
                        .or_default()
                        .insert(category.clone(), i);
                    kinds.push(ColumnKind::OneHot { field, category });
                }
                None => kinds.push(ColumnKind::Numeric),
            }
        }

        for field in &fields {
            if !groups.contains_key(field) {
                tracing::warn!(field = %field, "categorical field has no one-hot columns in schema");
            }
        }

        Ok(Self {
            columns,
            kinds,
            index,
            groups,
        })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn kind(&self, position: usize) -> Option<&ColumnKind> {
        self.kinds.get(position)
    }

    /// Column position for `field == category`, if that category was seen in training.
    pub fn one_hot(&self, field: &str, category: &str) -> Option<usize> {
        self.groups.get(field).and_then(|g| g.get(category)).copied()
    }

    pub fn is_categorical(&self, field: &str) -> bool {
        self.groups.contains_key(field)
    }

    /// Known categories for a field, in schema order.
    pub fn categories(&self, field: &str) -> Vec<&str> {
        let mut cats: Vec<(usize, &str)> = self
            .groups
            .get(field)
            .map(|g| g.iter().map(|(c, i)| (*i, c.as_str())).collect())
            .unwrap_or_default();
        cats.sort_unstable_by_key(|(i, _)| *i);
        cats.into_iter().map(|(_, c)| c).collect()
    }

    /// Column positions belonging to a categorical field's one-hot group.
    pub fn group_positions(&self, field: &str) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .groups
            .get(field)
            .map(|g| g.values().copied().collect())
            .unwrap_or_default();
        positions.sort_unstable();
        positions
    }
}
