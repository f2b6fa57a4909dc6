use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::schema::FeatureSchema;

/// A single raw input value, before alignment to the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Float(f64),
    Int(i64),
    Text(String),
}

impl RawValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Float(v) => Some(*v),
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

// Matches how the training pipeline named dummy columns: `inning_4`, `launch_speed_95.0`.
impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Float(v) => write!(f, "{:?}", v),
            RawValue::Int(v) => write!(f, "{}", v),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<u32> for RawValue {
    fn from(v: u32) -> Self {
        RawValue::Int(v as i64)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

/// Values laid out in schema order. Always exactly one value per column.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    schema: Arc<FeatureSchema>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn zeros(schema: Arc<FeatureSchema>) -> Self {
        let values = vec![0.0; schema.len()];
        Self { schema, values }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.schema.position(column).map(|i| self.values[i])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn nonzero(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Expand raw fields into a full schema-aligned vector.
///
/// A field that is itself a column is written through. Otherwise it is treated
/// as a category and the matching one-hot column is set to 1. Anything that
/// cannot be placed is dropped with a warning; this never fails.
pub fn build<'a, I, V>(schema: &Arc<FeatureSchema>, raw: I) -> FeatureVector
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Into<RawValue>,
{
    let mut vector = FeatureVector::zeros(Arc::clone(schema));

    for (field, value) in raw {
        let value = value.into();

        if let Some(i) = schema.position(field) {
            match value.as_number() {
                Some(v) => vector.values[i] = v,
                None => tracing::warn!(field, value = %value, "non-numeric value for numeric column; skipped"),
            }
            continue;
        }

        let category = value.to_string();
        let slot = if schema.is_categorical(field) {
            schema.one_hot(field, &category)
        } else {
            schema.position(&format!("{}_{}", field, category))
        };

        match slot {
            Some(i) => vector.values[i] = 1.0,
            None => tracing::warn!(field, value = %value, "not matched to any schema column; skipped"),
        }
    }

    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEFAULT_CATEGORICAL_FIELDS;

    fn schema() -> Arc<FeatureSchema> {
        let cols = [
            "launch_speed",
            "launch_angle",
            "pitch_type_FF",
            "pitch_type_SL",
            "stand_R",
            "stand_L",
            "inning_4",
            "wind_out_to_cf",
            "spin_bucket_2.5",
        ];
        Arc::new(
            FeatureSchema::new(
                cols.iter().map(|s| s.to_string()).collect(),
                DEFAULT_CATEGORICAL_FIELDS,
            )
            .unwrap(),
        )
    }

    #[test]
    fn numeric_passes_through_and_category_sets_one() {
        let s = schema();
        let v = build(
            &s,
            [
                ("launch_speed", RawValue::Float(95.0)),
                ("pitch_type", RawValue::from("SL")),
                ("inning", RawValue::Int(4)),
            ],
        );

        assert_eq!(v.get("launch_speed"), Some(95.0));
        assert_eq!(v.get("pitch_type_SL"), Some(1.0));
        assert_eq!(v.get("pitch_type_FF"), Some(0.0));
        assert_eq!(v.get("inning_4"), Some(1.0));
        assert_eq!(v.len(), s.len());
    }

    #[test]
    fn unknown_fields_and_categories_are_dropped() {
        let s = schema();
        let v = build(
            &s,
            [
                ("pitch_type", RawValue::from("ZZ")),
                ("umpire", RawValue::from("Joe")),
                ("inning", RawValue::Int(11)),
            ],
        );
        assert_eq!(v.nonzero(), 0);
        assert_eq!(v.iter().count(), s.len());
    }

    #[test]
    fn composite_key_formats_floats_with_decimal_point() {
        let s = schema();
        let v = build(&s, [("spin_bucket", RawValue::Float(2.5))]);
        assert_eq!(v.get("spin_bucket_2.5"), Some(1.0));
        assert_eq!(RawValue::Float(95.0).to_string(), "95.0");
        assert_eq!(RawValue::Int(4).to_string(), "4");
    }

    #[test]
    fn numeric_text_is_parsed_and_garbage_dropped() {
        let s = schema();
        let v = build(
            &s,
            [
                ("launch_angle", RawValue::from("28.5")),
                ("wind_out_to_cf", RawValue::from("calm")),
            ],
        );
        assert_eq!(v.get("launch_angle"), Some(28.5));
        assert_eq!(v.get("wind_out_to_cf"), Some(0.0));
    }

    #[test]
    fn serializes_in_schema_order() {
        let s = schema();
        let v = build(&s, [("launch_speed", 101.5)]);
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.starts_with("{\"launch_speed\":101.5,\"launch_angle\":0.0"));
    }
}
