//! Measurement values keyed by PMFM id

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// PMFM identifier
pub type PmfmId = i32;

/// A typed measurement value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PmfmValue {
    Boolean(bool),
    Number(f64),
    /// A qualitative value reference; only `id` is significant for equality
    Qualitative {
        id: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Text(String),
}

impl PmfmValue {
    pub fn qualitative(id: i32) -> Self {
        Self::Qualitative {
            id,
            label: None,
            name: None,
        }
    }

    pub fn qualitative_labelled(id: i32, label: impl Into<String>) -> Self {
        Self::Qualitative {
            id,
            label: Some(label.into()),
            name: None,
        }
    }

    /// Convert a raw JSON value; `null`, arrays and objects without an `id` are dropped
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null | serde_json::Value::Array(_) => None,
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Object(map) => {
                let id = map.get("id").and_then(json_as_i32)?;
                let text = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_string);
                Some(Self::Qualitative {
                    id,
                    label: text("label"),
                    name: text("name"),
                })
            },
        }
    }

    /// Numeric view: numbers, numeric text, and qualitative ids
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Qualitative { id, .. } => Some(f64::from(*id)),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Boolean(_) => None,
        }
    }

    /// Qualitative id, accepting a numeric or integral-text code
    pub fn qualitative_id(&self) -> Option<i32> {
        match self {
            Self::Qualitative { id, .. } => Some(*id),
            Self::Number(n) if n.fract() == 0.0 => Some(*n as i32),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Value equality tolerant to the representation of the same value
    ///
    /// Numbers compare with numeric text, qualitative values compare by id (against another
    /// qualitative value, a number, or a numeric code), booleans compare with `"true"`,
    /// `"false"`, `1` and `0`.
    pub fn equals(&self, other: &PmfmValue) -> bool {
        use PmfmValue::*;
        match (self, other) {
            (Qualitative { id: a, .. }, Qualitative { id: b, .. }) => a == b,
            (Text(a), Text(b)) if a == b => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Boolean(b), v) | (v, Boolean(b)) => match v {
                Text(s) => s.trim().eq_ignore_ascii_case(if *b { "true" } else { "false" }),
                Number(n) => *n == if *b { 1.0 } else { 0.0 },
                _ => false,
            },
            _ => matches!((self.as_f64(), other.as_f64()), (Some(a), Some(b)) if a == b),
        }
    }
}

fn json_as_i32(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl fmt::Display for PmfmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&haul_units::rounding::render_shortest(*n)),
            Self::Qualitative { id, label, .. } => match label {
                Some(label) => f.write_str(label),
                None => write!(f, "{id}"),
            },
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for PmfmValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PmfmValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Measurement values keyed by PMFM id
///
/// Loading tolerates the plain-object shape of the persistence layer: keys that are not
/// numeric (such as `__typename`) are dropped, `null` is kept as an explicit empty entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct MeasurementValues(BTreeMap<PmfmId, Option<PmfmValue>>);

impl MeasurementValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present, non-null value
    pub fn get(&self, id: PmfmId) -> Option<&PmfmValue> {
        self.0.get(&id).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: PmfmId) -> bool {
        self.get(id).is_some()
    }

    pub fn set(&mut self, id: PmfmId, value: impl Into<PmfmValue>) {
        self.0.insert(id, Some(value.into()));
    }

    pub fn set_null(&mut self, id: PmfmId) {
        self.0.insert(id, None);
    }

    pub fn remove(&mut self, id: PmfmId) -> Option<PmfmValue> {
        self.0.remove(&id).flatten()
    }

    /// Non-null entries
    pub fn iter(&self) -> impl Iterator<Item = (PmfmId, &PmfmValue)> {
        self.0.iter().filter_map(|(id, v)| v.as_ref().map(|v| (*id, v)))
    }

    /// Keys, including explicit nulls
    pub fn keys(&self) -> impl Iterator<Item = PmfmId> + '_ {
        self.0.keys().copied()
    }

    /// True when no entry carries a value
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Every non-null entry of `filter` is present here with an equal value
    pub fn matches(&self, filter: &MeasurementValues) -> bool {
        filter
            .iter()
            .all(|(id, expected)| self.get(id).is_some_and(|actual| actual.equals(expected)))
    }

    pub fn from_raw(raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let values = raw
            .iter()
            .filter_map(|(key, value)| {
                let id = key.trim().parse::<PmfmId>().ok()?;
                Some((id, PmfmValue::from_json(value)))
            })
            .collect();
        Self(values)
    }
}

impl<'de> Deserialize<'de> for MeasurementValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

impl FromIterator<(PmfmId, PmfmValue)> for MeasurementValues {
    fn from_iter<I: IntoIterator<Item = (PmfmId, PmfmValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(id, v)| (id, Some(v))).collect())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equals_coercion() {
        assert!(PmfmValue::Number(190.0).equals(&PmfmValue::from("190")));
        assert!(PmfmValue::qualitative(190).equals(&PmfmValue::Number(190.0)));
        assert!(PmfmValue::qualitative(190).equals(&PmfmValue::from("190")));
        assert!(PmfmValue::qualitative_labelled(190, "LAN").equals(&PmfmValue::qualitative(190)));
        assert!(!PmfmValue::qualitative(190).equals(&PmfmValue::qualitative(191)));
        assert!(PmfmValue::Boolean(true).equals(&PmfmValue::from("true")));
        assert!(PmfmValue::Boolean(false).equals(&PmfmValue::Number(0.0)));
        assert!(!PmfmValue::from("abc").equals(&PmfmValue::from("abd")));
        assert!(PmfmValue::from("1.50").equals(&PmfmValue::from("1.5")));
    }

    #[test]
    fn test_deserialize_drops_non_numeric_keys() {
        let values: MeasurementValues = serde_json::from_value(json!({
            "__typename": "MeasurementModelValues",
            "90": 190,
            "91": "12.5",
            "174": {"id": 5, "label": "A"},
            "95": null
        }))
        .unwrap();

        assert_eq!(values.get(90), Some(&PmfmValue::Number(190.0)));
        assert_eq!(values.get(91).and_then(PmfmValue::as_f64), Some(12.5));
        assert_eq!(values.get(174).and_then(PmfmValue::qualitative_id), Some(5));
        assert!(values.get(95).is_none());
        assert_eq!(values.keys().collect::<Vec<_>>(), vec![90, 91, 95, 174]);
    }

    #[test]
    fn test_matches_ignores_null_filter_entries() {
        let values: MeasurementValues = [(90, PmfmValue::qualitative(190))].into_iter().collect();
        let mut filter = MeasurementValues::new();
        filter.set(90, PmfmValue::Number(190.0));
        filter.set_null(91);
        assert!(values.matches(&filter));

        filter.set(91, 1.0);
        assert!(!values.matches(&filter));
    }

    #[test]
    fn test_serialize_keys_as_strings() {
        let mut values = MeasurementValues::new();
        values.set(90, PmfmValue::qualitative(190));
        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(json, json!({"90": {"id": 190}}));
    }
}
