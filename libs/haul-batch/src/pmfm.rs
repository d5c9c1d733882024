//! PMFM descriptors and the schema provider seam

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::measurement::{PmfmId, PmfmValue};
use crate::referential::method_ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PmfmType {
    QualitativeValue,
    Integer,
    Double,
    String,
    Boolean,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeValue {
    pub id: i32,
    pub label: String,
    #[serde(default)]
    pub name: String,
}

impl QualitativeValue {
    pub fn new(id: i32, label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            name: name.into(),
        }
    }

    pub fn as_value(&self) -> PmfmValue {
        PmfmValue::Qualitative {
            id: self.id,
            label: Some(self.label.clone()),
            name: Some(self.name.clone()),
        }
    }
}

/// A measurement parameter (Parameter, Matrix, Fraction, Method)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pmfm {
    pub id: PmfmId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub pmfm_type: PmfmType,
    #[serde(default)]
    pub unit_label: Option<String>,
    #[serde(default)]
    pub method_id: Option<i32>,
    #[serde(default)]
    pub is_computed: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub required: bool,
    /// Values are displayed in another unit than the stored one
    #[serde(default)]
    pub display_conversion: bool,
    #[serde(default)]
    pub maximum_number_decimals: Option<u32>,
    #[serde(default)]
    pub default_value: Option<PmfmValue>,
    #[serde(default)]
    pub qualitative_values: Vec<QualitativeValue>,
}

impl Pmfm {
    pub fn new(id: PmfmId, label: impl Into<String>, pmfm_type: PmfmType) -> Self {
        Self {
            id,
            label: label.into(),
            name: String::new(),
            pmfm_type,
            unit_label: None,
            method_id: None,
            is_computed: false,
            hidden: false,
            required: false,
            display_conversion: false,
            maximum_number_decimals: None,
            default_value: None,
            qualitative_values: Vec::new(),
        }
    }

    pub fn qualitative(id: PmfmId, label: impl Into<String>, values: Vec<QualitativeValue>) -> Self {
        Self {
            qualitative_values: values,
            ..Self::new(id, label, PmfmType::QualitativeValue)
        }
    }

    /// A weight PMFM in kilograms
    pub fn weight(id: PmfmId, method_id: i32) -> Self {
        Self {
            unit_label: Some("kg".to_string()),
            method_id: Some(method_id),
            is_computed: method_ids::is_calculated(method_id),
            maximum_number_decimals: Some(3),
            ..Self::new(id, "WEIGHT", PmfmType::Double)
        }
    }

    pub fn is_qualitative(&self) -> bool {
        self.pmfm_type == PmfmType::QualitativeValue
    }

    pub fn is_estimated(&self) -> bool {
        self.method_id == Some(method_ids::ESTIMATED_BY_OBSERVER)
    }

    pub fn qualitative_value(&self, id: i32) -> Option<&QualitativeValue> {
        self.qualitative_values.iter().find(|qv| qv.id == id)
    }
}

/// Supplies PMFM metadata to the batch model
pub trait PmfmSchemaProvider: Send + Sync {
    fn pmfm(&self, id: PmfmId) -> Option<Pmfm>;

    /// Ordered allowed values of a qualitative PMFM; empty for other types
    fn qualitative_values(&self, id: PmfmId) -> Vec<QualitativeValue> {
        self.pmfm(id).map(|p| p.qualitative_values).unwrap_or_default()
    }

    /// Resolve a list of ids, skipping unknown ones
    fn pmfms(&self, ids: &[PmfmId]) -> Vec<Pmfm> {
        ids.iter().filter_map(|id| self.pmfm(*id)).collect()
    }
}

/// In-memory schema
#[derive(Debug, Clone, Default)]
pub struct InMemoryPmfmSchema {
    pmfms: FxHashMap<PmfmId, Pmfm>,
}

impl InMemoryPmfmSchema {
    pub fn new(pmfms: impl IntoIterator<Item = Pmfm>) -> Self {
        Self {
            pmfms: pmfms.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn insert(&mut self, pmfm: Pmfm) {
        self.pmfms.insert(pmfm.id, pmfm);
    }

    pub fn len(&self) -> usize {
        self.pmfms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pmfms.is_empty()
    }
}

impl PmfmSchemaProvider for InMemoryPmfmSchema {
    fn pmfm(&self, id: PmfmId) -> Option<Pmfm> {
        self.pmfms.get(&id).cloned()
    }
}
