//! Batch entity
//!
//! One node of a catch decomposition. Structure (parent and children) is owned by
//! [`crate::tree::BatchTree`]; the entity only keeps the raw `parent_id` foreign key of the
//! persisted shape.

use haul_units::sampling_ratio::{is_sampling_ratio_computed, parse_sampling_ratio, SamplingRatioFormat};
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};
use crate::label::{BatchKind, BatchLabel};
use crate::measurement::MeasurementValues;

/// Entity type name of the persisted shape
pub const BATCH_TYPENAME: &str = "BatchVO";

fn default_typename() -> String {
    BATCH_TYPENAME.to_string()
}

/// Weight of a batch with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWeight {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_id: Option<i32>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub estimated: bool,
}

/// Reference to a taxon group or taxon name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxonRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl TaxonRef {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.label.as_deref().map_or(true, str::is_empty)
    }

    pub fn display_label(&self) -> String {
        match (&self.label, self.id) {
            (Some(label), _) if !label.is_empty() => label.clone(),
            (_, Some(id)) => id.to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(rename = "__typename", default = "default_typename")]
    pub typename: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub label: Option<BatchLabel>,
    #[serde(default)]
    pub rank_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaustive_inventory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_ratio_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_ratio_computed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_group: Option<TaxonRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_name: Option<TaxonRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub measurement_values: MeasurementValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<BatchWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_weight: Option<BatchWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_flag_id: Option<i32>,
    /// Stored flag; shadows the label-derived value when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sampling_batch: Option<bool>,
}

impl Default for Batch {
    fn default() -> Self {
        Self {
            typename: default_typename(),
            id: None,
            label: None,
            rank_order: None,
            operation_id: None,
            sale_id: None,
            parent_id: None,
            exhaustive_inventory: None,
            sampling_ratio: None,
            sampling_ratio_text: None,
            sampling_ratio_computed: None,
            individual_count: None,
            taxon_group: None,
            taxon_name: None,
            comments: None,
            measurement_values: MeasurementValues::default(),
            weight: None,
            children_weight: None,
            quality_flag_id: None,
            is_sampling_batch: None,
        }
    }
}

impl Batch {
    pub fn with_label(label: impl Into<BatchLabel>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_rank_order(mut self, rank_order: u32) -> Self {
        self.rank_order = Some(rank_order);
        self
    }

    /// Rendered label, empty when unlabelled
    pub fn label_text(&self) -> String {
        self.label.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    /// Sibling grouping key
    pub fn kind_group(&self) -> &str {
        self.label.as_ref().map(BatchLabel::kind_group).unwrap_or("")
    }

    pub fn kind(&self) -> BatchKind {
        if self.is_sampling_batch == Some(true) {
            return BatchKind::Sampling;
        }
        self.label.as_ref().map_or(BatchKind::Other, BatchLabel::kind)
    }

    pub fn is_sampling_batch(&self) -> bool {
        self.is_sampling_batch
            .unwrap_or_else(|| self.label.as_ref().is_some_and(|l| l.sampling))
    }

    pub fn is_individual(&self) -> bool {
        self.label.as_ref().is_some_and(BatchLabel::is_individual)
    }

    /// True if the label starts with `<level>#`
    pub fn has_level(&self, level: &str) -> bool {
        self.label.as_ref().is_some_and(|l| l.has_level(level))
    }

    /// Same id, or same functional attributes (rank order, operation, label)
    pub fn equals(&self, other: &Batch) -> bool {
        if self.id.is_some() && self.id == other.id {
            return true;
        }
        self.rank_order == other.rank_order
            && self.operation_id == other.operation_id
            && self.label_text() == other.label_text()
    }

    /// Set a stored sampling ratio, rejecting values outside `[0, 1]`
    pub fn set_sampling_ratio(&mut self, ratio: Option<f64>) -> Result<()> {
        if let Some(value) = ratio {
            if !(0.0..=1.0).contains(&value) {
                return Err(BatchError::InvalidSamplingRatio(value));
            }
        }
        self.sampling_ratio = ratio;
        Ok(())
    }

    /// Set the ratio from display text
    ///
    /// The computed flag is derived from the text markers, so a user-typed `15%` is stored
    /// as entered and any other rendering as computed.
    pub fn set_sampling_ratio_text(&mut self, text: &str, format: SamplingRatioFormat) -> Result<()> {
        let ratio = parse_sampling_ratio(text, format, None)?;
        self.set_sampling_ratio(ratio)?;
        if ratio.is_some() {
            self.sampling_ratio_text = Some(text.trim().to_string());
            self.sampling_ratio_computed = Some(is_sampling_ratio_computed(text.trim(), Some(format)));
        } else {
            self.sampling_ratio_text = None;
            self.sampling_ratio_computed = None;
        }
        Ok(())
    }

    /// Carries any data of its own, children aside
    pub fn has_data(&self, include_taxon: bool) -> bool {
        self.individual_count.is_some()
            || self.sampling_ratio.is_some_and(|r| !r.is_nan())
            || self.weight.as_ref().is_some_and(|w| !w.value.is_nan())
            || !self.measurement_values.is_empty()
            || (include_taxon
                && (self.taxon_group.as_ref().is_some_and(|t| !t.is_empty())
                    || self.taxon_name.as_ref().is_some_and(|t| !t.is_empty())))
    }
}
