//! Structured batch labels
//!
//! A label such as `SORTING_BATCH#3.LAN.%` encodes the batch position:
//!
//! - `SORTING_BATCH` is the acquisition level, the sibling grouping key (kind group)
//! - `#3` is the optional count suffix
//! - `.LAN` is a branch (landing); `.DIS` would be the discard branch
//! - `.%` marks a sampling sub-batch
//!
//! Parsing never fails and rendering is lossless: segments that do not follow the grammar
//! stay part of the level or branch text they were found in.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::referential::qualitative_labels;

/// Label suffix of sampling sub-batches
pub const SAMPLING_BATCH_SUFFIX: &str = ".%";

/// Acquisition level codes used as label prefixes
pub mod acquisition_level {
    pub const CATCH_BATCH: &str = "CATCH_BATCH";
    pub const SORTING_BATCH: &str = "SORTING_BATCH";
    pub const SORTING_BATCH_INDIVIDUAL: &str = "SORTING_BATCH_INDIVIDUAL";
}

/// Semantic position of a batch in the catch decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Catch,
    Sorting,
    Landing,
    Discard,
    Sampling,
    Individual,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BatchLabel {
    /// Text before the count suffix
    pub level: String,
    /// Count suffix after `#`
    pub number: Option<u32>,
    /// Dot-separated segments after the head
    pub branches: Vec<String>,
    /// Ends with [`SAMPLING_BATCH_SUFFIX`]
    pub sampling: bool,
}

impl BatchLabel {
    pub fn new(level: impl Into<String>, number: Option<u32>) -> Self {
        Self {
            level: level.into(),
            number,
            ..Self::default()
        }
    }

    /// `SORTING_BATCH_INDIVIDUAL#<n>`
    pub fn individual(number: u32) -> Self {
        Self::new(acquisition_level::SORTING_BATCH_INDIVIDUAL, Some(number))
    }

    /// The sampling child label of `parent`
    pub fn sampling_of(parent: &BatchLabel) -> Self {
        Self {
            sampling: true,
            ..parent.clone()
        }
    }

    /// Append a branch segment (`.LAN`, `.DIS`, or a qualitative value label)
    pub fn with_branch(&self, branch: impl Into<String>) -> Self {
        let mut label = self.clone();
        if label.sampling {
            // a branch below a sampling batch keeps the sampling marker inside the path
            label.branches.push("%".to_string());
            label.sampling = false;
        }
        label.branches.push(branch.into());
        label
    }

    pub fn parse(text: &str) -> Self {
        let (body, sampling) = match text.strip_suffix(SAMPLING_BATCH_SUFFIX) {
            Some(body) => (body, true),
            None => (text, false),
        };

        let mut segments = body.split('.');
        let head = segments.next().unwrap_or_default();
        let branches = segments.map(str::to_string).collect();

        let (level, number) = match head.split_once('#') {
            Some((level, digits)) => match parse_count(digits) {
                Some(n) => (level.to_string(), Some(n)),
                None => (head.to_string(), None),
            },
            None => (head.to_string(), None),
        };

        Self {
            level,
            number,
            branches,
            sampling,
        }
    }

    /// Sibling grouping key used by rank order assignment
    pub fn kind_group(&self) -> &str {
        &self.level
    }

    pub fn kind(&self) -> BatchKind {
        if self.sampling {
            return BatchKind::Sampling;
        }
        match self.level.as_str() {
            acquisition_level::CATCH_BATCH => return BatchKind::Catch,
            acquisition_level::SORTING_BATCH_INDIVIDUAL => return BatchKind::Individual,
            _ => {},
        }
        match self.branches.last().map(String::as_str) {
            Some(qualitative_labels::LANDING) => BatchKind::Landing,
            Some(qualitative_labels::DISCARD) => BatchKind::Discard,
            _ if self.level == acquisition_level::SORTING_BATCH => BatchKind::Sorting,
            _ => BatchKind::Other,
        }
    }

    /// True if this label starts with `<level>#`
    pub fn has_level(&self, level: &str) -> bool {
        self.level == level && self.number.is_some()
    }

    pub fn is_individual(&self) -> bool {
        self.level == acquisition_level::SORTING_BATCH_INDIVIDUAL
    }

    pub fn is_empty(&self) -> bool {
        self.level.is_empty() && self.number.is_none() && self.branches.is_empty() && !self.sampling
    }
}

// Counts are rendered back without leading zeros, so only canonical digit strings qualify
fn parse_count(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

impl fmt::Display for BatchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.level)?;
        if let Some(number) = self.number {
            f.write_str("#")?;
            f.write_str(itoa::Buffer::new().format(number))?;
        }
        for branch in &self.branches {
            write!(f, ".{branch}")?;
        }
        if self.sampling {
            f.write_str(SAMPLING_BATCH_SUFFIX)?;
        }
        Ok(())
    }
}

impl From<&str> for BatchLabel {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl Serialize for BatchLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BatchLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structured() {
        let label = BatchLabel::parse("SORTING_BATCH#3.LAN.%");
        assert_eq!(label.level, "SORTING_BATCH");
        assert_eq!(label.number, Some(3));
        assert_eq!(label.branches, vec!["LAN".to_string()]);
        assert!(label.sampling);
        assert_eq!(label.kind(), BatchKind::Sampling);
        assert_eq!(label.kind_group(), "SORTING_BATCH");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(BatchLabel::parse("CATCH_BATCH").kind(), BatchKind::Catch);
        assert_eq!(BatchLabel::parse("SORTING_BATCH#1").kind(), BatchKind::Sorting);
        assert_eq!(BatchLabel::parse("SORTING_BATCH#1.LAN").kind(), BatchKind::Landing);
        assert_eq!(BatchLabel::parse("SORTING_BATCH#1.DIS").kind(), BatchKind::Discard);
        assert_eq!(BatchLabel::parse("SORTING_BATCH_INDIVIDUAL#7").kind(), BatchKind::Individual);
        assert_eq!(BatchLabel::parse("FREE_TEXT").kind(), BatchKind::Other);
    }

    #[test]
    fn test_render_is_lossless() {
        for text in [
            "",
            "CATCH_BATCH",
            "SORTING_BATCH#0.LAN.%",
            "SORTING_BATCH#01",
            "A#b#c.d",
            "X.%.%",
            ".%",
            "A..B",
            "SORTING_BATCH#1.LAN.%.BULK",
        ] {
            assert_eq!(BatchLabel::parse(text).to_string(), text, "label {text:?}");
        }
    }

    #[test]
    fn test_constructors() {
        let parent = BatchLabel::parse("SORTING_BATCH#2.DIS");
        assert_eq!(BatchLabel::sampling_of(&parent).to_string(), "SORTING_BATCH#2.DIS.%");
        assert_eq!(BatchLabel::individual(4).to_string(), "SORTING_BATCH_INDIVIDUAL#4");
        assert_eq!(parent.with_branch("BULK").to_string(), "SORTING_BATCH#2.DIS.BULK");
        assert_eq!(
            BatchLabel::sampling_of(&parent).with_branch("BULK").to_string(),
            "SORTING_BATCH#2.DIS.%.BULK"
        );
    }
}
