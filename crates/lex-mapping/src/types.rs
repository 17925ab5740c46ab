use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MappingError;

/// Semantic category of an uploaded dataset.
///
/// `NoneOfThese` means classification failed. It is distinct from `Other`,
/// which is a legitimate category with its own standard schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Billing,
    Usage,
    Support,
    Other,
    #[default]
    NoneOfThese,
}

impl Category {
    /// Categories that can be recognized in model output, in scan order.
    pub const RECOGNIZED: [Category; 4] = [
        Category::Billing,
        Category::Usage,
        Category::Support,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Usage => "usage",
            Self::Support => "support",
            Self::Other => "other",
            Self::NoneOfThese => "none-of-these",
        }
    }

    /// `true` for every category except `NoneOfThese`.
    pub fn is_identified(&self) -> bool {
        !matches!(self, Self::NoneOfThese)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "billing" => Ok(Self::Billing),
            "usage" => Ok(Self::Usage),
            "support" => Ok(Self::Support),
            "other" => Ok(Self::Other),
            "none-of-these" | "none of these" => Ok(Self::NoneOfThese),
            _ => Err(MappingError::UnknownCategory(s.to_string())),
        }
    }
}

/// Mapping from standard column name to input column name.
///
/// A `None` value means the standard column is known but unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: BTreeMap<String, Option<String>>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the assignment for `standard`.
    pub fn insert(&mut self, standard: impl Into<String>, input: Option<String>) {
        self.entries.insert(standard.into(), input);
    }

    /// The input column assigned to `standard`, if any.
    pub fn get(&self, standard: &str) -> Option<&str> {
        self.entries.get(standard).and_then(|v| v.as_deref())
    }

    pub fn contains_key(&self, standard: &str) -> bool {
        self.entries.contains_key(standard)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries, set or unset.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Iterate over entries with an input column assigned.
    pub fn assigned(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|input| (k.as_str(), input)))
    }

    /// The standard column currently holding `input`, if any.
    pub fn standard_for_input(&self, input: &str) -> Option<&str> {
        self.assigned()
            .find(|(_, assigned)| *assigned == input)
            .map(|(standard, _)| standard)
    }

    /// Inverse of the assigned entries: input column -> standard column.
    pub fn to_rename_map(&self) -> BTreeMap<String, String> {
        self.assigned()
            .map(|(standard, input)| (input.to_string(), standard.to_string()))
            .collect()
    }
}

impl FromIterator<(String, Option<String>)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Result of a secondary validation pass over a candidate answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub diagnostic_message: String,
}

impl ValidationOutcome {
    pub fn valid(message: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            diagnostic_message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            diagnostic_message: message.into(),
        }
    }
}

/// Counts describing how much of a schema a mapping covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStats {
    pub total_input_columns: usize,
    pub total_mandatory_columns: usize,
    pub total_optional_columns: usize,
    pub mapped_input_columns: usize,
    pub mapped_mandatory_columns: usize,
    pub mapped_optional_columns: usize,
    pub unmapped_mandatory_columns: usize,
    pub unmapped_optional_columns: usize,
}
