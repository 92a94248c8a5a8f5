//! Ethogram index: behavior code → type, category, excluded behaviors.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::behavior_type::BehaviorType;
use crate::event::Event;
use crate::types::BehaviorCode;

/// Category label for behaviors without a category.
pub const NO_CATEGORY: &str = "No category";

/// One behavior definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthogramEntry {
    pub code: BehaviorCode,
    #[serde(rename = "type")]
    pub kind: BehaviorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Behaviors that cannot be active at the same time as this one.
    ///
    /// Not read by any analysis; kept so sessions round-trip unchanged.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded_codes: BTreeSet<String>,
}

impl EthogramEntry {
    pub fn new(code: BehaviorCode, kind: BehaviorType) -> Self {
        Self {
            code,
            kind,
            category: None,
            excluded_codes: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Read-only lookup of behavior definitions, keyed by code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<EthogramEntry>", into = "Vec<EthogramEntry>")]
pub struct Ethogram {
    entries: BTreeMap<BehaviorCode, EthogramEntry>,
}

impl Ethogram {
    /// Builds an index; a later entry with the same code replaces an earlier one.
    pub fn from_entries(entries: impl IntoIterator<Item = EthogramEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.code.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<&EthogramEntry> {
        self.entries.get(code)
    }

    /// Type of a behavior, or `None` when the code is not defined.
    pub fn behavior_type(&self, code: &str) -> Option<BehaviorType> {
        self.get(code).map(|entry| entry.kind)
    }

    pub fn is_state(&self, code: &str) -> bool {
        self.behavior_type(code) == Some(BehaviorType::State)
    }

    /// Category label; blank or missing categories map to [`NO_CATEGORY`].
    pub fn category_label(&self, code: &str) -> &str {
        self.get(code)
            .and_then(|entry| entry.category.as_deref())
            .filter(|category| !category.is_empty())
            .unwrap_or(NO_CATEGORY)
    }

    /// Codes of all State behaviors.
    pub fn state_codes(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .filter(|entry| entry.kind.is_state())
            .map(|entry| entry.code.to_string())
            .collect()
    }

    pub fn has_state_behaviors(&self) -> bool {
        self.entries.values().any(|entry| entry.kind.is_state())
    }

    /// Codes used by `events` that the ethogram does not define.
    pub fn undefined_codes<'a>(&self, events: impl IntoIterator<Item = &'a Event>) -> BTreeSet<String> {
        events
            .into_iter()
            .filter(|event| !self.entries.contains_key(event.behavior.as_str()))
            .map(|event| event.behavior.to_string())
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &EthogramEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<EthogramEntry>> for Ethogram {
    fn from(entries: Vec<EthogramEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<Ethogram> for Vec<EthogramEntry> {
    fn from(ethogram: Ethogram) -> Self {
        ethogram.entries.into_values().collect()
    }
}
