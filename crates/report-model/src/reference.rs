use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A named, effective-dated list of reference values.
///
/// The original dashboards hardcoded business-rule lists (excluded project
/// codes, employee rosters) inline and edited them per revision. Here they
/// are versioned data: each version takes effect on its date and stays in
/// force until the next one, so a report re-run for an old period still uses
/// the rules of that period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceList {
    pub name: String,
    /// Effective date → values in force from that date on.
    pub versions: BTreeMap<NaiveDate, Vec<String>>,
}

impl ReferenceList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: BTreeMap::new(),
        }
    }

    pub fn with_version(
        mut self,
        effective: NaiveDate,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.versions
            .insert(effective, values.into_iter().map(Into::into).collect());
        self
    }

    /// Values in force on `as_of`: the latest version whose effective date is
    /// not after `as_of`. Before the first version the list is empty.
    pub fn values_at(&self, as_of: NaiveDate) -> &[String] {
        self.versions
            .range(..=as_of)
            .next_back()
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }
}

/// Semantic release track of a reported category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseTrack {
    Beta,
    Production,
}

/// Explicit mapping from a source category label to its release track.
///
/// Several historical page revisions silently swapped which label meant
/// "Beta" vs "Production". The mapping is deployment configuration here, so a
/// relabeling is a reviewed config change rather than a guess in code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackLabels {
    pub labels: BTreeMap<String, ReleaseTrack>,
}

impl TrackLabels {
    pub fn with_label(mut self, label: impl Into<String>, track: ReleaseTrack) -> Self {
        self.labels.insert(label.into(), track);
        self
    }

    pub fn track_for(&self, label: &str) -> Option<ReleaseTrack> {
        self.labels.get(label).copied()
    }

    /// All labels assigned to `track`, in deterministic order.
    pub fn labels_for(&self, track: ReleaseTrack) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, t)| **t == track)
            .map(|(label, _)| label.as_str())
            .collect()
    }
}
