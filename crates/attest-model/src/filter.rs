use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::AttestationRecord;

/// Calendar-date window, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Dashboard filters. Every part is independent; an empty part does not restrict anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub sites: BTreeSet<String>,
    pub names: BTreeSet<String>,
    pub date_range: Option<DateRange>,
    /// Case-insensitive substring matched against the reviewed protocols.
    pub protocol_contains: Option<String>,
}

impl DashboardFilter {
    pub fn matches(&self, record: &AttestationRecord) -> bool {
        if !self.sites.is_empty() && !self.sites.contains(&record.site) {
            return false;
        }
        if !self.names.is_empty() && !self.names.contains(&record.name) {
            return false;
        }
        if let Some(range) = &self.date_range {
            if !range.contains(record.timestamp.date()) {
                return false;
            }
        }
        if let Some(needle) = self
            .protocol_contains
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            let needle = needle.to_lowercase();
            if !record
                .protocols_reviewed
                .iter()
                .any(|p| p.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }

    /// Keep matching records, preserving their order.
    pub fn apply<'a>(
        &self,
        records: impl IntoIterator<Item = &'a AttestationRecord>,
    ) -> Vec<AttestationRecord> {
        records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}
