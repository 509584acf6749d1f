#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical incident record and record set types.
//!
//! This crate defines the uniform record shape that the normalizer
//! produces and every analytical engine consumes. All heterogeneous
//! source columns are mapped into these fields; missing string fields
//! are filled with the literal `"Unknown"` and rows without valid
//! coordinates never make it into a [`RecordSet`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default value for string fields that are absent in the source data.
pub const UNKNOWN: &str = "Unknown";

/// A single normalized crime incident.
///
/// Coordinates are WGS84 longitude/latitude and are guaranteed finite
/// for any record inside a [`RecordSet`] built by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Crime category (e.g. "Burglary", "Vehicle crime").
    pub crime_type: String,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Event date, if the source carried one (full date or year-month).
    pub date: Option<NaiveDate>,
    /// Street or locality name.
    pub street_name: String,
    /// Last recorded outcome category.
    pub outcome_category: String,
    /// Administrative region label (LSOA name or code).
    pub region: String,
}

/// The canonical fields a normalized dataset can expose for filtering
/// and feature selection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CanonicalField {
    /// Crime category column.
    CrimeType,
    /// Event date column.
    Date,
    /// Street/locality name column.
    StreetName,
    /// Outcome category column.
    OutcomeCategory,
    /// Administrative region column.
    Region,
    /// Longitude coordinate axis.
    Longitude,
    /// Latitude coordinate axis.
    Latitude,
}

/// An ordered collection of incidents sharing one coordinate reference
/// system.
///
/// Filtering produces a new set; the source set is never mutated. The
/// engines treat record order as significant (it is the determinism
/// anchor for tie-breaking), so every operation preserves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    records: Vec<IncidentRecord>,
}

impl RecordSet {
    /// Wraps a vector of normalized records.
    #[must_use]
    pub const fn new(records: Vec<IncidentRecord>) -> Self {
        Self { records }
    }

    /// Number of records in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set contains no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records, in normalization order.
    #[must_use]
    pub fn records(&self) -> &[IncidentRecord] {
        &self.records
    }

    /// Consumes the set, yielding the underlying records.
    #[must_use]
    pub fn into_records(self) -> Vec<IncidentRecord> {
        self.records
    }

    /// Returns a new set containing only the records matched by
    /// `filter`, preserving order.
    #[must_use]
    pub fn filter(&self, filter: &RecordFilter) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
        }
    }
}

impl From<Vec<IncidentRecord>> for RecordSet {
    fn from(records: Vec<IncidentRecord>) -> Self {
        Self::new(records)
    }
}

/// Subset selection over a [`RecordSet`].
///
/// Empty lists place no constraint on their field. Date bounds are
/// inclusive; records without a date fail any date constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFilter {
    /// Crime types to keep.
    pub crime_types: Vec<String>,
    /// Earliest event date to keep (inclusive).
    pub date_from: Option<NaiveDate>,
    /// Latest event date to keep (inclusive).
    pub date_to: Option<NaiveDate>,
    /// Street names to keep.
    pub street_names: Vec<String>,
    /// Outcome categories to keep.
    pub outcome_categories: Vec<String>,
    /// Regions to keep.
    pub regions: Vec<String>,
}

impl RecordFilter {
    /// Whether `record` passes every constraint in this filter.
    #[must_use]
    pub fn matches(&self, record: &IncidentRecord) -> bool {
        if !self.crime_types.is_empty() && !self.crime_types.contains(&record.crime_type) {
            return false;
        }
        if !self.street_names.is_empty() && !self.street_names.contains(&record.street_name) {
            return false;
        }
        if !self.outcome_categories.is_empty()
            && !self.outcome_categories.contains(&record.outcome_category)
        {
            return false;
        }
        if !self.regions.is_empty() && !self.regions.contains(&record.region) {
            return false;
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = record.date else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(crime_type: &str, date: Option<&str>) -> IncidentRecord {
        IncidentRecord {
            crime_type: crime_type.to_string(),
            longitude: -0.1276,
            latitude: 51.5072,
            date: date.map(|d| d.parse().unwrap()),
            street_name: "On or near High Street".to_string(),
            outcome_category: UNKNOWN.to_string(),
            region: "Westminster 001A".to_string(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let set = RecordSet::new(vec![record("Burglary", None), record("Drugs", None)]);
        assert_eq!(set.filter(&RecordFilter::default()).len(), 2);
    }

    #[test]
    fn filters_by_crime_type() {
        let set = RecordSet::new(vec![record("Burglary", None), record("Drugs", None)]);
        let filter = RecordFilter {
            crime_types: vec!["Drugs".to_string()],
            ..RecordFilter::default()
        };
        let filtered = set.filter(&filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records()[0].crime_type, "Drugs");
    }

    #[test]
    fn date_range_is_inclusive() {
        let set = RecordSet::new(vec![
            record("Burglary", Some("2025-01-01")),
            record("Burglary", Some("2025-01-15")),
            record("Burglary", Some("2025-02-01")),
        ]);
        let filter = RecordFilter {
            date_from: Some("2025-01-01".parse().unwrap()),
            date_to: Some("2025-01-15".parse().unwrap()),
            ..RecordFilter::default()
        };
        assert_eq!(set.filter(&filter).len(), 2);
    }

    #[test]
    fn dateless_records_fail_date_constraints() {
        let set = RecordSet::new(vec![record("Burglary", None)]);
        let filter = RecordFilter {
            date_from: Some("2025-01-01".parse().unwrap()),
            ..RecordFilter::default()
        };
        assert!(set.filter(&filter).is_empty());
    }

    #[test]
    fn filtering_preserves_order_and_source() {
        let set = RecordSet::new(vec![
            record("Burglary", None),
            record("Drugs", None),
            record("Burglary", None),
        ]);
        let filter = RecordFilter {
            crime_types: vec!["Burglary".to_string()],
            ..RecordFilter::default()
        };
        let filtered = set.filter(&filter);
        assert_eq!(filtered.len(), 2);
        // Source set untouched.
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn canonical_field_round_trips_through_strum() {
        use std::str::FromStr as _;

        assert_eq!(CanonicalField::CrimeType.to_string(), "crime_type");
        assert_eq!(
            CanonicalField::from_str("outcome_category").unwrap(),
            CanonicalField::OutcomeCategory
        );
    }
}
