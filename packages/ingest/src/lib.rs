#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalizes raw monthly crime CSV exports into canonical records.
//!
//! Police data portals ship loosely-specified CSV files whose headers
//! vary in case, spacing, and naming. This crate maps whatever columns
//! are present onto the canonical field set, fills missing string
//! fields with `"Unknown"`, and drops rows without a usable coordinate
//! pair. Bad data is resolved here by exclusion or default-fill; it is
//! never surfaced to the analytical engines as an error.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use hotspot_records_models::{CanonicalField, IncidentRecord, RecordSet, UNKNOWN};
use thiserror::Error;

/// Errors that can occur while loading a data directory.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Filesystem access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV file could not be parsed at all.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The directory contained no CSV files.
    #[error("no CSV files found in {}", dir.display())]
    NoData {
        /// The directory that was scanned.
        dir: PathBuf,
    },
}

/// Outcome of parsing one CSV file.
struct FileParse {
    records: Vec<IncidentRecord>,
    fields: BTreeSet<CanonicalField>,
    dropped: u64,
}

/// Loads every CSV file in `dir` (non-recursive, lexicographic filename
/// order) and concatenates them into one normalized [`RecordSet`].
///
/// Returns the record set plus the canonical fields for which at least
/// one source column was actually present, i.e. the fields available
/// for filtering.
///
/// # Errors
///
/// Returns [`IngestError`] if the directory cannot be read, a file
/// cannot be parsed as CSV, or no CSV files are found.
pub fn load_crime_data(dir: &Path) -> Result<(RecordSet, Vec<CanonicalField>), IngestError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(IngestError::NoData {
            dir: dir.to_path_buf(),
        });
    }

    let mut all_records = Vec::new();
    let mut available: BTreeSet<CanonicalField> = BTreeSet::new();

    for path in &paths {
        let file = File::open(path)?;
        let parsed = parse_csv(file)?;

        log::info!(
            "{}: {} records ({} dropped for missing coordinates)",
            path.display(),
            parsed.records.len(),
            parsed.dropped
        );

        all_records.extend(parsed.records);
        available.extend(parsed.fields);
    }

    log::info!(
        "Loaded {} records from {} files",
        all_records.len(),
        paths.len()
    );

    Ok((RecordSet::new(all_records), available.into_iter().collect()))
}

/// Normalizes a raw CSV header: trim, lowercase, spaces and hyphens to
/// underscores.
fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Parses one CSV stream into normalized records.
fn parse_csv<R: Read>(reader: R) -> Result<FileParse, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let col = |name: &str| headers.iter().position(|h| h == name);

    let crime_type_col = col("crime_type");
    let longitude_col = col("longitude");
    let latitude_col = col("latitude");
    let date_col = col("date");
    let month_col = col("month");
    let location_col = col("location");
    let outcome_col = col("last_outcome_category");
    let lsoa_name_col = col("lsoa_name");
    let lsoa_code_col = col("lsoa_code");

    let mut fields = BTreeSet::new();
    if crime_type_col.is_some() {
        fields.insert(CanonicalField::CrimeType);
    }
    if date_col.is_some() || month_col.is_some() {
        fields.insert(CanonicalField::Date);
    }
    if location_col.is_some() {
        fields.insert(CanonicalField::StreetName);
    }
    if outcome_col.is_some() {
        fields.insert(CanonicalField::OutcomeCategory);
    }
    if lsoa_name_col.is_some() || lsoa_code_col.is_some() {
        fields.insert(CanonicalField::Region);
    }
    if longitude_col.is_some() {
        fields.insert(CanonicalField::Longitude);
    }
    if latitude_col.is_some() {
        fields.insert(CanonicalField::Latitude);
    }

    let mut records = Vec::new();
    let mut dropped: u64 = 0;

    for row in csv_reader.records() {
        let row = row?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let Some((longitude, latitude)) =
            parse_coordinates(cell(longitude_col), cell(latitude_col))
        else {
            dropped += 1;
            continue;
        };

        let date = cell(date_col)
            .and_then(parse_full_date)
            .or_else(|| cell(month_col).and_then(parse_month));

        let string_or_unknown =
            |value: Option<&str>| value.map_or_else(|| UNKNOWN.to_string(), str::to_string);

        records.push(IncidentRecord {
            crime_type: string_or_unknown(cell(crime_type_col)),
            longitude,
            latitude,
            date,
            street_name: string_or_unknown(cell(location_col)),
            outcome_category: string_or_unknown(cell(outcome_col)),
            region: string_or_unknown(cell(lsoa_name_col).or_else(|| cell(lsoa_code_col))),
        });
    }

    Ok(FileParse {
        records,
        fields,
        dropped,
    })
}

/// Parses a coordinate pair. Returns `None` if either value is missing,
/// non-numeric, or non-finite.
fn parse_coordinates(longitude: Option<&str>, latitude: Option<&str>) -> Option<(f64, f64)> {
    let longitude = longitude?.parse::<f64>().ok()?;
    let latitude = latitude?.parse::<f64>().ok()?;
    if !longitude.is_finite() || !latitude.is_finite() {
        return None;
    }
    Some((longitude, latitude))
}

/// Parses a full `YYYY-MM-DD` date.
fn parse_full_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parses a `YYYY-MM` month as the first day of that month.
fn parse_month(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Crime ID,Month,Longitude,Latitude,Location,LSOA name,Crime type,Last outcome category
abc123,2025-01,-0.1276,51.5072,On or near High Street,Westminster 001A,Burglary,Under investigation
def456,2025-01,-0.1300,51.5100,On or near Park Road,Westminster 001B,Drugs,
ghi789,2025-01,,51.5100,On or near Park Road,Westminster 001B,Drugs,Under investigation
jkl012,2025-01,not-a-number,51.5100,On or near Park Road,Westminster 001B,Drugs,Under investigation
";

    #[test]
    fn normalizes_headers() {
        assert_eq!(normalize_header(" Crime type "), "crime_type");
        assert_eq!(normalize_header("LSOA-name"), "lsoa_name");
    }

    #[test]
    fn parses_sample_and_drops_bad_coordinates() {
        let parsed = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.dropped, 2);

        let first = &parsed.records[0];
        assert_eq!(first.crime_type, "Burglary");
        assert!((first.longitude - -0.1276).abs() < f64::EPSILON);
        assert_eq!(first.date, Some("2025-01-01".parse().unwrap()));
        assert_eq!(first.region, "Westminster 001A");
    }

    #[test]
    fn missing_outcome_defaults_to_unknown() {
        let parsed = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(parsed.records[1].outcome_category, UNKNOWN);
    }

    #[test]
    fn reports_available_fields() {
        let parsed = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert!(parsed.fields.contains(&CanonicalField::CrimeType));
        assert!(parsed.fields.contains(&CanonicalField::Date));
        assert!(parsed.fields.contains(&CanonicalField::Region));
    }

    #[test]
    fn falls_back_to_lsoa_code_for_region() {
        let csv = "\
Longitude,Latitude,LSOA code,Crime type
-0.1,51.5,E01000001,Burglary
";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.records[0].region, "E01000001");
    }

    #[test]
    fn full_date_column_takes_precedence_over_month() {
        let csv = "\
Longitude,Latitude,Date,Month,Crime type
-0.1,51.5,2025-01-15,2025-02,Burglary
";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.records[0].date, Some("2025-01-15".parse().unwrap()));
    }

    #[test]
    fn no_data_error_names_the_directory() {
        let err = IngestError::NoData {
            dir: PathBuf::from("/var/empty/crime"),
        };
        assert_eq!(err.to_string(), "no CSV files found in /var/empty/crime");
    }

    #[test]
    fn unparseable_date_becomes_none_not_error() {
        let csv = "\
Longitude,Latitude,Month,Crime type
-0.1,51.5,January 2025,Burglary
";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].date, None);
    }
}
