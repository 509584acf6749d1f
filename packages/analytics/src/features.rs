//! Projects a record set into numeric coordinate vectors.
//!
//! Spatial mode yields `(lon, lat)` embedded in a 3-vector with a zero
//! third axis; spatiotemporal mode fills the third axis with whole days
//! since the earliest date in the set. Keeping one fixed-width vector
//! type lets every clusterer share the same distance code.

use hotspot_records_models::RecordSet;

use crate::AnalyticsError;

/// Which axes to project records onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    /// `(longitude, latitude)`.
    Spatial,
    /// `(longitude, latitude, days since earliest date)`.
    Spatiotemporal,
}

/// One coordinate vector per record, in record order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    vectors: Vec<[f64; 3]>,
    temporal: bool,
}

impl FeatureSet {
    /// Number of vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The vectors, parallel to the source record order.
    #[must_use]
    pub fn vectors(&self) -> &[[f64; 3]] {
        &self.vectors
    }

    /// Whether the third axis carries day offsets.
    #[must_use]
    pub const fn temporal(&self) -> bool {
        self.temporal
    }
}

/// Builds the feature vectors for `records`.
///
/// In spatiotemporal mode, records without a date sit at offset zero on
/// the time axis; if no record carries a date the whole set silently
/// degrades to pure spatial vectors.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidCoordinate`] if any record has a
/// non-finite coordinate. Normalization guarantees this cannot happen,
/// so hitting it means a caller bypassed the normalizer.
pub fn build_features(
    records: &RecordSet,
    mode: FeatureMode,
) -> Result<FeatureSet, AnalyticsError> {
    for (index, record) in records.records().iter().enumerate() {
        if !record.longitude.is_finite() || !record.latitude.is_finite() {
            return Err(AnalyticsError::InvalidCoordinate {
                index,
                longitude: record.longitude,
                latitude: record.latitude,
            });
        }
    }

    let min_date = match mode {
        FeatureMode::Spatial => None,
        FeatureMode::Spatiotemporal => {
            records.records().iter().filter_map(|r| r.date).min()
        }
    };

    let vectors = records
        .records()
        .iter()
        .map(|record| {
            let time = min_date.map_or(0.0, |min| {
                record.date.map_or(0.0, |date| {
                    #[allow(clippy::cast_precision_loss)]
                    let days = (date - min).num_days() as f64;
                    days
                })
            });
            [record.longitude, record.latitude, time]
        })
        .collect();

    Ok(FeatureSet {
        vectors,
        temporal: min_date.is_some(),
    })
}
