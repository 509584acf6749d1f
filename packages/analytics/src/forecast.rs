//! Short-horizon daily count forecasting.
//!
//! Builds a daily event-count series from the filtered records and fits
//! a classical additive model: a least-squares linear trend plus a
//! weekly seasonal component estimated from the trend residuals. The
//! residual standard deviation feeds symmetric 95% uncertainty bounds.

use chrono::{Datelike as _, Days, NaiveDate};
use hotspot_analytics_models::{ForecastParams, ForecastResult, ForecastRow};
use hotspot_records_models::RecordSet;
use std::collections::BTreeMap;

use crate::AnalyticsError;

/// Half-width multiplier for the 95% interval.
const Z_95: f64 = 1.96;

/// Fits the daily count model and projects it `params.periods` days
/// past the last observed date.
///
/// The returned series covers one row per distinct historical date
/// (the in-sample fit) followed by the horizon. A record set with no
/// usable dates yields [`ForecastResult::Unavailable`] rather than an
/// error. Fewer than two distinct dates still fit, with degenerate
/// (zero-width) bounds.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if `periods` is zero,
/// or [`AnalyticsError::ModelFit`] if the fit produces non-finite
/// values.
pub fn forecast(
    records: &RecordSet,
    params: &ForecastParams,
) -> Result<ForecastResult, AnalyticsError> {
    if params.periods == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "periods",
            value: params.periods.to_string(),
            expected: "an integer greater than or equal to 1",
        });
    }

    let mut daily: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in records.records() {
        if let Some(filter) = &params.crime_type
            && record.crime_type != *filter
        {
            continue;
        }
        if let Some(date) = record.date {
            *daily.entry(date).or_insert(0) += 1;
        }
    }

    if daily.is_empty() {
        return Ok(ForecastResult::Unavailable {
            reason: "no records with event dates after filtering".to_string(),
        });
    }

    let first = *daily.keys().next().unwrap_or(&NaiveDate::MIN);
    let last = *daily.keys().next_back().unwrap_or(&NaiveDate::MIN);

    #[allow(clippy::cast_precision_loss)]
    let observations: Vec<(NaiveDate, f64, f64)> = daily
        .iter()
        .map(|(&date, &count)| (date, (date - first).num_days() as f64, count as f64))
        .collect();

    let model = fit(&observations);

    let mut rows: Vec<ForecastRow> = observations
        .iter()
        .map(|&(date, x, _)| model.row(date, x))
        .collect();

    for step in 1..=params.periods {
        let date = last
            .checked_add_days(Days::new(u64::from(step)))
            .ok_or_else(|| AnalyticsError::ModelFit {
                message: "forecast horizon exceeds the calendar range".to_string(),
            })?;
        #[allow(clippy::cast_precision_loss)]
        let x = (date - first).num_days() as f64;
        rows.push(model.row(date, x));
    }

    if rows.iter().any(|r| !r.yhat.is_finite()) {
        return Err(AnalyticsError::ModelFit {
            message: "fitted values are non-finite".to_string(),
        });
    }

    log::debug!(
        "forecast: {} observed days, {} projected",
        observations.len(),
        params.periods
    );

    Ok(ForecastResult::Series { rows })
}

/// Fitted additive model: linear trend + weekly seasonal offsets.
struct Model {
    intercept: f64,
    slope: f64,
    // Indexed by `weekday::num_days_from_monday`.
    seasonal: [f64; 7],
    sigma: f64,
}

impl Model {
    fn predict(&self, date: NaiveDate, x: f64) -> f64 {
        let weekday = date.weekday().num_days_from_monday() as usize;
        self.slope.mul_add(x, self.intercept) + self.seasonal[weekday]
    }

    fn row(&self, date: NaiveDate, x: f64) -> ForecastRow {
        let yhat = self.predict(date, x);
        let half_width = Z_95 * self.sigma;
        ForecastRow {
            ds: date,
            yhat,
            yhat_lower: yhat - half_width,
            yhat_upper: yhat + half_width,
        }
    }
}

fn fit(observations: &[(NaiveDate, f64, f64)]) -> Model {
    #[allow(clippy::cast_precision_loss)]
    let n = observations.len() as f64;
    let x_mean = observations.iter().map(|&(_, x, _)| x).sum::<f64>() / n;
    let y_mean = observations.iter().map(|&(_, _, y)| y).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for &(_, x, y) in observations {
        covariance += (x - x_mean) * (y - y_mean);
        variance += (x - x_mean) * (x - x_mean);
    }

    // A single distinct date has zero variance; fall back to a flat
    // trend at the mean.
    let slope = if variance > 0.0 { covariance / variance } else { 0.0 };
    let intercept = slope.mul_add(-x_mean, y_mean);

    let mut seasonal_sums = [0.0_f64; 7];
    let mut seasonal_counts = [0_u32; 7];
    for &(date, x, y) in observations {
        let weekday = date.weekday().num_days_from_monday() as usize;
        seasonal_sums[weekday] += y - slope.mul_add(x, intercept);
        seasonal_counts[weekday] += 1;
    }
    let mut seasonal = [0.0_f64; 7];
    for w in 0..7 {
        if seasonal_counts[w] > 0 {
            seasonal[w] = seasonal_sums[w] / f64::from(seasonal_counts[w]);
        }
    }

    let model = Model {
        intercept,
        slope,
        seasonal,
        sigma: 0.0,
    };
    let residual_sq: f64 = observations
        .iter()
        .map(|&(date, x, y)| {
            let e = y - model.predict(date, x);
            e * e
        })
        .sum();

    Model {
        sigma: (residual_sq / n).sqrt(),
        ..model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record_set;

    fn daily_records(counts: &[(&'static str, usize)]) -> RecordSet {
        let mut points = Vec::new();
        for &(date, count) in counts {
            for _ in 0..count {
                points.push(("Burglary", 0.0, 0.0, Some(date)));
            }
        }
        record_set(&points)
    }

    fn series(result: ForecastResult) -> Vec<ForecastRow> {
        match result {
            ForecastResult::Series { rows } => rows,
            ForecastResult::Unavailable { reason } => panic!("unavailable: {reason}"),
        }
    }

    #[test]
    fn series_length_is_distinct_dates_plus_horizon() {
        let records = daily_records(&[
            ("2025-01-01", 2),
            ("2025-01-02", 3),
            ("2025-01-04", 1),
        ]);
        let rows = series(
            forecast(
                &records,
                &ForecastParams {
                    crime_type: None,
                    periods: 7,
                },
            )
            .unwrap(),
        );
        assert_eq!(rows.len(), 3 + 7);
    }

    #[test]
    fn bounds_bracket_the_point_estimate() {
        let records = daily_records(&[
            ("2025-01-01", 5),
            ("2025-01-02", 2),
            ("2025-01-03", 7),
            ("2025-01-04", 3),
        ]);
        let rows = series(forecast(&records, &ForecastParams::default()).unwrap());
        for row in rows {
            assert!(row.yhat_lower <= row.yhat);
            assert!(row.yhat <= row.yhat_upper);
        }
    }

    #[test]
    fn future_rows_continue_from_the_last_date() {
        let records = daily_records(&[("2025-01-01", 1), ("2025-01-02", 1)]);
        let rows = series(
            forecast(
                &records,
                &ForecastParams {
                    crime_type: None,
                    periods: 2,
                },
            )
            .unwrap(),
        );
        assert_eq!(rows[2].ds, "2025-01-03".parse().unwrap());
        assert_eq!(rows[3].ds, "2025-01-04".parse().unwrap());
    }

    #[test]
    fn dateless_records_make_forecasting_unavailable() {
        let records = record_set(&[("Burglary", 0.0, 0.0, None)]);
        let result = forecast(&records, &ForecastParams::default()).unwrap();
        assert!(matches!(result, ForecastResult::Unavailable { .. }));
    }

    #[test]
    fn crime_type_filter_restricts_the_series() {
        let mut points = vec![("Burglary", 0.0, 0.0, Some("2025-01-01"))];
        points.push(("Drugs", 0.0, 0.0, Some("2025-02-01")));
        let records = record_set(&points);
        let result = forecast(
            &records,
            &ForecastParams {
                crime_type: Some("Robbery".to_string()),
                periods: 5,
            },
        )
        .unwrap();
        assert!(matches!(result, ForecastResult::Unavailable { .. }));
    }

    #[test]
    fn single_date_fits_with_degenerate_bounds() {
        let records = daily_records(&[("2025-01-01", 4)]);
        let rows = series(
            forecast(
                &records,
                &ForecastParams {
                    crime_type: None,
                    periods: 3,
                },
            )
            .unwrap(),
        );
        assert_eq!(rows.len(), 4);
        for row in rows {
            assert!((row.yhat_upper - row.yhat_lower).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_zero_periods() {
        let records = daily_records(&[("2025-01-01", 1)]);
        let err = forecast(
            &records,
            &ForecastParams {
                crime_type: None,
                periods: 0,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InvalidParameter { name: "periods", .. }
        ));
    }
}
