#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Daily count series, forecast, evaluation and model state types.
//!
//! Field names serialize to the artifact column names the dashboard reads
//! (`ds`, `y`, `yhat`, `yhat_lower`, `yhat_upper`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of incidents on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DailyCount {
    /// Calendar day.
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    /// Incident count.
    #[serde(rename = "y")]
    pub count: u64,
}

/// Ascending, date-unique sequence of daily counts.
///
/// Only days that had at least one incident are present unless the series
/// was explicitly gap-filled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailySeries {
    points: Vec<DailyCount>,
}

impl DailySeries {
    /// Builds a series from arbitrary counts, sorting by date and summing
    /// duplicate days.
    #[must_use]
    pub fn from_counts(counts: impl IntoIterator<Item = DailyCount>) -> Self {
        let mut sorted: Vec<DailyCount> = counts.into_iter().collect();
        sorted.sort_by_key(|p| p.date);

        let mut points: Vec<DailyCount> = Vec::with_capacity(sorted.len());
        for point in sorted {
            match points.last_mut() {
                Some(last) if last.date == point.date => last.count += point.count,
                _ => points.push(point),
            }
        }

        Self { points }
    }

    /// The underlying points.
    #[must_use]
    pub fn points(&self) -> &[DailyCount] {
        &self.points
    }

    /// Number of days present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest day present.
    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    /// Latest day present.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Count recorded for `date`, if that day is present.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<u64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].count)
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.points.iter().map(|p| p.count).sum()
    }

    /// Days within `[start, end]`; either bound may be open.
    #[must_use]
    pub fn window(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| start.is_none_or(|s| p.date >= s) && end.is_none_or(|e| p.date <= e))
                .copied()
                .collect(),
        }
    }

    /// Splits into a training window `[train_start, train_end]` and a
    /// held-out window `(train_end, test_end]`.
    #[must_use]
    pub fn split_at(
        &self,
        train_start: NaiveDate,
        train_end: NaiveDate,
        test_end: NaiveDate,
    ) -> (Self, Self) {
        let train = self.window(Some(train_start), Some(train_end));
        let test = Self {
            points: self
                .points
                .iter()
                .filter(|p| p.date > train_end && p.date <= test_end)
                .copied()
                .collect(),
        };
        (train, test)
    }
}

/// One forecast row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Calendar day.
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    /// Point estimate.
    #[serde(rename = "yhat")]
    pub point: f64,
    /// Lower uncertainty bound.
    #[serde(rename = "yhat_lower")]
    pub lower: f64,
    /// Upper uncertainty bound.
    #[serde(rename = "yhat_upper")]
    pub upper: f64,
    /// Trend component of the point estimate.
    pub trend: f64,
    /// Weekly seasonal component (0 when disabled).
    pub weekly: f64,
    /// Yearly seasonal component (0 when disabled).
    pub yearly: f64,
}

/// Ascending, date-unique forecast rows covering the fitted history and
/// the future horizon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastResult {
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Wraps forecast rows, sorting them by date.
    #[must_use]
    pub fn new(mut points: Vec<ForecastPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self { points }
    }

    /// The forecast rows.
    #[must_use]
    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Row for `date`, if covered.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<&ForecastPoint> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| &self.points[i])
    }

    /// Earliest covered day.
    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    /// Latest covered day.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Rows within `[start, end]`.
    #[must_use]
    pub fn restrict(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
        }
    }
}

/// One held-out day joined with its forecast, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    /// Calendar day (always present in the actual series).
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    /// Actual count.
    #[serde(rename = "y")]
    pub actual: u64,
    /// Point estimate, empty when the day is outside the forecast.
    #[serde(rename = "yhat")]
    pub point: Option<f64>,
    /// Lower bound.
    #[serde(rename = "yhat_lower")]
    pub lower: Option<f64>,
    /// Upper bound.
    #[serde(rename = "yhat_upper")]
    pub upper: Option<f64>,
}

/// Join table plus accuracy over the matched rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    /// Left join of the actual days with the forecast.
    pub rows: Vec<EvaluationRow>,
    /// Rows that had a prediction.
    pub matched: usize,
    /// Mean absolute error over matched rows; `None` when nothing matched.
    pub mae: Option<f64>,
}

/// Result of evaluating a forecast against a held-out window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// The held-out window had data and was scored.
    Evaluated(EvaluationReport),
    /// The held-out window was empty; no evaluation was performed.
    NoTestData,
}

impl EvaluationOutcome {
    /// The report, when an evaluation was performed.
    #[must_use]
    pub const fn report(&self) -> Option<&EvaluationReport> {
        match self {
            Self::Evaluated(report) => Some(report),
            Self::NoTestData => None,
        }
    }

    /// MAE, when an evaluation was performed and matched at least one day.
    #[must_use]
    pub fn mae(&self) -> Option<f64> {
        self.report().and_then(|r| r.mae)
    }
}

/// Piecewise-linear trend in scaled units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrendState {
    /// Intercept at scaled time 0.
    pub offset: f64,
    /// Slope before the first changepoint.
    pub base_slope: f64,
    /// Changepoint positions in scaled time, ascending.
    pub changepoints: Vec<f64>,
    /// Slope change at each changepoint.
    pub deltas: Vec<f64>,
}

/// One fitted Fourier seasonality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SeasonalComponent {
    /// Component name (`weekly`, `yearly`).
    pub name: String,
    /// Period in days.
    pub period_days: f64,
    /// Fourier order; `coefficients` holds `2 * order` values.
    pub order: usize,
    /// Interleaved `sin`/`cos` coefficients, in scaled units.
    pub coefficients: Vec<f64>,
}

/// Settings for the simulated uncertainty interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UncertaintySettings {
    /// Central probability mass of the interval (e.g. 0.8).
    pub interval_width: f64,
    /// Number of simulated paths.
    pub samples: usize,
    /// Seed for the simulation.
    pub seed: u64,
}

/// Serializable state of a fitted additive seasonal model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelState {
    /// First training day (scaled time 0).
    pub history_start: NaiveDate,
    /// Last training day.
    pub history_end: NaiveDate,
    /// Number of training observations.
    pub training_rows: usize,
    /// Days corresponding to one unit of scaled time.
    pub t_scale_days: f64,
    /// Divisor applied to counts before fitting.
    pub y_scale: f64,
    /// Fitted trend.
    pub trend: TrendState,
    /// Fitted seasonal components.
    pub seasonalities: Vec<SeasonalComponent>,
    /// Residual standard deviation in scaled units.
    pub sigma: f64,
    /// Interval simulation settings.
    pub uncertainty: UncertaintySettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn series() -> DailySeries {
        DailySeries::from_counts([
            DailyCount { date: day(3), count: 2 },
            DailyCount { date: day(1), count: 1 },
            DailyCount { date: day(3), count: 4 },
            DailyCount { date: day(10), count: 7 },
        ])
    }

    #[test]
    fn from_counts_sorts_and_merges() {
        let s = series();
        assert_eq!(s.len(), 3);
        assert_eq!(s.first_date(), Some(day(1)));
        assert_eq!(s.get(day(3)), Some(6));
        assert_eq!(s.get(day(2)), None);
        assert_eq!(s.total(), 14);
    }

    #[test]
    fn split_is_disjoint() {
        let (train, test) = series().split_at(day(1), day(3), day(31));
        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 1);
        assert_eq!(test.first_date(), Some(day(10)));
    }

    #[test]
    fn forecast_restrict_and_lookup() {
        let rows = (1..=5)
            .map(|d| ForecastPoint {
                date: day(d),
                point: f64::from(d),
                lower: 0.0,
                upper: 10.0,
                trend: f64::from(d),
                weekly: 0.0,
                yearly: 0.0,
            })
            .rev()
            .collect();
        let forecast = ForecastResult::new(rows);
        assert_eq!(forecast.first_date(), Some(day(1)));
        assert_eq!(forecast.restrict(day(2), day(3)).len(), 2);
        assert!((forecast.get(day(4)).unwrap().point - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn evaluation_outcome_accessors() {
        assert_eq!(EvaluationOutcome::NoTestData.mae(), None);
        let outcome = EvaluationOutcome::Evaluated(EvaluationReport {
            rows: Vec::new(),
            matched: 0,
            mae: Some(1.5),
        });
        assert_eq!(outcome.mae(), Some(1.5));
    }

    #[test]
    fn model_state_round_trips_through_json() {
        let state = ModelState {
            history_start: day(1),
            history_end: day(31),
            training_rows: 31,
            t_scale_days: 30.0,
            y_scale: 12.0,
            trend: TrendState {
                offset: 0.5,
                base_slope: 0.1,
                changepoints: vec![0.25, 0.5],
                deltas: vec![0.01, -0.02],
            },
            seasonalities: vec![SeasonalComponent {
                name: "weekly".to_string(),
                period_days: 7.0,
                order: 1,
                coefficients: vec![0.1, -0.1],
            }],
            sigma: 0.05,
            uncertainty: UncertaintySettings {
                interval_width: 0.8,
                samples: 100,
                seed: 42,
            },
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: ModelState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
