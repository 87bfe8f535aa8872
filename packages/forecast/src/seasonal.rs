//! Additive trend + Fourier seasonality model.
//!
//! `y(t) = trend(t) + yearly(t) + weekly(t) + ε`
//!
//! The trend is piecewise linear with evenly spaced potential changepoints
//! over the early part of the history; slope changes are shrunk toward zero
//! so only the ones the data supports survive. Seasonalities are truncated
//! Fourier series over absolute day numbers. Everything is fit jointly as
//! one ridge regression on scaled data.
//!
//! Intervals come from simulation: future trend paths pick up random slope
//! changes at the historical changepoint rate, and every path gets Gaussian
//! observation noise at the residual scale.

use std::f64::consts::PI;

use chrono::{Datelike as _, NaiveDate};
use crime_forecast_forecast_models::{
    DailySeries, ForecastPoint, ForecastResult, ModelState, SeasonalComponent, TrendState,
    UncertaintySettings,
};
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};
use rand_distr::{Distribution as _, Normal};
use serde::{Deserialize, Serialize};

use crate::linalg::{design_matrix, fitted, ridge};
use crate::{ForecastError, Forecaster};

const YEARLY: &str = "yearly";
const WEEKLY: &str = "weekly";
const YEARLY_PERIOD_DAYS: f64 = 365.25;
const WEEKLY_PERIOD_DAYS: f64 = 7.0;
const MIN_VARIANCE: f64 = 1e-4;
const UNPENALIZED_JITTER: f64 = 1e-9;

/// Tunables for [`AdditiveSeasonalModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ModelSettings {
    /// Number of potential trend changepoints.
    pub changepoints: usize,
    /// Fraction of the history in which changepoints are placed.
    pub changepoint_range: f64,
    /// Prior scale of slope changes; smaller is a stiffer trend.
    pub changepoint_prior_scale: f64,
    /// Prior scale of seasonal coefficients.
    pub seasonality_prior_scale: f64,
    /// Fit a yearly seasonality.
    pub yearly_seasonality: bool,
    /// Fourier order of the yearly seasonality.
    pub yearly_order: usize,
    /// Fit a weekly seasonality.
    pub weekly_seasonality: bool,
    /// Fourier order of the weekly seasonality.
    pub weekly_order: usize,
    /// Minimum number of training observations.
    pub min_training_rows: usize,
    /// Central probability mass of the uncertainty interval.
    pub interval_width: f64,
    /// Simulated paths per forecast; 0 collapses the interval onto the
    /// point estimate.
    pub uncertainty_samples: usize,
    /// Seed for the interval simulation.
    pub seed: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly_seasonality: true,
            yearly_order: 10,
            weekly_seasonality: true,
            weekly_order: 3,
            min_training_rows: 10,
            interval_width: 0.8,
            uncertainty_samples: 300,
            seed: 42,
        }
    }
}

/// Piecewise-linear trend plus Fourier seasonalities, fit by ridge
/// regression.
#[derive(Debug, Clone, Default)]
pub struct AdditiveSeasonalModel {
    settings: ModelSettings,
}

impl AdditiveSeasonalModel {
    /// Creates a model with the given settings.
    #[must_use]
    pub const fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }

    fn seasonal_specs(&self) -> Vec<(&'static str, f64, usize)> {
        let mut specs = Vec::new();
        if self.settings.yearly_seasonality && self.settings.yearly_order > 0 {
            specs.push((YEARLY, YEARLY_PERIOD_DAYS, self.settings.yearly_order));
        }
        if self.settings.weekly_seasonality && self.settings.weekly_order > 0 {
            specs.push((WEEKLY, WEEKLY_PERIOD_DAYS, self.settings.weekly_order));
        }
        specs
    }
}

/// Days since the common era, the phase origin for every seasonality.
fn day_number(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

fn scaled_time(date: NaiveDate, start: NaiveDate, t_scale_days: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let days = (date - start).num_days() as f64;
    days / t_scale_days
}

/// Appends `sin`/`cos` pairs for harmonics `1..=order`.
fn fourier_terms(date: NaiveDate, period_days: f64, order: usize, out: &mut Vec<f64>) {
    let x = day_number(date);
    for harmonic in 1..=order {
        #[allow(clippy::cast_precision_loss)]
        let angle = 2.0 * PI * harmonic as f64 * x / period_days;
        let (sin, cos) = angle.sin_cos();
        out.push(sin);
        out.push(cos);
    }
}

fn seasonal_value(component: &SeasonalComponent, date: NaiveDate) -> f64 {
    let mut terms = Vec::with_capacity(component.coefficients.len());
    fourier_terms(date, component.period_days, component.order, &mut terms);
    terms
        .iter()
        .zip(&component.coefficients)
        .map(|(x, beta)| x * beta)
        .sum()
}

fn trend_value(trend: &TrendState, t: f64) -> f64 {
    let bends: f64 = trend
        .changepoints
        .iter()
        .zip(&trend.deltas)
        .map(|(c, delta)| delta * (t - c).max(0.0))
        .sum();
    trend.base_slope.mul_add(t, trend.offset) + bends
}

/// Positions of the potential changepoints, taken at evenly spaced
/// observations within the first `range` fraction of the history.
fn changepoint_positions(t: &[f64], count: usize, range: f64) -> Vec<f64> {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let history = ((t.len() as f64) * range.clamp(0.0, 1.0)).floor() as usize;
    let count = count.min(history.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last = history - 1;
    let mut positions: Vec<f64> = (1..=count)
        .map(|i| {
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_precision_loss
            )]
            let idx = ((i * last) as f64 / count as f64).round() as usize;
            t[idx]
        })
        .collect();
    positions.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);
    positions
}

#[allow(clippy::cast_precision_loss)]
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            #[allow(clippy::cast_precision_loss)]
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            #[allow(clippy::cast_precision_loss)]
            let frac = pos - lo as f64;
            (sorted[hi] - sorted[lo]).mul_add(frac, sorted[lo])
        }
    }
}

/// Zero-mean Laplace draw by inverse CDF.
fn laplace(rng: &mut StdRng, scale: f64) -> f64 {
    let u: f64 = rng.gen_range(-0.5..0.5);
    -scale * u.signum() * 2.0f64.mul_add(-u.abs(), 1.0).ln()
}

impl Forecaster for AdditiveSeasonalModel {
    fn name(&self) -> &'static str {
        "additive-seasonal"
    }

    fn fit(&self, series: &DailySeries) -> Result<ModelState, ForecastError> {
        let rows = series.len();
        let required = self.settings.min_training_rows.max(2);
        let (Some(start), Some(end)) = (series.first_date(), series.last_date()) else {
            return Err(ForecastError::InsufficientData { rows, required });
        };
        if rows < required {
            return Err(ForecastError::InsufficientData { rows, required });
        }

        log::info!("Fitting {} model on {rows} daily observations ({start} to {end})", self.name());

        #[allow(clippy::cast_precision_loss)]
        let t_scale_days = ((end - start).num_days() as f64).max(1.0);
        #[allow(clippy::cast_precision_loss)]
        let y_max = series.points().iter().map(|p| p.count).max().unwrap_or(0) as f64;
        let y_scale = if y_max > 0.0 { y_max } else { 1.0 };

        let t: Vec<f64> = series
            .points()
            .iter()
            .map(|p| scaled_time(p.date, start, t_scale_days))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let y: Vec<f64> = series
            .points()
            .iter()
            .map(|p| p.count as f64 / y_scale)
            .collect();

        let changepoints = changepoint_positions(
            &t,
            self.settings.changepoints,
            self.settings.changepoint_range,
        );
        let specs = self.seasonal_specs();
        let seasonal_cols: usize = specs.iter().map(|(_, _, order)| 2 * order).sum();
        let cols = 2 + changepoints.len() + seasonal_cols;

        let design_rows: Vec<Vec<f64>> = series
            .points()
            .iter()
            .zip(&t)
            .map(|(point, &ti)| {
                let mut row = Vec::with_capacity(cols);
                row.push(1.0);
                row.push(ti);
                row.extend(changepoints.iter().map(|c| (ti - c).max(0.0)));
                for &(_, period, order) in &specs {
                    fourier_terms(point.date, period, order, &mut row);
                }
                row
            })
            .collect();
        let design = design_matrix(&design_rows, cols);

        let noise = variance(&y).max(MIN_VARIANCE);
        let delta_penalty = noise / self.settings.changepoint_prior_scale.powi(2);
        let seasonal_penalty = noise / self.settings.seasonality_prior_scale.powi(2);

        let mut penalty = vec![UNPENALIZED_JITTER; 2];
        penalty.extend(std::iter::repeat_n(delta_penalty, changepoints.len()));
        penalty.extend(std::iter::repeat_n(seasonal_penalty, seasonal_cols));

        let beta = ridge(design.as_ref(), &y, &penalty).ok_or(ForecastError::Singular)?;

        let deltas = beta[2..2 + changepoints.len()].to_vec();
        let mut offset = 2 + changepoints.len();
        let seasonalities: Vec<SeasonalComponent> = specs
            .iter()
            .map(|&(name, period_days, order)| {
                let coefficients = beta[offset..offset + 2 * order].to_vec();
                offset += 2 * order;
                SeasonalComponent {
                    name: name.to_string(),
                    period_days,
                    order,
                    coefficients,
                }
            })
            .collect();

        let trend = TrendState {
            offset: beta[0],
            base_slope: beta[1],
            changepoints,
            deltas,
        };

        #[allow(clippy::cast_precision_loss)]
        let sigma = (fitted(design.as_ref(), &beta)
            .iter()
            .zip(&y)
            .map(|(f, actual)| (actual - f).powi(2))
            .sum::<f64>()
            / rows as f64)
            .sqrt();

        log::debug!(
            "Fitted trend offset={:.4} slope={:.4} with {} changepoints, sigma={sigma:.4}",
            trend.offset,
            trend.base_slope,
            trend.changepoints.len()
        );

        Ok(ModelState {
            history_start: start,
            history_end: end,
            training_rows: rows,
            t_scale_days,
            y_scale,
            trend,
            seasonalities,
            sigma,
            uncertainty: UncertaintySettings {
                interval_width: self.settings.interval_width,
                samples: self.settings.uncertainty_samples,
                seed: self.settings.seed,
            },
        })
    }

    fn predict(&self, state: &ModelState, horizon_days: u32) -> Result<ForecastResult, ForecastError> {
        let last = state.history_end + chrono::Days::new(u64::from(horizon_days));
        let dates: Vec<NaiveDate> = state
            .history_start
            .iter_days()
            .take_while(|d| *d <= last)
            .collect();

        log::info!(
            "Forecasting {} days ({horizon_days} past {})",
            dates.len(),
            state.history_end
        );

        let t: Vec<f64> = dates
            .iter()
            .map(|d| scaled_time(*d, state.history_start, state.t_scale_days))
            .collect();

        let component = |name: &str, date: NaiveDate| {
            state
                .seasonalities
                .iter()
                .filter(|c| c.name == name)
                .map(|c| seasonal_value(c, date))
                .sum::<f64>()
        };

        let mut trend = Vec::with_capacity(dates.len());
        let mut weekly = Vec::with_capacity(dates.len());
        let mut yearly = Vec::with_capacity(dates.len());
        for (date, &ti) in dates.iter().zip(&t) {
            trend.push(trend_value(&state.trend, ti));
            weekly.push(component(WEEKLY, *date));
            yearly.push(component(YEARLY, *date));
        }

        let (lower, upper) = simulate_bounds(state, &t, &trend, &weekly, &yearly);

        let points = dates
            .iter()
            .enumerate()
            .map(|(i, &date)| {
                let point = trend[i] + weekly[i] + yearly[i];
                ForecastPoint {
                    date,
                    point: point * state.y_scale,
                    lower: lower[i].unwrap_or(point) * state.y_scale,
                    upper: upper[i].unwrap_or(point) * state.y_scale,
                    trend: trend[i] * state.y_scale,
                    weekly: weekly[i] * state.y_scale,
                    yearly: yearly[i] * state.y_scale,
                }
            })
            .collect();

        Ok(ForecastResult::new(points))
    }
}

/// Simulated lower and upper bounds (scaled units) for each date; `None`
/// where simulation is disabled.
fn simulate_bounds(
    state: &ModelState,
    t: &[f64],
    trend: &[f64],
    weekly: &[f64],
    yearly: &[f64],
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = t.len();
    let UncertaintySettings {
        interval_width,
        samples,
        seed,
    } = state.uncertainty;

    if samples == 0 || n == 0 {
        return (vec![None; n], vec![None; n]);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, state.sigma).ok().filter(|_| state.sigma > 0.0);

    #[allow(clippy::cast_precision_loss)]
    let change_rate = if state.trend.changepoints.is_empty() {
        0.0
    } else {
        (state.trend.changepoints.len() as f64 / state.t_scale_days.max(1.0)).min(1.0)
    };
    #[allow(clippy::cast_precision_loss)]
    let change_scale = state.trend.deltas.iter().map(|d| d.abs()).sum::<f64>()
        / state.trend.deltas.len().max(1) as f64
        + 1e-8;

    let mut draws: Vec<Vec<f64>> = vec![Vec::with_capacity(samples); n];

    for _ in 0..samples {
        let mut extra_slope = 0.0;
        let mut extra_value = 0.0;
        let mut prev_t = 1.0;

        for i in 0..n {
            if t[i] > 1.0 {
                extra_value += extra_slope * (t[i] - prev_t);
                prev_t = t[i];
                if change_rate > 0.0 && rng.gen_bool(change_rate) {
                    extra_slope += laplace(&mut rng, change_scale);
                }
            }

            let eps = noise.map_or(0.0, |dist| dist.sample(&mut rng));
            draws[i].push(trend[i] + extra_value + weekly[i] + yearly[i] + eps);
        }
    }

    let lower_q = (1.0 - interval_width) / 2.0;
    let upper_q = (1.0 + interval_width) / 2.0;

    draws
        .into_iter()
        .map(|mut values| {
            values.sort_by(f64::total_cmp);
            (
                Some(quantile(&values, lower_q)),
                Some(quantile(&values, upper_q)),
            )
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use crime_forecast_forecast_models::DailyCount;

    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
    }

    fn series_from(counts: impl IntoIterator<Item = u64>) -> DailySeries {
        DailySeries::from_counts(counts.into_iter().enumerate().map(|(i, count)| DailyCount {
            date: start() + chrono::Days::new(i as u64),
            count,
        }))
    }

    #[test]
    fn rejects_short_history() {
        let model = AdditiveSeasonalModel::default();
        let err = model.fit(&series_from([3; 9])).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData {
                rows: 9,
                required: 10
            }
        ));
        assert!(model.fit(&DailySeries::default()).is_err());
    }

    #[test]
    fn flat_series_is_predicted_flat() {
        let model = AdditiveSeasonalModel::default();
        let state = model.fit(&series_from([10; 400])).unwrap();
        let forecast = model.predict(&state, 30).unwrap();

        assert_eq!(forecast.len(), 430);
        for point in forecast.points() {
            assert!((point.point - 10.0).abs() < 1e-3, "{point:?}");
            assert!(point.lower <= point.point + 1e-9);
            assert!(point.upper >= point.point - 1e-9);
        }
    }

    #[test]
    fn recovers_linear_growth() {
        let model = AdditiveSeasonalModel::new(ModelSettings {
            yearly_seasonality: false,
            weekly_seasonality: false,
            uncertainty_samples: 0,
            ..ModelSettings::default()
        });
        let state = model.fit(&series_from((0..200).map(|i| 50 + i / 4))).unwrap();
        let forecast = model.predict(&state, 20).unwrap();
        let last = forecast.points().last().unwrap();
        // Day 219 continues the slope of 0.25/day from 50.
        assert!((last.point - 104.75).abs() < 3.0, "{last:?}");
        assert!((last.upper - last.point).abs() < f64::EPSILON);
    }

    #[test]
    fn weekly_pattern_is_captured() {
        let model = AdditiveSeasonalModel::new(ModelSettings {
            yearly_seasonality: false,
            ..ModelSettings::default()
        });
        let weekly = [5, 5, 5, 5, 5, 20, 20];
        let state = model.fit(&series_from((0..140).map(|i| weekly[i % 7]))).unwrap();
        let forecast = model.predict(&state, 14).unwrap();

        let future: Vec<&ForecastPoint> = forecast
            .points()
            .iter()
            .filter(|p| p.date > state.history_end)
            .collect();
        for point in future {
            let offset = usize::try_from((point.date - start()).num_days()).unwrap();
            let expected = f64::from(u32::try_from(weekly[offset % 7]).unwrap());
            assert!((point.point - expected).abs() < 1.5, "{point:?}");
        }
    }

    #[test]
    fn intervals_widen_with_horizon() {
        // Rises, falls, then rises again, so the fitted slope changes are
        // large relative to the noise.
        let counts = (0..300u64).map(|i| {
            let level = match i {
                0..100 => 20 + i / 5,
                100..200 => 40 - (i - 100) / 5,
                _ => 20 + (i - 200) / 5,
            };
            level + (i * 7919) % 3
        });
        let model = AdditiveSeasonalModel::new(ModelSettings {
            yearly_seasonality: false,
            ..ModelSettings::default()
        });
        let state = model.fit(&series_from(counts)).unwrap();
        let forecast = model.predict(&state, 120).unwrap();

        let width = |p: &ForecastPoint| p.upper - p.lower;
        let near = width(forecast.get(state.history_end + chrono::Days::new(1)).unwrap());
        let far = width(forecast.get(state.history_end + chrono::Days::new(120)).unwrap());
        assert!(far > near, "near={near} far={far}");
    }

    #[test]
    fn prediction_is_deterministic_under_seed() {
        let model = AdditiveSeasonalModel::default();
        let state = model.fit(&series_from((0..60).map(|i| 10 + i % 5))).unwrap();
        let a = model.predict(&state, 10).unwrap();
        let b = model.predict(&state, 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn predict_range_covers_only_the_window() {
        let model = AdditiveSeasonalModel::default();
        let state = model.fit(&series_from([4; 50])).unwrap();
        let from = state.history_end + chrono::Days::new(10);
        let to = state.history_end + chrono::Days::new(20);
        let future = model.predict_range(&state, from, to).unwrap();
        assert_eq!(future.len(), 11);
        assert_eq!(future.first_date(), Some(from));
        assert_eq!(future.last_date(), Some(to));

        assert!(matches!(
            model.predict_range(&state, to, from),
            Err(ForecastError::InvalidRange { .. })
        ));
    }

    #[test]
    fn quantile_interpolates() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&values, 0.5) - 2.0).abs() < 1e-12);
        assert!((quantile(&values, 0.1) - 0.4).abs() < 1e-12);
    }
}
