//! Scoring a forecast against held-out daily counts.

use crime_forecast_forecast_models::{
    DailySeries, EvaluationOutcome, EvaluationReport, EvaluationRow, ForecastResult,
};

/// Left-joins the held-out days with the forecast and computes the mean
/// absolute error over the days that have a prediction.
///
/// An empty held-out series yields [`EvaluationOutcome::NoTestData`]. When
/// no held-out day is covered by the forecast the report is still produced
/// with `mae: None`.
#[must_use]
pub fn evaluate(forecast: &ForecastResult, actual: &DailySeries) -> EvaluationOutcome {
    if actual.is_empty() {
        log::warn!("No test data available; skipping evaluation");
        return EvaluationOutcome::NoTestData;
    }

    let rows: Vec<EvaluationRow> = actual
        .points()
        .iter()
        .map(|a| {
            let predicted = forecast.get(a.date);
            EvaluationRow {
                date: a.date,
                actual: a.count,
                point: predicted.map(|p| p.point),
                lower: predicted.map(|p| p.lower),
                upper: predicted.map(|p| p.upper),
            }
        })
        .collect();

    let errors: Vec<f64> = rows
        .iter()
        .filter_map(|row| {
            #[allow(clippy::cast_precision_loss)]
            row.point.map(|p| (row.actual as f64 - p).abs())
        })
        .collect();

    let matched = errors.len();
    #[allow(clippy::cast_precision_loss)]
    let mae = (matched > 0).then(|| errors.iter().sum::<f64>() / matched as f64);

    match mae {
        Some(mae) => log::info!("Mean Absolute Error: {mae:.4} over {matched} days"),
        None => log::warn!("No held-out day is covered by the forecast; MAE unavailable"),
    }
    if matched < rows.len() {
        log::debug!("{} held-out days have no prediction", rows.len() - matched);
    }

    EvaluationOutcome::Evaluated(EvaluationReport { rows, matched, mae })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_forecast_forecast_models::{DailyCount, ForecastPoint};

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn forecast(days: impl IntoIterator<Item = (u32, f64)>) -> ForecastResult {
        ForecastResult::new(
            days.into_iter()
                .map(|(d, point)| ForecastPoint {
                    date: date(d),
                    point,
                    lower: point - 1.0,
                    upper: point + 1.0,
                    trend: point,
                    weekly: 0.0,
                    yearly: 0.0,
                })
                .collect(),
        )
    }

    fn actual(days: impl IntoIterator<Item = (u32, u64)>) -> DailySeries {
        DailySeries::from_counts(
            days.into_iter()
                .map(|(d, count)| DailyCount { date: date(d), count }),
        )
    }

    #[test]
    fn mae_over_matched_rows_only() {
        let outcome = evaluate(
            &forecast([(1, 10.0), (2, 12.0)]),
            &actual([(1, 11), (2, 10), (5, 100)]),
        );
        let report = outcome.report().unwrap();
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.matched, 2);
        assert!((report.mae.unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(report.rows[2].point, None);
        assert_eq!(report.rows[2].actual, 100);
    }

    #[test]
    fn empty_actuals_are_no_test_data() {
        let outcome = evaluate(&forecast([(1, 1.0)]), &DailySeries::default());
        assert_eq!(outcome, EvaluationOutcome::NoTestData);
        assert_eq!(outcome.mae(), None);
    }

    #[test]
    fn unmatched_rows_report_no_mae() {
        let outcome = evaluate(&forecast([(1, 1.0)]), &actual([(20, 3)]));
        let report = outcome.report().unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(report.mae, None);
        assert_eq!(report.rows.len(), 1);
    }

    #[test]
    fn rows_follow_actual_dates() {
        let outcome = evaluate(
            &forecast((1..=10).map(|d| (d, 5.0))),
            &actual([(3, 5), (7, 5)]),
        );
        let report = outcome.report().unwrap();
        let dates: Vec<NaiveDate> = report.rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(3), date(7)]);
        assert_eq!(report.mae, Some(0.0));
    }
}
