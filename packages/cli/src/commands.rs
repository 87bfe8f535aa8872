//! Subcommand implementations.

use crime_forecast_artifacts::{ArtifactStore, PartitionArtifact};
use crime_forecast_cli_utils::{IndicatifProgress, MultiProgress};
use crime_forecast_incident_models::{IncidentRecord, PartitionBy};
use crime_forecast_pipeline::{
    BatchRunner, BatchSummary, PartitionOutcome, PartitionReport, PipelineConfig, load_table,
};

/// Forecasts every district.
///
/// # Errors
///
/// * If the incident table cannot be loaded
/// * If the batch summary cannot be written
pub fn districts(config: &PipelineConfig, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_table(config)?;
    let store = ArtifactStore::new(&config.output_dir);
    let progress = IndicatifProgress::partitions_bar(multi, "Forecasting districts");

    let summary = BatchRunner::new(config, &store).run_districts(&table, &progress)?;
    print_summary(&summary);
    Ok(())
}

/// Clusters every crime type and forecasts each one's largest hotspot.
///
/// # Errors
///
/// * If the incident table cannot be loaded
/// * If the batch summary cannot be written
pub fn categories(config: &PipelineConfig, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_table(config)?;
    let store = ArtifactStore::new(&config.output_dir);
    let progress = IndicatifProgress::partitions_bar(multi, "Forecasting crime types");

    let summary = BatchRunner::new(config, &store).run_categories(&table, &progress)?;
    print_summary(&summary);
    Ok(())
}

/// Clusters one crime type and forecasts its largest hotspot.
///
/// # Errors
///
/// * If the incident table cannot be loaded
pub fn hotspots(config: &PipelineConfig, category: &str) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_table(config)?;
    hotspots_in(config, &table, category);
    Ok(())
}

/// Clusters one crime type of an already loaded table and forecasts its
/// largest hotspot.
pub fn hotspots_in(config: &PipelineConfig, table: &[IncidentRecord], category: &str) {
    let store = ArtifactStore::new(&config.output_dir);

    let report = BatchRunner::new(config, &store).run_category(table, category);
    print_report(&report);

    if let Some(hotspots) = store.read_hotspots(category).ok().flatten() {
        println!("  {} hotspots saved", hotspots.features.len());
    }
}

/// Lists partitions with saved artifacts, with their last district or
/// crime-type batch outcome when a summary exists.
pub fn list(config: &PipelineConfig) {
    let store = ArtifactStore::new(&config.output_dir);
    let keys = store.list_partitions();

    if keys.is_empty() {
        println!(
            "No forecast artifacts in {}. Run `districts` or `categories` first.",
            store.root().display()
        );
        return;
    }

    let summaries: Vec<BatchSummary> = PartitionBy::all()
        .iter()
        .filter_map(|&by| {
            BatchSummary::load(&store, by).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable {by} batch summary: {e}");
                None
            })
        })
        .collect();

    println!("{} partitions in {}:", keys.len(), store.root().display());
    for key in &keys {
        let outcomes: Vec<String> = summaries
            .iter()
            .filter_map(|s| s.get(key).map(|r| format!("{} {}", s.partition_by, r.outcome)))
            .collect();
        if outcomes.is_empty() {
            println!("  {key}");
        } else {
            println!("  {key:<30} {}", outcomes.join(", "));
        }
    }
}

/// Prints what was saved for one partition.
pub fn show(config: &PipelineConfig, key: &str) {
    let store = ArtifactStore::new(&config.output_dir);
    match store.load_partition(key) {
        Some(artifact) => print_artifact(&artifact),
        None => println!(
            "No data available for '{key}' in {}. Available: {}",
            store.root().display(),
            available(&store)
        ),
    }
}

fn available(store: &ArtifactStore) -> String {
    let keys = store.list_partitions();
    if keys.is_empty() {
        "none".to_string()
    } else {
        keys.join(", ")
    }
}

fn print_artifact(artifact: &PartitionArtifact) {
    println!("{}", artifact.key);

    match &artifact.forecast {
        Some(forecast) => {
            if let (Some(first), Some(last)) = (forecast.first_date(), forecast.last_date()) {
                println!("  Forecast:          {first} to {last} ({} days)", forecast.len());
            }
        }
        None => println!("  Forecast:          not available"),
    }

    match &artifact.model {
        Some(model) => println!(
            "  Model:             trained {} to {} on {} days, {} changepoints",
            model.history_start,
            model.history_end,
            model.training_rows,
            model.trend.changepoints.len()
        ),
        None => println!("  Model:             not available"),
    }

    match &artifact.test_results {
        Some(rows) => {
            let errors: Vec<f64> = rows
                .iter()
                .filter_map(|r| {
                    #[allow(clippy::cast_precision_loss)]
                    r.point.map(|p| (r.actual as f64 - p).abs())
                })
                .collect();
            if errors.is_empty() {
                println!("  Test results:      {} days, none covered by the forecast", rows.len());
            } else {
                #[allow(clippy::cast_precision_loss)]
                let mae = errors.iter().sum::<f64>() / errors.len() as f64;
                println!(
                    "  Test results:      {} days, MAE {mae:.3} over {} matched",
                    rows.len(),
                    errors.len()
                );
            }
        }
        None => println!("  Test results:      no test data"),
    }

    match &artifact.future_forecast {
        Some(future) => {
            let total: f64 = future.points().iter().map(|p| p.point).sum();
            println!(
                "  Future forecast:   {} days, {total:.0} expected incidents",
                future.len()
            );
        }
        None => println!("  Future forecast:   not available"),
    }

    match &artifact.hotspots {
        Some(hotspots) => println!("  Hotspots:          {}", hotspots.features.len()),
        None => println!("  Hotspots:          none"),
    }
}

fn print_report(report: &PartitionReport) {
    let detail = match (report.outcome, report.mae) {
        (_, Some(mae)) => format!("MAE {mae:.3} over {} days", report.matched_days),
        (PartitionOutcome::Failed, None) => report.error.clone().unwrap_or_default(),
        (PartitionOutcome::Skipped, None) => format!("{} training days", report.training_rows),
        _ => String::new(),
    };
    println!("{:<30} {:<14} {detail}", report.key, report.outcome.as_ref());
    if let Some(top) = report.top_cluster {
        println!(
            "  top cluster {} with {} incidents",
            top.cluster_id, top.member_count
        );
    }
}

fn print_summary(summary: &BatchSummary) {
    println!();
    for report in &summary.partitions {
        print_report(report);
    }
    println!();
    println!(
        "{} partitions: {} evaluated, {} without test data, {} skipped, {} failed",
        summary.partitions.len(),
        summary.count(PartitionOutcome::Evaluated),
        summary.count(PartitionOutcome::NoTestData),
        summary.count(PartitionOutcome::Skipped),
        summary.count(PartitionOutcome::Failed)
    );
}
