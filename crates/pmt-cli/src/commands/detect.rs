//! `pmt detect`: train (or load) an auto-encoder and flag sensor windows.

use crate::cli::DetectArgs;
use anyhow::{bail, Context, Result};
use pmt_anomaly::{detect_anomalies, train_autoencoder, TrainedDetector};
use pmt_core::{load_config_from_path, PlannerConfig};
use pmt_io::{load_sensor_series, write_detections_csv};
use std::io::{self, Write};
use tabwriter::TabWriter;
use tracing::info;

pub fn run(args: &DetectArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("loading config '{}'", path.display()))?,
        None => PlannerConfig::default(),
    };
    apply_overrides(&mut config, args)?;

    let mut detector = match (&args.model, &args.train) {
        (Some(model_path), _) => TrainedDetector::load(model_path)
            .with_context(|| format!("loading model '{}'", model_path.display()))?,
        (None, Some(train_path)) => {
            let series = load_sensor_series(train_path)
                .with_context(|| format!("loading training series '{}'", train_path.display()))?;
            info!(
                samples = series.n_samples(),
                features = series.n_features(),
                "training series loaded"
            );
            train_autoencoder(&series.values, &config.ae, args.seed)?
        }
        (None, None) => bail!("either --train or --model is required"),
    };

    if let Some(model_out) = &args.model_out {
        detector.save(model_out)?;
        info!(path = %model_out.display(), "model saved");
    }

    let Some(detection_path) = args.input.as_ref().or(args.train.as_ref()) else {
        bail!("--input is required when detecting with a loaded --model");
    };
    let series = load_sensor_series(detection_path)
        .with_context(|| format!("loading detection series '{}'", detection_path.display()))?;

    let report = detect_anomalies(
        &mut detector,
        &series.values,
        Some(&series.timestamps),
        config.ae.threshold_percentile,
        config.ae.rolling_window,
    )?;

    write_detections_csv(&args.output, &report.detections)?;

    let summary = &report.summary;
    let mut tw = TabWriter::new(io::stdout());
    writeln!(tw, "windows\tanomalies\tfraction\tQ threshold\tT2 threshold")?;
    writeln!(
        tw,
        "{}\t{}\t{:.1}%\t{:.6}\t{:.6}",
        summary.total_windows,
        summary.anomalies_detected,
        summary.anomaly_fraction * 100.0,
        report.q_threshold,
        report.t2_threshold
    )?;
    tw.flush()?;
    println!("\ndetections written to '{}'", args.output.display());
    Ok(())
}

fn apply_overrides(config: &mut PlannerConfig, args: &DetectArgs) -> Result<()> {
    if let Some(arch) = &args.arch {
        config.ae.model_arch = arch.parse()?;
    }
    if let Some(epochs) = args.epochs {
        config.ae.num_epochs = epochs;
    }
    if let Some(window_size) = args.window_size {
        config.ae.window_size = window_size;
    }
    if let Some(percentile) = args.percentile {
        config.ae.threshold_percentile = percentile;
    }
    config.validate()?;
    Ok(())
}
