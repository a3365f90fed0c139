mod app;
use app::{App, SessionRun};

use anyhow::Context;
use doctored_core::PlannedTrial;
use doctored_experiment::{
    ResultStore, SaveSummary, SessionConfig, SessionInputs, SessionReport, SessionStateMachine,
};
use doctored_render::{ImageCache, load_font};
use doctored_timing::{HighPrecisionTimer, Timer};
use std::{env, path::PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = SessionConfig::load(config_path.as_deref()).context("loading session config")?;
    let inputs = SessionInputs::load(&config).context("loading stimuli and questions")?;
    let font = load_font(config.font_path.as_deref())?;

    let session = SessionStateMachine::new(
        config.clone(),
        inputs,
        HighPrecisionTimer::new(),
        rand::rng(),
    );
    let images = ImageCache::preload(session.plan().iter().map(PlannedTrial::image))?;
    tracing::info!(
        participant = %session.context().participant_id,
        trials = session.plan().len(),
        "session ready"
    );

    let SessionRun {
        report,
        frame_timer,
        error,
    } = App::new(session, font, images).run()?;

    let stats = frame_timer.frame_stats();
    tracing::info!(
        redraws = stats.samples,
        avg_ms = stats.average_frame_time_ns / 1e6,
        jitter_ms = stats.jitter_ns / 1e6,
        min_ms = stats.min_frame_time_ns / 1e6,
        max_ms = stats.max_frame_time_ns / 1e6,
        fps = stats.effective_fps,
        "render timing"
    );

    save_results(&config, &report, error)?;
    Ok(())
}

/// Saves what the outcome allows, then reports the run's own failure if it
/// had one. Results are written before any run error is returned.
fn save_results(
    config: &SessionConfig,
    report: &SessionReport,
    run_error: Option<anyhow::Error>,
) -> anyhow::Result<SaveSummary> {
    let store = ResultStore::new(&config.data_dir);
    let saved = store
        .save(report, config.keep_trials_on_abort)
        .with_context(|| format!("saving results under {}", config.data_dir.display()));

    if let Ok(summary) = &saved {
        tracing::info!(
            outcome = ?report.outcome,
            trial_rows = summary.trial_rows,
            participant_row = summary.participant_row,
            "results saved"
        );
    }
    match (run_error, saved) {
        (None, saved) => saved,
        (Some(run_error), Ok(_)) => Err(run_error.context("session ended by a display failure")),
        (Some(run_error), Err(save_error)) => {
            tracing::error!(error = %run_error, "session ended by a display failure");
            Err(save_error)
        }
    }
}
