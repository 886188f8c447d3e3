// Copyright The VajraPulse Authors
// SPDX-License-Identifier: Apache-2.0

//! The `vajrapulse` command-line entry point.
//!
//! Resolves the run plan from four layers (defaults, config file,
//! `VAJRAPULSE_*` environment variables, flags — later layers win), builds
//! the pattern and task, and drives one run through the test runner.
//!
//! Exit codes: 0 on normal completion (including adaptive completion),
//! 2 on invalid arguments or configuration, 1 on a task lifecycle failure.

mod tasks;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vajrapulse_config::{
    BackpressureMode, Error as ConfigError, FileConfig, LoadMode, MaxRate, Options, PatternSpec,
    RunPlan, duration::parse_flexible, pattern::parse_steps,
};
use vajrapulse_controller::TestRunner;
use vajrapulse_engine::adaptive::AdaptivePattern;
use vajrapulse_engine::pattern::{self, LoadPattern, WarmupCooldown};
use vajrapulse_telemetry::exporter::{JsonLinesExporter, LogExporter, SnapshotExporter};
use vajrapulse_telemetry::provider::MetricsProvider;

/// Rate-controlled load generation with adaptive feedback.
#[derive(Parser, Debug)]
#[command(name = "vajrapulse", version, about)]
struct Cli {
    /// Task identifier (noop, sleep:<duration>, flaky:<n>, spin:<duration>).
    task: String,

    /// Load mode: static|ramp|ramp-sustain|step|sine|spike|adaptive.
    #[arg(long)]
    mode: Option<String>,
    /// Base rate in iterations per second.
    #[arg(long)]
    tps: Option<f64>,
    /// Total duration (ms|s|m|h; bare number = seconds).
    #[arg(long)]
    duration: Option<String>,
    /// Ramp length for ramp modes.
    #[arg(long)]
    ramp_duration: Option<String>,
    /// Step segments: rate:duration,rate:duration,...
    #[arg(long)]
    steps: Option<String>,
    /// Mean rate (sine mode).
    #[arg(long)]
    mean_rate: Option<f64>,
    /// Amplitude around the mean (sine mode).
    #[arg(long)]
    amplitude: Option<f64>,
    /// Oscillation period (sine mode).
    #[arg(long)]
    period: Option<String>,
    /// Baseline rate (spike mode).
    #[arg(long)]
    base_rate: Option<f64>,
    /// Elevated rate (spike mode).
    #[arg(long)]
    spike_rate: Option<f64>,
    /// Spike spacing (spike mode).
    #[arg(long)]
    spike_interval: Option<String>,
    /// Spike length (spike mode).
    #[arg(long)]
    spike_duration: Option<String>,

    /// Adaptive: starting rate.
    #[arg(long)]
    initial_tps: Option<f64>,
    /// Adaptive: ramp-up step.
    #[arg(long)]
    ramp_increment: Option<f64>,
    /// Adaptive: ramp-down step.
    #[arg(long)]
    ramp_decrement: Option<f64>,
    /// Adaptive: phase-advance interval.
    #[arg(long)]
    ramp_interval: Option<String>,
    /// Adaptive: lower clamp.
    #[arg(long)]
    min_tps: Option<f64>,
    /// Adaptive: upper clamp, a number or `unlimited`.
    #[arg(long)]
    max_tps: Option<String>,
    /// Adaptive: sustain length.
    #[arg(long)]
    sustain_duration: Option<String>,
    /// Adaptive: failure-ratio threshold in [0, 1].
    #[arg(long)]
    error_threshold: Option<f64>,

    /// Run identifier; a generated UUID prefix when absent.
    #[arg(long)]
    run_id: Option<String>,
    /// Warmup window with suppressed recording.
    #[arg(long)]
    warmup: Option<String>,
    /// Cooldown window with suppressed recording.
    #[arg(long)]
    cooldown: Option<String>,
    /// Periodic report interval.
    #[arg(long)]
    report_interval: Option<String>,
    /// Export the first periodic report immediately.
    #[arg(long)]
    report_immediately: bool,
    /// Concurrency cap for io-bound tasks.
    #[arg(long)]
    max_in_flight: Option<usize>,
    /// Dispatcher behavior under saturation: queue|reject|drop.
    #[arg(long)]
    backpressure: Option<String>,
    /// Configuration file (YAML or JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write a JSON-lines report to this path.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    /// Converts the flag layer into mergeable options.
    fn into_options(self) -> Result<(String, Option<PathBuf>, Options), ConfigError> {
        let parse = |option: &'static str, value: Option<String>| {
            value.map(|v| parse_flexible(option, &v)).transpose()
        };
        let options = Options {
            mode: self.mode.as_deref().map(LoadMode::from_str).transpose()?,
            tps: self.tps,
            duration: parse("--duration", self.duration)?,
            ramp_duration: parse("--ramp-duration", self.ramp_duration)?,
            steps: self.steps.as_deref().map(parse_steps).transpose()?,
            mean_rate: self.mean_rate,
            amplitude: self.amplitude,
            period: parse("--period", self.period)?,
            base_rate: self.base_rate,
            spike_rate: self.spike_rate,
            spike_interval: parse("--spike-interval", self.spike_interval)?,
            spike_duration: parse("--spike-duration", self.spike_duration)?,
            initial_tps: self.initial_tps,
            ramp_increment: self.ramp_increment,
            ramp_decrement: self.ramp_decrement,
            ramp_interval: parse("--ramp-interval", self.ramp_interval)?,
            min_tps: self.min_tps,
            max_tps: self.max_tps.as_deref().map(MaxRate::from_str).transpose()?,
            sustain_duration: parse("--sustain-duration", self.sustain_duration)?,
            error_threshold: self.error_threshold,
            stable_intervals_required: None,
            max_search_cycles: None,
            run_id: self.run_id,
            warmup: parse("--warmup", self.warmup)?,
            cooldown: parse("--cooldown", self.cooldown)?,
            report_interval: parse("--report-interval", self.report_interval)?,
            report_immediately: self.report_immediately.then_some(true),
            percentiles: None,
            slo_buckets: None,
            drain_timeout: None,
            force_timeout: None,
            max_in_flight: self.max_in_flight,
            backpressure: self
                .backpressure
                .as_deref()
                .map(BackpressureMode::from_str)
                .transpose()?,
            log_exporter: None,
            output: self.output.clone(),
        };
        Ok((self.task, self.config, options))
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("VAJRAPULSE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Resolves the four option layers into a run plan.
fn resolve_plan(
    config_path: Option<&PathBuf>,
    flags: Options,
) -> Result<RunPlan, ConfigError> {
    let file_layer = match config_path {
        Some(path) => FileConfig::load(path)?.into_options()?,
        None => Options::default(),
    };
    let env_layer = Options::from_env_vars(std::env::vars())?;
    let merged = Options::default().merge(file_layer).merge(env_layer).merge(flags);
    RunPlan::resolve(merged)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let (task_id, config_path, flags) = match cli.into_options() {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!(kind = e.variant_name(), error = %e, "invalid arguments");
            return ExitCode::from(2);
        }
    };
    let plan = match resolve_plan(config_path.as_ref(), flags) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!(kind = e.variant_name(), error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };
    let task = match tasks::resolve(&task_id) {
        Ok(task) => task,
        Err(e) => {
            tracing::error!(error = %e, "task resolution failed");
            return ExitCode::from(2);
        }
    };

    let mut runner = TestRunner::new(plan.settings.clone());
    if plan.settings.log_exporter {
        runner.add_exporter(Box::<LogExporter>::default());
    }
    if let Some(path) = &plan.settings.output {
        match JsonLinesExporter::create(path) {
            Ok(exporter) => runner.add_exporter(Box::new(exporter) as Box<dyn SnapshotExporter>),
            Err(e) => {
                tracing::error!(error = %e, "cannot open report output");
                return ExitCode::from(2);
            }
        }
    }

    let pattern = build_pattern(&plan, &mut runner);

    let shutdown = CancellationToken::new();
    spawn_signal_hook(shutdown.clone());

    match runner.run(task, pattern, &task_id, shutdown).await {
        Ok(report) => {
            tracing::info!(
                run_id = %report.context.run_id,
                reason = report.reason.label(),
                total = report.snapshot.total,
                failure = report.snapshot.failure,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = e.variant_name(), error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

/// Builds the live pattern for the plan, wiring the adaptive controller to
/// the runner's cached metrics view and registering its gauges.
fn build_pattern(plan: &RunPlan, runner: &mut TestRunner) -> Box<dyn LoadPattern> {
    let base: Box<dyn LoadPattern> = match &plan.pattern {
        PatternSpec::Adaptive { adaptive } => {
            let provider = runner.metrics_provider() as Arc<dyn MetricsProvider>;
            let controller =
                AdaptivePattern::new(adaptive.clone(), provider, plan.settings.max_in_flight);
            runner.add_gauge_source(controller.telemetry());
            Box::new(controller)
        }
        spec => pattern::from_spec(spec)
            .unwrap_or_else(|| unreachable!("non-adaptive specs always build")),
    };
    match (plan.settings.warmup, plan.settings.cooldown) {
        (None, None) => base,
        (warmup, cooldown) => Box::new(WarmupCooldown::new(
            base,
            warmup.unwrap_or_default(),
            cooldown.unwrap_or_default(),
        )),
    }
}

/// First Ctrl-C requests a graceful stop; the second aborts the process.
fn spawn_signal_hook(shutdown: CancellationToken) {
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("interrupt received; stopping gracefully (Ctrl-C again to abort)");
        shutdown.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("second interrupt; aborting");
            std::process::exit(130);
        }
    });
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flags_become_an_options_layer() {
        let cli = Cli::parse_from([
            "vajrapulse",
            "noop",
            "--mode",
            "static",
            "--tps",
            "250",
            "--duration",
            "90s",
            "--warmup",
            "500ms",
        ]);
        let (task, config, options) = cli.into_options().expect("options");
        assert_eq!(task, "noop");
        assert!(config.is_none());
        assert_eq!(options.mode, Some(LoadMode::Static));
        assert_eq!(options.tps, Some(250.0));
        assert_eq!(options.duration, Some(Duration::from_secs(90)));
        assert_eq!(options.warmup, Some(Duration::from_millis(500)));
    }

    #[test]
    fn bare_duration_numbers_are_seconds() {
        let cli = Cli::parse_from(["vajrapulse", "noop", "--tps", "10", "--duration", "30"]);
        let (_, _, options) = cli.into_options().expect("options");
        assert_eq!(options.duration, Some(Duration::from_secs(30)));
    }

    #[test]
    fn adaptive_flags_flow_through() {
        let cli = Cli::parse_from([
            "vajrapulse",
            "noop",
            "--mode",
            "adaptive",
            "--initial-tps",
            "5",
            "--max-tps",
            "unlimited",
            "--ramp-interval",
            "5s",
            "--error-threshold",
            "0.05",
        ]);
        let (_, _, options) = cli.into_options().expect("options");
        let plan = RunPlan::resolve(options).expect("plan");
        let adaptive = plan.adaptive().expect("adaptive");
        assert_eq!(adaptive.initial_tps, 5.0);
        assert_eq!(adaptive.max_tps, MaxRate::Unlimited);
        assert_eq!(adaptive.ramp_interval, Duration::from_secs(5));
    }

    #[test]
    fn invalid_mode_is_rejected() {
        let cli = Cli::parse_from(["vajrapulse", "noop", "--mode", "warp"]);
        assert!(cli.into_options().is_err());
    }
}
