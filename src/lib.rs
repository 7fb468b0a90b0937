// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod dsl;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod time;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{BuildLayers, Scheduler, render_dot, topological_sort};
use crate::dsl::{ParsedBuild, Parser};
use crate::engine::{BuildReport, Runtime};
use crate::exec::ShellExecutor;
use crate::time::format_duration;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and pipeline parsing
/// - layering (`--dry-run`, `--dot` stop here)
/// - scheduler / runtime / shell executor
/// - Ctrl-C handling
///
/// Returns an error when the build does not succeed.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let config_dir = config_root_dir(&config_path);

    let source = cfg.pipeline_source(&config_dir)?;
    let verifier = cfg.verifier();
    let build = Parser::new(&source, &verifier)
        .with_edition(cfg.config.edition)
        .parse()?;
    let layers = topological_sort(&build.jobs)?;

    if args.dot {
        print!("{}", render_dot(&layers));
        return Ok(());
    }
    if args.dry_run {
        print_dry_run(&cfg, &build, &layers);
        layers.ensure_acyclic()?;
        return Ok(());
    }

    let scheduler = Scheduler::new(layers, build.scheduler_settings)?
        .with_edition(cfg.config.edition)
        .with_capacity(cfg.config.max_parallel)
        .with_partial_build(&args.from)?;
    let executor = ShellExecutor::new(cfg.job_commands()).with_working_dir(&config_dir);

    // Ctrl-C → cooperative cancellation.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = shutdown_tx.send(());
    });

    info!(
        config = %config_path.display(),
        edition = %cfg.config.edition,
        max_parallel = cfg.config.max_parallel,
        "starting build"
    );
    let report = Runtime::new(scheduler, executor)
        .with_poll_interval(cfg.poll_interval())
        .run(shutdown_rx)
        .await?;

    print_report(&report);
    if !report.is_success() {
        bail!("build finished with result {}", report.result);
    }
    Ok(())
}

/// Directory the pipeline file and job commands are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "ci/Buildgraph.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Buildgraph.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Dry-run output: settings, then layers or the cycle.
fn print_dry_run(cfg: &ConfigFile, build: &ParsedBuild, layers: &BuildLayers) {
    println!("buildgraph dry-run");
    println!("  config.edition = {}", cfg.config.edition);
    println!("  config.max_parallel = {}", cfg.config.max_parallel);
    println!(
        "  build.max_duration = {}",
        format_duration(build.scheduler_settings.max_duration)
    );
    for throttle in build.scheduler_settings.throttles() {
        println!(
            "  build.throttle = {}|{}",
            throttle.start.format("%H:%M"),
            throttle.executors
        );
    }
    println!();

    if layers.has_cycle() {
        println!("cycle: {}", layers.cycle().join(" -> "));
        return;
    }

    let ordered = layers.ordered_layer_ids();
    println!("layers ({}):", ordered.len());
    for (n, ids) in ordered.iter().enumerate() {
        println!("  {n}: {}", ids.join(", "));
    }
    println!();

    println!("jobs ({}):", build.jobs.len());
    for job in &build.jobs {
        println!("  - {}", job.id);
        if let Some(cfg_job) = cfg.job.get(&job.id) {
            println!("      cmd: {}", cfg_job.cmd);
        }
        if !job.settings.agents.is_empty() {
            println!("      agents: {:?}", job.settings.agent_names());
        }
        println!("      maxDuration: {}", format_duration(job.settings.max_duration));
        if job.settings.weight != 1 {
            println!("      weight: {}", job.settings.weight);
        }
        println!("      onParentFailure: {}", job.settings.on_parent_failure);
    }

    debug!("dry-run complete (no execution)");
}

/// One line per job with its status and run time.
fn print_report(report: &BuildReport) {
    let snapshot = &report.snapshot;
    println!(
        "build {}: {}/{} jobs finished in {}",
        report.result,
        snapshot.finished,
        snapshot.total,
        format_duration(snapshot.elapsed)
    );
    for job in &snapshot.jobs {
        let run_time = job
            .run_time
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<24} {:<12} {}", job.id, job.status.to_string(), run_time);
    }
}
