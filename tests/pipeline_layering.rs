// tests/pipeline_layering.rs

mod common;
use crate::common::{init_tracing, layers, pipeline};

use std::error::Error;
use std::time::Duration;

use buildgraph::dag::{
    BuildStatus, ParentFailureMode, Scheduled, Scheduler, SchedulerSettings, render_dot,
    topological_sort,
};
use buildgraph::dsl::{Parser, SettingsVerifier};
use buildgraph::errors::BuildGraphError;
use buildgraph::types::Edition;

type TestResult = Result<(), Box<dyn Error>>;

const RELEASE: &str = r#"
// release pipeline
_BUILD {
    maxDuration: 04:00
    buildThrottle: [08:00|1, "18:00|4"]
}

_ALL { agent: [linux] }

checkout -> compile -> "unit tests" -> package
compile -> lint
lint -> package -> publish

/* publishing may run anywhere,
   and it must not be skipped */
publish {
    agent: [any]
    onParentFailure: BUILD
    maxDuration: 30
}
"#;

fn release_verifier() -> SettingsVerifier {
    SettingsVerifier::new(
        ["checkout", "compile", "unit tests", "lint", "package", "publish"],
        ["linux", "windows"],
    )
}

#[test]
fn release_pipeline_layers() -> TestResult {
    init_tracing();
    let verifier = release_verifier();
    let build = Parser::new(RELEASE, &verifier)
        .with_edition(Edition::Pro)
        .parse()?;

    assert_eq!(
        build.job_ids().collect::<Vec<_>>(),
        vec!["checkout", "compile", "unit tests", "package", "lint", "publish"]
    );
    assert_eq!(build.scheduler_settings.max_duration, Duration::from_secs(4 * 3600));
    assert_eq!(build.scheduler_settings.throttles().len(), 2);

    let publish = &build.job("publish").ok_or("publish missing")?.settings;
    assert_eq!(publish.agent_names(), vec!["any"]);
    assert_eq!(publish.on_parent_failure, ParentFailureMode::Build);
    assert_eq!(publish.max_duration, Duration::from_secs(30 * 60));
    let lint = &build.job("lint").ok_or("lint missing")?.settings;
    assert_eq!(lint.agent_names(), vec!["linux"]);

    let layers = topological_sort(&build.jobs)?;
    assert!(!layers.has_cycle());
    assert_eq!(
        layers.ordered_layer_ids(),
        vec![
            vec!["checkout"],
            vec!["compile"],
            vec!["unit tests", "lint"],
            vec!["package"],
            vec!["publish"],
        ]
    );
    Ok(())
}

#[test]
fn community_edition_ignores_throttles() -> TestResult {
    let verifier = release_verifier();
    let build = Parser::new(RELEASE, &verifier).parse()?;
    assert!(build.scheduler_settings.throttles().is_empty());
    assert_eq!(build.scheduler_settings.max_duration, Duration::from_secs(4 * 3600));
    Ok(())
}

#[test]
fn release_pipeline_schedules_lint_next_to_tests() -> TestResult {
    let verifier = release_verifier();
    let build = Parser::new(RELEASE, &verifier).parse()?;
    let layers = topological_sort(&build.jobs)?;
    let mut scheduler = Scheduler::new(layers, build.scheduler_settings)?;

    let mut order = Vec::new();
    while scheduler.has_next() {
        match scheduler.get_next() {
            Scheduled::Job(job) => {
                order.push(job.id.clone());
                let status = if job.id == "lint" {
                    BuildStatus::Error
                } else {
                    BuildStatus::Success
                };
                scheduler.finish_build(&job.id, status)?;
            }
            Scheduled::Abort => break,
            other => panic!("unexpected {other:?}"),
        }
    }

    // package is skipped after lint failed; publish tolerates that
    assert_eq!(order, vec!["checkout", "compile", "unit tests", "lint", "publish"]);
    assert_eq!(scheduler.status("package"), Some(BuildStatus::ParentError));
    assert_eq!(scheduler.status("publish"), Some(BuildStatus::Success));
    assert!(scheduler.has_build_errors());
    assert!(scheduler.has_next());
    Ok(())
}

#[test]
fn cycle_is_reported_with_its_path() -> TestResult {
    let layers = layers("A -> B -> C -> D\nD -> B");
    assert!(layers.has_cycle());
    assert_eq!(layers.cycle(), ["C", "D", "B", "C"]);

    let err = Scheduler::new(layers, SchedulerSettings::default()).unwrap_err();
    assert!(matches!(err, BuildGraphError::BuildCycle(_)));
    assert_eq!(err.to_string(), "Build cycle detected: C -> D -> B -> C");
    Ok(())
}

#[test]
fn dot_export_lists_every_edge() {
    let dot = render_dot(&layers("A -> B; A -> C; \"unit tests\""));
    assert!(dot.starts_with("digraph {"), "{dot}");
    assert_eq!(dot.matches(" -> ").count(), 2, "{dot}");
    assert!(dot.contains("unit tests"), "{dot}");
}

#[test]
fn undefined_child_is_rejected_when_layering() {
    let mut build = pipeline("A -> B");
    build.jobs.retain(|job| job.id != "B");
    let err = topological_sort(&build.jobs).unwrap_err();
    assert!(matches!(err, BuildGraphError::JobNotFound(_)), "{err}");
}
