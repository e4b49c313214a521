//! Integration tests for a full monitored run.
//!
//! A real child command drives the lifecycle while a scripted source
//! stands in for the stats reader.

mod common;

use common::ScriptedSource;
use peekprof::child::spawn_command;
use peekprof::console::OutputMode;
use peekprof::{spawn_run, LifecycleCoordinator, Phase, RunOptions, SinkKind, SinkSpec, Target};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn options(sinks: Vec<SinkSpec>) -> RunOptions {
    RunOptions {
        interval: Duration::from_millis(100),
        sinks,
        output: OutputMode::None,
        ..RunOptions::default()
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_child_exit_ends_run_and_writes_csv() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("child.csv");

    let child = spawn_command("sleep 0.5", false).unwrap();
    let source = Arc::new(ScriptedSource::endless());

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        LifecycleCoordinator::new().run(
            source,
            Target::Child(child),
            options(vec![SinkSpec::Tabular { path: csv.clone() }]),
        ),
    )
    .await
    .expect("run ends when the command exits")
    .unwrap();

    assert!(summary.is_success());
    assert!(summary.source_error.is_none());
    assert!(
        (4..=6).contains(&summary.samples),
        "unexpected sample count {}",
        summary.samples
    );
    assert!(summary.elapsed >= Duration::from_millis(400));

    let written = summary.export.unwrap();
    assert_eq!(written, vec![(SinkKind::Tabular, csv.clone())]);

    let content = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(content.lines().count() as u64, summary.samples + 1);
    assert_eq!(summary.peak.peak_kb(), summary.samples as i64 * 1024);
}

#[tokio::test]
async fn test_external_cancel_finalizes_chart() {
    let dir = tempdir().unwrap();
    let html = dir.path().join("run.html");

    let (token, task) = spawn_run(
        Arc::new(ScriptedSource::endless()),
        Target::Pid(1),
        RunOptions {
            interval: Duration::from_millis(20),
            ..options(vec![SinkSpec::Chart {
                path: html.clone(),
                process_name: "scripted".into(),
                live_host: None,
            }])
        },
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    token.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(summary.is_success());
    assert!(summary.samples > 0);
    assert!(summary.live_addr.is_none());

    let page = std::fs::read_to_string(&html).unwrap();
    assert!(page.contains("scripted"));
    assert!(!page.contains("EventSource"));
}

#[tokio::test]
async fn test_live_run_binds_and_shuts_down() {
    let dir = tempdir().unwrap();
    let html = dir.path().join("live.html");

    let coordinator = LifecycleCoordinator::new();
    let token = coordinator.token();
    assert_eq!(coordinator.phase(), Phase::Starting);

    let run = tokio::spawn(coordinator.run(
        Arc::new(ScriptedSource::endless()),
        Target::Pid(1),
        RunOptions {
            interval: Duration::from_millis(20),
            live_host: Some("127.0.0.1:0".into()),
            shutdown_timeout: Duration::from_secs(2),
            ..options(vec![SinkSpec::Chart {
                path: html.clone(),
                process_name: "scripted".into(),
                live_host: Some("127.0.0.1:0".into()),
            }])
        },
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("drain completes within the shutdown timeout")
        .unwrap()
        .unwrap();

    assert!(summary.is_success());
    let addr = summary.live_addr.expect("server was started");
    assert_eq!(addr.ip().to_string(), "127.0.0.1");
    assert_ne!(addr.port(), 0);

    // Finalize rewrites the live page in place with the collected samples.
    let page = std::fs::read_to_string(&html).unwrap();
    assert_eq!(page.matches("<!DOCTYPE html>").count(), 1);
    assert!(page.contains("http://127.0.0.1:0/process/updates"));
    assert!(summary.samples > 0);
}
