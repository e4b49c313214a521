//! Integration tests for the sampler loop.
//!
//! A scripted stats source drives the sampler against real sinks.

mod common;

use common::ScriptedSource;
use peekprof::error::SourceError;
use peekprof::sink::build_sinks;
use peekprof::{ExtractorPipeline, Sampler, SinkKind, SinkSpec};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_source_failure_ends_run_with_samples_so_far() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("out.csv");
    let html = dir.path().join("out.html");

    let sinks = build_sinks(
        &[
            SinkSpec::Tabular { path: csv.clone() },
            SinkSpec::Chart {
                path: html.clone(),
                process_name: "scripted".into(),
                live_host: None,
            },
        ],
        true,
    )
    .unwrap();

    // Third read fails.
    let source = Arc::new(ScriptedSource::new(vec![1000, 3000]));
    let interval = Duration::from_millis(20);
    let sampler = Sampler::new(source.clone(), 1, interval, ExtractorPipeline::new(sinks)).unwrap();

    let token = CancellationToken::new();
    let started = Instant::now();
    let report = tokio::time::timeout(Duration::from_secs(5), sampler.run(token.clone()))
        .await
        .expect("sampler stops on its own");

    assert!(token.is_cancelled());
    assert_eq!(report.samples, 2);
    assert_eq!(source.calls(), 3);
    assert!(matches!(report.source_error, Some(SourceError::ProcessGone { pid: 1 })));
    assert_eq!(report.peak.peak_kb(), 3000);
    assert!(started.elapsed() < Duration::from_secs(2));

    let written = report.export.unwrap();
    assert_eq!(
        written,
        vec![(SinkKind::Tabular, csv.clone()), (SinkKind::Chart, html.clone())]
    );

    let content = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(content.lines().count(), 3);

    let chart = std::fs::read_to_string(&html).unwrap();
    assert!(chart.contains("\"data\":[0,2]"));
}

#[tokio::test]
async fn test_cancellation_finalizes_once() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("cancel.csv");
    let sinks = build_sinks(&[SinkSpec::Tabular { path: csv.clone() }], false).unwrap();

    let source = Arc::new(ScriptedSource::endless().without_swap());
    let sampler = Sampler::new(
        source.clone(),
        1,
        Duration::from_millis(10),
        ExtractorPipeline::new(sinks),
    )
    .unwrap();

    let token = CancellationToken::new();
    let run = tokio::spawn(sampler.run(token.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let report = run.await.unwrap();
    assert!(report.source_error.is_none());
    assert!(report.samples >= 1);
    assert_eq!(report.peak.peak_kb(), report.samples as i64 * 1024);

    let content = std::fs::read_to_string(&csv).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("timestamp,rss kb,cpu%"));
    assert_eq!(lines.count() as u64, report.samples);
}

#[tokio::test(start_paused = true)]
async fn test_first_sample_after_one_interval() {
    let source = Arc::new(ScriptedSource::endless());
    let sampler = Sampler::new(
        source.clone(),
        1,
        Duration::from_secs(10),
        ExtractorPipeline::new(Vec::new()),
    )
    .unwrap();

    let token = CancellationToken::new();
    let run = tokio::spawn(sampler.run(token.clone()));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(source.calls(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    token.cancel();
    let report = run.await.unwrap();
    assert_eq!(report.samples, 1);
}
