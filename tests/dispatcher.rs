//! Integration tests for the work dispatcher
//!
//! Concurrency bounds are observed with a gauge the jobs update; real
//! transfers run against a mock HTTP server.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use tempfile::TempDir;
use tokio::sync::mpsc;

use condarepo::app::{
    DispatchConfig, Md5Hash, ResourceDescriptor, TransferEngine, TransferOptions,
    TransferOutcome, TransferRecord, WorkDispatcher,
};
use support::{dir_url, md5_hex};

fn descriptors(count: usize) -> Vec<ResourceDescriptor> {
    let base = url::Url::parse("http://127.0.0.1:9/linux-64/").unwrap();
    (0..count)
        .map(|i| {
            ResourceDescriptor::new(format!("pkg{}.tar.bz2", i), 0, Md5Hash::EMPTY, &base).unwrap()
        })
        .collect()
}

#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_with_workers(workers: usize, jobs: usize) -> (Vec<TransferRecord>, usize) {
    let gauge = Arc::new(Gauge::default());
    let dispatcher = WorkDispatcher::new(DispatchConfig::with_worker_count(workers));

    let job_gauge = gauge.clone();
    let records = dispatcher
        .dispatch_with(descriptors(jobs), move |descriptor| {
            let gauge = job_gauge.clone();
            async move {
                gauge.enter();
                tokio::time::sleep(Duration::from_millis(20)).await;
                gauge.leave();
                TransferRecord::already_present(descriptor.identifier())
            }
        })
        .await;

    (records, gauge.peak.load(Ordering::SeqCst))
}

#[tokio::test]
async fn test_every_descriptor_yields_one_record() {
    let jobs = 12;
    for workers in [1, 4, jobs] {
        let (records, _) = run_with_workers(workers, jobs).await;
        assert_eq!(records.len(), jobs, "{} workers", workers);

        let mut identifiers: Vec<_> = records.iter().map(|r| r.identifier.clone()).collect();
        identifiers.sort();
        identifiers.dedup();
        assert_eq!(identifiers.len(), jobs);
    }
}

#[tokio::test]
async fn test_concurrency_never_exceeds_worker_count() {
    for workers in [1, 3, 8] {
        let (_, peak) = run_with_workers(workers, 16).await;
        assert!(peak <= workers, "peak {} with {} workers", peak, workers);
        assert!(peak >= 1);
    }
}

#[tokio::test]
async fn test_more_workers_than_jobs() {
    let (records, peak) = run_with_workers(32, 3).await;
    assert_eq!(records.len(), 3);
    assert!(peak <= 3);
}

#[tokio::test]
async fn test_failing_job_does_not_stop_the_others() {
    let dispatcher = WorkDispatcher::new(DispatchConfig::with_worker_count(2));

    let records = dispatcher
        .dispatch_with(descriptors(6), |descriptor| async move {
            if descriptor.identifier() == "pkg3.tar.bz2" {
                panic!("transfer task died");
            }
            TransferRecord::already_present(descriptor.identifier())
        })
        .await;

    assert_eq!(records.len(), 6);
    let failed: Vec<_> = records.iter().filter(|r| !r.outcome.ok()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].identifier, "pkg3.tar.bz2");
    assert!(matches!(failed[0].outcome, TransferOutcome::UnknownError(_)));
}

#[tokio::test]
async fn test_shutdown_before_dispatch_processes_nothing() {
    let (shutdown_tx, _keep) = tokio::sync::broadcast::channel(1);
    let dispatcher =
        WorkDispatcher::new(DispatchConfig::with_worker_count(2)).with_shutdown(shutdown_tx.clone());

    // Receivers subscribe inside dispatch, so fire from within the first job.
    let records = dispatcher
        .dispatch_with(descriptors(10), move |descriptor| {
            let shutdown_tx = shutdown_tx.clone();
            async move {
                let _ = shutdown_tx.send(());
                tokio::time::sleep(Duration::from_millis(20)).await;
                TransferRecord::already_present(descriptor.identifier())
            }
        })
        .await;

    // Each worker finishes the entry it holds, then stops.
    assert!(!records.is_empty());
    assert!(records.len() <= 2);
}

#[tokio::test]
async fn test_real_transfers_with_progress() {
    let server = MockServer::start_async().await;
    let base = dir_url(&server, "linux-64");
    let mut descriptors = Vec::new();
    let mut mocks = Vec::new();
    for i in 0..5 {
        let body = format!("package body number {}", i).into_bytes();
        let name = format!("pkg{}-1.0-0.tar.bz2", i);
        let path = format!("/linux-64/{}", name);
        let reply = body.clone();
        mocks.push(
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path);
                    then.status(200).body(reply);
                })
                .await,
        );
        let checksum = Md5Hash::from_hex(&md5_hex(&body)).unwrap();
        descriptors.push(ResourceDescriptor::new(name, body.len() as u64, checksum, &base).unwrap());
    }
    let temp_dir = TempDir::new().unwrap();

    let (progress_tx, mut progress_rx) = mpsc::channel(16);
    let dispatcher =
        WorkDispatcher::new(DispatchConfig::with_worker_count(3)).with_progress(progress_tx);

    let options = TransferOptions {
        max_retries: 0,
        max_backoff: Duration::ZERO,
        ..Default::default()
    };
    let records = dispatcher
        .dispatch(
            descriptors,
            TransferEngine::new(reqwest::Client::new()),
            temp_dir.path(),
            &options,
        )
        .await;
    drop(dispatcher);

    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.outcome == TransferOutcome::Success));

    let mut progressed = 0;
    while let Some(record) = progress_rx.recv().await {
        assert!(record.outcome.was_downloaded());
        progressed += 1;
    }
    assert_eq!(progressed, 5);

    for mock in &mocks {
        assert_eq!(mock.hits_async().await, 1);
    }
    for i in 0..5 {
        let content = std::fs::read(temp_dir.path().join(format!("pkg{}-1.0-0.tar.bz2", i))).unwrap();
        assert_eq!(content, format!("package body number {}", i).into_bytes());
    }
}
