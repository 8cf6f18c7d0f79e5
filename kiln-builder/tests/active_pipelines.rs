//! Integration tests for the active pipeline registry under concurrency.

mod common;

use kiln_builder::{ActivePipelines, BuildLocks};
use kiln_core::domain::pipeline::{Pipeline, PipelineType};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Barrier;

const WRITERS: usize = 16;
const APPENDS_PER_WRITER: usize = 50;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_lose_nothing() {
    common::init_tracing();
    let active = Arc::new(ActivePipelines::new());

    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let active = Arc::clone(&active);
        handles.push(tokio::spawn(async move {
            for i in 0..APPENDS_PER_WRITER {
                active.append(Pipeline::new(
                    format!("pipeline-{writer}-{i}"),
                    PipelineType::Golang,
                ));
                tokio::task::yield_now().await;
            }
        }));
    }

    // Readers traverse while writers append; every traversal is consistent
    let reader = {
        let active = Arc::clone(&active);
        tokio::spawn(async move {
            for _ in 0..100 {
                let snapshot: Vec<_> = active.iter().collect();
                let names: HashSet<_> = snapshot.iter().map(|p| p.name.clone()).collect();
                assert_eq!(names.len(), snapshot.len());
                tokio::task::yield_now().await;
            }
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    reader.await.unwrap();

    assert_eq!(active.len(), WRITERS * APPENDS_PER_WRITER);

    let names: HashSet<String> = active.iter().map(|p| p.name).collect();
    for writer in 0..WRITERS {
        for i in 0..APPENDS_PER_WRITER {
            assert!(names.contains(&format!("pipeline-{writer}-{i}")));
        }
    }
}

#[test]
fn appends_from_os_threads_are_ordered_per_writer() {
    let active = Arc::new(ActivePipelines::new());

    std::thread::scope(|scope| {
        for writer in 0..4 {
            let active = Arc::clone(&active);
            scope.spawn(move || {
                for i in 0..100 {
                    active.append(Pipeline::new(format!("w{writer}-{i}"), PipelineType::Golang));
                }
            });
        }
    });

    assert_eq!(active.len(), 400);

    // Each writer's entries appear in the order it appended them
    for writer in 0..4 {
        let prefix = format!("w{writer}-");
        let seq: Vec<usize> = active
            .iter()
            .filter_map(|p| p.name.strip_prefix(&prefix).map(|n| n.parse().unwrap()))
            .collect();
        assert_eq!(seq, (0..100).collect::<Vec<_>>());
    }
}

#[test]
fn traversal_after_appends_is_repeatable() {
    let active = ActivePipelines::new();
    for name in ["alpha", "beta", "gamma"] {
        active.append(Pipeline::new(name, PipelineType::Golang));
    }

    let first: Vec<String> = active.iter().map(|p| p.name).collect();
    let second: Vec<String> = active.iter().map(|p| p.name).collect();

    assert_eq!(first, vec!["alpha", "beta", "gamma"]);
    assert_eq!(first, second);
    assert!(active.contains("beta"));
    assert!(!active.contains("delta"));
}

/// `contains` then `append` is not atomic. Two callers that both check before
/// either appends both see `false` and both append.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn check_then_act_race_is_observable() {
    let active = Arc::new(ActivePipelines::new());
    let barrier = Arc::new(Barrier::new(2));
    let saw_absent = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let active = Arc::clone(&active);
        let barrier = Arc::clone(&barrier);
        let saw_absent = Arc::clone(&saw_absent);
        handles.push(tokio::spawn(async move {
            let present = active.contains("demo");
            barrier.wait().await;
            if !present {
                saw_absent.fetch_add(1, Ordering::SeqCst);
                active.append(Pipeline::new("demo", PipelineType::Golang));
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(saw_absent.load(Ordering::SeqCst), 2);
    assert_eq!(active.iter().filter(|p| p.name == "demo").count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn append_if_absent_admits_exactly_one() {
    let active = Arc::new(ActivePipelines::new());
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let active = Arc::clone(&active);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            active.append_if_absent(Pipeline::new("demo", PipelineType::Golang))
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(active.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn build_locks_admit_exactly_one() {
    let locks = BuildLocks::new();
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let locks = locks.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let lease = locks.try_acquire("demo");
            let won = lease.is_some();
            // Hold the lease until every contender has tried
            barrier.wait().await;
            drop(lease);
            won
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(locks.in_flight(), 0);
}
