// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Context isolation across threads and cooperative tasks.
//!
//! The same workload runs once on OS threads and once on interleaved tokio
//! tasks: four workers, each producing two scoped logs with disjoint value
//! ranges. Isolation holds when every worker's logs come out exactly as if
//! it ran alone.

use std::sync::Arc;

use scopelog::store::MemoryStore;
use scopelog::{fields, scoped, Client, ContextScope};

fn memory_client(project: &str) -> Arc<Client> {
    let store = Arc::new(MemoryStore::new());
    Arc::new(Client::with_store(store.clone(), store, project))
}

/// Two scoped logs per worker with values i*7 .. i*7+6, so every worker's
/// fields are globally unique. The outer log collects {a, b, c}, a nested
/// scope collects {d, e, f}, and `g` lands on the outer log after the inner
/// scope closes, exercising resumption of a suspended log.
fn run_worker(client: &Client, i: u64) {
    let _outer = client.log_scope(fields! { "a" => i * 7 }).unwrap();
    client.log(fields! { "b" => i * 7 + 1 }).unwrap();
    client.log(fields! { "c" => i * 7 + 2 }).unwrap();
    {
        let _inner = client.log_scope(fields! { "d" => i * 7 + 3 }).unwrap();
        client.log(fields! { "e" => i * 7 + 4 }).unwrap();
        client.log(fields! { "f" => i * 7 + 5 }).unwrap();
    }
    client.log(fields! { "g" => i * 7 + 6 }).unwrap();
}

async fn run_worker_interleaved(client: Arc<Client>, i: u64) {
    let _outer = client.log_scope(fields! { "a" => i * 7 }).unwrap();
    tokio::task::yield_now().await;
    client.log(fields! { "b" => i * 7 + 1 }).unwrap();
    tokio::task::yield_now().await;
    client.log(fields! { "c" => i * 7 + 2 }).unwrap();
    {
        let _inner = client.log_scope(fields! { "d" => i * 7 + 3 }).unwrap();
        tokio::task::yield_now().await;
        client.log(fields! { "e" => i * 7 + 4 }).unwrap();
        tokio::task::yield_now().await;
        client.log(fields! { "f" => i * 7 + 5 }).unwrap();
    }
    tokio::task::yield_now().await;
    client.log(fields! { "g" => i * 7 + 6 }).unwrap();
}

fn assert_worker_logs(client: &Client, i: u64) {
    let outer = fields! {
        "a" => i * 7,
        "b" => i * 7 + 1,
        "c" => i * 7 + 2,
        "g" => i * 7 + 6,
    };
    let inner = fields! {
        "d" => i * 7 + 3,
        "e" => i * 7 + 4,
        "f" => i * 7 + 5,
    };
    assert!(
        client.get_log_by_value(outer).unwrap().is_some(),
        "worker {i}: outer scoped log missing or polluted"
    );
    assert!(
        client.get_log_by_value(inner).unwrap().is_some(),
        "worker {i}: inner scoped log missing or polluted"
    );
}

// ============================================================================
// OS Threads
// ============================================================================

#[test]
fn test_threads_do_not_share_scope_state() {
    let client = memory_client("threaded");

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            std::thread::spawn(move || run_worker(&client, i))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(client.get_logs(None).unwrap().len(), 8);
    for i in 0..4 {
        assert_worker_logs(&client, i);
    }
}

#[test]
fn test_spawned_thread_starts_without_parent_scopes() {
    let client = memory_client("fresh-thread");

    let _ctx = ContextScope::enter("parent");
    let thread_client = client.clone();
    std::thread::spawn(move || {
        thread_client.log(fields! { "x" => 1 }).unwrap();
    })
    .join()
    .unwrap();

    // The thread's log carries no "parent/" prefix.
    assert!(client.get_log_by_value(fields! { "x" => 1 }).unwrap().is_some());
}

// ============================================================================
// Cooperative Tasks
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interleaved_tasks_do_not_share_scope_state() {
    let client = memory_client("tasked");

    let handles: Vec<_> = (0..4)
        .map(|i| tokio::spawn(scoped(run_worker_interleaved(client.clone(), i))))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(client.get_logs(None).unwrap().len(), 8);
    for i in 0..4 {
        assert_worker_logs(&client, i);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_inherits_snapshot_at_spawn() {
    let client = memory_client("snapshot");

    let task = {
        let _ctx = ContextScope::enter("parent");
        let task_client = client.clone();
        // Snapshot taken here, while "parent" is open.
        tokio::spawn(scoped(async move {
            tokio::task::yield_now().await;
            task_client.log(fields! { "x" => 1 }).unwrap();
        }))
    };
    // Parent scope is closed before the task necessarily runs; the task
    // still sees the path as of the spawn point.
    task.await.unwrap();

    assert!(client
        .get_log_by_value(fields! { "parent/x" => 1 })
        .unwrap()
        .is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_mutations_invisible_to_spawner() {
    let client = memory_client("one-way");

    let task_client = client.clone();
    tokio::spawn(scoped(async move {
        let _ctx = ContextScope::enter("task-only");
        tokio::task::yield_now().await;
        task_client.log(fields! { "inside" => 1 }).unwrap();
    }))
    .await
    .unwrap();

    client.log(fields! { "outside" => 2 }).unwrap();

    assert!(client
        .get_log_by_value(fields! { "task-only/inside" => 1 })
        .unwrap()
        .is_some());
    // The spawner's path never picked up the task's segment.
    assert!(client.get_log_by_value(fields! { "outside" => 2 }).unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sibling_tasks_see_disjoint_overlays() {
    let client = memory_client("siblings");

    let spawn_one = |segment: &'static str, value: u64| {
        let client = client.clone();
        tokio::spawn(scoped(async move {
            let _ctx = ContextScope::enter(segment);
            tokio::task::yield_now().await;
            client.log(fields! { "v" => value }).unwrap();
        }))
    };

    let a = spawn_one("alpha", 1);
    let b = spawn_one("beta", 2);
    a.await.unwrap();
    b.await.unwrap();

    assert!(client.get_log_by_value(fields! { "alpha/v" => 1 }).unwrap().is_some());
    assert!(client.get_log_by_value(fields! { "beta/v" => 2 }).unwrap().is_some());
}
