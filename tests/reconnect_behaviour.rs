// tests/reconnect_behaviour.rs

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

use watchman_rebuild::config::DaemonSettings;
use watchman_rebuild::engine::{DebounceScheduler, ReconnectLoop};
use watchman_rebuild::errors::RebuildError;
use watchman_rebuild::watch::{WatchBatch, WatchFilter};
use watchman_rebuild_test_utils::{
    init_tracing, with_timeout_of, FakeWatchClient, RecordingTrigger, Step,
};

const ROOT: &str = "/etc/nixos";

fn build_loop(
    client: &FakeWatchClient,
    trigger: &RecordingTrigger,
    settings: &DaemonSettings,
) -> ReconnectLoop<FakeWatchClient> {
    let scheduler = DebounceScheduler::spawn(settings.debounce_delay, Arc::new(trigger.clone()));
    ReconnectLoop::new(
        client.clone(),
        ROOT,
        WatchFilter::allow_all(),
        scheduler,
        settings,
    )
}

fn assert_spaced(instants: &[Instant], gap: Duration) {
    for pair in instants.windows(2) {
        let elapsed = pair[1] - pair[0];
        assert!(
            elapsed >= gap && elapsed < gap + Duration::from_millis(50),
            "attempts {elapsed:?} apart, expected {gap:?}"
        );
    }
}

fn changes(delay_secs: u64, files: &[&str]) -> Step {
    Step::Changes {
        delay: Duration::from_secs(delay_secs),
        files: files.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_ten_failed_connects() {
    init_tracing();
    let client = FakeWatchClient::new().fail_every_connect();
    let trigger = RecordingTrigger::new();
    let watcher = build_loop(&client, &trigger, &DaemonSettings::default());

    let result = with_timeout_of(
        Duration::from_secs(600),
        watcher.run(std::future::pending::<()>()),
    )
    .await;

    assert!(matches!(
        result,
        Err(RebuildError::ReconnectExhausted { attempts: 10 })
    ));
    let attempts = client.connect_attempts();
    assert_eq!(attempts.len(), 10);
    assert_spaced(&attempts, Duration::from_secs(5));
    assert_eq!(trigger.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn structural_error_mid_run_reconnects_then_gives_up() {
    init_tracing();
    let client = FakeWatchClient::new();
    client.push(changes(1, &["hosts/laptop.nix"]));
    client.push(Step::Crash);
    let trigger = RecordingTrigger::new();
    let watcher = build_loop(&client, &trigger, &DaemonSettings::default());

    let result = with_timeout_of(
        Duration::from_secs(600),
        watcher.run(std::future::pending::<()>()),
    )
    .await;

    assert!(matches!(
        result,
        Err(RebuildError::ReconnectExhausted { attempts: 10 })
    ));

    // One good connect, then ten failures after the drop.
    let attempts = client.connect_attempts();
    assert_eq!(attempts.len(), 11);
    assert_spaced(&attempts[1..], Duration::from_secs(5));
    assert!(!client.is_connected());

    // The change seen before the crash still went out: teardown waits for
    // the scheduler, and the debounce deadline passed long before.
    assert_eq!(trigger.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn fresh_instance_and_foreign_batches_are_ignored() {
    init_tracing();
    let client = FakeWatchClient::new();
    client.push(Step::Batch {
        delay: Duration::from_secs(1),
        batch: WatchBatch::changes("someone-else", vec!["other.nix".into()]),
    });
    client.push(Step::Batch {
        delay: Duration::from_secs(1),
        batch: WatchBatch::fresh_instance("watchman-rebuild", vec!["snapshot.nix".into()]),
    });
    client.push(Step::Batch {
        delay: Duration::from_secs(1),
        batch: WatchBatch::changes("watchman-rebuild", Vec::new()),
    });
    let trigger = RecordingTrigger::new();
    let watcher = build_loop(&client, &trigger, &DaemonSettings::default());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(watcher.run(async move {
        let _ = stop_rx.await;
    }));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(trigger.count(), 0);
    assert_eq!(client.subscriptions(), 1);

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn reconnect_resets_the_attempt_budget() {
    init_tracing();
    let settings = DaemonSettings::default();
    // Nine failures, then a success: one short of giving up. After the drop
    // the reconnect must succeed on a fresh budget.
    let client = FakeWatchClient::new().fail_connects(9);
    client.push(changes(1, &["hosts/laptop.nix"]));
    client.push(Step::Drop);
    client.push(changes(1, &["flake.nix"]));
    let trigger = RecordingTrigger::new();
    let watcher = build_loop(&client, &trigger, &settings);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(watcher.run(async move {
        let _ = stop_rx.await;
    }));

    // 9 failures x 5s, connect at t=45s, change at t=46s, drop, reconnect at
    // t=51s, second change at t=52s.
    sleep(Duration::from_secs(52)).await;
    assert_eq!(client.connect_attempts().len(), 11);
    assert_eq!(client.subscriptions(), 2);
    assert!(client.is_connected());

    sleep(Duration::from_secs(30)).await;

    let sets = trigger.path_sets();
    assert_eq!(sets.len(), 1);
    let expected: BTreeSet<String> = ["flake.nix", "hosts/laptop.nix"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(sets[0], expected);

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert!(!client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_a_pending_rebuild() {
    init_tracing();
    let client = FakeWatchClient::new();
    client.push(changes(1, &["hosts/laptop.nix"]));
    let trigger = RecordingTrigger::new();
    let watcher = build_loop(&client, &trigger, &DaemonSettings::default());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(watcher.run(async move {
        let _ = stop_rx.await;
    }));

    sleep(Duration::from_secs(5)).await;
    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    sleep(Duration::from_secs(30)).await;
    assert_eq!(trigger.count(), 0);
    assert!(client.closes() >= 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_lets_a_running_rebuild_finish() {
    init_tracing();
    let client = FakeWatchClient::new();
    client.push(changes(1, &["hosts/laptop.nix"]));
    let trigger = RecordingTrigger::new().busy_for(Duration::from_secs(30));
    let watcher = build_loop(&client, &trigger, &DaemonSettings::default());
    let start = Instant::now();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(watcher.run(async move {
        let _ = stop_rx.await;
    }));

    // Change at t=1s, rebuild from t=11s to t=41s.
    sleep(Duration::from_secs(20)).await;
    assert_eq!(trigger.count(), 1);
    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert!(Instant::now() - start >= Duration::from_secs(41));
}
