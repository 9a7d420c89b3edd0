// tests/rebuild_executor.rs

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use watchman_rebuild::config::RebuildCommand;
use watchman_rebuild::exec::{RebuildExecutor, RebuildTrigger};
use watchman_rebuild::lock::{LockStatus, RebuildLock};
use watchman_rebuild::types::{NotificationKind, RebuildOutcome};
use watchman_rebuild_test_utils::{init_tracing, RecordingNotifier};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn executor(
    workdir: &Path,
    state: &Path,
    line: &str,
    notifier: &RecordingNotifier,
) -> RebuildExecutor<RecordingNotifier> {
    RebuildExecutor::new(
        workdir,
        RebuildCommand::explicit(line),
        RebuildLock::new(state.join("watchman-rebuild.lock")),
        notifier.clone(),
    )
}

#[tokio::test]
async fn success_runs_in_config_root_with_unfree_allowed() -> TestResult {
    init_tracing();
    let config = TempDir::new()?;
    let state = TempDir::new()?;
    let notifier = RecordingNotifier::new();
    let exec = executor(
        config.path(),
        state.path(),
        r#"printf '%s\n' "$PWD" "$NIXPKGS_ALLOW_UNFREE" > out.txt"#,
        &notifier,
    );

    assert_eq!(exec.run().await?, RebuildOutcome::Succeeded);
    assert_eq!(notifier.sent(), vec![NotificationKind::Success]);
    assert!(!exec.lock().is_held());

    let out = fs::read_to_string(config.path().join("out.txt"))?;
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(fs::canonicalize(lines[0])?, fs::canonicalize(config.path())?);
    assert_eq!(lines[1], "1");
    Ok(())
}

#[tokio::test]
async fn failure_notifies_releases_lock_and_allows_the_next_attempt() -> TestResult {
    init_tracing();
    let config = TempDir::new()?;
    let state = TempDir::new()?;
    let notifier = RecordingNotifier::new();
    let exec = executor(config.path(), state.path(), "exit 3", &notifier);

    assert_eq!(
        exec.run().await?,
        RebuildOutcome::Failed { exit_code: Some(3) }
    );
    assert!(!exec.lock().is_held());

    // The daemon keeps going: the next change gets a fresh attempt.
    assert_eq!(
        exec.run().await?,
        RebuildOutcome::Failed { exit_code: Some(3) }
    );
    assert_eq!(
        notifier.sent(),
        vec![NotificationKind::Failure, NotificationKind::Failure]
    );
    Ok(())
}

#[tokio::test]
async fn busy_lock_skips_without_running() -> TestResult {
    init_tracing();
    let config = TempDir::new()?;
    let state = TempDir::new()?;
    let notifier = RecordingNotifier::new();
    let exec = executor(config.path(), state.path(), "touch ran", &notifier);

    let other = RebuildLock::new(state.path().join("watchman-rebuild.lock"));
    let LockStatus::Acquired(held) = other.acquire()? else {
        panic!("lock should be free");
    };

    assert_eq!(exec.run().await?, RebuildOutcome::Skipped);
    assert!(!config.path().join("ran").exists());
    assert!(notifier.sent().is_empty());

    held.release();
    assert_eq!(exec.run().await?, RebuildOutcome::Succeeded);
    assert!(config.path().join("ran").exists());
    Ok(())
}

#[tokio::test]
async fn launch_failure_still_releases_lock_and_notifies() -> TestResult {
    init_tracing();
    let state = TempDir::new()?;
    let missing = state.path().join("no-such-config");
    let notifier = RecordingNotifier::new();
    let exec = executor(&missing, state.path(), "true", &notifier);

    assert!(exec.run().await.is_err());
    assert!(!exec.lock().is_held());
    assert_eq!(notifier.sent(), vec![NotificationKind::Failure]);
    Ok(())
}

#[tokio::test]
async fn notification_errors_do_not_change_the_outcome() -> TestResult {
    init_tracing();
    let config = TempDir::new()?;
    let state = TempDir::new()?;
    let notifier = RecordingNotifier::failing();
    let exec = executor(config.path(), state.path(), "true", &notifier);

    assert_eq!(exec.run().await?, RebuildOutcome::Succeeded);
    assert_eq!(notifier.sent(), vec![NotificationKind::Success]);
    Ok(())
}

#[tokio::test]
async fn trigger_runs_the_command_once_per_batch() -> TestResult {
    init_tracing();
    let config = TempDir::new()?;
    let state = TempDir::new()?;
    let notifier = RecordingNotifier::new();
    let exec = executor(config.path(), state.path(), "echo run >> runs.txt", &notifier);

    let paths: BTreeSet<String> = (0..15).map(|i| format!("modules/m{i}.nix")).collect();
    exec.trigger(paths.clone()).await;
    exec.trigger(paths).await;

    let runs = fs::read_to_string(config.path().join("runs.txt"))?;
    assert_eq!(runs.lines().count(), 2);
    assert_eq!(notifier.sent().len(), 2);
    Ok(())
}
