// tests/ignore_filter.rs

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use notify::event::{DataChange, ModifyKind};
use notify::{Event, EventKind};
use tempfile::TempDir;

use watchman_rebuild::config::loader::load_daemon_config;
use watchman_rebuild::config::{load_ignore_patterns, RebuildCommand, IGNORE_CONFIG_FILE};
use watchman_rebuild::errors::RebuildError;
use watchman_rebuild::watch::notify_client::classify_event;
use watchman_rebuild::watch::{
    NotifyWatchClient, WatchClient, WatchFilter, WatchRoot, WatchSubscription,
};
use watchman_rebuild_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn write_ignore_file(dir: &TempDir, json: &str) -> std::io::Result<()> {
    fs::write(dir.path().join(IGNORE_CONFIG_FILE), json)
}

fn modified(path: PathBuf) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path)
}

#[test]
fn ignored_paths_never_reach_the_scheduler() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    write_ignore_file(&dir, r#"{ "ignore_patterns": ["*.tmp", "result/", ".direnv"] }"#)?;

    let patterns = load_ignore_patterns(dir.path());
    assert_eq!(patterns, vec!["*.tmp", "result", ".direnv"]);

    let subscription = WatchSubscription::new(
        WatchRoot {
            root: dir.path().to_path_buf(),
            relative_path: None,
        },
        WatchFilter::from_patterns(&patterns)?,
    );

    for ignored in ["scratch.tmp", "hosts/old.tmp", "result/sw/bin/hello", ".direnv/env"] {
        let event = modified(dir.path().join(ignored));
        assert_eq!(classify_event(&event, &subscription)?, None, "{ignored}");
    }

    let event = modified(dir.path().join("hosts/laptop.nix"));
    let batch = classify_event(&event, &subscription)?.expect("change should pass");
    assert_eq!(batch.files, vec!["hosts/laptop.nix"]);
    Ok(())
}

#[test]
fn malformed_ignore_file_watches_everything() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    write_ignore_file(&dir, "{ not json")?;
    assert!(load_ignore_patterns(dir.path()).is_empty());
    Ok(())
}

#[test]
fn daemon_config_requires_existing_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone");
    let err = load_daemon_config(&missing, Some("true".into())).unwrap_err();
    assert!(matches!(err, RebuildError::MissingConfigPath(p) if p == missing));
}

#[test]
fn daemon_config_keeps_explicit_command_and_patterns() -> TestResult {
    let dir = TempDir::new()?;
    write_ignore_file(&dir, r#"{ "ignore_patterns": ["*.swp"] }"#)?;

    let config = load_daemon_config(dir.path(), Some("make switch".into()))?;
    assert_eq!(config.command, RebuildCommand::explicit("make switch"));
    assert_eq!(config.ignore_patterns, vec!["*.swp"]);
    Ok(())
}

#[tokio::test]
async fn notify_client_reports_filtered_changes() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    fs::create_dir(dir.path().join("hosts"))?;
    let filter = WatchFilter::from_patterns(&["*.tmp".to_string()])?;

    let mut client = NotifyWatchClient::new(Duration::from_secs(2));
    let root = client.establish(dir.path())?;
    let subscription = WatchSubscription::new(root, filter);
    client.subscribe(&subscription)?;

    let first = client.receive().await?;
    assert!(first.is_fresh_instance);

    fs::write(dir.path().join("editor.tmp"), "x")?;
    fs::write(dir.path().join("hosts/laptop.nix"), "{ }")?;

    let batch = with_timeout(async {
        loop {
            match client.receive().await {
                Ok(batch) if !batch.is_fresh_instance => return batch,
                Ok(_) => continue,
                Err(err) if err.is_timeout() => continue,
                Err(err) => panic!("transport failed: {err}"),
            }
        }
    })
    .await;

    assert_eq!(batch.subscription, subscription.name);
    assert_eq!(batch.files, vec!["hosts/laptop.nix"]);

    client.close()?;
    assert!(!client.is_connected());
    Ok(())
}
