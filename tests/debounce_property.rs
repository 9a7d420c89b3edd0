// tests/debounce_property.rs

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use watchman_rebuild::engine::DebounceScheduler;
use watchman_rebuild_test_utils::RecordingTrigger;

const DELAY_MS: u64 = 1_000;

fn path_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "flake.nix",
        "flake.lock",
        "hosts/laptop.nix",
        "hosts/server.nix",
        "modules/git.nix",
        "modules/shell/zsh.nix",
        "home/default.nix",
    ])
    .prop_map(str::to_string)
}

/// A burst: each notification arrives `gap` after the previous one, always
/// well inside the debounce delay.
fn burst_strategy() -> impl Strategy<Value = Vec<(u64, Vec<String>)>> {
    prop::collection::vec(
        (0..(DELAY_MS - 100), prop::collection::vec(path_strategy(), 1..4)),
        1..20,
    )
}

fn run_burst(burst: Vec<(u64, Vec<String>)>) -> (usize, BTreeSet<String>, BTreeSet<String>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    rt.block_on(async move {
        let trigger = RecordingTrigger::new();
        let scheduler =
            DebounceScheduler::spawn(Duration::from_millis(DELAY_MS), Arc::new(trigger.clone()));

        let mut expected = BTreeSet::new();
        for (gap, paths) in burst {
            tokio::time::sleep(Duration::from_millis(gap)).await;
            expected.extend(paths.iter().cloned());
            scheduler.notify(paths);
        }
        tokio::time::sleep(Duration::from_millis(DELAY_MS * 3)).await;

        let sets = trigger.path_sets();
        let first = sets.first().cloned().unwrap_or_default();
        (sets.len(), first, expected)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn burst_inside_delay_triggers_once_with_union(burst in burst_strategy()) {
        let (count, fired, expected) = run_burst(burst);
        prop_assert_eq!(count, 1);
        prop_assert_eq!(fired, expected);
    }
}
