// tests/properties.rs

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use proptest::prelude::*;
use sentinel::cache::DependencyCache;
use sentinel::fs::mock::MockFileSystem;
use sentinel::model::{ExecutionResult, PackageResult, TestCounts, TestStatus};
use sentinel::parse::parse_output;
use sentinel::types::{ChangeEvent, ChangeKind};
use sentinel_test_utils::builders::{test_result, text_output};

fn status() -> impl Strategy<Value = TestStatus> {
    prop_oneof![
        Just(TestStatus::Pass),
        Just(TestStatus::Fail),
        Just(TestStatus::Skip),
    ]
}

fn kind() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        Just(ChangeKind::Created),
        Just(ChangeKind::Modified),
        Just(ChangeKind::Deleted),
    ]
}

proptest! {
    #[test]
    fn parsing_the_same_output_twice_agrees(statuses in prop::collection::vec(status(), 0..40)) {
        let names: Vec<String> = (0..statuses.len()).map(|i| format!("Test{i}")).collect();
        let pairs: Vec<(&str, TestStatus)> = names.iter().map(String::as_str).zip(statuses.iter().copied()).collect();
        let output = text_output(&pairs);

        let first = parse_output(&output, "pkg");
        let second = parse_output(&output, "pkg");
        prop_assert_eq!(&first, &second);

        let got: Vec<TestStatus> = first.iter().map(|t| t.status).collect();
        prop_assert_eq!(got, statuses);
    }

    #[test]
    fn totals_always_add_up(statuses in prop::collection::vec(status(), 0..60)) {
        let tests: Vec<_> = statuses.iter().map(|s| test_result("TestX", "pkg", *s)).collect();
        let counts = TestCounts::tally(&tests);
        prop_assert_eq!(counts.total, counts.passed + counts.failed + counts.skipped);
        prop_assert_eq!(counts.total, statuses.len());
    }

    #[test]
    fn execution_never_ends_before_it_starts(start_offset in 0u64..10_000, end_offset in 0u64..10_000) {
        let epoch = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let start = epoch + Duration::from_millis(start_offset);
        let end = epoch + Duration::from_millis(end_offset);

        let result = ExecutionResult::from_packages(Vec::<PackageResult>::new(), start, end);
        prop_assert!(result.end_time >= result.start_time);
        prop_assert_eq!(result.total_duration, result.end_time.duration_since(result.start_time).unwrap_or_default());
    }

    #[test]
    fn any_new_change_reruns_every_target(
        kinds in prop::collection::vec(kind(), 1..8),
        count in 1usize..6,
    ) {
        let fs = MockFileSystem::new();
        let targets: Vec<String> = (0..count).map(|i| format!("pkg{i}")).collect();
        for target in &targets {
            fs.add_file_at(format!("{target}/a.go"), SystemTime::now() - Duration::from_secs(600));
        }
        let cache = DependencyCache::with_fs(Arc::new(fs), ".");
        cache.update_cache(&targets);

        let changes: Vec<ChangeEvent> = kinds
            .iter()
            .enumerate()
            .map(|(i, k)| ChangeEvent::new(format!("pkg0/f{i}.go"), *k))
            .collect();

        let needed = cache.needs_execution(&targets, &changes);
        if kinds.iter().any(|k| k.is_new_change()) {
            prop_assert_eq!(needed, targets);
        } else {
            prop_assert!(needed.is_empty());
        }
    }
}
