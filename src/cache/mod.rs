// src/cache/mod.rs

//! Change-driven target selection and result reuse.
//!
//! [`DependencyCache`] answers three questions for a batch of file
//! changes: which targets are affected, which of those actually need to
//! run, and (after a run) what each target depended on and when it last
//! succeeded. Freshness is judged by modification times only.

mod scan;
mod targets;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use tracing::{debug, trace};

use crate::fs::{FileSystem, RealFileSystem};
use crate::model::TestSuite;
use crate::types::ChangeEvent;

use self::scan::{resolve, scan_dependencies};

/// The target that means "every package under the root".
pub const EVERYTHING: &str = "./...";

/// How long a successful run stays trustworthy without a rescan.
pub const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_secs(60);

/// What the cache knows about one target.
#[derive(Debug, Clone)]
pub struct DependencyRecord {
    pub target: String,
    /// When the target last ran successfully.
    pub last_run: SystemTime,
    /// Dependency files and their mtimes as of `last_run`.
    pub files: BTreeMap<PathBuf, SystemTime>,
    /// The suite produced by that run, when one was recorded.
    pub suite: Option<Arc<TestSuite>>,
}

/// Hit/miss counters for freshness lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Suite storage the parallel scheduler consults before running a unit.
pub trait SuiteCache: Send + Sync {
    /// A previously recorded suite for `target`, if it is still fresh.
    fn cached_suite(&self, target: &str) -> Option<TestSuite>;

    /// Record a successful run of `target`.
    fn store_suite(&self, target: &str, suite: &TestSuite);
}

#[derive(Debug)]
pub struct DependencyCache {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    recency_window: Duration,
    records: RwLock<HashMap<String, DependencyRecord>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DependencyCache {
    /// A cache over the real filesystem rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(Arc::new(RealFileSystem), root)
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            recency_window: DEFAULT_RECENCY_WINDOW,
            records: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_recency_window(mut self, window: Duration) -> Self {
        self.recency_window = window;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recency_window(&self) -> Duration {
        self.recency_window
    }

    /// Map a batch of changes to the deduplicated, sorted set of targets
    /// they affect.
    pub fn determine_targets(&self, changes: &[ChangeEvent]) -> Vec<String> {
        targets::determine_targets(self.fs.as_ref(), &self.root, changes)
    }

    /// The subset of `targets` that must run.
    ///
    /// Any creation or modification in `changes` means every target runs:
    /// the cache is only trusted when no edits are in flight. Otherwise a
    /// target is skipped only if it succeeded within the recency window and
    /// none of its recorded dependencies changed since.
    pub fn needs_execution(&self, targets: &[String], changes: &[ChangeEvent]) -> Vec<String> {
        if changes.iter().any(ChangeEvent::is_new_change) {
            debug!(targets = targets.len(), "edits in flight; bypassing cache");
            return targets.to_vec();
        }

        targets
            .iter()
            .filter(|target| {
                let fresh = self.is_fresh(target);
                self.count(fresh);
                !fresh
            })
            .cloned()
            .collect()
    }

    /// Rescan each target's dependencies and mark it as just having run.
    ///
    /// Only call this for targets that ran and did not error.
    pub fn update_cache(&self, targets: &[String]) {
        let fresh: Vec<DependencyRecord> = targets.iter().map(|t| self.build_record(t, None)).collect();
        let mut records = self.write();
        for record in fresh {
            trace!(target = %record.target, files = record.files.len(), "updated dependency record");
            records.insert(record.target.clone(), record);
        }
    }

    /// Like [`update_cache`](Self::update_cache) for one target, also
    /// keeping the suite it produced.
    pub fn record_success(&self, target: &str, suite: &TestSuite) {
        let record = self.build_record(target, Some(Arc::new(suite.clone())));
        self.write().insert(target.to_string(), record);
    }

    pub fn record(&self, target: &str) -> Option<DependencyRecord> {
        self.read().get(target).cloned()
    }

    pub fn invalidate(&self, target: &str) -> bool {
        self.write().remove(target).is_some()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn is_fresh(&self, target: &str) -> bool {
        // Snapshot under the lock, stat without it.
        let Some(record) = self.record(target) else {
            return false;
        };

        let age = SystemTime::now().duration_since(record.last_run).unwrap_or_default();
        if age >= self.recency_window {
            trace!(target, ?age, "record outside recency window");
            return false;
        }

        !self.dependencies_changed(&record)
    }

    fn dependencies_changed(&self, record: &DependencyRecord) -> bool {
        record.files.iter().any(|(file, recorded)| match self.fs.modified(file) {
            Ok(mtime) => {
                let changed = mtime > record.last_run || mtime != *recorded;
                if changed {
                    trace!(target = %record.target, file = %file.display(), "dependency changed");
                }
                changed
            }
            Err(_) => true,
        })
    }

    fn build_record(&self, target: &str, suite: Option<Arc<TestSuite>>) -> DependencyRecord {
        // Stamp first: a file edited while the scan runs must come out newer
        // than `last_run`.
        let last_run = SystemTime::now();
        let files = scan_dependencies(self.fs.as_ref(), &self.root, target);
        DependencyRecord {
            target: target.to_string(),
            last_run,
            files,
            suite,
        }
    }

    fn count(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, DependencyRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, DependencyRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of a target or file as the filesystem sees it.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve(&self.root, path)
    }
}

impl SuiteCache for DependencyCache {
    fn cached_suite(&self, target: &str) -> Option<TestSuite> {
        let suite = self
            .record(target)
            .and_then(|r| r.suite)
            .filter(|_| self.is_fresh(target))
            .map(|s| s.as_ref().clone());
        self.count(suite.is_some());
        suite
    }

    fn store_suite(&self, target: &str, suite: &TestSuite) {
        self.record_success(target, suite);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn past(secs: u64) -> SystemTime {
        SystemTime::now() - Duration::from_secs(secs)
    }

    fn cache_with(fs: &MockFileSystem) -> DependencyCache {
        DependencyCache::with_fs(Arc::new(fs.clone()), ".")
    }

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file_at("go.mod", past(600));
        fs.add_file_at("pkg/foo.go", past(600));
        fs.add_file_at("pkg/foo_test.go", past(600));
        fs
    }

    #[test]
    fn unknown_targets_need_execution() {
        let fs = project();
        let cache = cache_with(&fs);
        let targets = vec!["pkg".to_string()];
        assert_eq!(cache.needs_execution(&targets, &[]), targets);
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 1 });
    }

    #[test]
    fn recent_unchanged_targets_are_skipped_without_edits() {
        let fs = project();
        let cache = cache_with(&fs);
        let targets = vec!["pkg".to_string()];
        cache.update_cache(&targets);

        assert!(cache.needs_execution(&targets, &[ChangeEvent::deleted("other/x.go")]).is_empty());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn edits_in_flight_bypass_the_cache() {
        let fs = project();
        let cache = cache_with(&fs);
        let targets = vec!["pkg".to_string()];
        cache.update_cache(&targets);

        let changes = [ChangeEvent::modified("pkg/foo.go")];
        assert_eq!(cache.needs_execution(&targets, &changes), targets);
    }

    #[test]
    fn touched_dependency_makes_target_stale() {
        let fs = project();
        let cache = cache_with(&fs);
        let targets = vec!["pkg".to_string()];
        cache.update_cache(&targets);

        fs.add_file_at("pkg/foo.go", SystemTime::now() + Duration::from_secs(5));
        assert_eq!(cache.needs_execution(&targets, &[]), targets);
    }

    #[test]
    fn deleted_dependency_makes_target_stale() {
        let fs = project();
        let cache = cache_with(&fs);
        let targets = vec!["pkg".to_string()];
        cache.update_cache(&targets);

        fs.remove("pkg/foo.go");
        assert_eq!(cache.needs_execution(&targets, &[]), targets);
    }

    #[test]
    fn zero_window_never_trusts_the_cache() {
        let fs = project();
        let cache = cache_with(&fs).with_recency_window(Duration::ZERO);
        let targets = vec!["pkg".to_string()];
        cache.update_cache(&targets);
        assert_eq!(cache.needs_execution(&targets, &[]), targets);
    }

    #[test]
    fn suites_are_served_only_while_fresh() {
        let fs = project();
        let cache = cache_with(&fs);
        let suite = TestSuite::new("pkg", Vec::new(), Duration::from_millis(3));

        assert!(cache.cached_suite("pkg").is_none());
        cache.store_suite("pkg", &suite);
        assert_eq!(cache.cached_suite("pkg"), Some(suite));

        fs.add_file_at("pkg/foo_test.go", SystemTime::now() + Duration::from_secs(5));
        assert!(cache.cached_suite("pkg").is_none());
    }

    #[test]
    fn update_without_suite_serves_nothing() {
        let fs = project();
        let cache = cache_with(&fs);
        cache.update_cache(&["pkg".to_string()]);
        assert!(cache.cached_suite("pkg").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_and_clear() {
        let fs = project();
        let cache = cache_with(&fs);
        cache.update_cache(&["pkg".to_string(), EVERYTHING.to_string()]);
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate("pkg"));
        assert!(!cache.invalidate("pkg"));
        cache.clear();
        assert!(cache.is_empty());
    }

    /// Touches one file the first time it is stat'ed, as an editor saving
    /// while the dependency scan runs.
    #[derive(Debug)]
    struct EditDuringScan {
        inner: MockFileSystem,
        path: PathBuf,
        edited: std::sync::atomic::AtomicBool,
    }

    impl FileSystem for EditDuringScan {
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.inner.is_file(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.inner.is_dir(path)
        }

        fn modified(&self, path: &Path) -> anyhow::Result<SystemTime> {
            if path == self.path.as_path() && !self.edited.swap(true, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(2));
                self.inner.add_file_at(path, SystemTime::now());
            }
            self.inner.modified(path)
        }

        fn read_dir(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>> {
            self.inner.read_dir(path)
        }
    }

    #[test]
    fn edit_racing_the_scan_leaves_the_target_stale() {
        let fs = EditDuringScan {
            inner: project(),
            path: PathBuf::from("pkg/foo.go"),
            edited: Default::default(),
        };
        let cache = DependencyCache::with_fs(Arc::new(fs), ".");
        let pkg = vec!["pkg".to_string()];

        cache.update_cache(&pkg);
        let record = cache.record("pkg").unwrap();
        assert!(record.files[Path::new("pkg/foo.go")] > record.last_run);
        assert_eq!(cache.needs_execution(&pkg, &[]), pkg);
    }
}
