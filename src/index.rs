// content-index/src/index.rs
//! The content index: fingerprint -> current path, refreshed wholesale.
//!
//! One rebuild at a time, guarded by a latch taken before any work starts
//! and released only after the swap and save (or the abort). Readers take a
//! cheap `Arc` clone of the live state and never wait on a rebuild; a new
//! mapping becomes visible only once the whole walk has finished.

use parking_lot::RwLock;
use rayon::iter::{
    ParallelBridge,
    ParallelIterator
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{
            AtomicBool,
            AtomicU64,
            Ordering
        },
        Arc,
    },
    thread::{
        self,
        JoinHandle
    },
    time::{
        Duration,
        Instant
    },
};
use tracing::{
    debug,
    error,
    info,
    warn
};
use crate::{
    config::IndexConfig,
    diff::{
        diff_mappings,
        MappingDiff
    },
    error::{
        IndexError,
        Result
    },
    hasher::{
        ContentHasher,
        Sha256Hasher
    },
    store::{
        self,
        Mapping,
        Snapshot
    },
    util,
    walker::ImageWalker,
};


/// A completed build: the mapping and the time that build started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexState {
    pub mapping: Mapping,
    /// Epoch millis; 0 = never built.
    pub last_build: i64,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// Another rebuild held the latch; this request was dropped.
    AlreadyRunning,
    /// Not stale, nothing to do.
    Fresh,
    /// The walk failed; the previous mapping is still live.
    Aborted(IndexError),
}

impl RefreshOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RefreshOutcome::Completed(_))
    }
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub started_at: i64,
    pub elapsed: Duration,
    pub indexed: usize,
    /// Files found by the walk whose hashing failed.
    pub skipped: usize,
    /// False when the swap happened but the checkpoint write failed.
    pub persisted: bool,
    pub diff: MappingDiff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub entries: usize,
    pub last_build: i64,
    pub builds_completed: u64,
    pub refreshing: bool,
}

/// Where an indexed file lives relative to the configured roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// First configured root containing `path`, if any.
    pub root: Option<PathBuf>,
    /// `path` with `root` stripped; the full path when no root matches.
    pub relative: PathBuf,
}

#[derive(Debug, Clone, Default)]
struct RefreshLatch(Arc<AtomicBool>);

/// Held for the whole of one rebuild. Releases the latch on drop, panics
/// included.
#[derive(Debug)]
struct RefreshGuard(Arc<AtomicBool>);

impl RefreshLatch {
    fn try_acquire(&self) -> Option<RefreshGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard(Arc::clone(&self.0)))
    }

    fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct ScanResult {
    mapping: Mapping,
    indexed: usize,
    skipped: usize,
}

pub struct ContentIndex {
    config: IndexConfig,
    hasher: Arc<dyn ContentHasher>,
    state: RwLock<Arc<IndexState>>,
    latch: RefreshLatch,
    builds: AtomicU64,
}

impl ContentIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_hasher(config, Arc::new(Sha256Hasher))
    }

    pub fn with_hasher(config: IndexConfig, hasher: Arc<dyn ContentHasher>) -> Self {
        Self {
            config,
            hasher,
            state: RwLock::new(Arc::new(IndexState::default())),
            latch: RefreshLatch::default(),
            builds: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Install the saved checkpoint as the live state without rebuilding.
    /// On any error the live state is reset to empty and never built, and
    /// the error is returned so the caller can force a rebuild.
    pub fn load(&self) -> Result<()> {
        match store::try_load(&self.config.cache_file) {
            Ok(Some(snap)) => {
                info!(
                    path = %self.config.cache_file.display(),
                    entries = snap.mappings.len(),
                    last_build = %util::format_millis(snap.last_update),
                    "loaded content index"
                );
                self.install(snap);
                Ok(())
            }
            Ok(None) => {
                info!(path = %self.config.cache_file.display(), "no saved content index");
                self.install(Snapshot::default());
                Ok(())
            }
            Err(err) => {
                self.install(Snapshot::default());
                Err(err)
            }
        }
    }

    /// Load the checkpoint, then start a background rebuild if it is stale,
    /// missing, or unreadable. Returns once the loaded state is live.
    pub fn initialize(self: &Arc<Self>) -> Option<JoinHandle<RefreshOutcome>> {
        let force = match self.load() {
            Ok(()) => false,
            Err(err) => {
                error!(error = %err, "error initializing content index, forcing rebuild");
                true
            }
        };

        if force || self.is_stale_at(util::now_millis()) {
            self.spawn_update_cache()
        } else {
            None
        }
    }

    /// Stale once strictly more than the interval has passed since the last
    /// build started.
    pub fn is_stale_at(&self, now_ms: i64) -> bool {
        let last = self.state.read().last_build;
        let interval = i64::try_from(self.config.update_interval_ms).unwrap_or(i64::MAX);
        now_ms.saturating_sub(last) > interval
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(util::now_millis())
    }

    /// Kick off a background rebuild if one is due. Never blocks; lookups
    /// keep using the current mapping meanwhile.
    pub fn ensure_updated(self: &Arc<Self>) -> Option<JoinHandle<RefreshOutcome>> {
        if self.is_stale() {
            self.spawn_update_cache()
        } else {
            None
        }
    }

    /// Blocking form of `ensure_updated` with an explicit clock.
    pub fn ensure_updated_at(&self, now_ms: i64) -> RefreshOutcome {
        if self.is_stale_at(now_ms) {
            self.update_cache()
        } else {
            RefreshOutcome::Fresh
        }
    }

    /// Rebuild now on the calling thread, regardless of staleness.
    pub fn update_cache(&self) -> RefreshOutcome {
        match self.latch.try_acquire() {
            Some(guard) => self.rebuild(guard),
            None => {
                debug!("rebuild already in progress, dropping request");
                RefreshOutcome::AlreadyRunning
            }
        }
    }

    /// Fire-and-forget rebuild. `None` when one is already running.
    pub fn spawn_update_cache(self: &Arc<Self>) -> Option<JoinHandle<RefreshOutcome>> {
        let Some(guard) = self.latch.try_acquire() else {
            debug!("rebuild already in progress, dropping request");
            return None;
        };
        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("content-index-refresh".into())
            .spawn(move || this.rebuild(guard));
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                // guard was moved into the closure and dropped with it
                error!(error = %err, "failed to spawn rebuild thread");
                None
            }
        }
    }

    pub fn get_path(&self, fingerprint: &str) -> Option<PathBuf> {
        self.state.read().mapping.get(fingerprint).cloned()
    }

    pub fn locate(&self, fingerprint: &str) -> Option<Location> {
        let path = self.get_path(fingerprint)?;
        let hit = self
            .config
            .roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok().map(|rel| (root.clone(), rel.to_path_buf())));
        let (root, relative) = match hit {
            Some((root, rel)) => (Some(root), rel),
            None => (None, path.clone()),
        };
        Some(Location { path, root, relative })
    }

    /// The live state as of this call. Later swaps do not affect it.
    pub fn snapshot(&self) -> Arc<IndexState> {
        Arc::clone(&self.state.read())
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.snapshot();
        IndexStats {
            entries: state.mapping.len(),
            last_build: state.last_build,
            builds_completed: self.builds.load(Ordering::Relaxed),
            refreshing: self.latch.is_held(),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.latch.is_held()
    }

    fn install(&self, snap: Snapshot) {
        let state = IndexState { mapping: snap.mappings, last_build: snap.last_update };
        *self.state.write() = Arc::new(state);
    }

    fn rebuild(&self, _guard: RefreshGuard) -> RefreshOutcome {
        let started_at = util::now_millis();
        let timer = Instant::now();
        info!(roots = ?self.config.roots, "rebuilding content index");

        let scan = match self.scan() {
            Ok(scan) => scan,
            Err(err) => {
                error!(error = %err, "rebuild aborted, keeping previous index");
                return RefreshOutcome::Aborted(err);
            }
        };

        let next = Arc::new(IndexState { mapping: scan.mapping, last_build: started_at });
        let previous = std::mem::replace(&mut *self.state.write(), Arc::clone(&next));
        self.builds.fetch_add(1, Ordering::Relaxed);

        let diff = diff_mappings(&previous.mapping, &next.mapping);
        let persisted = store::save_logged(&self.config.cache_file, started_at, &next.mapping);
        let elapsed = timer.elapsed();

        info!(
            indexed = scan.indexed,
            skipped = scan.skipped,
            added = diff.added.len(),
            removed = diff.removed.len(),
            moved = diff.moved.len(),
            persisted,
            elapsed_ms = elapsed.as_millis() as u64,
            "content index rebuilt"
        );

        RefreshOutcome::Completed(RefreshReport {
            started_at,
            elapsed,
            indexed: scan.indexed,
            skipped: scan.skipped,
            persisted,
            diff,
        })
    }

    /// Walk every root and hash on a bounded pool. Workers only return
    /// results tagged with their walk position; this thread alone builds the
    /// new mapping, inserting in walk order so that among identical files
    /// the last one walked wins on every rebuild.
    fn scan(&self) -> Result<ScanResult> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.hash_threads.unwrap_or(0))
            .thread_name(|i| format!("content-hash-{i}"))
            .build()?;
        let walker = ImageWalker::new(self.config.roots.clone(), self.config.walk_options());
        let hasher = &*self.hasher;

        let mut hashed: Vec<(usize, Option<(String, PathBuf)>)> = pool.install(|| {
            walker
                .enumerate()
                .par_bridge()
                .map(|(seq, item)| -> Result<(usize, Option<(String, PathBuf)>)> {
                    let path = item?;
                    match hasher.fingerprint(&path) {
                        Ok(fp) => {
                            debug!(path = %path.display(), fingerprint = %fp, "processed file");
                            Ok((seq, Some((fp, path))))
                        }
                        Err(err) if err.is_per_file() => {
                            warn!(error = %err, "skipping file");
                            Ok((seq, None))
                        }
                        Err(err) => {
                            error!(path = %path.display(), error = %err, "hasher failed, skipping file");
                            Ok((seq, None))
                        }
                    }
                })
                .collect::<Result<Vec<_>>>()
        })?;
        hashed.sort_unstable_by_key(|(seq, _)| *seq);

        let mut mapping = Mapping::with_capacity(hashed.len());
        let mut skipped = 0;
        for (_, entry) in hashed {
            match entry {
                Some((fp, path)) => {
                    mapping.insert(fp, path);
                }
                None => skipped += 1,
            }
        }
        let indexed = mapping.len();
        Ok(ScanResult { mapping, indexed, skipped })
    }
}
