/// Scenario cache — lazy, memoized loading with one load in flight per type.
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::registry::{ScenarioLoader, ScenarioRegistry};
use crate::core::sequence::Sequence;
use crate::schema::scenario::{Scenario, ScenarioError, ScenarioType};

type PendingLoad = Shared<BoxFuture<'static, Result<Arc<Scenario>, ScenarioError>>>;

enum Entry {
    Ready(Arc<Scenario>),
    Loading(PendingLoad),
}

/// Process-wide store of loaded scenarios.
///
/// Construct one at startup and share it by `Arc` with every engine. Callers
/// that miss the cache while a load for the same type is running wait on
/// that load instead of starting another. Failed loads are not cached.
pub struct ScenarioCache {
    registry: ScenarioRegistry,
    entries: Mutex<FxHashMap<ScenarioType, Entry>>,
    loads_started: AtomicUsize,
}

impl ScenarioCache {
    pub fn new(registry: ScenarioRegistry) -> Self {
        Self {
            registry,
            entries: Mutex::new(FxHashMap::default()),
            loads_started: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Return the cached scenario, loading it first if needed.
    pub async fn get(&self, scenario: ScenarioType) -> Result<Arc<Scenario>, ScenarioError> {
        let pending = {
            let mut entries = self.entries.lock();
            match entries.get(&scenario) {
                Some(Entry::Ready(loaded)) => return Ok(Arc::clone(loaded)),
                Some(Entry::Loading(pending)) => pending.clone(),
                None => {
                    let loader = self.registry.loader(scenario)?;
                    let pending = load_checked(loader, scenario).boxed().shared();
                    entries.insert(scenario, Entry::Loading(pending.clone()));
                    self.loads_started.fetch_add(1, Ordering::Relaxed);
                    debug!(scenario = %scenario, "loading scenario");
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut entries = self.entries.lock();
        // Only settle the entry this call waited on; `clear` may have replaced it.
        let owns_entry = matches!(
            entries.get(&scenario),
            Some(Entry::Loading(current)) if current.ptr_eq(&pending)
        );
        if owns_entry {
            match &result {
                Ok(loaded) => {
                    entries.insert(scenario, Entry::Ready(Arc::clone(loaded)));
                }
                Err(e) => {
                    warn!(scenario = %scenario, error = %e, "scenario load failed");
                    entries.remove(&scenario);
                }
            }
        }
        result
    }

    /// Load every registered scenario, returning each outcome.
    pub async fn preload_all(&self) -> Vec<(ScenarioType, Result<Arc<Scenario>, ScenarioError>)> {
        let loads = self
            .registry
            .types()
            .into_iter()
            .map(|scenario| async move { (scenario, self.get(scenario).await) });
        future::join_all(loads).await
    }

    /// Drop every cached scenario. Later `get` calls load again.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn is_cached(&self, scenario: ScenarioType) -> bool {
        matches!(self.entries.lock().get(&scenario), Some(Entry::Ready(_)))
    }

    /// Number of scenarios fully loaded.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times a loader has been invoked.
    pub fn loads_started(&self) -> usize {
        self.loads_started.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ScenarioCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioCache")
            .field("registry", &self.registry)
            .field("cached", &self.len())
            .finish()
    }
}

/// Run a loader and reject definitions that cannot be played.
async fn load_checked(
    loader: Arc<dyn ScenarioLoader>,
    scenario: ScenarioType,
) -> Result<Arc<Scenario>, ScenarioError> {
    let loaded = loader.load(scenario).await?;
    if loaded.id != scenario {
        return Err(ScenarioError::invalid(
            scenario,
            format!("definition declares id {}", loaded.id),
        ));
    }
    Sequence::generate(&loaded)?;
    Ok(Arc::new(loaded))
}
