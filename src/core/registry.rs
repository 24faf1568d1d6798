/// Scenario registry — maps each scenario type to the loader that produces it.
use futures::future::{self, BoxFuture, FutureExt};
use rustc_hash::FxHashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::schema::scenario::{Scenario, ScenarioError, ScenarioType};

/// Produces a scenario definition on demand.
pub trait ScenarioLoader: Send + Sync {
    fn load(&self, scenario: ScenarioType) -> BoxFuture<'static, Result<Scenario, ScenarioError>>;
}

/// A RON definition compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedRon(pub &'static str);

impl ScenarioLoader for EmbeddedRon {
    fn load(&self, scenario: ScenarioType) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
        let parsed = Scenario::parse_ron(self.0).map_err(|e| ScenarioError::load_failure(scenario, e));
        future::ready(parsed).boxed()
    }
}

/// A RON definition read from disk each time it is loaded.
#[derive(Debug, Clone)]
pub struct RonFile(pub PathBuf);

impl ScenarioLoader for RonFile {
    fn load(&self, scenario: ScenarioType) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
        let path = self.0.clone();
        async move {
            Scenario::load_from_ron(&path)
                .map_err(|e| ScenarioError::load_failure(scenario, format!("{}: {e}", path.display())))
        }
        .boxed()
    }
}

/// Adapts an async closure into a loader.
pub struct FnLoader<F>(pub F);

impl<F, Fut> ScenarioLoader for FnLoader<F>
where
    F: Fn(ScenarioType) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Scenario, ScenarioError>> + Send + 'static,
{
    fn load(&self, scenario: ScenarioType) -> BoxFuture<'static, Result<Scenario, ScenarioError>> {
        (self.0)(scenario).boxed()
    }
}

/// The set of scenarios an application knows how to load.
#[derive(Clone, Default)]
pub struct ScenarioRegistry {
    loaders: FxHashMap<ScenarioType, Arc<dyn ScenarioLoader>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader, replacing any previous one for the same type.
    pub fn register<L>(&mut self, scenario: ScenarioType, loader: L)
    where
        L: ScenarioLoader + 'static,
    {
        self.loaders.insert(scenario, Arc::new(loader));
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<L>(mut self, scenario: ScenarioType, loader: L) -> Self
    where
        L: ScenarioLoader + 'static,
    {
        self.register(scenario, loader);
        self
    }

    pub fn loader(&self, scenario: ScenarioType) -> Result<Arc<dyn ScenarioLoader>, ScenarioError> {
        self.loaders
            .get(&scenario)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownScenarioType(scenario.tag().to_string()))
    }

    pub fn contains(&self, scenario: ScenarioType) -> bool {
        self.loaders.contains_key(&scenario)
    }

    /// Registered types in declaration order.
    pub fn types(&self) -> Vec<ScenarioType> {
        let mut types: Vec<ScenarioType> = self.loaders.keys().copied().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl std::fmt::Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRegistry")
            .field("types", &self.types())
            .finish()
    }
}
