//! The unit contract and the id → unit registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use conductor_shared::{Result, UnitOutput};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A pluggable, named asynchronous operation.
///
/// `process` may run for any finite time and may fail with any
/// [`ConductorError`](conductor_shared::ConductorError); the coordinator
/// converts both deadlines and errors into failed results.
///
/// A deadline stops the coordinator *waiting*: the `process` future is
/// dropped at its next suspension point, but anything the unit spawned onto
/// the runtime keeps running. Units that hold external resources must
/// release them on drop.
#[async_trait]
pub trait Unit: Send + Sync {
    /// Registry id. Lookups are exact and case-sensitive.
    fn id(&self) -> &str;

    /// Run the unit with the step's parameters.
    async fn process(&self, params: &Map<String, Value>) -> Result<UnitOutput>;

    /// Per-unit deadline; `None` defers to the coordinator default.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered units by id. Read-only once handed to a coordinator.
#[derive(Default, Clone)]
pub struct UnitRegistry {
    units: HashMap<String, Arc<dyn Unit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit under its own id, replacing any previous one.
    pub fn register(&mut self, unit: Arc<dyn Unit>) {
        let id = unit.id().to_string();
        if self.units.insert(id.clone(), unit).is_some() {
            warn!(unit_id = %id, "replacing previously registered unit");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, unit: impl Unit + 'static) -> Self {
        self.register(Arc::new(unit));
        self
    }

    pub fn get(&self, unit_id: &str) -> Option<Arc<dyn Unit>> {
        self.units.get(unit_id).cloned()
    }

    pub fn contains(&self, unit_id: &str) -> bool {
        self.units.contains_key(unit_id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.units.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitRegistry")
            .field("units", &self.ids())
            .finish()
    }
}
