//! Engine registry: the directory from `EngineId` to `EngineRecord`.
//!
//! The foreign engine identifies engines only by integer, so the bridge
//! keeps one process-wide registry that the dispatcher resolves against.
//! Records are never removed.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracebridge_hostapi::EngineId;

use crate::record::EngineRecord;

#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: Mutex<HashMap<EngineId, Arc<EngineRecord>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` under its id.
    ///
    /// Returns false, leaving the registry unchanged, if the id is present.
    pub fn insert(&self, record: Arc<EngineRecord>) -> bool {
        let mut engines = self.engines.lock();
        if engines.contains_key(&record.id()) {
            return false;
        }
        engines.insert(record.id(), record);
        true
    }

    pub fn lookup(&self, id: EngineId) -> Option<Arc<EngineRecord>> {
        self.engines.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: EngineId) -> bool {
        self.engines.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry.
pub fn global() -> &'static EngineRegistry {
    static REGISTRY: OnceLock<EngineRegistry> = OnceLock::new();
    REGISTRY.get_or_init(EngineRegistry::new)
}
