//! Per-engine record: host-function table and log subscriber.
//!
//! Each record guards its own table, so registration and dispatch against
//! different engines never contend. Lookups hand out `Arc`s so callers can
//! drop the lock before invoking a callback.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracebridge_hostapi::{CallShape, EngineId, FatalError};

use crate::descriptor::HostFunction;

/// Receives each execution-log item as a JSON fragment.
pub type LogSubscriber = Arc<dyn Fn(&str) + Send + Sync>;

pub struct EngineRecord {
    id: EngineId,
    host_functions: Mutex<HashMap<String, Arc<HostFunction>>>,
    log_subscriber: Mutex<Option<LogSubscriber>>,
}

impl EngineRecord {
    pub fn new(id: EngineId) -> Self {
        Self {
            id,
            host_functions: Mutex::new(HashMap::new()),
            log_subscriber: Mutex::new(None),
        }
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    /// Register `function` under `name`. A name can only be registered once.
    pub fn register(&self, name: &str, function: HostFunction) -> Result<CallShape, FatalError> {
        let mut table = self.host_functions.lock();
        if table.contains_key(name) {
            return Err(FatalError::DuplicateFunction {
                engine: self.id,
                name: name.to_string(),
            });
        }
        let shape = function.shape();
        table.insert(name.to_string(), Arc::new(function));
        Ok(shape)
    }

    /// Drop a registration the foreign engine refused to bind.
    pub(crate) fn discard(&self, name: &str) -> Option<Arc<HostFunction>> {
        self.host_functions.lock().remove(name)
    }

    pub fn host_function(&self, name: &str) -> Result<Arc<HostFunction>, FatalError> {
        self.host_functions
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| FatalError::UnknownFunction {
                engine: self.id,
                name: name.to_string(),
            })
    }

    /// Registered names, sorted.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.host_functions.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Install or replace the subscriber, returning the previous one.
    pub fn set_log_subscriber(&self, subscriber: LogSubscriber) -> Option<LogSubscriber> {
        self.log_subscriber.lock().replace(subscriber)
    }

    pub fn clear_log_subscriber(&self) -> Option<LogSubscriber> {
        self.log_subscriber.lock().take()
    }

    pub fn log_subscriber(&self) -> Option<LogSubscriber> {
        self.log_subscriber.lock().clone()
    }
}

impl std::fmt::Debug for EngineRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRecord")
            .field("id", &self.id)
            .field("host_functions", &self.function_names())
            .field("log_subscriber", &self.log_subscriber.lock().is_some())
            .finish()
    }
}
