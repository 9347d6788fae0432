//! Process-wide handler for fatal binding errors.
//!
//! Every fatal error passes through [`raise`] before it is returned to the
//! caller: it is logged with `tracing::error!` and handed to the installed
//! handler, if any. Embedders that want fatal errors to end the process
//! install [`abort_on_fatal`].

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;
use tracebridge_hostapi::FatalError;

type Handler = Arc<dyn Fn(&FatalError) + Send + Sync>;

static HANDLER: RwLock<Option<Handler>> = parking_lot::const_rwlock(None);

/// Install `handler`, replacing any previous one.
pub fn set_fatal_handler<F>(handler: F)
where
    F: Fn(&FatalError) + Send + Sync + 'static,
{
    *HANDLER.write() = Some(Arc::new(handler));
}

/// Remove the installed handler. Fatal errors are still logged.
pub fn clear_fatal_handler() {
    *HANDLER.write() = None;
}

/// Install a handler that aborts the process after logging.
pub fn abort_on_fatal() {
    set_fatal_handler(|_| std::process::abort());
}

/// Report `err` and hand it back for propagation.
pub fn raise(err: FatalError) -> FatalError {
    error!(
        engine = %err.engine(),
        function = err.function().unwrap_or("-"),
        "fatal binding error: {}",
        err
    );
    // Clone out so the handler may itself install or clear handlers.
    let handler = HANDLER.read().clone();
    if let Some(handler) = handler {
        handler(&err);
    }
    err
}
