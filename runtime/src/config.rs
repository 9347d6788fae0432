//! Runtime configuration.

/// Size of one WASM page in bytes.
pub const WASM_PAGE_SIZE: usize = 65536;

/// Configuration for the trace runtime.
///
/// Controls resource limits, the import namespace, and the names of the
/// entry export and built-in halting imports.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Wasmtime fuel limit (instruction metering).
    /// `None` disables metering; exhaustion is reported as out-of-gas.
    pub fuel_limit: Option<u64>,

    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Module name every import must come from.
    pub import_module: String,

    /// Export run by `compute_trace`. Must have type `() -> ()`.
    pub entry_export: String,

    /// Built-in import that halts execution with the stop status.
    pub stop_import: String,

    /// Built-in import that halts execution with the reverted status.
    pub revert_import: String,

    /// Whether traces include the non-zero regions of initial memory.
    pub record_global_memory: bool,
}

impl RuntimeConfig {
    /// Memory limit in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_pages as usize * WASM_PAGE_SIZE
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fuel_limit: None,
            max_memory_pages: 256, // 16 MiB
            import_module: "env".into(),
            entry_export: "main".into(),
            stop_import: "_evm_stop".into(),
            revert_import: "_evm_revert".into(),
            record_global_memory: true,
        }
    }
}
