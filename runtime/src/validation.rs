//! WASM module validation: entry and import checks.
//!
//! Validates that a compiled WASM module can be traced before it is
//! accepted by `set_binary`. Checks:
//!
//! 1. The entry export is present with type `() -> ()`
//! 2. All imports are functions from the configured import module
//! 3. No WASI imports

use tracebridge_hostapi::EngineError;
use wasmtime::{ExternType, Module};

use crate::config::RuntimeConfig;

/// Validate that a WASM module meets the runtime's requirements.
pub fn validate_module(module: &Module, config: &RuntimeConfig) -> Result<(), EngineError> {
    validate_entry(module, config)?;
    validate_imports(module, config)?;
    Ok(())
}

/// Check that the entry export is a function taking and returning nothing.
fn validate_entry(module: &Module, config: &RuntimeConfig) -> Result<(), EngineError> {
    let name = &config.entry_export;
    let export = module
        .exports()
        .find(|e| e.name() == name.as_str())
        .ok_or_else(|| EngineError::Validation(format!("missing entry export: {}", name)))?;

    let func_ty = match export.ty() {
        ExternType::Func(ft) => ft,
        _ => {
            return Err(EngineError::Validation(format!(
                "export '{}' must be a function",
                name
            )));
        }
    };

    let params = func_ty.params().len();
    let results = func_ty.results().len();
    if params != 0 || results != 0 {
        return Err(EngineError::Validation(format!(
            "export '{}' must have type () -> (), got {} params and {} results",
            name, params, results
        )));
    }

    Ok(())
}

/// Check that all imports are functions from the configured module.
fn validate_imports(module: &Module, config: &RuntimeConfig) -> Result<(), EngineError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name.starts_with("wasi") {
            return Err(EngineError::Validation(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != config.import_module {
            return Err(EngineError::Validation(format!(
                "import from disallowed module '{}': {}::{}",
                module_name,
                module_name,
                import.name()
            )));
        }

        if !matches!(import.ty(), ExternType::Func(_)) {
            return Err(EngineError::Validation(format!(
                "import '{}::{}' must be a function",
                module_name,
                import.name()
            )));
        }
    }

    Ok(())
}
