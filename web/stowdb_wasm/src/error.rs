//! Error types for WASM bindings.

use stowdb_core::EngineError;
use stowdb_storage::StorageError;
use thiserror::Error;
use wasm_bindgen::prelude::*;

/// Errors that can occur in the WASM bindings.
#[derive(Debug, Error)]
pub enum WasmError {
    /// The engine rejected the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Storage operation failed outside the engine.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A schema, query or record passed from JavaScript is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// JavaScript error occurred.
    #[error("JS error: {0}")]
    JsError(String),

    /// Feature not supported in current browser.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl From<WasmError> for JsValue {
    fn from(err: WasmError) -> Self {
        let error = js_sys::Error::new(&err.to_string());
        error.set_name(err.kind());
        error.into()
    }
}

impl From<JsValue> for WasmError {
    fn from(val: JsValue) -> Self {
        WasmError::JsError(val.as_string().unwrap_or_else(|| format!("{:?}", val)))
    }
}

impl From<serde_wasm_bindgen::Error> for WasmError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        WasmError::InvalidInput(err.to_string())
    }
}

impl WasmError {
    /// JavaScript `Error.name` for this error, so callers can branch on it.
    pub fn kind(&self) -> &'static str {
        match self {
            WasmError::Engine(EngineError::InvalidSchema { .. }) => "InvalidSchemaError",
            WasmError::Engine(EngineError::NotOpen) => "NotOpenError",
            WasmError::Engine(EngineError::TransactionAborted { .. }) => "TransactionAbortedError",
            WasmError::Engine(EngineError::UnknownStore { .. }) => "UnknownStoreError",
            WasmError::Engine(EngineError::InvalidRecord { .. }) => "InvalidRecordError",
            WasmError::Engine(EngineError::Storage(_)) | WasmError::Storage(_) => "StorageError",
            WasmError::InvalidInput(_) => "TypeError",
            WasmError::JsError(_) => "Error",
            WasmError::NotSupported(_) => "NotSupportedError",
        }
    }
}

/// Result type for WASM operations.
pub type WasmResult<T> = Result<T, WasmError>;
