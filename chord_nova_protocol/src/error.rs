// Failures at the request boundary.
//
// A request fails either because its document is malformed (category
// `parse`: not JSON, wrong field type, unknown `op`) or because the engine
// rejected valid input (the engine's own categories). Both are rendered
// into an `ErrorResponse` rather than propagated to the caller.

use chord_nova_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ProtocolError {
    pub fn category(&self) -> &'static str {
        match self {
            ProtocolError::Parse(_) => "parse",
            ProtocolError::Engine(e) => e.category(),
        }
    }
}
