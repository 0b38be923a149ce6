use crate::TypeTag;
use thiserror::Error;

/// Errors raised while moving values across the stack bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("expected type '{expected}', found '{found}'")]
    TypeMismatch { expected: TypeTag, found: TypeTag },

    #[error("unable to marshal table with cyclic reference")]
    CyclicReference,

    #[error("attempt to call a {found} value")]
    NotCallable { found: TypeTag },

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("listener #{listener} failed: {source}")]
    Listener {
        listener: u64,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    pub fn mismatch(expected: TypeTag, found: TypeTag) -> Self {
        BridgeError::TypeMismatch { expected, found }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        BridgeError::Runtime(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
