//! Gloo Core
//!
//! Dynamic values for an embedded scripting runtime:
//! - [`Value`]: closed variant type mirroring the runtime's type lattice
//! - [`StackBridge`]: the stack-based embedding protocol values cross
//! - [`MemoryState`]: in-process reference runtime used by tests and the demo host
//!
//! ## Marshalling
//!
//! `Value::to_stack` and `Value::from_stack` are the only operations that touch
//! the bridge. Tables are copied recursively; a table that contains itself
//! (directly or through nested tables) is rejected with
//! [`BridgeError::CyclicReference`] instead of recursing forever.

pub mod bridge;
mod error;
mod types;
pub mod value;

pub use bridge::{MemoryState, RefId, RuntimeId, StackBridge};
pub use error::{BridgeError, Result};
pub use types::TypeTag;
pub use value::{
    Callable, IntoArgs, NativeFn, ScriptRef, Table, TableId, UserdataHandle, Value,
};

/// Gloo version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
