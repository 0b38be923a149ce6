//! Stack bridge
//!
//! The embedding protocol of the host scripting runtime. Values are exchanged
//! through a shared evaluation stack:
//!
//! - Positive indices address slots from the bottom of the current call frame (1-based)
//! - Negative indices address slots from the top (-1 is the top slot)
//!
//! Implementations are not thread-safe. Whoever holds `&mut dyn StackBridge`
//! is, by construction, on the runtime's callback thread.

pub mod memory;

use crate::{Callable, Result, TypeTag, UserdataHandle};
use std::fmt;

pub use memory::MemoryState;

/// Identity of one runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeId(pub u64);

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime#{}", self.0)
    }
}

/// Handle to a persistent reference held by the runtime's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(pub i32);

/// Primitives consumed from the embedding runtime.
pub trait StackBridge {
    fn runtime_id(&self) -> RuntimeId;

    /// Number of slots in the current frame.
    fn top(&self) -> i32;

    /// Truncate or grow (with nils) the current frame. Negative values count from the top.
    fn set_top(&mut self, top: i32);

    /// Convert a relative index into a frame-absolute one.
    fn absolute(&self, index: i32) -> i32 {
        if index > 0 {
            index
        } else {
            self.top() + index + 1
        }
    }

    fn pop(&mut self, count: i32) {
        let top = self.top();
        self.set_top(top - count);
    }

    /// Type of the slot at `index`; invalid positions read as nil.
    fn type_of(&self, index: i32) -> TypeTag;

    fn push_nil(&mut self);
    fn push_bool(&mut self, value: bool);
    fn push_number(&mut self, value: f64);
    fn push_string(&mut self, value: &str);
    fn push_function(&mut self, function: Callable);
    fn push_userdata(&mut self, handle: UserdataHandle);

    /// Push a copy of the slot at `index`.
    fn push_copy(&mut self, index: i32);

    /// Push the runtime's globals table.
    fn push_globals(&mut self);

    fn to_bool(&self, index: i32) -> bool;
    fn to_number(&self, index: i32) -> Option<f64>;
    fn to_string(&self, index: i32) -> Option<String>;
    fn to_function(&self, index: i32) -> Option<Callable>;
    fn to_userdata(&self, index: i32) -> Option<UserdataHandle>;

    fn create_table(&mut self);

    /// Push `t[name]` where `t` is the table at `index`.
    fn get_field(&mut self, index: i32, name: &str) -> Result<()>;

    /// Pop a value and store it as `t[name]`.
    fn set_field(&mut self, index: i32, name: &str) -> Result<()>;

    /// Pop a key/value pair (value on top) and store it into the table at `index`.
    fn set_table(&mut self, index: i32) -> Result<()>;

    /// Table traversal: pops a key and pushes the next key/value pair.
    /// Returns `false` (pushing nothing) once the table is exhausted.
    fn next(&mut self, index: i32) -> Result<bool>;

    /// Pop the top slot into the persistent registry.
    fn reference_create(&mut self) -> RefId;
    fn reference_push(&mut self, reference: RefId);
    fn reference_free(&mut self, reference: RefId);

    /// Identity comparison of two slots, without metamethods.
    fn raw_equal(&self, a: i32, b: i32) -> bool;

    /// Call the function below `nargs` arguments, leaving `nresults` results.
    fn call(&mut self, nargs: i32, nresults: i32) -> Result<()>;
}
