//! Callable handles

use crate::{Result, StackBridge};
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Host function callable from the runtime.
///
/// Arguments sit at positions `1..=top` of the callee's frame; the function
/// pushes its results and returns how many it pushed.
pub type NativeFn = dyn Fn(&mut dyn StackBridge) -> Result<usize> + Send + Sync;

/// Opaque id of a function owned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptRef(pub u64);

fn noop_native(_: &mut dyn StackBridge) -> Result<usize> {
    Ok(0)
}

static NOOP: Lazy<Arc<NativeFn>> = Lazy::new(|| {
    let f: Arc<NativeFn> = Arc::new(noop_native);
    f
});

/// Non-owning handle to something the runtime can call.
///
/// Equality and ordering are by identity.
#[derive(Clone)]
pub enum Callable {
    Native(Arc<NativeFn>),
    Script(ScriptRef),
}

impl Callable {
    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&mut dyn StackBridge) -> Result<usize> + Send + Sync + 'static,
    {
        Callable::Native(Arc::new(f))
    }

    /// Shared function that ignores its arguments and returns nothing.
    pub fn noop() -> Self {
        Callable::Native(Arc::clone(&NOOP))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Callable::Native(_))
    }

    fn identity(&self) -> (u8, u64) {
        match self {
            Callable::Native(f) => (0, Arc::as_ptr(f) as *const () as usize as u64),
            Callable::Script(r) => (1, r.0),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Callable {}

impl PartialOrd for Callable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Callable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for Callable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "Native({:#x})", self.identity().1),
            Callable::Script(r) => write!(f, "Script({})", r.0),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function: {:#x}", self.identity().1)
    }
}
