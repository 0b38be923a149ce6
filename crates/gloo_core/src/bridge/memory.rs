// memory.rs - In-process reference runtime for the stack bridge
//
// A small Lua-like state: a value stack split into call frames, tables with
// identity, a persistent reference registry, a globals table carrying the
// `hook` library, and host closures standing in for scripted functions.
// It has no parser. Rc-based, so it never leaves the thread that created it.

use super::{RefId, RuntimeId, StackBridge};
use crate::{BridgeError, Callable, Result, ScriptRef, TypeTag, UserdataHandle, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Function body registered with [`MemoryState::create_function`].
pub type ScriptFn = dyn Fn(&mut MemoryState) -> Result<usize>;

type TableRef = Rc<RefCell<MemoryTable>>;

#[derive(Clone)]
enum Slot {
    Nil,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Table(TableRef),
    Function(Callable),
    Userdata(UserdataHandle),
}

impl Slot {
    fn tag(&self) -> TypeTag {
        match self {
            Slot::Nil => TypeTag::Nil,
            Slot::Boolean(_) => TypeTag::Boolean,
            Slot::Number(_) => TypeTag::Number,
            Slot::String(_) => TypeTag::String,
            Slot::Table(_) => TypeTag::Table,
            Slot::Function(_) => TypeTag::Function,
            Slot::Userdata(_) => TypeTag::Userdata,
        }
    }

    fn raw_eq(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Nil, Slot::Nil) => true,
            (Slot::Boolean(a), Slot::Boolean(b)) => a == b,
            (Slot::Number(a), Slot::Number(b)) => a == b,
            (Slot::String(a), Slot::String(b)) => a == b,
            (Slot::Table(a), Slot::Table(b)) => Rc::ptr_eq(a, b),
            (Slot::Function(a), Slot::Function(b)) => a == b,
            (Slot::Userdata(a), Slot::Userdata(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Default)]
struct MemoryTable {
    entries: Vec<(Slot, Slot)>,
}

impl MemoryTable {
    fn position(&self, key: &Slot) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.raw_eq(key))
    }

    fn get(&self, key: &Slot) -> Slot {
        self.position(key)
            .map(|i| self.entries[i].1.clone())
            .unwrap_or(Slot::Nil)
    }

    /// Assigning nil removes the entry.
    fn set(&mut self, key: Slot, value: Slot) {
        match (self.position(&key), value) {
            (Some(i), Slot::Nil) => {
                self.entries.remove(i);
            }
            (Some(i), value) => self.entries[i].1 = value,
            (None, Slot::Nil) => {}
            (None, value) => self.entries.push((key, value)),
        }
    }

    fn next(&self, key: &Slot) -> Result<Option<(Slot, Slot)>> {
        let start = match key {
            Slot::Nil => 0,
            key => {
                self.position(key)
                    .ok_or_else(|| BridgeError::runtime("invalid key to 'next'"))?
                    + 1
            }
        };
        Ok(self.entries.get(start).cloned())
    }
}

struct Hook {
    event: String,
    id: String,
    function: Callable,
}

/// Reference [`StackBridge`] implementation.
pub struct MemoryState {
    id: RuntimeId,
    stack: Vec<Slot>,
    frames: Vec<usize>,
    globals: TableRef,
    references: HashMap<i32, Slot>,
    next_reference: i32,
    scripts: Vec<Rc<ScriptFn>>,
    hooks: Vec<Hook>,
}

impl MemoryState {
    /// Create a state with the `hook` library and `print` installed.
    pub fn new() -> Self {
        let mut state = Self {
            id: RuntimeId(NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed)),
            stack: Vec::new(),
            frames: Vec::new(),
            globals: Rc::new(RefCell::new(MemoryTable::default())),
            references: HashMap::new(),
            next_reference: 1,
            scripts: Vec::new(),
            hooks: Vec::new(),
        };
        state.open_hook_library();
        state.open_print();
        state
    }

    /// Register a host closure as a runtime-owned function.
    pub fn create_function<F>(&mut self, body: F) -> Callable
    where
        F: Fn(&mut MemoryState) -> Result<usize> + 'static,
    {
        let id = self.scripts.len() as u64;
        self.scripts.push(Rc::new(body));
        Callable::Script(ScriptRef(id))
    }

    /// Push `value` and store it as a global.
    pub fn set_global(&mut self, name: &str, value: &Value) -> Result<()> {
        value.to_stack(self)?;
        let slot = self.pop_slot();
        self.globals
            .borrow_mut()
            .set(Slot::String(Rc::from(name)), slot);
        Ok(())
    }

    /// Read a global into an owned value.
    pub fn global(&mut self, name: &str) -> Result<Value> {
        let slot = self.globals.borrow().get(&Slot::String(Rc::from(name)));
        self.stack.push(slot);
        let value = Value::from_stack(self, -1);
        self.stack.pop();
        value
    }

    /// Invoke every hook registered for `event`, in registration order.
    pub fn run_hook(&mut self, event: &str) -> Result<()> {
        let functions: Vec<Callable> = self
            .hooks
            .iter()
            .filter(|hook| hook.event == event)
            .map(|hook| hook.function.clone())
            .collect();

        for function in functions {
            self.push_function(function);
            self.call(0, 0)?;
        }
        Ok(())
    }

    pub fn hook_count(&self, event: &str) -> usize {
        self.hooks.iter().filter(|hook| hook.event == event).count()
    }

    pub fn hook_ids(&self, event: &str) -> Vec<String> {
        self.hooks
            .iter()
            .filter(|hook| hook.event == event)
            .map(|hook| hook.id.clone())
            .collect()
    }

    /// Persistent references currently held.
    pub fn live_references(&self) -> usize {
        self.references.len()
    }

    fn open_hook_library(&mut self) {
        let add = self.create_function(|state| {
            let event = state.arg_string(1, "hook.Add")?;
            let id = state.arg_string(2, "hook.Add")?;
            let function = state
                .to_function(3)
                .ok_or_else(|| BridgeError::mismatch(TypeTag::Function, state.type_of(3)))?;

            match state
                .hooks
                .iter_mut()
                .find(|hook| hook.event == event && hook.id == id)
            {
                Some(hook) => hook.function = function,
                None => {
                    tracing::debug!(%event, %id, "hook added");
                    state.hooks.push(Hook {
                        event,
                        id,
                        function,
                    });
                }
            }
            Ok(0)
        });

        let remove = self.create_function(|state| {
            let event = state.arg_string(1, "hook.Remove")?;
            let id = state.arg_string(2, "hook.Remove")?;
            state
                .hooks
                .retain(|hook| !(hook.event == event && hook.id == id));
            Ok(0)
        });

        let mut library = MemoryTable::default();
        library.set(Slot::String(Rc::from("Add")), Slot::Function(add));
        library.set(Slot::String(Rc::from("Remove")), Slot::Function(remove));
        self.globals.borrow_mut().set(
            Slot::String(Rc::from("hook")),
            Slot::Table(Rc::new(RefCell::new(library))),
        );
    }

    fn open_print(&mut self) {
        let print = self.create_function(|state| {
            let mut parts = Vec::new();
            for index in 1..=state.top() {
                parts.push(Value::from_stack(state, index)?.to_string());
            }
            tracing::info!(target: "gloo::script", "{}", parts.join("\t"));
            Ok(0)
        });
        self.globals
            .borrow_mut()
            .set(Slot::String(Rc::from("print")), Slot::Function(print));
    }

    fn arg_string(&self, index: i32, function: &str) -> Result<String> {
        match self.slot(index) {
            Some(Slot::String(s)) => Ok(s.to_string()),
            other => {
                let found = other.map_or(TypeTag::Nil, Slot::tag);
                Err(BridgeError::runtime(format!(
                    "bad argument #{index} to '{function}' (string expected, got {found})"
                )))
            }
        }
    }

    fn base(&self) -> usize {
        self.frames.last().copied().unwrap_or(0)
    }

    fn slot_position(&self, index: i32) -> Option<usize> {
        let base = self.base();
        let len = self.stack.len();
        let position = if index > 0 {
            base + index as usize - 1
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            if back > len - base {
                return None;
            }
            len - back
        } else {
            return None;
        };
        (position >= base && position < len).then_some(position)
    }

    fn slot(&self, index: i32) -> Option<&Slot> {
        self.slot_position(index).map(|position| &self.stack[position])
    }

    fn table_at(&self, index: i32) -> Result<TableRef> {
        match self.slot(index) {
            Some(Slot::Table(table)) => Ok(Rc::clone(table)),
            other => {
                let found = other.map_or(TypeTag::Nil, Slot::tag);
                Err(BridgeError::runtime(format!(
                    "attempt to index a {found} value"
                )))
            }
        }
    }

    fn pop_slot(&mut self) -> Slot {
        if self.stack.len() > self.base() {
            self.stack.pop().unwrap_or(Slot::Nil)
        } else {
            Slot::Nil
        }
    }
}

impl Default for MemoryState {
    fn default() -> Self {
        Self::new()
    }
}

impl StackBridge for MemoryState {
    fn runtime_id(&self) -> RuntimeId {
        self.id
    }

    fn top(&self) -> i32 {
        (self.stack.len() - self.base()) as i32
    }

    fn set_top(&mut self, top: i32) {
        let base = self.base();
        let target = if top >= 0 {
            base + top as usize
        } else {
            (self.stack.len() as i64 + top as i64 + 1).max(base as i64) as usize
        };
        self.stack.resize(target, Slot::Nil);
    }

    fn type_of(&self, index: i32) -> TypeTag {
        self.slot(index).map_or(TypeTag::Nil, Slot::tag)
    }

    fn push_nil(&mut self) {
        self.stack.push(Slot::Nil);
    }

    fn push_bool(&mut self, value: bool) {
        self.stack.push(Slot::Boolean(value));
    }

    fn push_number(&mut self, value: f64) {
        self.stack.push(Slot::Number(value));
    }

    fn push_string(&mut self, value: &str) {
        self.stack.push(Slot::String(Rc::from(value)));
    }

    fn push_function(&mut self, function: Callable) {
        self.stack.push(Slot::Function(function));
    }

    fn push_userdata(&mut self, handle: UserdataHandle) {
        self.stack.push(Slot::Userdata(handle));
    }

    fn push_copy(&mut self, index: i32) {
        let slot = self.slot(index).cloned().unwrap_or(Slot::Nil);
        self.stack.push(slot);
    }

    fn push_globals(&mut self) {
        self.stack.push(Slot::Table(Rc::clone(&self.globals)));
    }

    fn to_bool(&self, index: i32) -> bool {
        !matches!(self.slot(index), None | Some(Slot::Nil) | Some(Slot::Boolean(false)))
    }

    fn to_number(&self, index: i32) -> Option<f64> {
        match self.slot(index) {
            Some(Slot::Number(n)) => Some(*n),
            _ => None,
        }
    }

    fn to_string(&self, index: i32) -> Option<String> {
        match self.slot(index) {
            Some(Slot::String(s)) => Some(s.to_string()),
            Some(Slot::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    fn to_function(&self, index: i32) -> Option<Callable> {
        match self.slot(index) {
            Some(Slot::Function(f)) => Some(f.clone()),
            _ => None,
        }
    }

    fn to_userdata(&self, index: i32) -> Option<UserdataHandle> {
        match self.slot(index) {
            Some(Slot::Userdata(u)) => Some(*u),
            _ => None,
        }
    }

    fn create_table(&mut self) {
        self.stack
            .push(Slot::Table(Rc::new(RefCell::new(MemoryTable::default()))));
    }

    fn get_field(&mut self, index: i32, name: &str) -> Result<()> {
        let table = self.table_at(index)?;
        let value = table.borrow().get(&Slot::String(Rc::from(name)));
        self.stack.push(value);
        Ok(())
    }

    fn set_field(&mut self, index: i32, name: &str) -> Result<()> {
        let table = self.table_at(index)?;
        let value = self.pop_slot();
        table.borrow_mut().set(Slot::String(Rc::from(name)), value);
        Ok(())
    }

    fn set_table(&mut self, index: i32) -> Result<()> {
        let table = self.table_at(index)?;
        match self.slot(-2) {
            Some(Slot::Nil) | None => return Err(BridgeError::runtime("table index is nil")),
            Some(Slot::Number(n)) if n.is_nan() => {
                return Err(BridgeError::runtime("table index is NaN"))
            }
            _ => {}
        }
        let value = self.pop_slot();
        let key = self.pop_slot();
        table.borrow_mut().set(key, value);
        Ok(())
    }

    fn next(&mut self, index: i32) -> Result<bool> {
        let table = self.table_at(index)?;
        let key = self.pop_slot();
        let entry = table.borrow().next(&key)?;
        match entry {
            Some((key, value)) => {
                self.stack.push(key);
                self.stack.push(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reference_create(&mut self) -> RefId {
        let slot = self.pop_slot();
        let reference = self.next_reference;
        self.next_reference += 1;
        self.references.insert(reference, slot);
        RefId(reference)
    }

    fn reference_push(&mut self, reference: RefId) {
        let slot = self
            .references
            .get(&reference.0)
            .cloned()
            .unwrap_or(Slot::Nil);
        self.stack.push(slot);
    }

    fn reference_free(&mut self, reference: RefId) {
        self.references.remove(&reference.0);
    }

    fn raw_equal(&self, a: i32, b: i32) -> bool {
        match (self.slot(a), self.slot(b)) {
            (Some(a), Some(b)) => a.raw_eq(b),
            _ => false,
        }
    }

    fn call(&mut self, nargs: i32, nresults: i32) -> Result<()> {
        let nargs = nargs.max(0) as usize;
        let len = self.stack.len();
        if len < self.base() + nargs + 1 {
            return Err(BridgeError::runtime("not enough values on the stack for call"));
        }

        let function_position = len - nargs - 1;
        let callable = match &self.stack[function_position] {
            Slot::Function(callable) => callable.clone(),
            other => {
                let found = other.tag();
                self.stack.truncate(function_position);
                return Err(BridgeError::NotCallable { found });
            }
        };

        self.frames.push(function_position + 1);
        let outcome = match callable {
            Callable::Native(function) => function(&mut *self as &mut dyn StackBridge),
            Callable::Script(reference) => match self.scripts.get(reference.0 as usize).cloned() {
                Some(body) => body(&mut *self),
                None => Err(BridgeError::runtime(format!(
                    "unknown function {}",
                    reference.0
                ))),
            },
        };
        self.frames.pop();

        let returned = match outcome {
            Ok(returned) => returned,
            Err(err) => {
                self.stack.truncate(function_position);
                return Err(err);
            }
        };

        let len = self.stack.len();
        let returned = returned.min(len - (function_position + 1));
        let results = self.stack.split_off(len - returned);
        self.stack.truncate(function_position);

        if nresults < 0 {
            self.stack.extend(results);
        } else {
            for i in 0..nresults as usize {
                self.stack.push(results.get(i).cloned().unwrap_or(Slot::Nil));
            }
        }
        Ok(())
    }
}
