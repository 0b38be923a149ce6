//! Dynamic value representation
//!
//! [`Value`] mirrors the runtime's type lattice. Scalars live inline; tables
//! own their mapping behind a single `Box`; functions and userdata hold
//! non-owning handles whose lifetime the runtime manages.

mod args;
mod callable;
mod convert;
mod display;
mod table;
mod userdata;

pub use args::IntoArgs;
pub use callable::{Callable, NativeFn, ScriptRef};
pub use table::{Table, TableId};
pub use userdata::UserdataHandle;

use crate::{BridgeError, RefId, Result, StackBridge, TypeTag};
use std::cmp::Ordering;

/// Any value the runtime can hold.
///
/// Values are ordered first by [`TypeTag`], then by the natural order within
/// a variant, so they can key a `BTreeMap`. Equality agrees with that order:
/// tables compare structurally, functions and userdata by identity.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Table(Box<Table>),
    Function(Callable),
    Userdata(UserdataHandle),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Nil => TypeTag::Nil,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Table(_) => TypeTag::Table,
            Value::Function(_) => TypeTag::Function,
            Value::Userdata(_) => TypeTag::Userdata,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_tag().name()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Zero value of a variant.
    pub fn make(tag: TypeTag) -> Value {
        match tag {
            TypeTag::Nil => Value::Nil,
            TypeTag::Boolean => Value::Boolean(false),
            TypeTag::Number => Value::Number(0.0),
            TypeTag::String => Value::String(String::new()),
            TypeTag::Table => Value::Table(Box::new(Table::new())),
            TypeTag::Function => Value::Function(Callable::noop()),
            TypeTag::Userdata => Value::Userdata(UserdataHandle::null()),
        }
    }

    /// Narrow to a host type. Never coerces across variants.
    pub fn cast<T>(self) -> Result<T>
    where
        T: TryFrom<Value, Error = BridgeError>,
    {
        T::try_from(self)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(BridgeError::mismatch(TypeTag::Boolean, other.type_tag())),
        }
    }

    pub fn as_number(&self) -> Result<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(BridgeError::mismatch(TypeTag::Number, other.type_tag())),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(BridgeError::mismatch(TypeTag::String, other.type_tag())),
        }
    }

    pub fn as_table(&self) -> Result<&Table> {
        match self {
            Value::Table(t) => Ok(t),
            other => Err(BridgeError::mismatch(TypeTag::Table, other.type_tag())),
        }
    }

    pub fn as_table_mut(&mut self) -> Result<&mut Table> {
        match self {
            Value::Table(t) => Ok(t),
            other => Err(BridgeError::mismatch(TypeTag::Table, other.type_tag())),
        }
    }

    /// Table lookup; fails if this value is not a table.
    pub fn get(&self, key: &Value) -> Result<Option<&Value>> {
        Ok(self.as_table()?.get(key))
    }

    /// Table assignment; fails if this value is not a table.
    pub fn set(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        Ok(self.as_table_mut()?.insert(key, value))
    }

    /// Read the slot at `index` into an owned value.
    ///
    /// Tables are read recursively. A nested table that is one of the tables
    /// currently being read fails with [`BridgeError::CyclicReference`]. On
    /// error the stack is restored to its height at entry.
    pub fn from_stack(bridge: &mut dyn StackBridge, index: i32) -> Result<Value> {
        let top = bridge.top();
        let index = bridge.absolute(index);
        let mut ancestors = Vec::new();
        let result = Value::read(bridge, index, &mut ancestors);
        if result.is_err() {
            bridge.set_top(top);
        }
        result
    }

    /// Push this value on top of the stack.
    ///
    /// Tables are rebuilt as new runtime tables. A table that contains itself
    /// (by [`TableId`]) fails with [`BridgeError::CyclicReference`] and leaves
    /// the stack as it was.
    pub fn to_stack(&self, bridge: &mut dyn StackBridge) -> Result<()> {
        let top = bridge.top();
        let mut ancestors = Vec::new();
        let result = self.write(bridge, &mut ancestors);
        if result.is_err() {
            bridge.set_top(top);
        }
        result
    }

    /// `index` must be absolute.
    pub(crate) fn read(
        bridge: &mut dyn StackBridge,
        index: i32,
        ancestors: &mut Vec<RefId>,
    ) -> Result<Value> {
        let tag = bridge.type_of(index);
        let value = match tag {
            TypeTag::Nil => Value::Nil,
            TypeTag::Boolean => Value::Boolean(bridge.to_bool(index)),
            TypeTag::Number => Value::Number(
                bridge
                    .to_number(index)
                    .ok_or_else(|| BridgeError::mismatch(TypeTag::Number, tag))?,
            ),
            TypeTag::String => Value::String(
                bridge
                    .to_string(index)
                    .ok_or_else(|| BridgeError::mismatch(TypeTag::String, tag))?,
            ),
            TypeTag::Table => Value::Table(Box::new(Table::read(bridge, index, ancestors)?)),
            TypeTag::Function => Value::Function(
                bridge
                    .to_function(index)
                    .ok_or_else(|| BridgeError::mismatch(TypeTag::Function, tag))?,
            ),
            TypeTag::Userdata => Value::Userdata(
                bridge
                    .to_userdata(index)
                    .ok_or_else(|| BridgeError::mismatch(TypeTag::Userdata, tag))?,
            ),
        };
        Ok(value)
    }

    pub(crate) fn write(
        &self,
        bridge: &mut dyn StackBridge,
        ancestors: &mut Vec<TableId>,
    ) -> Result<()> {
        match self {
            Value::Nil => bridge.push_nil(),
            Value::Boolean(b) => bridge.push_bool(*b),
            Value::Number(n) => bridge.push_number(*n),
            Value::String(s) => bridge.push_string(s),
            Value::Table(t) => t.write(bridge, ancestors)?,
            Value::Function(f) => bridge.push_function(f.clone()),
            Value::Userdata(u) => bridge.push_userdata(*u),
        }
        Ok(())
    }
}

// -0.0 and 0.0 name the same key in the runtime, so they compare equal.
fn number_cmp(a: f64, b: f64) -> Ordering {
    (a + 0.0).total_cmp(&(b + 0.0))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => number_cmp(*a, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Table(a), Value::Table(b)) => a.cmp(b),
            (Value::Function(a), Value::Function(b)) => a.cmp(b),
            (Value::Userdata(a), Value::Userdata(b)) => a.cmp(b),
            _ => self.type_tag().cmp(&other.type_tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryState;

    fn samples() -> Vec<Value> {
        let mut nested = Table::new();
        nested.insert("x", 1.0);
        let mut other = Table::new();
        other.insert("x", 2.0);
        vec![
            Value::Nil,
            Value::from(false),
            Value::from(true),
            Value::from(-1.5),
            Value::from(0.0),
            Value::from(-0.0),
            Value::from(f64::NAN),
            Value::from(""),
            Value::from("a"),
            Value::from("b"),
            Value::from(Table::new()),
            Value::from(nested),
            Value::from(other),
            Value::Function(Callable::noop()),
            Value::Function(Callable::Script(ScriptRef(3))),
            Value::Userdata(UserdataHandle::null()),
            Value::Userdata(UserdataHandle::with_subtype(240, 0x10)),
        ]
    }

    #[test]
    fn test_make_zero_values() {
        assert_eq!(Value::make(TypeTag::Nil), Value::Nil);
        assert_eq!(Value::make(TypeTag::Boolean), Value::Boolean(false));
        assert_eq!(Value::make(TypeTag::Number), Value::Number(0.0));
        assert_eq!(Value::make(TypeTag::String), Value::from(""));
        assert!(Value::make(TypeTag::Table).as_table().unwrap().is_empty());
        assert_eq!(Value::make(TypeTag::Function), Value::Function(Callable::noop()));
        assert_eq!(
            Value::make(TypeTag::Userdata),
            Value::Userdata(UserdataHandle::null())
        );
        for tag in TypeTag::ALL {
            assert_eq!(Value::make(tag).type_tag(), tag);
        }
    }

    #[test]
    fn test_cross_variant_never_equal() {
        assert_ne!(Value::from(0.0), Value::from(false));
        assert_ne!(Value::from("1"), Value::from(1.0));
        assert_ne!(Value::Nil, Value::from(false));
        assert!(Value::from(true) < Value::from(-100.0));
        assert!(Value::from(1e9) < Value::from(""));
    }

    #[test]
    fn test_ordering_is_strict_weak() {
        let values = samples();
        for a in &values {
            assert!(a.cmp(a) == Ordering::Equal, "irreflexive for {a:?}");
            for b in &values {
                assert_eq!(a.cmp(b), b.cmp(a).reverse());
                assert_eq!(a == b, a.cmp(b) == Ordering::Equal);
                for c in &values {
                    if a < b && b < c {
                        assert!(a < c, "transitivity: {a:?} < {b:?} < {c:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_signed_zero_is_one_key() {
        let mut table = Table::new();
        table.insert(0.0, "pos");
        table.insert(-0.0, "neg");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&Value::from(0.0)), Some(&Value::from("neg")));
    }

    #[test]
    fn test_tables_compare_structurally() {
        let mut a = Table::new();
        a.insert("k", 1.0);
        let mut b = Table::new();
        b.insert("k", 1.0);
        assert_ne!(a.id(), b.id());
        assert_eq!(Value::from(a), Value::from(b));
    }

    #[test]
    fn test_typed_access_rejects_other_variants() {
        let value = Value::from(3.0);
        assert_eq!(value.as_number().unwrap(), 3.0);
        assert!(matches!(
            value.as_str(),
            Err(BridgeError::TypeMismatch {
                expected: TypeTag::String,
                found: TypeTag::Number
            })
        ));
        let mut not_table = Value::from(true);
        assert!(not_table.set("k", 1.0).is_err());
        assert!(not_table.get(&Value::from("k")).is_err());
    }

    #[test]
    fn test_scalar_round_trip() {
        let mut state = MemoryState::new();
        let values = vec![
            Value::Nil,
            Value::from(true),
            Value::from(false),
            Value::from(42.5),
            Value::from("hello"),
            Value::Function(Callable::noop()),
            Value::Function(Callable::Script(ScriptRef(9))),
            Value::Userdata(UserdataHandle::new(0xdead)),
            Value::Userdata(UserdataHandle::with_subtype(240, 0xbeef)),
        ];
        for value in values {
            value.to_stack(&mut state).unwrap();
            let back = Value::from_stack(&mut state, -1).unwrap();
            state.pop(1);
            assert_eq!(back, value);
        }
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn test_nested_table_round_trip() {
        let mut inner = Table::new();
        inner.insert(1.0, "one");
        inner.insert(true, Value::Userdata(UserdataHandle::new(7)));
        let mut deeper = Table::new();
        deeper.insert("leaf", -3.0);
        inner.insert("deeper", deeper);

        let mut key_table = Table::new();
        key_table.insert("as", "key");

        let mut outer = Table::new();
        outer.insert("inner", inner);
        outer.insert(key_table, 5.0);
        outer.insert(2.0, Value::Function(Callable::noop()));
        let value = Value::from(outer);

        let mut state = MemoryState::new();
        value.to_stack(&mut state).unwrap();
        let back = Value::from_stack(&mut state, 1).unwrap();
        assert_eq!(back, value);
        assert_eq!(state.top(), 1);
    }

    #[test]
    fn test_self_containing_table_is_rejected_on_push() {
        let mut table = Table::new();
        table.insert("name", "loop");
        let alias = table.alias();
        table.insert("self", alias);

        let mut state = MemoryState::new();
        state.push_number(1.0);
        let err = Value::from(table).to_stack(&mut state).unwrap_err();
        assert!(matches!(err, BridgeError::CyclicReference));
        assert_eq!(state.top(), 1);
    }

    #[test]
    fn test_self_key_is_rejected_on_push() {
        let mut table = Table::new();
        let alias = table.alias();
        table.insert(alias, true);
        let err = Value::from(table).to_stack(&mut MemoryState::new()).unwrap_err();
        assert!(matches!(err, BridgeError::CyclicReference));
    }

    #[test]
    fn test_indirect_cycle_is_rejected_on_push() {
        let mut a = Table::new();
        let a_alias = a.alias();
        let mut b = Table::new();
        b.insert("back", a_alias);
        a.insert("b", b);
        let err = Value::from(a).to_stack(&mut MemoryState::new()).unwrap_err();
        assert!(matches!(err, BridgeError::CyclicReference));
    }

    #[test]
    fn test_shared_subtable_is_not_a_cycle() {
        let shared = Table::new();
        let mut outer = Table::new();
        outer.insert("a", shared.clone());
        outer.insert("b", shared);
        let mut state = MemoryState::new();
        Value::from(outer).to_stack(&mut state).unwrap();
        assert_eq!(state.type_of(-1), TypeTag::Table);
    }
}
