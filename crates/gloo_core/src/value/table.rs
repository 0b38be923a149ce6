// table.rs - Table values and their stack marshalling
//
// A table owns its mapping. Its TableId is minted on creation and on every
// clone; only `alias` shares it, so an alias inserted into its own table is
// self-containment.

use super::Value;
use crate::{BridgeError, RefId, Result, StackBridge, TypeTag};
use std::cmp::Ordering;
use std::collections::btree_map::{self, BTreeMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a table, independent of its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(u64);

impl TableId {
    fn next() -> Self {
        TableId(NEXT_TABLE_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Mapping from [`Value`] to [`Value`] with unique keys.
#[derive(Debug)]
pub struct Table {
    id: TableId,
    entries: BTreeMap<Value, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self {
            id: TableId::next(),
            entries: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    /// Copy that keeps this table's identity.
    pub fn alias(&self) -> Self {
        Self {
            id: self.id,
            entries: self.entries.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Lookup by string key.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.entries.get(&Value::from(name))
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite; returns the previous value for an equal key.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Value, Value> {
        self.entries.iter()
    }

    /// Read the table at `index` into an owned value.
    pub fn from_stack(bridge: &mut dyn StackBridge, index: i32) -> Result<Table> {
        let found = bridge.type_of(index);
        if found != TypeTag::Table {
            return Err(BridgeError::mismatch(TypeTag::Table, found));
        }

        let top = bridge.top();
        let index = bridge.absolute(index);
        let mut ancestors = Vec::new();
        let result = Table::read(bridge, index, &mut ancestors);
        if result.is_err() {
            bridge.set_top(top);
        }
        result
    }

    /// Push a new runtime table holding this table's entries.
    pub fn to_stack(&self, bridge: &mut dyn StackBridge) -> Result<()> {
        let top = bridge.top();
        let mut ancestors = Vec::new();
        let result = self.write(bridge, &mut ancestors);
        if result.is_err() {
            bridge.set_top(top);
        }
        result
    }

    /// Each table being read is pinned by a persistent reference so nested
    /// slots can be compared against it by identity.
    pub(crate) fn read(
        bridge: &mut dyn StackBridge,
        index: i32,
        ancestors: &mut Vec<RefId>,
    ) -> Result<Table> {
        bridge.push_copy(index);
        let reference = bridge.reference_create();
        ancestors.push(reference);

        let entries = Table::read_entries(bridge, index, ancestors);

        ancestors.pop();
        bridge.reference_free(reference);
        entries
    }

    fn read_entries(
        bridge: &mut dyn StackBridge,
        index: i32,
        ancestors: &mut Vec<RefId>,
    ) -> Result<Table> {
        let mut table = Table::new();

        bridge.push_nil();
        while bridge.next(index)? {
            let value_index = bridge.top();
            let key_index = value_index - 1;

            check_not_ancestor(bridge, key_index, ancestors)?;
            let key = Value::read(bridge, key_index, ancestors)?;

            check_not_ancestor(bridge, value_index, ancestors)?;
            let value = Value::read(bridge, value_index, ancestors)?;

            // keep the key for the next traversal step
            bridge.pop(1);
            table.entries.insert(key, value);
        }

        Ok(table)
    }

    pub(crate) fn write(
        &self,
        bridge: &mut dyn StackBridge,
        ancestors: &mut Vec<TableId>,
    ) -> Result<()> {
        if ancestors.contains(&self.id) {
            return Err(BridgeError::CyclicReference);
        }
        ancestors.push(self.id);

        bridge.create_table();
        for (key, value) in &self.entries {
            key.write(bridge, ancestors)?;
            value.write(bridge, ancestors)?;
            bridge.set_table(-3)?;
        }

        ancestors.pop();
        Ok(())
    }
}

fn check_not_ancestor(
    bridge: &mut dyn StackBridge,
    index: i32,
    ancestors: &[RefId],
) -> Result<()> {
    if bridge.type_of(index) != TypeTag::Table {
        return Ok(());
    }
    for &reference in ancestors {
        bridge.reference_push(reference);
        let same = bridge.raw_equal(-1, index);
        bridge.pop(1);
        if same {
            return Err(BridgeError::CyclicReference);
        }
    }
    Ok(())
}

impl Clone for Table {
    fn clone(&self) -> Self {
        Self {
            id: TableId::next(),
            entries: self.entries.clone(),
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Table {}

impl PartialOrd for Table {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Table {
    fn cmp(&self, other: &Self) -> Ordering {
        self.entries.cmp(&other.entries)
    }
}

impl<K, V> FromIterator<(K, V)> for Table
where
    K: Into<Value>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (key, value) in iter {
            table.insert(key, value);
        }
        table
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = (&'a Value, &'a Value);
    type IntoIter = btree_map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryState;

    #[test]
    fn test_clone_is_a_new_table() {
        let mut table = Table::new();
        table.insert("k", 1.0);
        let copy = table.clone();
        assert_ne!(table.id(), copy.id());
        assert_eq!(table, copy);

        let alias = table.alias();
        assert_eq!(table.id(), alias.id());
        assert_eq!(table, alias);
    }

    #[test]
    fn test_clone_nested_in_origin_round_trips() {
        let mut v1 = Table::new();
        v1.insert("name", "v1");
        let mut v2 = v1.clone();
        v2.insert("name", "v2");
        v2.insert("prev", v1);
        let value = Value::from(v2);

        let mut state = MemoryState::new();
        value.to_stack(&mut state).unwrap();
        let back = Value::from_stack(&mut state, -1).unwrap();
        assert_eq!(back, value);
        assert_eq!(
            back.get(&Value::from("prev")).unwrap().unwrap().as_table().unwrap().field("name"),
            Some(&Value::from("v1"))
        );
    }

    #[test]
    fn test_insert_overwrites_equal_key() {
        let mut table = Table::new();
        assert_eq!(table.insert("k", 1.0), None);
        assert_eq!(table.insert("k", 2.0), Some(Value::from(1.0)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.field("k"), Some(&Value::from(2.0)));
    }

    #[test]
    fn test_from_iter() {
        let table: Table = [("a", 1.0), ("b", 2.0)].into_iter().collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.field("b"), Some(&Value::from(2.0)));
    }

    #[test]
    fn test_from_stack_rejects_non_table() {
        let mut state = MemoryState::new();
        state.push_string("not a table");
        let err = Table::from_stack(&mut state, -1).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::TypeMismatch {
                expected: TypeTag::Table,
                found: TypeTag::String
            }
        ));
    }

    #[test]
    fn test_from_stack_reads_runtime_table() {
        let mut state = MemoryState::new();
        state.create_table();
        state.push_number(10.0);
        state.set_field(-2, "x").unwrap();
        state.push_bool(true);
        state.set_field(-2, "flag").unwrap();

        let table = Table::from_stack(&mut state, 1).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.field("x"), Some(&Value::from(10.0)));
        assert_eq!(table.field("flag"), Some(&Value::from(true)));
        assert_eq!(state.top(), 1);
        assert_eq!(state.live_references(), 0);
    }

    #[test]
    fn test_from_stack_rejects_self_value() {
        let mut state = MemoryState::new();
        state.push_number(0.0);
        state.create_table();
        state.push_copy(-1);
        state.set_field(-2, "me").unwrap();

        let err = Value::from_stack(&mut state, -1).unwrap_err();
        assert!(matches!(err, BridgeError::CyclicReference));
        assert_eq!(state.top(), 2);
        assert_eq!(state.live_references(), 0);
    }

    #[test]
    fn test_from_stack_rejects_self_key() {
        let mut state = MemoryState::new();
        state.create_table();
        state.push_copy(-1);
        state.push_bool(true);
        state.set_table(-3).unwrap();

        let err = Table::from_stack(&mut state, 1).unwrap_err();
        assert!(matches!(err, BridgeError::CyclicReference));
        assert_eq!(state.top(), 1);
    }

    #[test]
    fn test_from_stack_rejects_indirect_cycle() {
        let mut state = MemoryState::new();
        // outer = {}; inner = { back = outer }; outer.inner = inner
        state.create_table();
        state.create_table();
        state.push_copy(1);
        state.set_field(2, "back").unwrap();
        state.set_field(1, "inner").unwrap();

        let err = Value::from_stack(&mut state, 1).unwrap_err();
        assert!(matches!(err, BridgeError::CyclicReference));
        assert_eq!(state.live_references(), 0);
    }
}
