// types.rs - Runtime type lattice
//
// Discriminants follow the embedding runtime's type ids. Id 2 (light userdata)
// is folded into `Userdata`.

use std::fmt;

/// Type tag of a value on the stack or inside a [`crate::Value`].
///
/// The derived ordering is the cross-variant ordering used by `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Nil = 0,
    Boolean = 1,
    Number = 3,
    String = 4,
    Table = 5,
    Function = 6,
    Userdata = 7,
}

impl TypeTag {
    pub const ALL: [TypeTag; 7] = [
        TypeTag::Nil,
        TypeTag::Boolean,
        TypeTag::Number,
        TypeTag::String,
        TypeTag::Table,
        TypeTag::Function,
        TypeTag::Userdata,
    ];

    /// Name as reported by the runtime's `type()` builtin.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Nil => "nil",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Table => "table",
            TypeTag::Function => "function",
            TypeTag::Userdata => "userdata",
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
