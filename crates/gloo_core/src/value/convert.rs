// convert.rs - Literal conversions into and typed conversions out of Value

use super::{Callable, Table, UserdataHandle, Value};
use crate::{BridgeError, TypeTag};

macro_rules! number_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(value as f64)
                }
            }
        )+
    };
}

number_from!(f64, f32, i32, u32, i64, u64, usize);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Value::Table(Box::new(value))
    }
}

impl From<Callable> for Value {
    fn from(value: Callable) -> Self {
        Value::Function(value)
    }
}

impl From<UserdataHandle> for Value {
    fn from(value: UserdataHandle) -> Self {
        Value::Userdata(value)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

/// `TryFrom<Value>` for a host type stored in exactly one variant.
macro_rules! narrow_to {
    ($ty:ty, $tag:ident, $variant:ident($binding:ident) => $out:expr) => {
        impl TryFrom<Value> for $ty {
            type Error = BridgeError;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    Value::$variant($binding) => Ok($out),
                    other => Err(BridgeError::mismatch(TypeTag::$tag, other.type_tag())),
                }
            }
        }
    };
}

narrow_to!(bool, Boolean, Boolean(b) => b);
narrow_to!(f64, Number, Number(n) => n);
narrow_to!(String, String, String(s) => s);
narrow_to!(Table, Table, Table(t) => *t);
narrow_to!(Callable, Function, Function(f) => f);
narrow_to!(UserdataHandle, Userdata, Userdata(u) => u);

impl TryFrom<&Value> for bool {
    type Error = BridgeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_bool()
    }
}

impl TryFrom<&Value> for f64 {
    type Error = BridgeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_number()
    }
}
