use std::fmt;

/// Opaque native handle stored in the runtime.
///
/// `subtype` 0 is plain userdata; other values tag handles created for a
/// specific native class (the runtime's custom type ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserdataHandle {
    subtype: u16,
    addr: usize,
}

impl UserdataHandle {
    pub const fn new(addr: usize) -> Self {
        Self { subtype: 0, addr }
    }

    pub const fn with_subtype(subtype: u16, addr: usize) -> Self {
        Self { subtype, addr }
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self::new(ptr as usize)
    }

    pub const fn null() -> Self {
        Self::new(0)
    }

    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    pub fn subtype(&self) -> u16 {
        self.subtype
    }

    pub fn addr(&self) -> usize {
        self.addr
    }
}

impl fmt::Display for UserdataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subtype == 0 {
            write!(f, "userdata: {:#x}", self.addr)
        } else {
            write!(f, "userdata<{}>: {:#x}", self.subtype, self.addr)
        }
    }
}
