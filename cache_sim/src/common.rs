use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// byte address of a data reference
pub struct Addr(u64);

impl Addr {
    pub fn new(v: u64) -> Self {
        Self(v)
    }
    pub fn inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// kind of a trace record, keyed by its letter in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AccessKind {
    /// `I`
    Instruction = 0x49,
    /// `L`
    Load = 0x4c,
    /// `S`
    Store = 0x53,
    /// `M`: a load immediately followed by a store to the same address
    Modify = 0x4d,
}

impl AccessKind {
    /// number of data cache accesses a record of this kind causes.
    pub fn accesses(self) -> usize {
        match self {
            AccessKind::Instruction => 0,
            AccessKind::Load | AccessKind::Store => 1,
            AccessKind::Modify => 2,
        }
    }
    pub fn letter(self) -> char {
        char::from(u8::from(self))
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub kind: AccessKind,
    pub addr: Addr,
    /// bytes touched; carried for display only
    pub size: u32,
}

impl TraceRecord {
    pub fn new(kind: AccessKind, addr: u64, size: u32) -> Self {
        Self {
            kind,
            addr: Addr::new(addr),
            size,
        }
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {},{}", self.kind, self.addr, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_kind_letter() {
        assert_eq!(Some(AccessKind::Modify), AccessKind::try_from(b'M').ok());
        assert_eq!(Some(AccessKind::Instruction), AccessKind::try_from(b'I').ok());
        assert!(AccessKind::try_from(b'X').is_err());
        assert_eq!('S', AccessKind::Store.letter());
        assert_eq!(b'L', u8::from(AccessKind::Load));
    }
    #[test]
    fn test_record_display() {
        let r = TraceRecord::new(AccessKind::Modify, 0x7ff000388, 4);
        assert_eq!("M 7ff000388,4", format!("{r}"));
    }
}
