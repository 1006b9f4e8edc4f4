use core::cmp::Ordering;
use core::fmt;

use internment::Intern;

/// Canonical interned key for an identifier or function name.
///
/// Interning gives every distinct spelling one process-wide instance, so
/// copies are free and equality/hashing never touch the character data.
/// Symbol tables and function maps key on this exclusively.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SymbolId(Intern<String>);

impl SymbolId {
    pub fn new(name: &str) -> Self {
        SymbolId(Intern::from_ref(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(name: &str) -> Self {
        SymbolId::new(name)
    }
}

impl From<String> for SymbolId {
    fn from(name: String) -> Self {
        SymbolId(Intern::new(name))
    }
}

impl PartialOrd for SymbolId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SymbolId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}
