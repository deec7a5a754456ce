//! Replication positions
//!
//! A position totally orders the primary's change history. A replica has
//! caught up to a write once its applied position reaches the primary's
//! position at the time of that write.

use std::fmt;

/// A totally ordered position in the primary's change history.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ReplicationPosition(u64);

impl ReplicationPosition {
    /// Creates a position with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Position before any change was applied.
    #[inline]
    pub fn genesis() -> Self {
        Self(0)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The position following this one.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ReplicationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_and_next() {
        let p = ReplicationPosition::genesis();
        assert_eq!(p.value(), 0);
        assert_eq!(p.next(), ReplicationPosition::new(1));
        assert!(p < p.next());
    }
}
