//! Connection targets

use std::fmt;

/// Which endpoint an operation wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    /// The primary. Requesting it marks the domain written.
    Primary,
    /// Any replica; possibly lagged
    Replica,
    /// A particular endpoint by index (0 = primary, replicas from 1)
    Specific(usize),
}

impl fmt::Display for ReadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadTarget::Primary => write!(f, "primary"),
            ReadTarget::Replica => write!(f, "replica"),
            ReadTarget::Specific(index) => write!(f, "endpoint #{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ReadTarget::Primary.to_string(), "primary");
        assert_eq!(ReadTarget::Replica.to_string(), "replica");
        assert_eq!(ReadTarget::Specific(2).to_string(), "endpoint #2");
    }
}
