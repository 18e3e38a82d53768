//! The `<base>-<version>` naming scheme SSA construction writes into every
//! `dest`/`src` field of the IR once renaming has run.

use std::fmt;

/// A versioned SSA name: `base-version`. Version `0` is the sentinel that
/// marks a use with no preceding definition in the unit (a program input).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SsaVariable {
    pub base: String,
    pub version: i64,
}

impl SsaVariable {
    pub fn new(base: impl Into<String>, version: i64) -> Self {
        Self {
            base: base.into(),
            version,
        }
    }

    /// The rename-walk sentinel: version `0`, used for a name not yet
    /// pushed onto [`crate::ssa::builder`]'s per-name stack.
    pub fn sentinel(base: impl Into<String>) -> Self {
        Self::new(base, 0)
    }
}

impl fmt::Display for SsaVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(SsaVariable::new("r0", 3).to_string(), "r0-3");
        assert_eq!(SsaVariable::sentinel("r0").to_string(), "r0-0");
    }
}
