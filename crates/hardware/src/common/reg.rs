//! Register identifiers.
//!
//! The pipeline never reads register values; it only needs to know which registers an
//! instruction reads and writes so the scoreboard can order dependent instructions.
//! Registers are written `r<n>` (integer, `x<n>` also accepted), `f<n>`, `v<n>` and `m<n>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Register file a register belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegClass {
    /// Integer registers.
    Int,
    /// Floating-point registers.
    Float,
    /// Vector registers.
    Vec,
    /// Miscellaneous (control/status) registers. Not tracked by the scoreboard.
    Misc,
}

/// An architectural register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegId {
    /// Register file.
    pub class: RegClass,
    /// Index within the file.
    pub index: u16,
}

/// A register name that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid register name `{0}`")]
pub struct ParseRegError(String);

impl RegId {
    /// Integer register `index`.
    pub const fn int(index: u16) -> Self {
        Self {
            class: RegClass::Int,
            index,
        }
    }

    /// Floating-point register `index`.
    pub const fn float(index: u16) -> Self {
        Self {
            class: RegClass::Float,
            index,
        }
    }

    /// Vector register `index`.
    pub const fn vec(index: u16) -> Self {
        Self {
            class: RegClass::Vec,
            index,
        }
    }

    /// Miscellaneous register `index`.
    pub const fn misc(index: u16) -> Self {
        Self {
            class: RegClass::Misc,
            index,
        }
    }

    /// Whether dependencies through this register are tracked.
    pub const fn is_tracked(self) -> bool {
        !matches!(self.class, RegClass::Misc)
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.class {
            RegClass::Int => 'r',
            RegClass::Float => 'f',
            RegClass::Vec => 'v',
            RegClass::Misc => 'm',
        };
        write!(f, "{prefix}{}", self.index)
    }
}

impl FromStr for RegId {
    type Err = ParseRegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let class = match chars.next() {
            Some('r' | 'x') => RegClass::Int,
            Some('f') => RegClass::Float,
            Some('v') => RegClass::Vec,
            Some('m') => RegClass::Misc,
            _ => return Err(ParseRegError(s.to_owned())),
        };
        let index = chars
            .as_str()
            .parse::<u16>()
            .map_err(|_| ParseRegError(s.to_owned()))?;
        Ok(Self { class, index })
    }
}

impl TryFrom<String> for RegId {
    type Error = ParseRegError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RegId> for String {
    fn from(reg: RegId) -> Self {
        reg.to_string()
    }
}
