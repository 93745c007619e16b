//! Partition keys
//!
//! A partition is the (sex, prop-or-component, type code) domain inside
//! which drawables are numbered and capacity-checked.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Component type names, indexed by type code
pub const COMPONENT_TYPES: [&str; 12] = [
    "head", "berd", "hair", "uppr", "lowr", "hand", "feet", "teef", "accs", "task", "decl", "jbib",
];

/// Prop type names, indexed by type code
pub const PROP_TYPES: [&str; 13] = [
    "p_head", "p_eyes", "p_ears", "p_mouth", "p_lhand", "p_rhand", "p_lwrist", "p_rwrist",
    "p_hip", "p_lfoot", "p_rfoot", "ph_lhand", "ph_rhand",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            other => Err(Error::InvalidArgument(format!("Unknown sex: {}", other))),
        }
    }
}

/// Independent numbering and capacity domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub sex: Sex,
    pub is_prop: bool,
    pub type_code: u8,
}

impl PartitionKey {
    pub fn new(sex: Sex, is_prop: bool, type_code: u8) -> Self {
        Self {
            sex,
            is_prop,
            type_code,
        }
    }

    pub fn component(sex: Sex, type_code: u8) -> Self {
        Self::new(sex, false, type_code)
    }

    pub fn prop(sex: Sex, type_code: u8) -> Self {
        Self::new(sex, true, type_code)
    }

    /// Look up a key by its type name (`jbib`, `p_head`, ...)
    pub fn from_type_name(sex: Sex, name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if let Some(code) = PROP_TYPES.iter().position(|t| *t == name) {
            return Some(Self::prop(sex, code as u8));
        }
        COMPONENT_TYPES
            .iter()
            .position(|t| *t == name)
            .map(|code| Self::component(sex, code as u8))
    }

    /// Type name for this key, `None` for codes outside the known tables
    pub fn type_name(&self) -> Option<&'static str> {
        let table: &[&'static str] = if self.is_prop {
            &PROP_TYPES
        } else {
            &COMPONENT_TYPES
        };
        table.get(self.type_code as usize).copied()
    }

    pub fn kind(&self) -> &'static str {
        if self.is_prop {
            "prop"
        } else {
            "component"
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}({})",
            self.sex,
            self.kind(),
            self.type_name().unwrap_or("unknown"),
            self.type_code
        )
    }
}
