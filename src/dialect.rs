use crate::error::VcsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported version-control backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Git,
    Hg,
}

impl Dialect {
    pub fn binary_name(self) -> &'static str {
        match self {
            Dialect::Git => "git",
            Dialect::Hg => "hg",
        }
    }

    /// Arguments for a machine-readable status listing
    pub fn status_args(self) -> &'static str {
        match self {
            Dialect::Git => "status --porcelain",
            Dialect::Hg => "status -C",
        }
    }

    /// Arguments that print the repository root
    pub fn root_args(self) -> &'static str {
        match self {
            Dialect::Git => "rev-parse --show-toplevel",
            Dialect::Hg => "root",
        }
    }

    pub fn init_args(self) -> &'static str {
        "init"
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

impl FromStr for Dialect {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(Dialect::Git),
            "hg" | "mercurial" => Ok(Dialect::Hg),
            _ => Err(VcsError::UnknownDialect {
                name: s.to_string(),
            }),
        }
    }
}
