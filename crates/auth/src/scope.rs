use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// OAuth-style scope string carried in access claims (e.g. `"shipit:write"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    /// Read access to an owner's catalog and shipments.
    pub const READ: Scope = Scope(Cow::Borrowed("shipit:read"));
    /// Write access (placements, deletions).
    pub const WRITE: Scope = Scope(Cow::Borrowed("shipit:write"));

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
