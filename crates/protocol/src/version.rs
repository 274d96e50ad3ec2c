use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{CodeUnit, Diagnostic};

/// Version of the serialized unit-set document layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u16,
    pub minor: u16,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

    /// Readers accept any minor revision of their own major version.
    pub fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.major == other.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported unit-set schema {found} (this build reads {expected})")]
pub struct VersionMismatch {
    pub found: SchemaVersion,
    pub expected: SchemaVersion,
}

/// Serialized form of an emitted unit set, as handed to graph builders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitSetDocument {
    pub schema_version: SchemaVersion,
    pub units: Vec<CodeUnit>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl UnitSetDocument {
    pub fn new(units: Vec<CodeUnit>, diagnostics: Vec<Diagnostic>) -> Self {
        Self { schema_version: SchemaVersion::CURRENT, units, diagnostics }
    }

    pub fn check_version(&self) -> Result<(), VersionMismatch> {
        if SchemaVersion::CURRENT.is_compatible_with(&self.schema_version) {
            Ok(())
        } else {
            Err(VersionMismatch { found: self.schema_version, expected: SchemaVersion::CURRENT })
        }
    }
}
