use protocol::{DeclKind, SourceSpan, VersionMismatch};
use thiserror::Error;

/// Structural problems that keep a record out of every bucket.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("record has an empty qualified name")]
    EmptyName,

    #[error("name segment {index} of '{name}' is blank")]
    BlankSegment { name: String, index: usize },

    #[error("namespace path '{path}' is not a strict prefix of '{name}'")]
    NamespacePathMismatch { path: String, name: String },

    #[error("{kind} '{name}' has no parameter list")]
    MissingSignature { kind: DeclKind, name: String },

    #[error("{kind} '{name}' cannot carry parameters")]
    UnexpectedSignature { kind: DeclKind, name: String },

    #[error("{kind} '{name}' cannot carry cv or ref qualifiers")]
    UnexpectedQualifiers { kind: DeclKind, name: String },

    #[error("{kind} '{name}' cannot carry a noexcept clause")]
    UnexpectedNoexcept { kind: DeclKind, name: String },

    #[error("namespace '{name}' cannot carry template arguments")]
    TemplatedNamespace { name: String },

    #[error("source span ends before it starts")]
    InvertedSpan,

    #[error("unit '{name}' has no contributing occurrences")]
    NoOccurrences { name: String },
}

/// A rejected record, tied to where it came from when that is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub span: Option<SourceSpan>,
    pub reason: MalformedRecord,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("run aborted before translation unit '{0}' completed")]
    Aborted(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Schema(#[from] VersionMismatch),
}

pub type Result<T> = std::result::Result<T, EngineError>;
