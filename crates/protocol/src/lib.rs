use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

pub mod version;
pub use version::{SchemaVersion, UnitSetDocument, VersionMismatch};

/// Kinds of declared code units a syntax-only C++ parse can emit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Class,
    Struct,
    Union,
    Enum,
    EnumClass,
    Function,
    MemberFunction,
    Namespace,
    TypeAlias,
    Variable,
    OperatorFunction,
}

impl DeclKind {
    pub fn is_callable(&self) -> bool {
        matches!(self, DeclKind::Function | DeclKind::MemberFunction | DeclKind::OperatorFunction)
    }

    /// Kinds whose members are collected into a `member_set`.
    pub fn is_scope(&self) -> bool {
        matches!(self, DeclKind::Namespace | DeclKind::Class | DeclKind::Struct | DeclKind::Union)
    }

    /// cv and ref qualifiers only apply to non-static member functions and member operators.
    pub fn accepts_member_qualifiers(&self) -> bool {
        matches!(self, DeclKind::MemberFunction | DeclKind::OperatorFunction)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Class => "class",
            DeclKind::Struct => "struct",
            DeclKind::Union => "union",
            DeclKind::Enum => "enum",
            DeclKind::EnumClass => "enum class",
            DeclKind::Function => "function",
            DeclKind::MemberFunction => "member function",
            DeclKind::Namespace => "namespace",
            DeclKind::TypeAlias => "type alias",
            DeclKind::Variable => "variable",
            DeclKind::OperatorFunction => "operator",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    Const,
    Volatile,
    LvalueRef,
    RvalueRef,
}

impl Qualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Const => "const",
            Qualifier::Volatile => "volatile",
            Qualifier::LvalueRef => "&",
            Qualifier::RvalueRef => "&&",
        }
    }
}

/// Qualifiers trailing a function declarator.
///
/// `noexcept` is the opaque condition text as written (`noexcept`, `noexcept(true)`,
/// `noexcept(sizeof(T) > 4)`); it is never evaluated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Qualifiers {
    #[serde(default)]
    pub cv_ref: BTreeSet<Qualifier>,
    #[serde(default)]
    pub noexcept: Option<String>,
}

impl Qualifiers {
    pub fn new(cv_ref: impl IntoIterator<Item = Qualifier>) -> Self {
        Self { cv_ref: cv_ref.into_iter().collect(), noexcept: None }
    }

    pub fn with_noexcept(mut self, text: impl Into<String>) -> Self {
        self.noexcept = Some(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cv_ref.is_empty() && self.noexcept.is_none()
    }
}

/// Preprocessor branch an occurrence was parsed under.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BranchId {
    #[default]
    Unconditional,
    Conditional(String),
}

impl BranchId {
    pub fn conditional(id: impl Into<String>) -> Self {
        BranchId::Conditional(id.into())
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, BranchId::Conditional(_))
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchId::Unconditional => f.write_str("<unconditional>"),
            BranchId::Conditional(id) => f.write_str(id),
        }
    }
}

/// Provenance of an occurrence. Never part of identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub file: String,
    pub start_byte: u32,
    pub end_byte: u32,
}

const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

impl SourceSpan {
    pub fn new(file: impl Into<String>, start_byte: u32, end_byte: u32) -> Self {
        Self { file: file.into(), start_byte, end_byte }
    }

    /// True for implementation files, as opposed to headers.
    pub fn is_source_file(&self) -> bool {
        std::path::Path::new(&self.file)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{}]", self.file, self.start_byte, self.end_byte)
    }
}

/// One parser-emitted occurrence of a declaration-like construct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclarationRecord {
    pub kind: DeclKind,
    pub qualified_name: Vec<String>,
    #[serde(default)]
    pub namespace_path: Vec<String>,
    #[serde(default)]
    pub signature: Option<Vec<String>>,
    #[serde(default)]
    pub qualifiers: Qualifiers,
    #[serde(default)]
    pub template_args: Vec<String>,
    #[serde(default)]
    pub has_body: bool,
    #[serde(default)]
    pub body_digest: Option<String>,
    #[serde(default)]
    pub branch_id: BranchId,
    pub source_span: SourceSpan,
}

impl DeclarationRecord {
    /// Fingerprint of a body's text, insensitive to whitespace layout.
    pub fn digest_body(text: &str) -> String {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn simple_name(&self) -> Option<&str> {
        self.qualified_name.last().map(String::as_str)
    }

    pub fn occurrence(&self) -> Occurrence {
        Occurrence {
            span: self.source_span.clone(),
            branch_id: self.branch_id.clone(),
            has_body: self.has_body,
            body_digest: if self.has_body { self.body_digest.clone() } else { None },
            noexcept: self.qualifiers.noexcept.clone(),
        }
    }
}

/// Per-source provenance retained inside a [`CodeUnit`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Occurrence {
    pub span: SourceSpan,
    #[serde(default)]
    pub branch_id: BranchId,
    #[serde(default)]
    pub has_body: bool,
    #[serde(default)]
    pub body_digest: Option<String>,
    #[serde(default)]
    pub noexcept: Option<String>,
}

impl Occurrence {
    /// Lower is preferred: a body in a source file, then a body in a header,
    /// then a bare declaration.
    pub fn definition_rank(&self) -> u8 {
        match (self.has_body, self.span.is_source_file()) {
            (true, true) => 0,
            (true, false) => 1,
            (false, _) => 2,
        }
    }
}

/// Canonical fingerprint deciding whether two occurrences denote the same entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub kind: DeclKind,
    pub qualified_name: Vec<String>,
    pub signature: Vec<String>,
    pub cv_ref: BTreeSet<Qualifier>,
    pub template_args: Vec<String>,
}

impl IdentityKey {
    pub fn fqn(&self) -> String {
        self.qualified_name.join("::")
    }

    /// Stable node id for downstream graph builders.
    ///
    /// Hashes a length-prefixed encoding so that `["a::b"]` and `["a", "b"]`
    /// never share an id.
    pub fn fingerprint(&self) -> String {
        let mut encoded = String::new();
        push_part(&mut encoded, self.kind.as_str());
        push_list(&mut encoded, self.qualified_name.iter().map(String::as_str));
        push_list(&mut encoded, self.signature.iter().map(String::as_str));
        push_list(&mut encoded, self.cv_ref.iter().map(Qualifier::as_str));
        push_list(&mut encoded, self.template_args.iter().map(String::as_str));
        format!("{:x}", md5::compute(encoded))
    }
}

fn push_part(out: &mut String, part: &str) {
    out.push_str(&part.len().to_string());
    out.push(':');
    out.push_str(part);
}

fn push_list<'a>(out: &mut String, parts: impl ExactSizeIterator<Item = &'a str>) {
    out.push_str(&parts.len().to_string());
    out.push('#');
    for part in parts {
        push_part(out, part);
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.fqn())?;
        if !self.template_args.is_empty() {
            write!(f, "<{}>", self.template_args.join(", "))?;
        }
        if self.kind.is_callable() {
            write!(f, "({})", self.signature.join(", "))?;
        }
        for q in &self.cv_ref {
            write!(f, " {}", q.as_str())?;
        }
        Ok(())
    }
}

/// How the members of an identity bucket relate to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Single,
    DeclDefPair,
    Reopening,
    BranchDuplicate,
    QualifierConflict,
    TrueConflict,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Single => "single",
            Classification::DeclDefPair => "decl-def-pair",
            Classification::Reopening => "reopening",
            Classification::BranchDuplicate => "branch-duplicate",
            Classification::QualifierConflict => "qualifier-conflict",
            Classification::TrueConflict => "true-conflict",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Canonical,
    UnresolvedConflict,
}

/// The merged representation of one logical declared entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeUnit {
    pub key: IdentityKey,
    pub kind: DeclKind,
    pub qualified_name: Vec<String>,
    pub namespace_path: Vec<String>,
    pub signature: Vec<String>,
    pub qualifiers: Qualifiers,
    pub template_args: Vec<String>,
    pub definition_present: bool,
    pub contributing_occurrences: Vec<Occurrence>,
    #[serde(default)]
    pub member_set: IndexSet<IdentityKey>,
    #[serde(default)]
    pub qualifier_conflicts: Vec<Option<String>>,
    pub classification: Classification,
    #[serde(default)]
    pub status: UnitStatus,
}

impl CodeUnit {
    pub fn fqn(&self) -> String {
        self.qualified_name.join("::")
    }

    pub fn simple_name(&self) -> &str {
        self.qualified_name.last().map(String::as_str).unwrap_or_default()
    }

    pub fn contributing_spans(&self) -> impl Iterator<Item = &SourceSpan> {
        self.contributing_occurrences.iter().map(|o| &o.span)
    }

    pub fn is_conflict(&self) -> bool {
        self.status == UnitStatus::UnresolvedConflict
    }

    /// The occurrence a client should navigate to: the best ranked one, the
    /// earliest encountered among equals.
    pub fn primary_occurrence(&self) -> Option<&Occurrence> {
        self.contributing_occurrences.iter().min_by_key(|o| o.definition_rank())
    }

    pub fn primary_definition(&self) -> Option<&Occurrence> {
        self.primary_occurrence().filter(|o| o.has_body)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Malformed,
    BranchDuplicate,
    QualifierConflict,
    TrueConflict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Display form of the affected identity; absent for rejected records.
    pub identity: Option<String>,
    pub message: String,
    pub spans: Vec<SourceSpan>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.severity, self.message)?;
        if let Some(first) = self.spans.first() {
            write!(f, " at {}", first)?;
        }
        Ok(())
    }
}
