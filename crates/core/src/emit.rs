use protocol::{
    Classification, CodeUnit, Diagnostic, DiagnosticKind, IdentityKey, Severity, SourceSpan, UnitSetDocument,
};
use tracing::{debug, info};

use crate::classify::BucketProfile;
use crate::error::{EngineError, Rejected};
use crate::resolve::attach_members;

/// The final deduplicated units of a run plus everything worth reporting about them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSet {
    pub units: Vec<CodeUnit>,
    pub diagnostics: Vec<Diagnostic>,
}

impl UnitSet {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// All units for a key: one, or several when the key is in conflict.
    pub fn by_key<'a>(&'a self, key: &'a IdentityKey) -> impl Iterator<Item = &'a CodeUnit> + 'a {
        self.units.iter().filter(move |u| &u.key == key)
    }

    pub fn units_named<'a>(&'a self, fqn: &'a str) -> impl Iterator<Item = &'a CodeUnit> + 'a {
        self.units.iter().filter(move |u| u.fqn() == fqn)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &CodeUnit> {
        self.units.iter().filter(|u| u.is_conflict())
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn into_document(self) -> UnitSetDocument {
        UnitSetDocument::new(self.units, self.diagnostics)
    }

    pub fn from_document(document: UnitSetDocument) -> Result<Self, EngineError> {
        document.check_version()?;
        Ok(Self { units: document.units, diagnostics: document.diagnostics })
    }
}

/// Collects resolved buckets and produces the published [`UnitSet`].
#[derive(Debug)]
pub struct Emitter {
    report_branch_duplicates: bool,
    units: Vec<CodeUnit>,
    diagnostics: Vec<Diagnostic>,
}

impl Emitter {
    pub fn new(report_branch_duplicates: bool) -> Self {
        Self { report_branch_duplicates, units: Vec::new(), diagnostics: Vec::new() }
    }

    pub fn accept(
        &mut self,
        key: &IdentityKey,
        classification: Classification,
        profile: &BucketProfile,
        units: Vec<CodeUnit>,
    ) {
        let spans: Vec<SourceSpan> = units.iter().flat_map(|u| u.contributing_spans().cloned()).collect();

        let diagnostic = match classification {
            Classification::Single | Classification::DeclDefPair | Classification::Reopening => None,
            Classification::BranchDuplicate if self.report_branch_duplicates => Some(Diagnostic {
                kind: DiagnosticKind::BranchDuplicate,
                severity: Severity::Note,
                identity: Some(key.to_string()),
                message: format!(
                    "{} differs across {} conditional preprocessor branch(es) ({} bodies kept as alternatives)",
                    key, profile.conditional_branches, profile.bodies
                ),
                spans,
            }),
            Classification::BranchDuplicate => None,
            Classification::QualifierConflict => Some(Diagnostic {
                kind: DiagnosticKind::QualifierConflict,
                severity: Severity::Warning,
                identity: Some(key.to_string()),
                message: format!(
                    "{} is declared with {} different noexcept clauses: {}",
                    key,
                    profile.noexcept_texts.len(),
                    render_noexcept(&profile.noexcept_texts)
                ),
                spans,
            }),
            Classification::TrueConflict => Some(Diagnostic {
                kind: DiagnosticKind::TrueConflict,
                severity: Severity::Error,
                identity: Some(key.to_string()),
                message: format!(
                    "{} has {} contradictory definitions in branch(es) {}",
                    key,
                    units.len(),
                    profile.conflicting_branches.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ")
                ),
                spans,
            }),
        };

        if let Some(diagnostic) = diagnostic {
            debug!("{}", diagnostic);
            self.diagnostics.push(diagnostic);
        }
        self.units.extend(units);
    }

    pub fn reject(&mut self, rejected: Rejected) {
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::Malformed,
            severity: Severity::Error,
            identity: None,
            message: rejected.reason.to_string(),
            spans: rejected.span.into_iter().collect(),
        });
    }

    /// Carries an earlier run's diagnostic into this one unchanged.
    pub fn carry(&mut self, diagnostic: Diagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn finish(mut self) -> UnitSet {
        attach_members(&mut self.units);
        info!("Emitting {} code units with {} diagnostics", self.units.len(), self.diagnostics.len());
        UnitSet { units: self.units, diagnostics: self.diagnostics }
    }
}

fn render_noexcept(texts: &[Option<String>]) -> String {
    texts
        .iter()
        .map(|t| match t {
            Some(text) => format!("'{}'", text),
            None => "<none>".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
