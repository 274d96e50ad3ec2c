//! Identity keys: the rules for "same" versus "different" code unit.
//!
//! A key is built from `kind`, `qualified_name`, the parameter type descriptors,
//! the cv/ref qualifier set and the template arguments. Preprocessor branch,
//! body presence, provenance and the `noexcept` text never participate.

use protocol::{CodeUnit, DeclKind, DeclarationRecord, IdentityKey};

use crate::error::MalformedRecord;

const TIGHT_PUNCTUATION: &[char] = &['*', '&', '<', '>', ',', '(', ')', '[', ']', ':'];

#[derive(Debug, Default, Clone, Copy)]
pub struct KeyBuilder;

impl KeyBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, record: &DeclarationRecord) -> Result<IdentityKey, MalformedRecord> {
        self.validate(record)?;

        let signature = match (&record.signature, record.kind.is_callable()) {
            (Some(params), true) => normalize_signature(params),
            _ => Vec::new(),
        };

        Ok(IdentityKey {
            kind: record.kind,
            qualified_name: normalize_name(&record.qualified_name),
            signature,
            cv_ref: record.qualifiers.cv_ref.clone(),
            template_args: record.template_args.iter().map(|a| normalize_type(a)).collect(),
        })
    }

    /// Recomputes the key of an already merged unit from its own fields.
    pub fn rekey(&self, unit: &CodeUnit) -> Result<IdentityKey, MalformedRecord> {
        check_name(&unit.qualified_name, &unit.namespace_path)?;
        if !unit.kind.is_callable() && !unit.signature.is_empty() {
            return Err(MalformedRecord::UnexpectedSignature { kind: unit.kind, name: unit.fqn() });
        }

        Ok(IdentityKey {
            kind: unit.kind,
            qualified_name: normalize_name(&unit.qualified_name),
            signature: normalize_signature(&unit.signature),
            cv_ref: unit.qualifiers.cv_ref.clone(),
            template_args: unit.template_args.iter().map(|a| normalize_type(a)).collect(),
        })
    }

    fn validate(&self, record: &DeclarationRecord) -> Result<(), MalformedRecord> {
        let kind = record.kind;
        check_name(&record.qualified_name, &record.namespace_path)?;
        let name = record.qualified_name.join("::");

        if record.source_span.end_byte < record.source_span.start_byte {
            return Err(MalformedRecord::InvertedSpan);
        }

        match (&record.signature, kind.is_callable()) {
            (None, true) => return Err(MalformedRecord::MissingSignature { kind, name }),
            (Some(params), false) if !params.is_empty() => {
                return Err(MalformedRecord::UnexpectedSignature { kind, name })
            }
            _ => {}
        }

        if !record.qualifiers.cv_ref.is_empty() && !kind.accepts_member_qualifiers() {
            return Err(MalformedRecord::UnexpectedQualifiers { kind, name });
        }
        if record.qualifiers.noexcept.is_some() && !kind.is_callable() {
            return Err(MalformedRecord::UnexpectedNoexcept { kind, name });
        }
        if kind == DeclKind::Namespace && !record.template_args.is_empty() {
            return Err(MalformedRecord::TemplatedNamespace { name });
        }

        Ok(())
    }
}

fn check_name(qualified_name: &[String], namespace_path: &[String]) -> Result<(), MalformedRecord> {
    if qualified_name.is_empty() {
        return Err(MalformedRecord::EmptyName);
    }
    let name = qualified_name.join("::");
    // Anonymous namespaces arrive under a placeholder segment such as "(anonymous)".
    if let Some(index) = qualified_name.iter().position(|s| s.trim().is_empty()) {
        return Err(MalformedRecord::BlankSegment { name, index });
    }
    let is_strict_prefix =
        namespace_path.len() < qualified_name.len() && qualified_name.starts_with(namespace_path);
    if !is_strict_prefix {
        return Err(MalformedRecord::NamespacePathMismatch { path: namespace_path.join("::"), name });
    }
    Ok(())
}

fn normalize_name(segments: &[String]) -> Vec<String> {
    segments.iter().map(|s| normalize_type(s)).collect()
}

/// `f(void)` and `f()` declare the same parameter list.
pub fn normalize_signature(params: &[String]) -> Vec<String> {
    let normalized: Vec<String> = params.iter().map(|p| normalize_type(p)).collect();
    if normalized.len() == 1 && normalized[0] == "void" {
        return Vec::new();
    }
    normalized
}

/// `noexcept( true )` and `noexcept(true)` are the same clause. The condition
/// itself is never evaluated.
pub fn normalize_noexcept(clause: &str) -> String {
    normalize_type(clause)
}

/// Canonical spelling of a type descriptor: single spaces between words and no
/// spaces around declarator or template punctuation.
pub fn normalize_type(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(chars.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev_tight = out.chars().last().is_some_and(|p| TIGHT_PUNCTUATION.contains(&p));
            let next_tight = chars.get(i + 1).is_some_and(|n| TIGHT_PUNCTUATION.contains(n));
            if prev_tight || next_tight {
                continue;
            }
        }
        out.push(c);
    }
    out
}
