//! Folds classified buckets into canonical code units.

use indexmap::{IndexMap, IndexSet};
use protocol::{Classification, CodeUnit, DeclKind, IdentityKey, Occurrence, Qualifiers, UnitStatus};
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::index::Bucket;

/// Turns one bucket into its unit(s). Only a true conflict yields more than one.
pub fn resolve(bucket: Bucket, classification: Classification) -> Vec<CodeUnit> {
    let key = bucket.key;
    let namespace_path = bucket
        .fragments
        .first()
        .map(|f| f.namespace_path.clone())
        .unwrap_or_default();

    let mut members: IndexSet<IdentityKey> = IndexSet::new();
    let mut occurrences: Vec<Occurrence> = Vec::new();
    for fragment in bucket.fragments {
        members.extend(fragment.member_set);
        occurrences.extend(fragment.occurrences);
    }

    match classification {
        Classification::Single
        | Classification::DeclDefPair
        | Classification::Reopening
        | Classification::BranchDuplicate
        | Classification::QualifierConflict => vec![build_unit(
            &key,
            &namespace_path,
            occurrences,
            members,
            classification,
            UnitStatus::Canonical,
        )],
        Classification::TrueConflict => {
            let groups = split_by_body(occurrences);
            warn!("Unresolved conflict for {}: {} distinct definitions", key, groups.len());
            groups
                .into_iter()
                .map(|group| {
                    build_unit(
                        &key,
                        &namespace_path,
                        group,
                        members.clone(),
                        classification,
                        UnitStatus::UnresolvedConflict,
                    )
                })
                .collect()
        }
    }
}

/// One group per distinct body digest, in first-seen order. Occurrences whose
/// content is unknown stay with the first group so none are lost.
fn split_by_body(occurrences: Vec<Occurrence>) -> Vec<Vec<Occurrence>> {
    let mut groups: IndexMap<String, Vec<Occurrence>> = IndexMap::new();
    for occ in &occurrences {
        if let (true, Some(digest)) = (occ.has_body, occ.body_digest.as_ref()) {
            groups.entry(digest.clone()).or_default();
        }
    }
    if groups.is_empty() {
        return vec![occurrences];
    }

    for occ in occurrences {
        let slot = match (occ.has_body, occ.body_digest.as_deref()) {
            (true, Some(digest)) => groups.get_index_of(digest).unwrap_or(0),
            _ => 0,
        };
        if let Some((_, group)) = groups.get_index_mut(slot) {
            group.push(occ);
        }
    }
    groups.into_values().collect()
}

fn build_unit(
    key: &IdentityKey,
    namespace_path: &[String],
    occurrences: Vec<Occurrence>,
    member_set: IndexSet<IdentityKey>,
    classification: Classification,
    status: UnitStatus,
) -> CodeUnit {
    let mut noexcept_texts: Vec<Option<String>> = Vec::new();
    for occ in &occurrences {
        if !noexcept_texts.contains(&occ.noexcept) {
            noexcept_texts.push(occ.noexcept.clone());
        }
    }

    let (noexcept, qualifier_conflicts) = if noexcept_texts.len() > 1 {
        (None, noexcept_texts)
    } else {
        (noexcept_texts.pop().flatten(), Vec::new())
    };

    CodeUnit {
        key: key.clone(),
        kind: key.kind,
        qualified_name: key.qualified_name.clone(),
        namespace_path: namespace_path.to_vec(),
        signature: key.signature.clone(),
        qualifiers: Qualifiers { cv_ref: key.cv_ref.clone(), noexcept },
        template_args: key.template_args.clone(),
        definition_present: occurrences.iter().any(|o| o.has_body),
        contributing_occurrences: occurrences,
        member_set,
        qualifier_conflicts,
        classification,
        status,
    }
}

/// Lower ranks win when several scopes share the parent name; equal ranks
/// fall back to key order.
fn scope_rank(key: &IdentityKey) -> Option<u8> {
    match key.kind {
        DeclKind::Namespace => Some(0),
        DeclKind::Class | DeclKind::Struct | DeclKind::Union if key.template_args.is_empty() => Some(1),
        DeclKind::Class
        | DeclKind::Struct
        | DeclKind::Union
        | DeclKind::Enum
        | DeclKind::EnumClass
        | DeclKind::Function
        | DeclKind::MemberFunction
        | DeclKind::TypeAlias
        | DeclKind::Variable
        | DeclKind::OperatorFunction => None,
    }
}

/// Records every unit as a member of the scope unit directly enclosing it.
/// Existing member sets are extended, never replaced.
pub fn attach_members(units: &mut [CodeUnit]) {
    let mut scopes: FxHashMap<&[String], &IdentityKey> = FxHashMap::default();
    for unit in units.iter() {
        let Some(rank) = scope_rank(&unit.key) else { continue };
        let slot = scopes.entry(unit.key.qualified_name.as_slice()).or_insert(&unit.key);
        let current = scope_rank(*slot).map(|r| (r, *slot));
        if current.is_some_and(|held| (rank, &unit.key) < held) {
            *slot = &unit.key;
        }
    }

    let mut additions: Vec<(IdentityKey, IdentityKey)> = Vec::new();
    for unit in units.iter() {
        let name = &unit.key.qualified_name;
        if name.len() < 2 {
            continue;
        }
        if let Some(scope) = scopes.get(&name[..name.len() - 1]) {
            additions.push(((*scope).clone(), unit.key.clone()));
        }
    }

    let mut by_scope: FxHashMap<IdentityKey, Vec<IdentityKey>> = FxHashMap::default();
    for (scope, member) in additions {
        by_scope.entry(scope).or_default().push(member);
    }
    for unit in units.iter_mut() {
        if let Some(members) = by_scope.get(&unit.key) {
            unit.member_set.extend(members.iter().cloned());
        }
    }
}
