//! Labels the relationship between the members of one identity bucket.
//!
//! Every decision here is taken over the multiset of occurrences, so permuting
//! the input never changes a bucket's classification.

use protocol::{BranchId, Classification, DeclKind};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::index::Bucket;

/// Facts about a bucket that the classification rules are stated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketProfile {
    pub occurrences: usize,
    pub bodies: usize,
    /// Distinct noexcept texts in first-seen order; `None` is "no clause".
    pub noexcept_texts: Vec<Option<String>>,
    pub conditional_branches: usize,
    /// Branches holding two or more bodies with different known content.
    pub conflicting_branches: Vec<BranchId>,
    /// Bodies sit in more than one branch group and are not all the same text.
    pub diverging_bodies: bool,
}

impl BucketProfile {
    pub fn of(bucket: &Bucket) -> Self {
        let mut occurrences = 0;
        let mut bodies = 0;
        let mut noexcept_texts: Vec<Option<String>> = Vec::new();
        let mut branches: FxHashSet<&BranchId> = FxHashSet::default();
        let mut digests: FxHashMap<&BranchId, FxHashSet<&str>> = FxHashMap::default();
        let mut body_branches: FxHashSet<&BranchId> = FxHashSet::default();
        let mut all_digests: FxHashSet<&str> = FxHashSet::default();
        let mut undigested_bodies = 0;

        for occ in bucket.occurrences() {
            occurrences += 1;
            if !noexcept_texts.contains(&occ.noexcept) {
                noexcept_texts.push(occ.noexcept.clone());
            }
            if occ.branch_id.is_conditional() {
                branches.insert(&occ.branch_id);
            }
            if occ.has_body {
                bodies += 1;
                body_branches.insert(&occ.branch_id);
                match occ.body_digest.as_deref() {
                    Some(digest) => {
                        digests.entry(&occ.branch_id).or_default().insert(digest);
                        all_digests.insert(digest);
                    }
                    None => undigested_bodies += 1,
                }
            }
        }

        let mut conflicting_branches: Vec<BranchId> = digests
            .into_iter()
            .filter(|(_, seen)| seen.len() > 1)
            .map(|(branch, _)| branch.clone())
            .collect();
        conflicting_branches.sort();
        let diverging_bodies = body_branches.len() > 1 && (all_digests.len() > 1 || undigested_bodies > 0);

        Self {
            occurrences,
            bodies,
            noexcept_texts,
            conditional_branches: branches.len(),
            conflicting_branches,
            diverging_bodies,
        }
    }

    pub fn has_qualifier_conflict(&self) -> bool {
        self.noexcept_texts.len() > 1
    }
}

/// Namespaces are the only kind whose repeated occurrences are reopenings by
/// definition; aggregates fold as declaration/definition pairs instead.
fn reopens(kind: DeclKind) -> bool {
    match kind {
        DeclKind::Namespace => true,
        DeclKind::Class
        | DeclKind::Struct
        | DeclKind::Union
        | DeclKind::Enum
        | DeclKind::EnumClass
        | DeclKind::Function
        | DeclKind::MemberFunction
        | DeclKind::TypeAlias
        | DeclKind::Variable
        | DeclKind::OperatorFunction => false,
    }
}

pub fn classify(bucket: &Bucket) -> Classification {
    classify_profile(bucket.key.kind, &BucketProfile::of(bucket))
}

pub fn classify_profile(kind: DeclKind, profile: &BucketProfile) -> Classification {
    if profile.occurrences <= 1 {
        return Classification::Single;
    }
    if reopens(kind) {
        return Classification::Reopening;
    }
    if !profile.conflicting_branches.is_empty() {
        return Classification::TrueConflict;
    }
    if profile.has_qualifier_conflict() {
        return Classification::QualifierConflict;
    }
    if profile.conditional_branches >= 2 && profile.bodies != 1 {
        return Classification::BranchDuplicate;
    }
    // An unconditional body next to a different conditional one.
    if profile.diverging_bodies {
        return Classification::BranchDuplicate;
    }
    Classification::DeclDefPair
}
