use indexmap::{IndexMap, IndexSet};
use protocol::{CodeUnit, DeclarationRecord, IdentityKey, Occurrence};
use tracing::debug;

use crate::error::{MalformedRecord, Rejected};
use crate::identity::{normalize_noexcept, KeyBuilder};

/// One contribution to a bucket: a single record, or an already merged unit
/// being folded again (cross-unit pass, idempotence).
#[derive(Debug, Clone)]
pub struct Fragment {
    pub namespace_path: Vec<String>,
    pub occurrences: Vec<Occurrence>,
    pub member_set: IndexSet<IdentityKey>,
}

impl Fragment {
    fn from_record(record: &DeclarationRecord) -> Self {
        Self {
            namespace_path: record.namespace_path.clone(),
            occurrences: vec![normalized(record.occurrence())],
            member_set: IndexSet::new(),
        }
    }

    fn from_unit(unit: CodeUnit) -> Self {
        Self {
            namespace_path: unit.namespace_path,
            occurrences: unit.contributing_occurrences.into_iter().map(normalized).collect(),
            member_set: unit.member_set,
        }
    }
}

fn normalized(mut occurrence: Occurrence) -> Occurrence {
    occurrence.noexcept = occurrence.noexcept.as_deref().map(normalize_noexcept);
    occurrence
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub key: IdentityKey,
    pub fragments: Vec<Fragment>,
}

impl Bucket {
    /// All occurrences in encounter order.
    pub fn occurrences(&self) -> impl Iterator<Item = &Occurrence> {
        self.fragments.iter().flat_map(|f| f.occurrences.iter())
    }

    pub fn occurrence_count(&self) -> usize {
        self.fragments.iter().map(|f| f.occurrences.len()).sum()
    }
}

/// Identity key -> ordered occurrences sharing it, built in one pass.
///
/// Buckets keep the order in which their key was first seen; that order is the
/// emission order of the resulting units.
#[derive(Debug, Default)]
pub struct GroupingIndex {
    builder: KeyBuilder,
    buckets: IndexMap<IdentityKey, Bucket>,
    rejected: Vec<Rejected>,
}

impl GroupingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DeclarationRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert_record(record);
        }
        index
    }

    /// Returns false when the record was rejected as malformed.
    pub fn insert_record(&mut self, record: &DeclarationRecord) -> bool {
        match self.builder.build(record) {
            Ok(key) => {
                self.push(key, Fragment::from_record(record));
                true
            }
            Err(reason) => {
                debug!("Rejecting record at {}: {}", record.source_span, reason);
                self.rejected.push(Rejected { span: Some(record.source_span.clone()), reason });
                false
            }
        }
    }

    pub fn insert_unit(&mut self, unit: CodeUnit) -> bool {
        let first_span = unit.contributing_occurrences.first().map(|o| o.span.clone());
        let keyed = if unit.contributing_occurrences.is_empty() {
            Err(MalformedRecord::NoOccurrences { name: unit.fqn() })
        } else {
            self.builder.rekey(&unit)
        };

        match keyed {
            Ok(key) => {
                self.push(key, Fragment::from_unit(unit));
                true
            }
            Err(reason) => {
                debug!("Rejecting unit {}: {}", unit.fqn(), reason);
                self.rejected.push(Rejected { span: first_span, reason });
                false
            }
        }
    }

    fn push(&mut self, key: IdentityKey, fragment: Fragment) {
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Bucket { key, fragments: Vec::new() })
            .fragments
            .push(fragment);
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    pub fn rejected(&self) -> &[Rejected] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Bucket>, Vec<Rejected>) {
        (self.buckets.into_values().collect(), self.rejected)
    }
}
