//! Declaration patterns lifted from real headers: duplicated prototypes,
//! forward declarations, conditional class bodies, specializations, overload
//! families and out-of-line definitions.

use protocol::{
    BranchId, Classification, DeclKind, DeclarationRecord, DiagnosticKind, Qualifier, Qualifiers, Severity,
    SourceSpan, UnitStatus,
};

use crate::config::EngineConfig;
use crate::emit::UnitSet;
use crate::pipeline::{Pipeline, TranslationUnit};

struct Rec(DeclarationRecord);

impl Rec {
    fn new(kind: DeclKind, name: &str, file: &str, start: u32) -> Self {
        let qualified_name: Vec<String> = name.split("::").map(str::to_string).collect();
        Rec(DeclarationRecord {
            kind,
            qualified_name,
            namespace_path: vec![],
            signature: if kind.is_callable() { Some(vec![]) } else { None },
            qualifiers: Qualifiers::default(),
            template_args: vec![],
            has_body: false,
            body_digest: None,
            branch_id: BranchId::Unconditional,
            source_span: SourceSpan::new(file, start, start + 16),
        })
    }

    fn ns(mut self, path: &str) -> Self {
        self.0.namespace_path = path.split("::").map(str::to_string).collect();
        self
    }

    fn params(mut self, params: &[&str]) -> Self {
        self.0.signature = Some(params.iter().map(|p| p.to_string()).collect());
        self
    }

    fn body(mut self, text: &str) -> Self {
        self.0.has_body = true;
        self.0.body_digest = Some(DeclarationRecord::digest_body(text));
        self
    }

    fn branch(mut self, id: &str) -> Self {
        self.0.branch_id = BranchId::conditional(id);
        self
    }

    fn quals(mut self, quals: &[Qualifier]) -> Self {
        self.0.qualifiers.cv_ref = quals.iter().copied().collect();
        self
    }

    fn noexcept(mut self, text: &str) -> Self {
        self.0.qualifiers.noexcept = Some(text.into());
        self
    }

    fn targs(mut self, args: &[&str]) -> Self {
        self.0.template_args = args.iter().map(|a| a.to_string()).collect();
        self
    }
}

fn run(records: Vec<Rec>) -> UnitSet {
    let tu = TranslationUnit::new("tu.cpp", records.into_iter().map(|r| r.0).collect());
    Pipeline::default().run_translation_unit(&tu).unwrap()
}

#[test]
fn test_duplicated_prototypes_fold_to_one_declaration() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "free_func", "duplicates.h", 0).params(&["int"]),
        Rec::new(DeclKind::Function, "free_func", "duplicates.h", 40).params(&["int"]),
        Rec::new(DeclKind::Function, "free_func", "duplicates.h", 80).params(&["int"]),
    ]);

    assert_eq!(set.len(), 1);
    let unit = &set.units[0];
    assert_eq!(unit.classification, Classification::DeclDefPair);
    assert!(!unit.definition_present);
    assert_eq!(unit.contributing_occurrences.len(), 3);
    assert!(set.diagnostics.is_empty());
}

#[test]
fn test_forward_declared_class_then_defined() {
    let set = run(vec![
        Rec::new(DeclKind::Class, "ForwardDeclClass", "forward.h", 0),
        Rec::new(DeclKind::Function, "useForward", "forward.h", 30).params(&["ForwardDeclClass *"]),
        Rec::new(DeclKind::Class, "ForwardDeclClass", "forward.h", 90).body("{ public: int value; }"),
    ]);

    let classes: Vec<_> = set.units_named("ForwardDeclClass").collect();
    assert_eq!(classes.len(), 1);
    assert!(classes[0].definition_present);
    assert_eq!(classes[0].classification, Classification::DeclDefPair);
    // The class keeps the slot of its first sighting.
    assert_eq!(set.units[0].fqn(), "ForwardDeclClass");
}

#[test]
fn test_conditional_class_bodies_are_branch_duplicates() {
    let set = run(vec![
        Rec::new(DeclKind::Class, "ConditionalClass", "cond.h", 10).branch("cond.h#if:1").body("{ int a; }"),
        Rec::new(DeclKind::Class, "ConditionalClass", "cond.h", 60).branch("cond.h#else:1").body("{ long a; }"),
    ]);

    assert_eq!(set.len(), 1);
    let unit = &set.units[0];
    assert_eq!(unit.classification, Classification::BranchDuplicate);
    assert_eq!(unit.status, UnitStatus::Canonical);
    assert_eq!(unit.contributing_occurrences.len(), 2);

    let notes: Vec<_> = set.diagnostics_of(DiagnosticKind::BranchDuplicate).collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Note);
}

#[test]
fn test_branch_notes_can_be_silenced() {
    let records = vec![
        Rec::new(DeclKind::Class, "ConditionalClass", "cond.h", 10).branch("cond.h#if:1").body("{ int a; }"),
        Rec::new(DeclKind::Class, "ConditionalClass", "cond.h", 60).branch("cond.h#else:1").body("{ long a; }"),
    ];
    let tu = TranslationUnit::new("tu.cpp", records.into_iter().map(|r| r.0).collect());
    let set = Pipeline::new(EngineConfig::default().without_branch_notes()).run_translation_unit(&tu).unwrap();

    assert_eq!(set.units[0].classification, Classification::BranchDuplicate);
    assert!(set.diagnostics.is_empty());
}

#[test]
fn test_one_body_across_branches_is_a_plain_pair() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "platform_init", "plat.h", 0).branch("plat.h#if:4"),
        Rec::new(DeclKind::Function, "platform_init", "plat.h", 50).branch("plat.h#else:4").body("{}"),
    ]);
    assert_eq!(set.units[0].classification, Classification::DeclDefPair);
}

#[test]
fn test_template_specialization_stays_separate() {
    let set = run(vec![
        Rec::new(DeclKind::Class, "TemplateClass", "templates.h", 0).body("{ T value; }"),
        Rec::new(DeclKind::MemberFunction, "TemplateClass::get", "templates.h", 20).params(&[]),
        Rec::new(DeclKind::Class, "TemplateClass", "templates.h", 80).targs(&["int"]).body("{ int value; }"),
        Rec::new(DeclKind::MemberFunction, "TemplateClass::get", "templates.h", 100).params(&[]),
    ]);

    let classes: Vec<_> = set.units_named("TemplateClass").collect();
    assert_eq!(classes.len(), 2);
    assert!(classes.iter().all(|c| c.classification == Classification::Single));

    let getters: Vec<_> = set.units_named("TemplateClass::get").collect();
    assert_eq!(getters.len(), 1);
    assert_eq!(getters[0].contributing_occurrences.len(), 2);
}

#[test]
fn test_overload_family_keeps_every_signature() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "overloaded", "overloads.h", 0).params(&["int"]),
        Rec::new(DeclKind::Function, "overloaded", "overloads.h", 20).params(&["double"]),
        Rec::new(DeclKind::Function, "overloaded", "overloads.h", 40).params(&["int", "int"]),
        Rec::new(DeclKind::Function, "overloaded", "overloads.h", 60).params(&["int"]).body("{ return; }"),
    ]);

    assert_eq!(set.len(), 3);
    let signatures: Vec<Vec<String>> = set.units.iter().map(|u| u.signature.clone()).collect();
    assert_eq!(
        signatures,
        vec![vec!["int".to_string()], vec!["double".to_string()], vec!["int".to_string(), "int".to_string()]]
    );
    assert!(set.units[0].definition_present);
}

#[test]
fn test_cv_and_ref_qualified_overloads() {
    let set = run(vec![
        Rec::new(DeclKind::MemberFunction, "Widget::get", "widget.h", 0),
        Rec::new(DeclKind::MemberFunction, "Widget::get", "widget.h", 20).quals(&[Qualifier::Const]),
        Rec::new(DeclKind::MemberFunction, "Widget::get", "widget.h", 40).quals(&[Qualifier::Volatile]),
        Rec::new(DeclKind::MemberFunction, "Widget::get", "widget.h", 60).quals(&[Qualifier::RvalueRef]),
        Rec::new(DeclKind::MemberFunction, "Widget::get", "widget.h", 80).quals(&[Qualifier::Const, Qualifier::LvalueRef]),
    ]);

    assert_eq!(set.len(), 5);
    assert!(set.units.iter().all(|u| u.classification == Classification::Single));
}

#[test]
fn test_noexcept_variants_collapse_with_recorded_conflict() {
    let set = run(vec![
        Rec::new(DeclKind::MemberFunction, "Buffer::swap", "buffer.h", 0).noexcept("noexcept"),
        Rec::new(DeclKind::MemberFunction, "Buffer::swap", "buffer.cpp", 0)
            .noexcept("noexcept(std::is_nothrow_swappable_v<T>)")
            .body("{ std::swap(data, other.data); }"),
    ]);

    assert_eq!(set.len(), 1);
    let unit = &set.units[0];
    assert_eq!(unit.classification, Classification::QualifierConflict);
    assert_eq!(unit.qualifiers.noexcept, None);
    assert_eq!(
        unit.qualifier_conflicts,
        vec![Some("noexcept".to_string()), Some("noexcept(std::is_nothrow_swappable_v<T>)".to_string())]
    );

    let warnings: Vec<_> = set.diagnostics_of(DiagnosticKind::QualifierConflict).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(warnings[0].spans.len(), 2);
}

#[test]
fn test_agreeing_noexcept_is_kept() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "hash", "h.h", 0).noexcept("noexcept"),
        Rec::new(DeclKind::Function, "hash", "h.cpp", 0).noexcept("noexcept").body("{ return 0; }"),
    ]);
    assert_eq!(set.units[0].qualifiers.noexcept.as_deref(), Some("noexcept"));
    assert!(set.units[0].qualifier_conflicts.is_empty());
}

#[test]
fn test_out_of_line_member_definition_joins_in_class_declaration() {
    let set = run(vec![
        Rec::new(DeclKind::Namespace, "geo", "geo.h", 0).body("{}"),
        Rec::new(DeclKind::Class, "geo::Point", "geo.h", 10).ns("geo").body("{ double x, y; }"),
        Rec::new(DeclKind::MemberFunction, "geo::Point::norm", "geo.h", 30)
            .ns("geo")
            .params(&[])
            .quals(&[Qualifier::Const]),
        Rec::new(DeclKind::MemberFunction, "geo::Point::norm", "geo.cpp", 200)
            .ns("geo")
            .params(&["void"])
            .quals(&[Qualifier::Const])
            .body("{ return std::sqrt(x * x + y * y); }"),
    ]);

    let norm: Vec<_> = set.units_named("geo::Point::norm").collect();
    assert_eq!(norm.len(), 1);
    assert!(norm[0].definition_present);
    let files: Vec<&str> = norm[0].contributing_spans().map(|s| s.file.as_str()).collect();
    assert_eq!(files, vec!["geo.h", "geo.cpp"]);

    let point = set.units_named("geo::Point").next().unwrap();
    assert_eq!(point.member_set.len(), 1);
    let geo = set.units_named("geo").next().unwrap();
    assert_eq!(geo.member_set.iter().map(|k| k.fqn()).collect::<Vec<_>>(), vec!["geo::Point"]);
}

#[test]
fn test_contradictory_bodies_reported_not_merged() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "version", "v1.h", 0).body("{ return 1; }"),
        Rec::new(DeclKind::Function, "version", "v2.h", 0).body("{ return 2; }"),
    ]);

    assert_eq!(set.len(), 2);
    assert_eq!(set.conflicts().count(), 2);
    let errors: Vec<_> = set.diagnostics_of(DiagnosticKind::TrueConflict).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, Severity::Error);
}

#[test]
fn test_malformed_record_does_not_poison_the_rest() {
    let mut broken = Rec::new(DeclKind::Variable, "counter", "globals.h", 0);
    broken.0.qualifiers.noexcept = Some("noexcept".into());
    let set = run(vec![broken, Rec::new(DeclKind::Variable, "limit", "globals.h", 20)]);

    assert_eq!(set.len(), 1);
    assert_eq!(set.units[0].fqn(), "limit");
    let malformed: Vec<_> = set.diagnostics_of(DiagnosticKind::Malformed).collect();
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].message, "variable 'counter' cannot carry a noexcept clause");
}

#[test]
fn test_conditional_override_of_unconditional_body_is_kept_as_alternative() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "f", "p.h", 0).body("{ return 1; }"),
        Rec::new(DeclKind::Function, "f", "p.h", 40).branch("p.h#ifdef:X").body("{ return 2; }"),
    ]);

    assert_eq!(set.len(), 1);
    assert_eq!(set.units[0].classification, Classification::BranchDuplicate);
    assert_eq!(set.units[0].contributing_occurrences.len(), 2);
    let notes: Vec<_> = set.diagnostics_of(DiagnosticKind::BranchDuplicate).collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].spans.len(), 2);
}

#[test]
fn test_noexcept_spacing_variants_agree() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "reset", "r.h", 0).noexcept("noexcept(true)"),
        Rec::new(DeclKind::Function, "reset", "r.cpp", 0).noexcept("noexcept( true )").body("{}"),
    ]);

    assert_eq!(set.units[0].classification, Classification::DeclDefPair);
    assert_eq!(set.units[0].qualifiers.noexcept.as_deref(), Some("noexcept(true)"));
    assert!(set.units[0].qualifier_conflicts.is_empty());
    assert!(set.diagnostics.is_empty());
}

#[test]
fn test_primary_definition_prefers_source_over_header_over_declaration() {
    let set = run(vec![
        Rec::new(DeclKind::Function, "area", "shape.h", 0).params(&["double"]),
        Rec::new(DeclKind::Function, "area", "shape_inl.h", 30).params(&["double"]).body("{ return r * r; }"),
        Rec::new(DeclKind::Function, "area", "shape.cpp", 90).params(&["double"]).body("{ return r * r; }"),
    ]);

    let area = &set.units[0];
    assert_eq!(area.primary_definition().map(|o| o.span.file.as_str()), Some("shape.cpp"));
    // Provenance itself stays in encounter order.
    let files: Vec<&str> = area.contributing_spans().map(|s| s.file.as_str()).collect();
    assert_eq!(files, vec!["shape.h", "shape_inl.h", "shape.cpp"]);
}
