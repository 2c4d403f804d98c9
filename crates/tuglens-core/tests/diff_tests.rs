//! Integration tests for structural edits and the snapshot diff

use std::collections::BTreeMap;

use proptest::prelude::*;
use tracing_subscriber::EnvFilter;
use tuglens_core::builder::{FunctionBuilder, TypeBuilder, UnitBuilder, VariableBuilder};
use tuglens_core::id;
use tuglens_core::list_edit::ListEdit;
use tuglens_core::project_edit::{diff_node, AddNode, EditFunction, EditVariable, RemoveNode};
use tuglens_core::set_edit::SetEdit;
use tuglens_core::{diff, diff_units, Function, ProjectEdit, SourceNode, SourceTree, SourceUnit, Type};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn main_unit(function: FunctionBuilder) -> SourceUnit {
    UnitBuilder::new("src/Main.java")
        .ty(TypeBuilder::new("Main").modifiers(["public"]).function(function))
        .build()
        .unwrap()
}

/// A small project with nested types, fields, methods and a second file.
fn project() -> SourceTree {
    SourceTree::of([
        UnitBuilder::new("src/Main.java")
            .ty(TypeBuilder::new("Main")
                .modifiers(["public"])
                .supertypes(["Object"])
                .variable(VariableBuilder::new("version").modifiers(["private"]).initializer(["\"1.0\""]))
                .function(
                    FunctionBuilder::new("getVersion(String)")
                        .modifiers(["public"])
                        .parameter("name")
                        .body(["{", "return version;", "}"]),
                )
                .ty(TypeBuilder::new("Inner").function(FunctionBuilder::new("run()").body(["{", "}"]))))
            .build()
            .unwrap(),
        UnitBuilder::new("src/util/Strings.java")
            .ty(TypeBuilder::new("Strings")
                .function(FunctionBuilder::new("join(String, List)").parameter("sep").parameter("parts")))
            .build()
            .unwrap(),
    ])
    .unwrap()
}

fn assert_round_trip(before: &SourceTree, after: &SourceTree) {
    let edits = diff(before, after).unwrap();
    let mut replayed = before.clone();
    replayed.apply_all(&edits).unwrap();
    assert_eq!(&replayed, after, "edits: {:#?}", edits);
}

/// Every node's parent holds exactly its current version.
fn assert_ancestors_consistent(tree: &SourceTree) {
    for node in tree.walk() {
        for child in node.children() {
            assert_eq!(tree.get(child.id()), Some(&child), "stale child '{}'", child.id());
        }
    }
    let walked = tree.walk().count();
    assert_eq!(walked, tree.index().len());
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn removing_a_method_is_one_remove_node() {
    init_tracing();
    let before =
        SourceTree::of([main_unit(FunctionBuilder::new("getVersion(String)").parameter("name"))]).unwrap();
    let after = SourceTree::of([UnitBuilder::new("src/Main.java")
        .ty(TypeBuilder::new("Main").modifiers(["public"]))
        .build()
        .unwrap()])
    .unwrap();

    let edits = diff(&before, &after).unwrap();
    assert_eq!(
        edits,
        vec![ProjectEdit::from(
            RemoveNode::new("src/Main.java:Main:getVersion(String)").unwrap()
        )]
    );

    let mut replayed = before.clone();
    replayed.apply_all(&edits).unwrap();
    let main = replayed.get_as::<Type>("src/Main.java:Main").unwrap();
    assert!(main.members().is_empty());
    assert_eq!(replayed, after);
}

#[test]
fn modifier_and_parameter_rename_is_one_function_edit() {
    init_tracing();
    let before: SourceNode = FunctionBuilder::new("getVersion(String)")
        .parameter("name")
        .build("src/Main.java:Main")
        .unwrap()
        .into();
    let after: SourceNode = FunctionBuilder::new("getVersion(String)")
        .modifiers(["public"])
        .parameter("arg")
        .build("src/Main.java:Main")
        .unwrap()
        .into();

    let edit = diff_node(&before, &after).unwrap();
    let expected = EditFunction::new("src/Main.java:Main:getVersion(String)")
        .unwrap()
        .with_modifier_edits(vec![SetEdit::Add("public".to_string())])
        .with_parameter_edits(vec![
            ListEdit::Remove { index: 0 },
            ListEdit::Add {
                index: 0,
                value: "arg".to_string(),
            },
        ]);
    assert_eq!(edit, Some(ProjectEdit::from(expected)));

    // The full snapshot diff creates the new parameter first, so only the
    // modifier remains for the function edit.
    let before_tree =
        SourceTree::of([main_unit(FunctionBuilder::new("getVersion(String)").parameter("name"))]).unwrap();
    let after_tree = SourceTree::of([main_unit(
        FunctionBuilder::new("getVersion(String)").modifiers(["public"]).parameter("arg"),
    )])
    .unwrap();
    assert_round_trip(&before_tree, &after_tree);
}

#[test]
fn same_content_through_different_histories_has_empty_diff() {
    init_tracing();
    let function_id = "src/Main.java:Main:getVersion(String)";

    // History one: edit the initializer, then add the field.
    let mut first = project();
    first
        .apply_all(&[
            EditVariable::new("src/Main.java:Main:version")
                .unwrap()
                .with_initializer_edits(vec![ListEdit::Replace {
                    index: 0,
                    value: "\"2.0\"".to_string(),
                }])
                .into(),
            AddNode::new(VariableBuilder::new("DEBUG").build("src/Main.java:Main").unwrap())
                .unwrap()
                .into(),
        ])
        .unwrap();

    // History two: add the field, touch the function and undo it, then edit
    // the initializer in two steps.
    let mut second = project();
    second
        .apply_all(&[
            AddNode::new(VariableBuilder::new("DEBUG").build("src/Main.java:Main").unwrap())
                .unwrap()
                .into(),
            EditFunction::new(function_id)
                .unwrap()
                .with_modifier_edits(vec![SetEdit::Add("static".to_string())])
                .into(),
            EditFunction::new(function_id)
                .unwrap()
                .with_modifier_edits(vec![SetEdit::Remove("static".to_string())])
                .into(),
            EditVariable::new("src/Main.java:Main:version")
                .unwrap()
                .with_initializer_edits(vec![ListEdit::Remove { index: 0 }])
                .into(),
            EditVariable::new("src/Main.java:Main:version")
                .unwrap()
                .with_initializer_edits(vec![ListEdit::Add {
                    index: 0,
                    value: "\"2.0\"".to_string(),
                }])
                .into(),
        ])
        .unwrap();

    assert_eq!(first, second);
    assert!(diff(&first, &second).unwrap().is_empty());
    assert_ancestors_consistent(&first);
    assert_ancestors_consistent(&second);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn diff_with_itself_is_empty() {
    let tree = project();
    assert!(diff(&tree, &tree).unwrap().is_empty());
}

#[test]
fn project_round_trips_against_edited_version() {
    init_tracing();
    let before = project();
    let after = SourceTree::of([
        UnitBuilder::new("src/Main.java")
            .ty(TypeBuilder::new("Main")
                .modifiers(["public", "final"])
                .variable(VariableBuilder::new("version").modifiers(["private"]).initializer(["\"1.1\""]))
                .function(
                    FunctionBuilder::new("getVersion(String)")
                        .parameter("prefix")
                        .body(["{", "return prefix + version;", "}"]),
                )
                .function(FunctionBuilder::new("main(String[])").modifiers(["static"]).parameter("args")))
            .build()
            .unwrap(),
        UnitBuilder::new("src/util/Lists.java")
            .ty(TypeBuilder::new("Lists"))
            .build()
            .unwrap(),
    ])
    .unwrap();

    assert_round_trip(&before, &after);
    assert_round_trip(&after, &before);
    assert_round_trip(&SourceTree::empty(), &after);
    assert_round_trip(&before, &SourceTree::empty());
}

#[test]
fn diff_units_matches_tree_diff() {
    let before: Vec<SourceUnit> = project().units().cloned().collect();
    let after = vec![UnitBuilder::new("src/Main.java").build().unwrap()];
    let from_units = diff_units(&before, &after).unwrap();
    let from_trees = diff(&project(), &SourceTree::of(after).unwrap()).unwrap();
    assert_eq!(from_units, from_trees);
}

#[test]
fn ancestors_stay_consistent_under_edit_sequences() {
    let mut tree = project();
    let function_id = "src/Main.java:Main:getVersion(String)";
    let edits: Vec<ProjectEdit> = vec![
        AddNode::new(VariableBuilder::new("flag").build(function_id).unwrap()).unwrap().into(),
        EditVariable::new(id::parameter_id(function_id, "name"))
            .unwrap()
            .with_modifier_edits(vec![SetEdit::Add("final".to_string())])
            .into(),
        EditFunction::new(function_id)
            .unwrap()
            .with_parameter_edits(vec![
                ListEdit::Remove { index: 1 },
                ListEdit::Add {
                    index: 0,
                    value: "flag".to_string(),
                },
            ])
            .into(),
        RemoveNode::new("src/Main.java:Main:Inner:run()").unwrap().into(),
        AddNode::new(FunctionBuilder::new("stop()").build("src/Main.java:Main:Inner").unwrap())
            .unwrap()
            .into(),
    ];
    for edit in &edits {
        tree.apply(edit).unwrap();
        assert_ancestors_consistent(&tree);
    }
    let function = tree.get_as::<Function>(function_id).unwrap();
    assert_eq!(function.parameter_names(), vec!["flag", "name"]);
    assert!(function.parameters()[1].modifiers().contains("final"));
    let unit = tree.unit("src/Main.java").unwrap();
    assert_eq!(tree.get("src/Main.java"), Some(&SourceNode::Unit(unit.clone())));
}

// ============================================================================
// Generated Snapshots
// ============================================================================

// Snapshots are generated as plain shapes first, then built, so that
// proptest can shrink a failing case down to a small tree.

const MODIFIERS: &[&str] = &["public", "private", "static", "final"];
const SUPERTYPES: &[&str] = &["Object", "Runnable"];
const NAMES: &[&str] = &["a", "b", "c", "d", "e"];
const TYPE_NAMES: &[&str] = &["T", "U"];
const LINES: &[&str] = &["{", "}", "x++;", "return x;", "call();"];

#[derive(Debug, Clone)]
struct FunctionShape {
    modifiers: Vec<&'static str>,
    parameters: Vec<&'static str>,
    body: Vec<&'static str>,
}

#[derive(Debug, Clone)]
enum MemberShape {
    Type(TypeShape),
    Function(FunctionShape),
    Variable {
        modifiers: Vec<&'static str>,
        initializer: Vec<&'static str>,
    },
}

#[derive(Debug, Clone)]
struct TypeShape {
    modifiers: Vec<&'static str>,
    supertypes: Vec<&'static str>,
    members: BTreeMap<&'static str, MemberShape>,
}

#[derive(Debug, Clone)]
struct UnitShape {
    types: BTreeMap<&'static str, TypeShape>,
    main: Option<FunctionShape>,
}

fn subset(values: &'static [&'static str]) -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(values, 0..=values.len())
}

fn lines(max: usize) -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(LINES), 0..max)
}

fn function_shape() -> impl Strategy<Value = FunctionShape> {
    // Shuffled so parameter order varies between versions.
    (subset(MODIFIERS), subset(NAMES).prop_shuffle(), lines(5)).prop_map(
        |(modifiers, parameters, body)| FunctionShape {
            modifiers,
            parameters,
            body,
        },
    )
}

fn type_body(members: impl Strategy<Value = MemberShape>) -> impl Strategy<Value = TypeShape> {
    (
        subset(MODIFIERS),
        subset(SUPERTYPES),
        prop::collection::btree_map(prop::sample::select(NAMES), members, 0..4),
    )
        .prop_map(|(modifiers, supertypes, members)| TypeShape {
            modifiers,
            supertypes,
            members,
        })
}

fn type_shape() -> impl Strategy<Value = TypeShape> {
    let leaf = prop_oneof![
        function_shape().prop_map(MemberShape::Function),
        (subset(MODIFIERS), lines(3))
            .prop_map(|(modifiers, initializer)| MemberShape::Variable { modifiers, initializer }),
    ];
    let member = leaf.prop_recursive(2, 24, 4, |inner| {
        prop_oneof![inner.clone(), type_body(inner).prop_map(MemberShape::Type)]
    });
    type_body(member)
}

fn unit_shape() -> impl Strategy<Value = UnitShape> {
    (
        prop::collection::btree_map(prop::sample::select(TYPE_NAMES), type_shape(), 0..=2),
        prop::option::of(function_shape()),
    )
        .prop_map(|(types, main)| UnitShape { types, main })
}

/// One optional unit per fixed path.
fn tree_shape() -> impl Strategy<Value = Vec<Option<UnitShape>>> {
    prop::collection::vec(prop::option::of(unit_shape()), 3)
}

fn build_function(signature: &str, shape: &FunctionShape) -> FunctionBuilder {
    let mut function = FunctionBuilder::new(signature).modifiers(shape.modifiers.clone());
    for name in &shape.parameters {
        function = function.parameter(*name);
    }
    function.body(shape.body.clone())
}

fn build_type(name: &str, shape: &TypeShape) -> TypeBuilder {
    let mut ty = TypeBuilder::new(name)
        .modifiers(shape.modifiers.clone())
        .supertypes(shape.supertypes.clone());
    for (member, member_shape) in &shape.members {
        ty = match member_shape {
            MemberShape::Type(inner) => ty.ty(build_type(&member.to_uppercase(), inner)),
            MemberShape::Function(function) => {
                ty.function(build_function(&format!("{}()", member), function))
            }
            MemberShape::Variable {
                modifiers,
                initializer,
            } => ty.variable(
                VariableBuilder::new(*member)
                    .modifiers(modifiers.clone())
                    .initializer(initializer.clone()),
            ),
        };
    }
    ty
}

fn build_tree(shape: &[Option<UnitShape>]) -> SourceTree {
    let paths = ["src/A.java", "src/B.java", "src/c/C.java"];
    let units = paths.iter().zip(shape).filter_map(|(path, unit_shape)| {
        let unit_shape = unit_shape.as_ref()?;
        let mut unit = UnitBuilder::new(*path);
        for (name, ty) in &unit_shape.types {
            unit = unit.ty(build_type(name, ty));
        }
        if let Some(main) = &unit_shape.main {
            unit = unit.function(build_function("main()", main));
        }
        Some(unit.build().unwrap())
    });
    SourceTree::of(units).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn generated_snapshots_round_trip(before in tree_shape(), after in tree_shape()) {
        init_tracing();
        let before = build_tree(&before);
        let after = build_tree(&after);
        assert_round_trip(&before, &after);
        prop_assert!(diff(&after, &after).unwrap().is_empty());
    }

    #[test]
    fn generated_edits_keep_ancestors_consistent(before in tree_shape(), after in tree_shape()) {
        let before = build_tree(&before);
        let after = build_tree(&after);
        let mut tree = before.clone();
        for edit in diff(&before, &after).unwrap() {
            tree.apply(&edit).unwrap();
            assert_ancestors_consistent(&tree);
        }
        prop_assert_eq!(tree, after);
    }
}
