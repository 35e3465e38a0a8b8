//! End-to-end scenarios through the public facade.

use crate::{
    Compiler, EmptyActivation, EvalError, MapActivation, Navigator, Runtime, TraversalOrder,
    Value,
};
use celang_core::types::CelType;

fn eval(text: &str) -> Result<Value, EvalError> {
    let checked = Compiler::standard()
        .compile(text)
        .into_checked_ast()
        .unwrap_or_else(|e| panic!("compile failed for {text:?}: {e}"));
    Runtime::standard().program(checked).eval(&EmptyActivation)
}

#[test]
fn scenario_relations_chain() {
    assert_eq!(
        eval("1 < 2 && 1 <= 1 && 2 > 1 && 1 >= 1 && 1 == 1 && 2 != 1").unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn scenario_starts_with_bindings() {
    let compiler = Compiler::builder()
        .add_var("resource.name", CelType::String)
        .add_var("group", CelType::String)
        .build()
        .unwrap();
    let checked = compiler
        .compile("resource.name.startsWith('/groups/' + group)")
        .into_checked_ast()
        .unwrap();
    let program = Runtime::standard().program(checked);
    let activation = MapActivation::new()
        .bind("resource.name", "/groups/admin")
        .bind("group", "admin");
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(true));
}

#[test]
fn scenario_comprehension_macros() {
    assert_eq!(eval("[0, 1, 2].exists(x, x > 1)").unwrap(), Value::Bool(true));
    assert_eq!(eval("[0, 1, 2].all(x, x >= 0)").unwrap(), Value::Bool(true));
    assert_eq!(
        eval("[0, 1, 2].filter(x, x > 0)").unwrap(),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        eval("[0, 1, 2].map(x, x + 1)").unwrap(),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn scenario_error_absorption() {
    assert_eq!(eval("true || (1 / 0 > 2)").unwrap(), Value::Bool(true));
    assert_eq!(eval("false || (1 / 0 > 2)"), Err(EvalError::DivisionByZero));
}

#[test]
fn scenario_candidate_name_order() {
    let container = crate::Container::builder("a.b.c.M.N").build().unwrap();
    assert_eq!(
        container.resolve_candidate_names("R.s"),
        vec![
            "a.b.c.M.N.R.s",
            "a.b.c.M.R.s",
            "a.b.c.R.s",
            "a.b.R.s",
            "a.R.s",
            "R.s",
        ]
    );
    assert_eq!(container.resolve_candidate_names(".R.s"), vec!["R.s"]);
}

#[test]
fn scenario_overflow_trapping() {
    assert_eq!(eval("9223372036854775807 + 1"), Err(EvalError::Overflow));
    assert_eq!(eval("-9223372036854775808 - 1"), Err(EvalError::Overflow));
    assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
    assert_eq!(eval("1 % 0"), Err(EvalError::ModulusByZero));
}

#[test]
fn navigator_metrics_over_compiled_ast() {
    let parsed = Compiler::standard()
        .parse("f(a + b, c)")
        .parsed_ast()
        .unwrap()
        .clone();
    let nav = Navigator::new(&parsed.root).unwrap();
    let root = nav.root();

    // Pre and post order cover the same multiset of nodes.
    let mut pre: Vec<_> = root
        .all_nodes(TraversalOrder::Pre)
        .map(|n| n.id())
        .collect();
    let mut post: Vec<_> = root
        .all_nodes(TraversalOrder::Post)
        .map(|n| n.id())
        .collect();
    assert_eq!(pre.len(), post.len());
    pre.sort_unstable();
    post.sort_unstable();
    assert_eq!(pre, post);

    // Height and max-id consistency.
    for node in root.all_nodes(TraversalOrder::Pre) {
        let child_heights: Vec<u32> = node.children().map(|c| c.height()).collect();
        match child_heights.iter().max() {
            None => assert_eq!(node.height(), 0),
            Some(max) => assert_eq!(node.height(), max + 1),
        }
        for descendant in node.descendants(TraversalOrder::Pre) {
            assert!(node.max_id() >= descendant.id());
        }
    }
}

#[test]
fn checked_ast_round_trips_with_annotations() {
    let checked = Compiler::standard()
        .compile("[1, 2].map(x, x * 2) == [2, 4]")
        .into_checked_ast()
        .unwrap();
    let bytes = crate::wire::checked_to_bytes(&checked).unwrap();
    let back = crate::wire::checked_from_bytes(&bytes).unwrap();
    assert_eq!(back, checked);

    // The deserialized AST still evaluates.
    let program = Runtime::standard().program(back);
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(true));
}

#[test]
fn determinism_across_runs() {
    let checked = Compiler::standard()
        .compile("{'k': [1, 2, 3]}['k'].map(x, x * x)")
        .into_checked_ast()
        .unwrap();
    let program = Runtime::standard().program(checked);
    let first = program.eval(&EmptyActivation).unwrap();
    for _ in 0..10 {
        assert_eq!(program.eval(&EmptyActivation).unwrap(), first);
    }
}
