use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use celang_compiler::Compiler;
use celang_core::ast::CheckedAst;
use celang_core::descriptors::{EnumDescriptor, MessageDescriptor};
use celang_core::types::CelType;

use crate::activation::{EmptyActivation, FnActivation, MapActivation, PartialActivation};
use crate::error::EvalError;
use crate::msg::MessageValue;
use crate::runtime::Runtime;
use crate::value::Value;

fn compile(text: &str) -> CheckedAst {
    compile_with(&Compiler::standard(), text)
}

fn compile_with(compiler: &Compiler, text: &str) -> CheckedAst {
    let result = compiler.compile(text);
    assert!(
        !result.has_error(),
        "compile failed for {text:?}:\n{}",
        result.error_string()
    );
    result.into_checked_ast().unwrap()
}

fn eval(text: &str) -> Result<Value, EvalError> {
    Runtime::standard().program(compile(text)).eval(&EmptyActivation)
}

fn eval_ok(text: &str) -> Value {
    eval(text).unwrap_or_else(|e| panic!("eval failed for {text:?}: {e}"))
}

fn test_compiler() -> Compiler {
    Compiler::builder()
        .add_message_type(test_descriptor())
        .add_enum_type(
            EnumDescriptor::new("test.Color")
                .value("RED", 0)
                .value("GREEN", 1),
        )
        .add_var("msg", CelType::Message("test.Msg".into()))
        .add_var("resource.name", CelType::String)
        .add_var("group", CelType::String)
        .add_var("flag", CelType::Bool)
        .build()
        .unwrap()
}

fn test_descriptor() -> MessageDescriptor {
    MessageDescriptor::new("test.Msg")
        .field("name", CelType::String)
        .field("count", CelType::Int)
        .field("nested", CelType::Message("test.Msg".into()))
}

fn test_runtime() -> Runtime {
    Runtime::builder().add_message_type(test_descriptor()).build()
}

#[test]
fn relations_chain_evaluates_true() {
    assert_eq!(
        eval_ok("1 < 2 && 1 <= 1 && 2 > 1 && 1 >= 1 && 1 == 1 && 2 != 1"),
        Value::Bool(true)
    );
}

#[test]
fn starts_with_over_bindings() {
    let checked = compile_with(&test_compiler(), "resource.name.startsWith('/groups/' + group)");
    let program = Runtime::standard().program(checked);
    let activation = MapActivation::new()
        .bind("resource.name", "/groups/admin")
        .bind("group", "admin");
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(true));

    let other = MapActivation::new()
        .bind("resource.name", "/users/alice")
        .bind("group", "admin");
    assert_eq!(program.eval(&other).unwrap(), Value::Bool(false));
}

#[test]
fn has_on_message_fields() {
    let checked = compile_with(&test_compiler(), "has(msg.nested)");
    let runtime = test_runtime();
    let program = runtime.program(checked);

    let pool_descriptor = Arc::new(test_descriptor());
    let absent = MessageValue::builder(pool_descriptor.clone()).build();
    let activation = MapActivation::new().bind("msg", Value::Message(Arc::new(absent)));
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(false));

    // Present and zero-valued still counts as set.
    let zero_count = compile_with(&test_compiler(), "has(msg.count)");
    let program = runtime.program(zero_count);
    let mut builder = MessageValue::builder(pool_descriptor);
    builder.set_field("count", Value::Int(0)).unwrap();
    let activation = MapActivation::new().bind("msg", Value::Message(Arc::new(builder.build())));
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(true));
}

#[test]
fn comprehension_macros() {
    assert_eq!(eval_ok("[0, 1, 2].exists(x, x > 1)"), Value::Bool(true));
    assert_eq!(eval_ok("[0, 1, 2].all(x, x >= 0)"), Value::Bool(true));
    assert_eq!(eval_ok("[0, 1, 2].all(x, x > 0)"), Value::Bool(false));
    assert_eq!(
        eval_ok("[0, 1, 2].filter(x, x > 0)"),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        eval_ok("[0, 1, 2].map(x, x + 1)"),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
        eval_ok("[0, 1, 2].map(x, x > 0, x * 10)"),
        Value::list(vec![Value::Int(10), Value::Int(20)])
    );
    assert_eq!(eval_ok("[1, 2, 3].exists_one(x, x == 2)"), Value::Bool(true));
    assert_eq!(eval_ok("[2, 2].exists_one(x, x == 2)"), Value::Bool(false));
    assert_eq!(eval_ok("{'a': 1, 'b': 2}.exists(k, k == 'b')"), Value::Bool(true));
}

#[test]
fn error_absorption_by_logical_or() {
    assert_eq!(eval_ok("true || (1 / 0 > 2)"), Value::Bool(true));
    assert_eq!(eval("false || (1 / 0 > 2)"), Err(EvalError::DivisionByZero));
}

#[test]
fn absorption_is_commutative() {
    assert_eq!(eval_ok("false && (1 / 0 > 2)"), Value::Bool(false));
    assert_eq!(eval_ok("(1 / 0 > 2) && false"), Value::Bool(false));
    assert_eq!(eval_ok("(1 / 0 > 2) || true"), Value::Bool(true));
    assert_eq!(eval("(1 / 0 > 2) || false"), Err(EvalError::DivisionByZero));
    assert_eq!(eval("true && (1 / 0 > 2)"), Err(EvalError::DivisionByZero));
}

#[test]
fn overflow_trapping() {
    assert_eq!(eval("9223372036854775807 + 1"), Err(EvalError::Overflow));
    assert_eq!(eval("-9223372036854775808 - 1"), Err(EvalError::Overflow));
    assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
    assert_eq!(eval("1 % 0"), Err(EvalError::ModulusByZero));
    assert_eq!(eval("0u - 1u"), Err(EvalError::Overflow));
}

#[test]
fn ternary_short_circuits() {
    assert_eq!(eval_ok("true ? 1 : 1 / 0"), Value::Int(1));
    assert_eq!(eval_ok("false ? 1 / 0 : 2"), Value::Int(2));
    assert_eq!(eval("false ? 1 : 1 / 0"), Err(EvalError::DivisionByZero));
}

#[test]
fn unknown_variables_absorb_or_propagate() {
    let compiler = test_compiler();
    let runtime = Runtime::standard();

    // Unknown && false short-circuits to false.
    let program = runtime.program(compile_with(&compiler, "flag && false"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(false));

    // Unknown && true stays unknown, carrying the attribute name.
    let program = runtime.program(compile_with(&compiler, "flag && true"));
    match program.eval(&EmptyActivation).unwrap() {
        Value::Unknown(set) => assert_eq!(set.attributes(), ["flag"]),
        other => panic!("expected unknown, got {other}"),
    }
}

#[test]
fn unknown_and_error_combine_preserving_both() {
    let compiler = test_compiler();
    let runtime = Runtime::standard();
    for text in [
        "flag && (1 / 0 > 2)",
        "(1 / 0 > 2) && flag",
        "flag || (1 / 0 > 2)",
        "(1 / 0 > 2) || flag",
    ] {
        let program = runtime.program(compile_with(&compiler, text));
        match program.eval(&EmptyActivation).unwrap() {
            Value::Unknown(set) => {
                assert_eq!(set.attributes(), ["flag"], "{text}");
                assert_eq!(set.errors(), [EvalError::DivisionByZero], "{text}");
            }
            other => panic!("expected combined unknown for {text:?}, got {other}"),
        }
    }

    // Short-circuiting still wins over the combination.
    let program = runtime.program(compile_with(&compiler, "flag && (1 / 0 > 2) && false"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(false));
}

#[test]
fn strict_variables_error_on_missing() {
    let compiler = test_compiler();
    let runtime = Runtime::builder().strict_variables(true).build();
    let program = runtime.program(compile_with(&compiler, "flag"));
    assert_eq!(
        program.eval(&EmptyActivation),
        Err(EvalError::UnboundVariable("flag".into()))
    );
    // Absorption still wins over the unbound error.
    let program = runtime.program(compile_with(&compiler, "flag && false"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(false));
}

#[test]
fn partial_activation_unknowns_merge() {
    let compiler = Compiler::builder()
        .add_var("a", CelType::Bool)
        .add_var("b", CelType::Bool)
        .build()
        .unwrap();
    let program = Runtime::standard().program(compile_with(&compiler, "a && b"));
    let activation = PartialActivation::new(EmptyActivation, ["a", "b"]);
    match program.eval(&activation).unwrap() {
        Value::Unknown(set) => assert_eq!(set.attributes(), ["a", "b"]),
        other => panic!("expected merged unknown, got {other}"),
    }
}

#[test]
fn iteration_budget_is_aggregate() {
    let runtime = Runtime::builder().comprehension_max_iterations(5).build();
    let program = runtime.program(compile("[1, 2, 3].all(x, x > 0) && [4, 5, 6].all(x, x > 0)"));
    assert_eq!(
        program.eval(&EmptyActivation),
        Err(EvalError::IterationLimitExceeded)
    );

    let unlimited = Runtime::builder().comprehension_max_iterations(-1).build();
    let program = unlimited.program(compile("[1, 2, 3].all(x, x > 0) && [4, 5, 6].all(x, x > 0)"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(true));
}

#[test]
fn cancellation_is_observed_in_loops() {
    let flag = Arc::new(AtomicBool::new(true));
    let runtime = Runtime::builder().cancellation(flag.clone()).build();
    let program = runtime.program(compile("[1, 2, 3].all(x, x > 0)"));
    assert_eq!(program.eval(&EmptyActivation), Err(EvalError::Cancelled));

    flag.store(false, Ordering::Relaxed);
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(true));
}

#[test]
fn duplicate_map_keys_error_by_default() {
    assert_eq!(
        eval("{'a': 1, 'a': 2}['a']"),
        Err(EvalError::DuplicateMapKey("\"a\"".into()))
    );
    let last_wins = Runtime::builder().last_wins_map_keys(true).build();
    let program = last_wins.program(compile("{'a': 1, 'a': 2}['a']"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Int(2));
}

#[test]
fn optional_entries_are_skipped_when_empty() {
    assert_eq!(
        eval_ok("[1, ?optional.none(), 3]"),
        Value::list(vec![Value::Int(1), Value::Int(3)])
    );
    assert_eq!(
        eval_ok("[1, ?optional.of(2)]"),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(eval_ok("size({?'k': optional.none()})"), Value::Int(0));
    assert_eq!(eval_ok("{?'k': optional.of(1)}['k']"), Value::Int(1));
}

#[test]
fn optional_indexing() {
    assert_eq!(eval_ok("{'a': 1}[?'a'].value()"), Value::Int(1));
    assert_eq!(eval_ok("{'a': 1}[?'b'].hasValue()"), Value::Bool(false));
    assert_eq!(eval_ok("[10, 20][?1].orValue(0)"), Value::Int(20));
    assert_eq!(eval_ok("[10, 20][?5].orValue(0)"), Value::Int(0));
    // Optional entries compose with optional indexing.
    assert_eq!(
        eval_ok("[1, ?{'a': 2}[?'a'], ?{'a': 2}[?'b']]"),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn optional_api() {
    assert_eq!(eval_ok("optional.of(1).hasValue()"), Value::Bool(true));
    assert_eq!(eval_ok("optional.none().hasValue()"), Value::Bool(false));
    assert_eq!(eval_ok("optional.of(1).value() + 1"), Value::Int(2));
    assert_eq!(eval_ok("optional.none().orValue(9)"), Value::Int(9));
    assert_eq!(eval_ok("optional.ofNonZeroValue(0).hasValue()"), Value::Bool(false));
    assert!(matches!(
        eval("optional.none().value()"),
        Err(EvalError::InvalidArgument(_))
    ));
}

#[test]
fn struct_construction_and_field_access() {
    let compiler = test_compiler();
    let runtime = test_runtime();
    let program = runtime.program(compile_with(
        &compiler,
        "test.Msg{name: 'a', count: 2}.count + 1",
    ));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Int(3));

    // Optional fields drop out of construction when empty.
    let program = runtime.program(compile_with(
        &compiler,
        "has(test.Msg{?name: optional.none()}.name)",
    ));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(false));
}

#[test]
fn enum_constants_evaluate_via_reference() {
    let compiler = test_compiler();
    let program = Runtime::standard().program(compile_with(&compiler, "test.Color.GREEN == 1"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(true));
}

#[test]
fn index_errors() {
    assert!(matches!(eval("[1, 2][5]"), Err(EvalError::InvalidArgument(_))));
    assert_eq!(
        eval("{'a': 1}['b']"),
        Err(EvalError::NoSuchKey("\"b\"".into()))
    );
    assert_eq!(eval_ok("{'a': 1}['a']"), Value::Int(1));
    assert_eq!(eval_ok("[10, 20][1]"), Value::Int(20));
}

#[test]
fn membership_and_size() {
    assert_eq!(eval_ok("2 in [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval_ok("'k' in {'k': 1}"), Value::Bool(true));
    assert_eq!(eval_ok("size('héllo')"), Value::Int(5));
    assert_eq!(eval_ok("size([1, 2, 3])"), Value::Int(3));
    assert_eq!(eval_ok("'abc'.size()"), Value::Int(3));
}

#[test]
fn string_functions() {
    assert_eq!(eval_ok("'hello'.contains('ell')"), Value::Bool(true));
    assert_eq!(eval_ok("'a.txt'.endsWith('.txt')"), Value::Bool(true));
    assert_eq!(eval_ok("'xx123'.matches('[0-9]+')"), Value::Bool(true));
    assert!(matches!(
        eval("'x'.matches('(')"),
        Err(EvalError::InvalidArgument(_))
    ));
}

#[test]
fn conversions_end_to_end() {
    assert_eq!(eval_ok("int('42') + 1"), Value::Int(43));
    assert_eq!(eval_ok("string(42) + '!'"), Value::string("42!"));
    assert_eq!(eval_ok("double(1) / 2.0"), Value::Double(0.5));
    assert_eq!(eval_ok("uint(3) + 1u"), Value::Uint(4));
    assert_eq!(eval_ok("string(b'ok')"), Value::string("ok"));
    assert_eq!(eval_ok("type(1) == int"), Value::Bool(true));
    assert_eq!(eval_ok("type('a') == type('b')"), Value::Bool(true));
}

#[test]
fn timestamp_and_duration_arithmetic() {
    assert_eq!(
        eval_ok("timestamp('2024-01-01T00:00:00Z') + duration('1h') == timestamp('2024-01-01T01:00:00Z')"),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ok("timestamp('2024-01-02T00:00:00Z') - timestamp('2024-01-01T00:00:00Z') == duration('24h')"),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ok("timestamp('2024-06-15T10:30:00Z').getFullYear()"),
        Value::Int(2024)
    );
    assert_eq!(
        eval_ok("timestamp(1704067200) == timestamp('2024-01-01T00:00:00Z')"),
        Value::Bool(true)
    );
    assert_eq!(eval_ok("duration('90m').getMinutes()"), Value::Int(90));
    assert_eq!(
        eval_ok("timestamp('2024-01-01T00:30:00Z').getHours('+02:00')"),
        Value::Int(2)
    );
    // Beyond year 9999.
    assert_eq!(
        eval("timestamp('9999-12-31T23:59:59Z') + duration('1h')"),
        Err(EvalError::Overflow)
    );
}

#[test]
fn cel_bind_introduces_local() {
    assert_eq!(eval_ok("cel.bind(v, 5, v * v)"), Value::Int(25));
    assert_eq!(
        eval_ok("cel.bind(v, [1, 2], v.all(x, x > 0) && 3 in (v + [3]))"),
        Value::Bool(true)
    );
}

#[test]
fn parse_only_programs_dispatch_by_runtime_kind() {
    let compiler = Compiler::standard();
    let runtime = Runtime::standard();

    let parsed = compiler.parse("1 + 2 * 3").parsed_ast().unwrap().clone();
    let program = runtime.program_from_parsed(parsed);
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Int(7));

    let parsed = compiler
        .parse("optional.of('x').value()")
        .parsed_ast()
        .unwrap()
        .clone();
    let program = runtime.program_from_parsed(parsed);
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::string("x"));

    // Unchecked attribute resolution still sees dotted bindings.
    let parsed = compiler
        .parse("resource.name == '/ok'")
        .parsed_ast()
        .unwrap()
        .clone();
    let program = runtime.program_from_parsed(parsed);
    let activation = MapActivation::new().bind("resource.name", "/ok");
    assert_eq!(program.eval(&activation).unwrap(), Value::Bool(true));
}

#[test]
fn legacy_unsigned_long_folding() {
    let compiler = Compiler::builder()
        .enable_unsigned_longs(false)
        .build()
        .unwrap();
    let runtime = Runtime::builder().enable_unsigned_longs(false).build();
    let program = runtime.program(compile_with(&compiler, "1u + 1"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Int(2));
}

#[test]
fn heterogeneous_comparisons_when_enabled() {
    let compiler = Compiler::builder()
        .enable_heterogeneous_numeric_comparisons(true)
        .build()
        .unwrap();
    let program = Runtime::standard().program(compile_with(&compiler, "1 < 2u && 2u < 2.5"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(true));

    let program = Runtime::standard().program(compile_with(&compiler, "1 == 1u && 1u == 1.0"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::Bool(true));
}

#[test]
fn evaluation_is_deterministic_across_threads() {
    let program = Runtime::standard().program(compile("[1, 2, 3, 4].map(x, x * x)"));
    let expected = program.eval(&EmptyActivation).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let program = program.clone();
                s.spawn(move || program.eval(&EmptyActivation).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn concatenation_size_limit() {
    let runtime = Runtime::builder().max_concat_size(5).build();
    let program = runtime.program(compile("'abcd' + 'efg'"));
    assert!(matches!(
        program.eval(&EmptyActivation),
        Err(EvalError::InvalidArgument(_))
    ));
    let program = runtime.program(compile("'ab' + 'cd'"));
    assert_eq!(program.eval(&EmptyActivation).unwrap(), Value::string("abcd"));
}

#[test]
fn result_type_reports_checked_annotation() {
    let program = Runtime::standard().program(compile("1 + 2"));
    assert_eq!(program.result_type(), Some(&CelType::Int));
}

#[test]
fn evaluation_order_is_left_to_right() {
    // Entries evaluate in source order; the second entry's value errors
    // before its key is checked for duplication.
    let err = eval("{'a': 1, 'a': 1 / 0}");
    assert!(matches!(err, Err(EvalError::DivisionByZero)));
}

#[test]
fn resolver_function_activation_end_to_end() {
    let compiler = Compiler::builder().add_var("n", CelType::Int).build().unwrap();
    let program = Runtime::standard().program(compile_with(&compiler, "n * 7"));
    let activation = FnActivation(|name: &str| (name == "n").then_some(Value::Int(6)));
    assert_eq!(program.eval(&activation).unwrap(), Value::Int(42));
}
