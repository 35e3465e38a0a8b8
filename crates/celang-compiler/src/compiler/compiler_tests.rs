use celang_core::types::CelType;
use celang_core::wire;
use indoc::indoc;

use crate::compiler::Compiler;
use crate::Error;

#[test]
fn compile_reports_result_type() {
    let compiler = Compiler::standard();
    let result = compiler.compile("1 < 2 && 2 != 1");
    assert!(!result.has_error());
    assert_eq!(result.checked_ast().unwrap().result_type(), &CelType::Bool);
}

#[test]
fn error_string_uses_caret_format() {
    let compiler = Compiler::standard();
    let result = compiler.compile("1 + unknown_var");
    assert!(result.has_error());
    insta::assert_snapshot!(result.error_string(), @r"
    ERROR: <input>:1:4: undeclared reference to 'unknown_var' (in container '')
     | 1 + unknown_var
     |     ^
    ");
}

#[test]
fn parse_error_is_positioned() {
    let compiler = Compiler::standard();
    let result = compiler.parse("1 ++");
    assert!(result.has_error());
    let rendered = result.error_string();
    assert!(rendered.starts_with("ERROR: <input>:1:"), "{rendered}");
    assert!(result.parsed_ast().is_err());
}

#[test]
fn checked_ast_accessor_fails_on_errors() {
    let compiler = Compiler::standard();
    let result = compiler.compile("true ? 1 : 'a'");
    match result.checked_ast() {
        Err(Error::ValidationError(diags)) => assert!(diags.has_errors()),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn check_runs_on_previously_parsed_ast() {
    let compiler = Compiler::standard();
    let parse_result = compiler.parse("size([1, 2, 3])");
    let parsed = parse_result.parsed_ast().unwrap();
    let check_result = compiler.check(parsed, parse_result.source());
    assert_eq!(
        check_result.checked_ast().unwrap().result_type(),
        &CelType::Int
    );
}

#[test]
fn multiline_error_points_at_line() {
    let compiler = Compiler::standard();
    let source = indoc! {"
        1 +
        bad_name
    "};
    let result = compiler.compile(source);
    assert!(result.has_error());
    let rendered = result.error_string();
    assert!(rendered.contains(":2:0:"), "{rendered}");
    assert!(rendered.contains(" | bad_name"), "{rendered}");
}

#[test]
fn parsed_ast_round_trips_through_wire() {
    let compiler = Compiler::standard();
    let result = compiler.parse("[1, 2].map(x, x * 2)");
    let parsed = result.parsed_ast().unwrap();

    let json = wire::parsed_to_json(parsed).unwrap();
    assert_eq!(&wire::parsed_from_json(&json).unwrap(), parsed);

    let bytes = wire::parsed_to_bytes(parsed).unwrap();
    assert_eq!(&wire::parsed_from_bytes(&bytes).unwrap(), parsed);
}

#[test]
fn checked_ast_round_trips_through_wire() {
    let compiler = Compiler::standard();
    let result = compiler.compile("{'k': [1, 2]}['k'][0] == 1");
    let checked = result.checked_ast().unwrap();

    let json = wire::checked_to_json(checked).unwrap();
    let back = wire::checked_from_json(&json).unwrap();
    assert_eq!(&back, checked);
    assert_eq!(back.result_type(), &CelType::Bool);

    let bytes = wire::checked_to_bytes(checked).unwrap();
    assert_eq!(&wire::checked_from_bytes(&bytes).unwrap(), checked);
}

#[test]
fn builder_rejects_bad_container_config() {
    let err = Compiler::builder()
        .alias("a.b", "pkg.Thing")
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Container(_)));
}

#[test]
fn compiler_is_reusable_across_expressions() {
    let compiler = Compiler::standard();
    for text in ["1 + 1", "'a' + 'b'", "[1].exists(x, x == 1)"] {
        assert!(!compiler.compile(text).has_error(), "{text}");
    }
}
