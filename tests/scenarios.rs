//! End-to-end scenarios driven through the public `compile` entry point.

use pzc::{compile, CompilerConfig, Diagnostic};

#[test]
fn minimal_valid_program() {
    let out = compile("program p;\nbegin\nend.", &CompilerConfig::new()).unwrap();
    assert!(out.code.contains("init L.0, 20, L.1, L.2, L.3"));
    assert!(out.code.contains("L.0:"));
    assert!(out.code.contains("bss 20"));
    assert!(out.code.contains("L.2:"));
    assert!(out.code.contains("L.3:"));
    assert!(out.code.contains("halt"));
    assert!(out.code.contains("L.1:"));
    assert!(out.code.contains("bss 500"));
    assert!(out.code.trim_end().ends_with("end"));
}

#[test]
fn integer_assignment_order_and_frame_size() {
    let out = compile(
        "program p; var x: integer; begin x := 1 + 2 end.",
        &CompilerConfig::new(),
    )
    .unwrap();

    let body: Vec<&str> = out
        .code
        .lines()
        .map(|l| l.trim())
        .filter(|l| matches!(*l, "la 20, 0" | "lc 1" | "lc 2" | "add" | "st"))
        .collect();
    assert_eq!(body, vec!["la 20, 0", "lc 1", "lc 2", "add", "st"]);
    assert!(out.code.contains("bss 21"));
}

#[test]
fn type_mismatch_on_assignment() {
    let err = compile(
        "program p; var x: integer; begin x := true end.",
        &CompilerConfig::new(),
    )
    .unwrap_err();
    assert_eq!(err, Diagnostic::AssignmentTypeMismatch(1));
    assert_eq!(
        err.to_string(),
        "Line 1: Expression must be of same type as variable"
    );
}

#[test]
fn undefined_identifier() {
    let err = compile("program p; begin x := 0 end.", &CompilerConfig::new()).unwrap_err();
    assert_eq!(err, Diagnostic::Undefined(1));
    assert_eq!(err.to_string(), "Line 1: Unidentified identifier");
}

#[test]
fn nested_procedure_call_static_link_sequence() {
    let src = "program p;\nprocedure q;\nbegin end;\nbegin q end.";
    let out = compile(src, &CompilerConfig::new()).unwrap();

    let calls: Vec<&str> = out
        .code
        .lines()
        .map(|l| l.trim())
        .filter(|l| matches!(*l, "push 0, 0" | "js L.4" | "pop 0, 0"))
        .collect();
    assert_eq!(calls, vec!["push 0, 0", "js L.4", "pop 0, 0"]);
}

#[test]
fn invalid_array_bounds() {
    let err = compile(
        "program p; var a: array[5..1] of integer; begin end.",
        &CompilerConfig::new(),
    )
    .unwrap_err();
    assert_eq!(err, Diagnostic::BadArrayBounds(1));
    assert_eq!(
        err.to_string(),
        "Line 1: Start index must be less than or equal to end index of array"
    );
}

#[test]
fn trace_stream_is_empty_under_suppress() {
    let config = CompilerConfig::new().with_suppress(true);
    let out = compile("program p; begin end.", &config).unwrap();
    assert!(out.trace.is_empty());
}

#[test]
fn trace_stream_carries_tokens_and_rules_under_debug() {
    let config = CompilerConfig::new().with_debug(true);
    let out = compile("program p; begin end.", &config).unwrap();
    assert!(out.trace.contains("TOKEN: T_PROG"));
    assert!(out.trace.contains("N_PROG ->"));
}

#[test]
fn malformed_literal_is_a_warning_not_a_failure() {
    let out = compile(
        "program p; begin end. 99999999999",
        &CompilerConfig::new(),
    )
    .unwrap();
    assert_eq!(out.warnings.len(), 1);
}
