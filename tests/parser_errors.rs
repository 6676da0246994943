// Error accumulation and the console rendering contract.
//
// Downstream tooling parses the `Role: file:line:col` heads, so their exact
// shape is pinned here.

use jsson_core::error::{ParseErrorKind, Stage};
use jsson_core::{parse, transpile};
use std::path::Path;

#[test]
fn test_parser_collects_multiple_errors() {
    let (_, errors) = parse("a = @bogus\nb = (1 + 2\nc = x ? y", None);
    assert!(errors.len() >= 3, "expected several errors, got {errors:?}");
}

#[test]
fn test_partial_tree_survives_errors() {
    let (program, errors) = parse("good = 1\nbad = @nope\nalso_good = 3", None);
    assert!(!errors.is_empty());
    // Statements around the broken one still parse.
    assert!(program.statements.len() >= 2);
}

#[test]
fn test_render_without_file_is_single_line() {
    let (_, errors) = parse("v = a ? b", None);
    let rendered = errors[0].render();
    assert!(rendered.starts_with("Syntax wizard: "), "{rendered}");
    assert!(!rendered.contains('\n'), "{rendered}");
    assert!(rendered.contains(" — "), "{rendered}");
}

#[test]
fn test_render_with_file_shows_source_and_caret() {
    let source = "ok = 1\nbroken = (2 + 3";
    let (_, errors) = parse(source, Some(Path::new("conf/demo.jsson")));
    assert!(!errors.is_empty());
    let rendered = errors[0].render();

    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 3, "{rendered}");
    assert!(lines[0].starts_with("Syntax wizard: demo.jsson:"), "{rendered}");
    assert!(lines[1].contains("broken = (2 + 3"), "{rendered}");
    // The with-source form ends at the caret; no message follows it.
    assert_eq!(lines[2].trim_start(), "^", "{rendered}");
}

#[test]
fn test_with_source_parse_rendering_is_pinned() {
    let (_, errors) = parse("v = a ? b", Some(Path::new("pin.jsson")));
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].render(),
        "Syntax wizard: pin.jsson:1:9\n    v = a ? b\n            ^"
    );
}

#[test]
fn test_with_source_eval_rendering_is_pinned() {
    let err = transpile("x = 1 / 0", "math.jsson").unwrap_err();
    assert_eq!(
        err.render_all().join("\n"),
        "Transpile gremlin: math.jsson:1:7\n    x = 1 / 0\n          ^"
    );
}

#[test]
fn test_without_source_rendering_keeps_the_message() {
    let (_, errors) = parse("v = a ? b", None);
    assert_eq!(
        errors[0].render(),
        "Syntax wizard: 1:9 — expected ':' in ternary expression — wizard needs both ? and :"
    );
}

#[test]
fn test_lexer_errors_render_with_their_own_role() {
    let (_, errors) = parse("a = \"endless", Some(Path::new("lex.jsson")));
    let lex_error = errors.iter().find(|e| e.stage == Stage::Lex).unwrap();
    let rendered = lex_error.render();
    assert!(rendered.starts_with("Lex goblin: lex.jsson:"), "{rendered}");
    // The message itself lives on the error's Display.
    assert!(lex_error.to_string().contains("endless string"));
}

#[test]
fn test_eval_errors_render_with_gremlin_role() {
    let err = transpile("x = 1 / 0", "math.jsson").unwrap_err();
    let rendered = err.render_all().join("\n");
    assert!(rendered.starts_with("Transpile gremlin: math.jsson:1:"), "{rendered}");
    assert!(err.to_string().contains("division by zero"));
}

#[test]
fn test_eval_error_caret_points_at_the_operator() {
    let err = transpile("x = 1 / 0", "math.jsson").unwrap_err();
    let rendered = err.render_all().join("\n");
    let lines: Vec<&str> = rendered.lines().collect();
    // Context block: head, echoed source line, caret line, nothing after.
    assert_eq!(lines.len(), 3, "{rendered}");
    assert!(lines[1].contains("x = 1 / 0"), "{rendered}");
    assert!(lines[2].ends_with('^'), "{rendered}");
    let caret_col = lines[2].find('^').unwrap();
    let slash_col = lines[1].find('/').unwrap();
    assert_eq!(caret_col, slash_col, "{rendered}");
}

#[test]
fn test_error_positions_are_one_based() {
    let (_, errors) = parse("v = a ? b", None);
    assert_eq!(errors[0].line, 1);
    assert!(errors[0].column >= 1);
}

#[test]
fn test_specific_error_kinds() {
    let (_, errors) = parse("obj { x = 1 ", None);
    assert!(errors
        .iter()
        .any(|e| matches!(e.kind, ParseErrorKind::MissingClosingBrace)));

    let (_, errors) = parse("include", None);
    assert!(errors
        .iter()
        .any(|e| matches!(e.kind, ParseErrorKind::IncludePathExpected)));

    let (_, errors) = parse("@preset { a = 1 }", None);
    assert!(errors
        .iter()
        .any(|e| matches!(e.kind, ParseErrorKind::PresetNameExpected)));
}

#[test]
fn test_miette_diagnostics_carry_labels() {
    let (_, errors) = parse("v = a ? b", Some(Path::new("lbl.jsson")));
    let report = miette::Report::new(errors[0].clone());
    let message = format!("{report}");
    assert!(message.contains("ternary"), "{message}");
}
