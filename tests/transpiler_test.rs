// End-to-end transpilation scenarios: source text in, JSON value out.

use jsson_core::{transpile, JssonError};

fn eval_json(source: &str) -> serde_json::Value {
    let result = transpile(source, "test.jsson").unwrap_or_else(|err| {
        panic!("transpile failed:\n{}", err.render_all().join("\n"));
    });
    serde_json::from_str(&result.to_json().unwrap()).unwrap()
}

fn eval_err(source: &str) -> JssonError {
    match transpile(source, "test.jsson") {
        Ok(_) => panic!("expected an error for {source:?}"),
        Err(err) => err,
    }
}

fn is_uuid_v4(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == 5
        && parts[0].len() == 8
        && parts[1].len() == 4
        && parts[2].len() == 4
        && parts[3].len() == 4
        && parts[4].len() == 12
        && parts[2].starts_with('4')
        && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn is_generated_email(s: &str) -> bool {
    s.strip_prefix("user")
        .and_then(|rest| rest.strip_suffix("@example.com"))
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

#[test]
fn test_range_flattens_into_array_literal() {
    let out = eval_json("ports = [ 8080..8083 ]");
    assert_eq!(out, serde_json::json!({ "ports": [8080, 8081, 8082, 8083] }));
}

#[test]
fn test_bare_range_binding_is_a_plain_array() {
    let out = eval_json("ports = 8080..8082");
    assert_eq!(out, serde_json::json!({ "ports": [8080, 8081, 8082] }));
}

#[test]
fn test_range_splices_between_other_elements() {
    let out = eval_json("v = [ 1, 10..12, 99 ]");
    assert_eq!(out, serde_json::json!({ "v": [1, 10, 11, 12, 99] }));
}

#[test]
fn test_nested_array_does_not_flatten() {
    let out = eval_json("v = [ 1, [2, 3], 4 ]");
    assert_eq!(out, serde_json::json!({ "v": [1, [2, 3], 4] }));
}

#[test]
fn test_template_with_row_zipping_and_map() {
    let out = eval_json(
        r#"
users [
  template { id, name }
  map (u) = { user_id = u.id, display = u.name }
  1..3, "alice"
]
"#,
    );
    assert_eq!(
        out,
        serde_json::json!({
            "users": [
                { "user_id": 1, "display": "alice" },
                { "user_id": 2, "display": "alice" },
                { "user_id": 3, "display": "alice" },
            ]
        })
    );
}

#[test]
fn test_template_zips_to_shortest_range() {
    let out = eval_json(
        r#"
pairs [
  template { a, b }
  1..5, 10..12
]
"#,
    );
    assert_eq!(
        out,
        serde_json::json!({
            "pairs": [
                { "a": 1, "b": 10 },
                { "a": 2, "b": 11 },
                { "a": 3, "b": 12 },
            ]
        })
    );
}

#[test]
fn test_template_without_map_yields_row_objects() {
    let out = eval_json(
        r#"
hosts [
  template { name, port }
  "web", 80
  "db", 5432
]
"#,
    );
    assert_eq!(
        out,
        serde_json::json!({
            "hosts": [
                { "name": "web", "port": 80 },
                { "name": "db", "port": 5432 },
            ]
        })
    );
}

#[test]
fn test_implicit_template_from_bare_map() {
    let out = eval_json("squares [ map (n) = n * n\n 1..4 ]");
    assert_eq!(out, serde_json::json!({ "squares": [1, 4, 9, 16] }));
}

#[test]
fn test_preset_with_overrides() {
    let out = eval_json(
        r#"
@preset "base" { port = 8080, host = "localhost", timeout = 30 }
prod = @use "base" { port = 443 }
"#,
    );
    assert_eq!(
        out,
        serde_json::json!({
            "prod": { "port": 443, "host": "localhost", "timeout": 30 }
        })
    );
}

#[test]
fn test_preset_references_are_isolated_copies() {
    let out = eval_json(
        r#"
@preset "svc" { retries = 3, backoff = 2 }
first = @use "svc" { retries = 9 }
second = @use "svc"
"#,
    );
    assert_eq!(out["first"]["retries"], 9);
    assert_eq!(out["second"]["retries"], 3);
    assert_eq!(out["second"]["backoff"], 2);
}

#[test]
fn test_legacy_preset_reference_syntax() {
    let out = eval_json(
        r#"
@preset "api" { timeout = 30 }
service = @"api"
"#,
    );
    assert_eq!(out, serde_json::json!({ "service": { "timeout": 30 } }));
}

#[test]
fn test_unknown_preset_is_an_error() {
    let err = eval_err(r#"api = @use "nope""#);
    let message = err.to_string();
    assert!(message.contains("not found"), "{message}");
}

#[test]
fn test_variable_scoping_and_arithmetic() {
    let out = eval_json("x := 10\nobj { x := 20, value = x * 2 }");
    assert_eq!(out, serde_json::json!({ "obj": { "value": 40 } }));
}

#[test]
fn test_outer_variables_visible_in_nested_objects() {
    let out = eval_json("base := 100\nobj { value = base + 1 }");
    assert_eq!(out, serde_json::json!({ "obj": { "value": 101 } }));
}

#[test]
fn test_var_decls_are_not_emitted() {
    let out = eval_json("secret := 42\nshown = 1");
    assert_eq!(out, serde_json::json!({ "shown": 1 }));
}

#[test]
fn test_validators_in_template_rows() {
    let out = eval_json(
        r#"
items [
  template { id, email }
  map (r) = r
  @uuid, @email
  @uuid, @email
]
"#,
    );
    let items = out["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    let id0 = items[0]["id"].as_str().unwrap();
    let id1 = items[1]["id"].as_str().unwrap();
    assert!(is_uuid_v4(id0), "{id0}");
    assert!(is_uuid_v4(id1), "{id1}");
    assert_ne!(id0, id1);

    let email0 = items[0]["email"].as_str().unwrap();
    let email1 = items[1]["email"].as_str().unwrap();
    assert!(is_generated_email(email0), "{email0}");
    assert!(is_generated_email(email1), "{email1}");
    assert_ne!(email0, email1);
}

#[test]
fn test_int_validator_bounds() {
    let out = eval_json("v = @int(10, 20)");
    let v = out["v"].as_i64().unwrap();
    assert!((10..=20).contains(&v));
}

#[test]
fn test_map_over_range() {
    let out = eval_json("doubled = 1..3 map (x) = x * 2");
    assert_eq!(out, serde_json::json!({ "doubled": [2, 4, 6] }));
}

#[test]
fn test_map_over_array_of_objects() {
    let out = eval_json(
        r#"
rows := [ { n = 1 }, { n = 2 } ]
values = rows map (r) = r.n * 10
"#,
    );
    assert_eq!(out, serde_json::json!({ "values": [10, 20] }));
}

#[test]
fn test_ternary_branches() {
    let out = eval_json("mode = 1 > 0 ? \"up\" : \"down\"\nother = 0 ? 1 : 2");
    assert_eq!(out, serde_json::json!({ "mode": "up", "other": 2 }));
}

#[test]
fn test_interpolation_with_resolved_variable() {
    let out = eval_json("name := \"world\"\ngreeting = `hello ${name}!`");
    assert_eq!(out, serde_json::json!({ "greeting": "hello world!" }));
}

#[test]
fn test_interpolation_keeps_unresolved_placeholder() {
    let out = eval_json("s = `hi ${missing}`");
    assert_eq!(out, serde_json::json!({ "s": "hi ${missing}" }));
}

#[test]
fn test_interpolation_of_expressions() {
    let out = eval_json("count := 3\ns = `total: ${count * 2}`");
    assert_eq!(out, serde_json::json!({ "s": "total: 6" }));
}

#[test]
fn test_member_access() {
    let out = eval_json("base := { port = 80, host = \"h\" }\nv = base.port");
    assert_eq!(out, serde_json::json!({ "v": 80 }));
}

#[test]
fn test_unresolved_identifier_reads_as_string() {
    let out = eval_json("name = myToken");
    assert_eq!(out, serde_json::json!({ "name": "myToken" }));
}

#[test]
fn test_boolean_spellings() {
    let out = eval_json("a = yes\nb = no\nc = on\nd = off\ne = true\nf = false");
    assert_eq!(
        out,
        serde_json::json!({
            "a": true, "b": false, "c": true, "d": false, "e": true, "f": false
        })
    );
}

#[test]
fn test_string_range_in_array() {
    let out = eval_json("hosts = [ \"web1\"..\"web3\" ]");
    assert_eq!(out, serde_json::json!({ "hosts": ["web1", "web2", "web3"] }));
}

#[test]
fn test_key_order_matches_source_order() {
    let result = transpile("zulu = 1\nalpha = 2\nmike = 3", "test.jsson").unwrap();
    let json = result.to_json().unwrap();
    let z = json.find("zulu").unwrap();
    let a = json.find("alpha").unwrap();
    let m = json.find("mike").unwrap();
    assert!(z < a && a < m, "{json}");
}

#[test]
fn test_numeric_promotion() {
    let out = eval_json("a = 1 + 2.5\nb = 7 / 2\nc = 2 * 3");
    assert_eq!(out, serde_json::json!({ "a": 3.5, "b": 3, "c": 6 }));
}

#[test]
fn test_logical_operators_evaluate_both_sides() {
    let out = eval_json("a = 1 && 0\nb = 0 || \"x\"");
    assert_eq!(out, serde_json::json!({ "a": false, "b": true }));

    // Eager evaluation: the right side runs even when the left decides.
    let err = eval_err("v = 1 || (1 / 0)");
    let message = err.to_string();
    assert!(message.contains("division by zero"), "{message}");
}

#[test]
fn test_determinism_without_validators() {
    let source = r#"
servers [
  template { name, port }
  "a1".."a3", 9000..9002
]
t := 2 + 3 * 4
total = t
flag = t > 10 ? on : off
"#;
    let first = eval_json(source);
    let second = eval_json(source);
    assert_eq!(first, second);
    assert_eq!(first["total"], 14);
    assert_eq!(first["flag"], true);
    assert_eq!(
        first["servers"],
        serde_json::json!([
            { "name": "a1", "port": 9000 },
            { "name": "a2", "port": 9001 },
            { "name": "a3", "port": 9002 },
        ])
    );
}
