// Output format checks: JSON round-trips, YAML/TOML/TypeScript shapes.

use jsson_core::{transpile, Transpilation};

fn run(source: &str) -> Transpilation {
    transpile(source, "out.jsson").unwrap_or_else(|err| {
        panic!("transpile failed:\n{}", err.render_all().join("\n"));
    })
}

const CONFIG: &str = r#"
app = "demo"
server {
    host = "localhost"
    port = 8080
    tls = off
}
limits = [10, 20, 30]
"#;

#[test]
fn test_json_round_trips() {
    let result = run(CONFIG);
    let json = result.to_json().unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(
        reparsed,
        serde_json::json!({
            "app": "demo",
            "server": { "host": "localhost", "port": 8080, "tls": false },
            "limits": [10, 20, 30],
        })
    );
}

#[test]
fn test_json_serialization_is_stable() {
    let result = run(CONFIG);
    assert_eq!(result.to_json().unwrap(), result.to_json().unwrap());
}

#[test]
fn test_ranges_never_leak_into_output() {
    let result = run("ids = 1..4\nwrapped = [ 1..2 ]");
    let json = result.to_json().unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(reparsed["ids"], serde_json::json!([1, 2, 3, 4]));
    assert_eq!(reparsed["wrapped"], serde_json::json!([1, 2]));
    assert!(!json.contains("Range"), "{json}");
}

#[test]
fn test_yaml_block_style() {
    let yaml = run(CONFIG).to_yaml().unwrap();
    assert!(yaml.contains("app: demo"), "{yaml}");
    assert!(yaml.contains("server:"), "{yaml}");
    assert!(yaml.contains("  port: 8080"), "{yaml}");
    assert!(yaml.contains("- 10"), "{yaml}");
}

#[test]
fn test_toml_tables() {
    let toml_out = run(CONFIG).to_toml().unwrap();
    assert!(toml_out.contains("app = \"demo\""), "{toml_out}");
    assert!(toml_out.contains("[server]"), "{toml_out}");
    assert!(toml_out.contains("port = 8080"), "{toml_out}");
}

#[test]
fn test_toml_rejects_null() {
    let result = run("nothing = null");
    assert!(result.to_toml().is_err());
}

#[test]
fn test_typescript_module_shape() {
    let ts = run(CONFIG).to_typescript();
    assert!(ts.contains("export const app = \"demo\" as const;"), "{ts}");
    assert!(ts.contains("export const server = {"), "{ts}");
    assert!(ts.contains("port: 8080"), "{ts}");
    assert!(ts.contains("// Generated types"), "{ts}");
    assert!(ts.contains("export type App = typeof app;"), "{ts}");
    assert!(ts.contains("export type Server = typeof server;"), "{ts}");
    assert!(ts.contains("export type Limits = typeof limits;"), "{ts}");
}

#[test]
fn test_key_order_is_first_appearance_in_every_format() {
    let source = "zebra = 1\nquail = 2\nantelope = 3";
    let result = run(source);

    let json = result.to_json().unwrap();
    let positions: Vec<usize> = ["zebra", "quail", "antelope"]
        .iter()
        .map(|k| json.find(k).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");

    let ts = result.to_typescript();
    let positions: Vec<usize> = ["const zebra", "const quail", "const antelope"]
        .iter()
        .map(|k| ts.find(k).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{ts}");
}

#[test]
fn test_evaluated_tree_matches_json_output() {
    let result = run(CONFIG);
    let direct = serde_json::to_value(&result.root).unwrap();
    let through_string: serde_json::Value =
        serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(direct, through_string);
}

#[test]
fn test_floats_and_ints_stay_distinct() {
    let result = run("i = 3\nf = 3.5\nwhole = 2.0");
    let json = result.to_json().unwrap();
    assert!(json.contains("\"i\": 3"), "{json}");
    assert!(json.contains("\"f\": 3.5"), "{json}");
    // A whole float keeps its float identity in JSON.
    assert!(json.contains("\"whole\": 2.0"), "{json}");
}
