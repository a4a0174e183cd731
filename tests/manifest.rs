//! The proc macro links the library without its command-line stack.

use toml_edit::DocumentMut;

fn manifest(relative: &str) -> DocumentMut {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(relative);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
        .parse()
        .unwrap()
}

const CLI_ONLY: &[&str] = &[
    "anstream",
    "clap",
    "ignore",
    "serde_json",
    "tempfile",
    "toml_edit",
    "tracing-subscriber",
];

#[test]
fn macros_crate_disables_default_features() {
    let doc = manifest("method-logger-macros/Cargo.toml");
    let dep = &doc["dependencies"]["method-logger"];
    assert_eq!(
        dep.get("default-features").and_then(|v| v.as_bool()),
        Some(false),
        "method-logger-macros should not pull in the cli feature"
    );
}

#[test]
fn command_line_dependencies_are_optional() {
    let doc = manifest("Cargo.toml");
    let deps = doc["dependencies"].as_table_like().unwrap();
    for name in CLI_ONLY {
        let dep = deps
            .get(name)
            .unwrap_or_else(|| panic!("missing dependency {name}"));
        assert_eq!(
            dep.get("optional").and_then(|v| v.as_bool()),
            Some(true),
            "{name} should be optional"
        );
    }

    let cli: Vec<String> = doc["features"]["cli"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    for name in CLI_ONLY {
        assert!(cli.contains(&format!("dep:{name}")), "cli should enable {name}");
    }
}
