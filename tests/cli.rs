//! Drive the method-logger binary through each subcommand.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn method_logger(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_method-logger"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run method-logger")
}

fn create_file(base: &Path, relative: &str, content: &str) {
    let path = base.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn create_project(dir: &Path) {
    create_file(
        dir,
        "Cargo.toml",
        r#"[package]
name = "demo"
version = "0.1.0"
edition = "2021"
"#,
    );
    create_file(
        dir,
        "src/main.rs",
        r#"mod greet;

#[method_logger]
fn test() {
    println!("test");
}

fn main() {
    test();
    greet::hello();
}
"#,
    );
    create_file(
        dir,
        "src/greet.rs",
        r#"pub fn hello() {
    println!("hello");
}

#[method_logger]
pub struct Ignored;
"#,
    );
}

#[test]
fn rewrite_prints_to_stdout() {
    let tmp = tempfile::tempdir().unwrap();
    create_project(tmp.path());

    let output = method_logger(&["rewrite", "src/main.rs"], tmp.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "rewrite failed:\n{stderr}");

    assert!(
        stdout.contains("::std::println!(\"Hello world!!!\");"),
        "diagnostic missing. Got:\n{stdout}"
    );
    assert!(!stdout.contains("#[method_logger]"), "marker should be stripped");
    assert!(stderr.contains("instrumented 1 function(s)"), "got:\n{stderr}");

    // The source file itself is untouched.
    let on_disk = fs::read_to_string(tmp.path().join("src/main.rs")).unwrap();
    assert!(on_disk.contains("#[method_logger]"));
}

#[test]
fn rewrite_in_place_and_keep_marker() {
    let tmp = tempfile::tempdir().unwrap();
    create_project(tmp.path());

    let output = method_logger(
        &["rewrite", "--in-place", "--keep-marker", "src/main.rs"],
        tmp.path(),
    );
    assert!(
        output.status.success(),
        "rewrite failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty());

    let on_disk = fs::read_to_string(tmp.path().join("src/main.rs")).unwrap();
    assert!(on_disk.contains("#[method_logger]"));
    assert_eq!(on_disk.matches("Hello world!!!").count(), 1);
}

#[test]
fn keep_marker_from_manifest_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    create_project(tmp.path());
    let manifest = tmp.path().join("Cargo.toml");
    let mut toml = fs::read_to_string(&manifest).unwrap();
    toml.push_str("\n[package.metadata.method-logger]\nkeep-marker = true\n");
    fs::write(&manifest, toml).unwrap();

    let output = method_logger(&["rewrite", "src/main.rs"], tmp.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("#[method_logger]"), "got:\n{stdout}");
}

#[test]
fn rewrite_missing_file_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let output = method_logger(&["rewrite", "nope.rs"], tmp.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "got:\n{stderr}");
    assert!(stderr.contains("nope.rs"), "got:\n{stderr}");
}

#[test]
fn rewrite_reports_parse_errors_with_path() {
    let tmp = tempfile::tempdir().unwrap();
    create_file(tmp.path(), "broken.rs", "fn broken( {");
    let output = method_logger(&["rewrite", "broken.rs"], tmp.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse broken.rs"), "got:\n{stderr}");
}

#[test]
fn list_shows_tagged_functions_and_warnings() {
    let tmp = tempfile::tempdir().unwrap();
    create_project(tmp.path());

    let output = method_logger(&["list", "src"], tmp.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "list failed:\n{stderr}");

    assert!(stdout.contains("main.rs:"), "got:\n{stdout}");
    assert!(stdout.contains("test"), "got:\n{stdout}");
    assert!(
        stderr.contains("struct Ignored -- marker only applies to functions"),
        "got:\n{stderr}"
    );
    assert!(
        stderr.contains("found 1 tagged function(s) across 2 file(s)"),
        "got:\n{stderr}"
    );
}

#[test]
fn list_json_is_machine_readable() {
    let tmp = tempfile::tempdir().unwrap();
    create_project(tmp.path());

    let output = method_logger(&["list", "--json", "src"], tmp.path());
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let files = value.as_array().unwrap();
    assert_eq!(files.len(), 2);

    let greet = &files[0];
    assert_eq!(greet["file"], "greet.rs");
    assert_eq!(greet["ignored"][0]["reason"], "misplaced");

    let main = &files[1];
    assert_eq!(main["file"], "main.rs");
    assert_eq!(main["tagged"][0]["name"], "test");
    assert_eq!(main["tagged"][0]["has_body"], true);
    assert_eq!(main["tagged"][0]["line"], 4);
}

#[test]
fn project_stages_a_rewritten_copy() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("demo");
    create_project(&project);
    let out = tmp.path().join("staged");

    let output = method_logger(
        &[
            "project",
            "--project",
            project.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ],
        tmp.path(),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "project failed:\n{stderr}");
    assert!(
        stderr.contains("instrumented 1 function(s) across 2 file(s)"),
        "got:\n{stderr}"
    );

    // stdout is not a terminal here, so the staged path is printed.
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), out.display().to_string());

    let main = fs::read_to_string(out.join("src/main.rs")).unwrap();
    assert!(main.contains("Hello world!!!"));
    let manifest = fs::read_to_string(out.join("Cargo.toml")).unwrap();
    assert_eq!(
        manifest,
        fs::read_to_string(project.join("Cargo.toml")).unwrap()
    );
    // greet.rs mentions the marker but has nothing to instrument.
    let greet = fs::read_to_string(out.join("src/greet.rs")).unwrap();
    assert_eq!(
        greet,
        fs::read_to_string(project.join("src/greet.rs")).unwrap()
    );
}

#[test]
fn project_refuses_non_empty_output() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("demo");
    create_project(&project);
    let out = tmp.path().join("staged");
    create_file(&out, "keep.txt", "x");

    let output = method_logger(
        &[
            "project",
            "--project",
            project.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ],
        tmp.path(),
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not empty"), "got:\n{stderr}");
}

#[test]
fn list_skips_root_target_directory() {
    let tmp = tempfile::tempdir().unwrap();
    create_project(tmp.path());
    create_file(
        tmp.path(),
        "target/debug/build/generated.rs",
        "#[method_logger]\nfn generated() {}\n",
    );

    let output = method_logger(&["list", "--json", "."], tmp.path());
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let files: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["file"].as_str())
        .collect();
    assert_eq!(files, ["src/greet.rs", "src/main.rs"]);
}
