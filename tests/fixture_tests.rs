use proctor::{
    HarnessError, Sandbox, Template,
    fixture::{
        copy_dir, create_empty_package, dedent, find_files, worker_fixture_tree, write_files,
        write_symlinks,
    },
};

#[test]
fn write_files_dedents_and_creates_nested_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_files(dir.path(), [("a/b/c.txt", "  line1\n  line2\n")]).expect("write");

    assert!(dir.path().join("a/b").is_dir());
    let body = std::fs::read_to_string(dir.path().join("a/b/c.txt")).expect("read back");
    assert_eq!(body, "line1\nline2\n");
}

#[test]
fn write_files_round_trips_indented_template_bodies() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_files(
        dir.path(),
        [(
            "__tests__/sample.test.js",
            "
            test('works', () => {
              expect(1).toBe(1);
            });
            ",
        )],
    )
    .expect("write");

    let body =
        std::fs::read_to_string(dir.path().join("__tests__/sample.test.js")).expect("read back");
    assert_eq!(
        body,
        "test('works', () => {\n  expect(1).toBe(1);\n});\n"
    );
}

#[test]
fn dedent_keeps_relative_indentation_and_blank_lines() {
    assert_eq!(dedent("  a\n\n    b\n"), "a\n\n  b\n");
    assert_eq!(dedent("plain"), "plain");
}

#[cfg(unix)]
#[test]
fn write_symlinks_links_an_existing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_files(dir.path(), [("real/file.txt", "content\n")]).expect("write");
    write_symlinks(dir.path(), [("real", "linked/alias")]).expect("link");

    let body = std::fs::read_to_string(dir.path().join("linked/alias/file.txt")).expect("read");
    assert_eq!(body, "content\n");
}

#[test]
fn create_empty_package_stamps_the_autogenerated_notice() {
    let dir = tempfile::tempdir().expect("tempdir");
    create_empty_package(dir.path(), None).expect("scaffold");

    let manifest = std::fs::read_to_string(dir.path().join("package.json")).expect("read");
    let parsed: serde_json::Value = serde_json::from_str(&manifest).expect("valid json");
    assert_eq!(
        parsed["description"],
        "THIS IS AN AUTOGENERATED FILE AND SHOULD NOT BE ADDED TO GIT"
    );
    assert_eq!(parsed["jest"]["testEnvironment"], "node");
}

#[test]
fn create_empty_package_keeps_caller_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    create_empty_package(
        dir.path(),
        Some(serde_json::json!({"dependencies": {"left-pad": "1.0.0"}})),
    )
    .expect("scaffold");

    let manifest = std::fs::read_to_string(dir.path().join("package.json")).expect("read");
    let parsed: serde_json::Value = serde_json::from_str(&manifest).expect("valid json");
    assert_eq!(parsed["dependencies"]["left-pad"], "1.0.0");
    assert!(parsed["description"].is_string());
    assert!(parsed.get("jest").is_none());
}

#[test]
fn copy_dir_replicates_a_tree() {
    let src = tempfile::tempdir().expect("tempdir");
    let dest = tempfile::tempdir().expect("tempdir");
    write_files(src.path(), [("a.txt", "a\n"), ("sub/b.txt", "b\n")]).expect("write");

    let target = dest.path().join("copy");
    copy_dir(src.path(), &target).expect("copy");

    assert_eq!(std::fs::read_to_string(target.join("a.txt")).expect("read"), "a\n");
    assert_eq!(
        std::fs::read_to_string(target.join("sub/b.txt")).expect("read"),
        "b\n"
    );
}

#[test]
fn template_fills_numbered_placeholders() {
    let template = Template::new("test('$1', () => expect($2).toBe($2));");
    let filled = template.fill(&["name", "1"]).expect("fill");
    assert_eq!(filled, "test('name', () => expect(1).toBe(1));");
}

#[test]
fn template_errors_on_a_missing_value() {
    let template = Template::new("uses $1 and $3");
    let err = template.fill(&["only-one"]).expect_err("out of range");
    match err {
        HarnessError::TemplateIndex { index, available } => {
            assert_eq!(index, 3);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[test]
fn worker_fixture_tree_generates_twenty_six_todo_files() {
    let files = worker_fixture_tree();
    assert_eq!(files.len(), 26);
    assert_eq!(files[0].0, "__tests__/test0.test.js");
    assert_eq!(files[25].0, "__tests__/test25.test.js");
    assert!(files[7].1.contains("test.todo('test 7');"));
}

#[test]
fn sandbox_is_unique_and_removed_on_drop() {
    let first = Sandbox::new("proctor-test").expect("sandbox");
    let second = Sandbox::new("proctor-test").expect("sandbox");
    assert_ne!(first.path(), second.path());

    let kept = first.path().to_path_buf();
    write_files(&kept, [("x.txt", "x")]).expect("write");
    drop(first);
    assert!(!kept.exists());
}

#[test]
fn find_files_matches_a_glob_under_a_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_files(
        dir.path(),
        [("logs/run1.log", "a"), ("logs/run2.log", "b"), ("logs/skip.txt", "c")],
    )
    .expect("write");

    let found = find_files("logs/*.log", dir.path()).expect("glob");
    assert_eq!(found.len(), 2);
}
