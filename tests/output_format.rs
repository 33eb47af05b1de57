mod common;

use common::Workspace;
use predicates::prelude::*;

#[test]
fn test_human_output_shows_summary() {
    let ws = Workspace::new();
    ws.file("a.bin", b"duplicate content");
    ws.file("b.bin", b"duplicate content");

    ws.cmd()
        .arg("-D")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dedup Summary"))
        .stdout(predicate::str::contains("Duplicates:"));
}

#[test]
fn test_human_output_no_duplicates() {
    let ws = Workspace::new();
    ws.file("a.bin", b"unique a");

    ws.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("No duplicates found."));
}

#[test]
fn test_json_output_structure() {
    let ws = Workspace::new();
    let content = b"duplicate content";
    ws.file("a.bin", content);
    ws.file("b.bin", content);

    let json = ws.json(&["-D"]);

    assert_eq!(json["dry_run"], true);
    for key in [
        "scanned",
        "hashed",
        "cached",
        "duplicates",
        "linked",
        "skipped",
        "bytes_reclaimed",
    ] {
        assert!(json["stats"][key].is_number(), "missing stats.{key}");
    }
    for key in ["scan", "hash", "link"] {
        assert!(json["stats"]["errors"][key].is_number(), "missing errors.{key}");
    }

    let group = &json["groups"][0];
    assert_eq!(group["size"], content.len() as u64);
    assert!(group["hash"].as_str().unwrap().starts_with("sha256:"));
    assert_eq!(group["files"].as_array().unwrap().len(), 2);

    let action = &json["actions"][0];
    assert_eq!(action["status"], "would-link");
    assert!(action["candidate"].as_str().unwrap().ends_with("b.bin"));
    assert!(action["canonical"].as_str().unwrap().ends_with("a.bin"));
}

#[test]
fn test_quiet_output_empty() {
    let ws = Workspace::new();
    ws.file("a.bin", b"duplicate content");
    ws.file("b.bin", b"duplicate content");

    ws.cmd()
        .args(["--format", "quiet", "-D"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_verbose_lists_groups() {
    let ws = Workspace::new();
    ws.file("a.bin", b"duplicate content");
    ws.file("b.bin", b"duplicate content");

    ws.cmd()
        .args(["-D", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Group 1:"))
        .stdout(predicate::str::contains("a.bin"));
}
