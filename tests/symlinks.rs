mod common;

use common::{Workspace, is_symlink};
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::symlink;
use tempfile::TempDir;

#[test]
fn test_foreign_symlink_is_reported_and_left_alone() {
    let ws = Workspace::new();
    let outside = TempDir::new().unwrap();
    let foreign = outside.path().join("shared.bin");
    fs::write(&foreign, b"content X").unwrap();

    ws.file("a/model.bin", b"content X");
    let link = ws.root().join("b/link.bin");
    fs::create_dir_all(link.parent().unwrap()).unwrap();
    symlink(&foreign, &link).unwrap();

    ws.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("[skipped]"))
        .stdout(predicate::str::contains("leaving it alone"));

    assert_eq!(fs::read_link(&link).unwrap(), foreign);
    assert_eq!(fs::read(&foreign).unwrap(), b"content X");
}

#[test]
fn test_symlinked_directory_is_not_followed() {
    let ws = Workspace::new();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("x.bin"), b"content X").unwrap();
    ws.file("a.bin", b"content X");
    symlink(outside.path(), ws.root().join("linked_dir")).unwrap();

    let json = ws.json(&[]);

    assert_eq!(json["stats"]["scanned"], 1);
    assert!(!is_symlink(&outside.path().join("x.bin")));
}

#[test]
fn test_link_points_at_absolute_canonical_path() {
    let ws = Workspace::new();
    let a = ws.file("deep/er/a.bin", b"content");
    let b = ws.file("z.bin", b"content");

    ws.cmd().assert().success();

    let target = fs::read_link(&b).unwrap();
    assert!(target.is_absolute());
    assert_eq!(target, a);
    assert_eq!(fs::read(&b).unwrap(), b"content");
}
