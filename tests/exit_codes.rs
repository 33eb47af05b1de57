mod common;

use common::{Workspace, dupe_linker};
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_exit_zero_no_duplicates() {
    let ws = Workspace::new();
    ws.file("a.bin", b"unique content a");
    ws.file("b.bin", b"unique content b");

    ws.cmd().assert().success();
}

#[test]
fn test_exit_zero_with_duplicates() {
    let ws = Workspace::new();
    ws.file("a.bin", b"duplicate content");
    ws.file("b.bin", b"duplicate content");

    ws.cmd().assert().success();
}

#[test]
fn test_missing_root_fails() {
    let state = TempDir::new().unwrap();

    dupe_linker()
        .args(["-d", "/nonexistent/models/dir"])
        .arg("-b")
        .arg(state.path().join("db.sqlite3"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot access directory"));
}

#[test]
fn test_root_must_be_a_directory() {
    let ws = Workspace::new();
    let file = ws.file("model.bin", b"x");

    dupe_linker()
        .arg("-d")
        .arg(&file)
        .arg("-b")
        .arg(ws.db())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn test_unopenable_store_fails() {
    let ws = Workspace::new();
    ws.file("a.bin", b"x");

    dupe_linker()
        .arg("-d")
        .arg(ws.models.path())
        .arg("-b")
        .arg(ws.state.path().join("missing/dir/db.sqlite3"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot open hash store"));
}

#[test]
fn test_missing_dir_flag_is_usage_error() {
    dupe_linker().assert().code(2);
}

#[test]
fn test_zero_threads_is_usage_error() {
    let ws = Workspace::new();
    ws.cmd().args(["-t", "0"]).assert().code(2);
}

#[cfg(unix)]
#[test]
fn test_per_file_failure_is_not_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    ws.file("a.bin", b"duplicate content");
    ws.file("b.bin", b"duplicate content");
    let locked = ws.file("locked.bin", b"secret");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    // Root can read anything; only meaningful for unprivileged users
    if std::fs::read(&locked).is_ok() {
        return;
    }

    let json = ws.json(&[]);
    assert_eq!(json["stats"]["errors"]["hash"], 1);
    assert_eq!(json["stats"]["linked"], 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_counts_as_scan_error() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    ws.file("ok/a.bin", b"duplicate content");
    ws.file("ok/b.bin", b"duplicate content");
    ws.file("locked/c.bin", b"duplicate content");
    let locked = ws.root().join("locked");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    let readable = std::fs::read_dir(&locked).is_ok();
    let output = ws.cmd().args(["--format", "json", "-D"]).assert().success();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    if readable {
        return;
    }

    let out = output.get_output();
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["stats"]["errors"]["scan"], 1);
    assert_eq!(json["stats"]["scanned"], 2);
    assert!(String::from_utf8_lossy(&out.stderr).contains("locked"));
}

#[test]
fn test_database_from_older_version_is_imported() {
    let ws = Workspace::new();
    ws.file("a.bin", b"duplicate content");
    ws.file("b.bin", b"duplicate content");
    {
        let conn = rusqlite::Connection::open(ws.db()).unwrap();
        conn.execute_batch(
            "CREATE TABLE files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                path TEXT NOT NULL,
                sha256 TEXT NOT NULL UNIQUE
            );
            INSERT INTO files (filename, path, sha256)
            VALUES ('old.bin', './old.bin', 'abc123');",
        )
        .unwrap();
    }

    let json = ws.json(&["-D"]);

    assert_eq!(json["stats"]["hashed"], 2);
    assert_eq!(json["stats"]["linked"], 1);
}
