use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::Server;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

const REGISTRY: &str = r#"{
    "schemaVersion": 2,
    "packages": [
        {"name": "ripgrep", "type": "github-release", "repo": "BurntSushi/ripgrep"},
        {"name": "fd", "type": "manual"}
    ]
}"#;

fn write_recipe(root: &Path, name: &str, pkgver: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("PKGBUILD"),
        format!("pkgname={}\npkgver={}\npkgrel=1\narch=('x86_64')\n", name, pkgver),
    )
    .unwrap();
}

fn pkgfeed(root: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("pkgfeed"));
    for var in [
        "GITHUB_TOKEN",
        "PKGFEED_ROOT",
        "PKGFEED_REGISTRY",
        "PKGFEED_REPO_DIR",
        "PKGFEED_REPO_DB",
        "PKGFEED_COMPARE",
    ] {
        cmd.env_remove(var);
    }
    cmd.arg("--root")
        .arg(root)
        .arg("--lock-file")
        .arg(root.join("test.lock"));
    cmd
}

#[test]
fn test_check_json_reports_every_package() {
    let mut server = Server::new();
    let _releases = server
        .mock("GET", "/repos/BurntSushi/ripgrep/releases?per_page=30")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {"tag_name": "15.0.0-rc1", "draft": false, "prerelease": true},
                {"tag_name": "14.1.0", "draft": false, "prerelease": false}
            ]"#,
        )
        .create();

    let root = tempdir().unwrap();
    fs::write(root.path().join("feeds.json"), REGISTRY).unwrap();
    write_recipe(root.path(), "ripgrep", "14.0.0");
    write_recipe(root.path(), "fd", "10.1.0");
    write_recipe(root.path(), "local-tool", "0.3");

    let output = pkgfeed(root.path())
        .arg("--api-url")
        .arg(server.url())
        .arg("check")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = report.as_array().unwrap();
    let summary: Vec<(&str, &str)> = entries
        .iter()
        .map(|e| (e["name"].as_str().unwrap(), e["status"].as_str().unwrap()))
        .collect();
    assert_eq!(
        summary,
        vec![("ripgrep", "UPDATE"), ("fd", "MANUAL"), ("local-tool", "NO_FEED")]
    );
    assert_eq!(entries[0]["current"], "14.0.0");
    assert_eq!(entries[0]["upstream"], "14.1.0");
    assert_eq!(entries[0]["feed"], "github-release");
    assert!(entries[0]["error"].is_null());
}

#[test]
fn test_check_fails_when_upstream_is_missing() {
    let mut server = Server::new();
    let _releases = server
        .mock("GET", "/repos/BurntSushi/ripgrep/releases?per_page=30")
        .with_status(404)
        .create();

    let root = tempdir().unwrap();
    fs::write(root.path().join("feeds.json"), REGISTRY).unwrap();
    write_recipe(root.path(), "ripgrep", "14.0.0");
    write_recipe(root.path(), "fd", "10.1.0");

    pkgfeed(root.path())
        .arg("--api-url")
        .arg(server.url())
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("ripgrep  UNKNOWN"))
        .stdout(predicate::str::contains("MANUAL"))
        .stderr(predicate::str::contains("Failed: ripgrep"));
}

#[test]
fn test_check_list_does_not_fetch() {
    let root = tempdir().unwrap();
    fs::write(root.path().join("feeds.json"), REGISTRY).unwrap();

    pkgfeed(root.path())
        .arg("--api-url")
        .arg("http://127.0.0.1:9")
        .arg("check")
        .arg("--list")
        .assert()
        .success()
        .stdout("ripgrep\tgithub-release\nfd\tmanual\n");
}

#[test]
fn test_missing_registry_is_fatal() {
    let root = tempdir().unwrap();

    pkgfeed(root.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_orphans_lists_unregistered_packages() {
    let root = tempdir().unwrap();
    fs::write(root.path().join("feeds.json"), REGISTRY).unwrap();
    let repo = root.path().join("repo");
    fs::create_dir(&repo).unwrap();
    for file in [
        "ripgrep-14.1.0-1-x86_64.pkg.tar.zst",
        "oldtool-1.0-1-x86_64.pkg.tar.zst",
        "oldtool-1.0-1-x86_64.pkg.tar.zst.sig",
        "repo.db.tar.gz",
    ] {
        fs::write(repo.join(file), "x").unwrap();
    }

    pkgfeed(root.path())
        .arg("orphans")
        .assert()
        .success()
        .stdout("oldtool\n");
    assert!(repo.join("oldtool-1.0-1-x86_64.pkg.tar.zst").exists());
}

#[test]
fn test_prune_dry_run_keeps_files() {
    let root = tempdir().unwrap();
    let repo = root.path().join("repo");
    fs::create_dir(&repo).unwrap();

    let now = SystemTime::now();
    for (file, age) in [
        ("tool-1.0-1-x86_64.pkg.tar.zst", 300),
        ("tool-1.1-1-x86_64.pkg.tar.zst", 200),
        ("tool-1.2-1-x86_64.pkg.tar.zst", 100),
    ] {
        let path = repo.join(file);
        fs::write(&path, "x").unwrap();
        let handle = fs::File::options().write(true).open(&path).unwrap();
        handle.set_modified(now - Duration::from_secs(age)).unwrap();
    }

    pkgfeed(root.path())
        .arg("prune")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("tool-1.0-1-x86_64.pkg.tar.zst"))
        .stdout(predicate::str::contains("tool-1.1-1").not())
        .stdout(predicate::str::contains("Would remove 1 artifact(s)"));
    assert!(repo.join("tool-1.0-1-x86_64.pkg.tar.zst").exists());
}

#[test]
fn test_unlock_without_lock() {
    let root = tempdir().unwrap();

    pkgfeed(root.path())
        .arg("unlock")
        .assert()
        .success()
        .stdout(predicate::str::contains("No lock at"));
}

#[test]
fn test_unlock_removes_stale_lock() {
    let root = tempdir().unwrap();
    fs::write(root.path().join("test.lock"), "4242").unwrap();

    pkgfeed(root.path())
        .arg("unlock")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed stale lock"));
    assert!(!root.path().join("test.lock").exists());
}
