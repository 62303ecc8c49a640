#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCRIPT: &str = r#"
addappid(100)
addappid(200, 1, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
addappid(201, 1, "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
"#;

fn write_config(temp: &TempDir) -> PathBuf {
    let root = temp.path().join("client");
    fs::create_dir_all(&root).unwrap();
    let path = temp.path().join("config.toml");
    fs::write(
        &path,
        format!(
            "[client]\nroot = '{}'\n\n[remote]\nenabled = false\n",
            root.display()
        ),
    )
    .unwrap();
    path
}

fn write_script(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("100.lua");
    fs::write(&path, SCRIPT).unwrap();
    path
}

fn ctl(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("depotkeepctl").unwrap();
    cmd.arg("--config").arg(config).env("RUST_LOG", "warn");
    cmd
}

fn slot_ids(root: &Path) -> Vec<String> {
    let mut ids: Vec<String> = match fs::read_dir(root.join("AppList")) {
        Ok(entries) => entries
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    };
    ids.sort();
    ids
}

#[test]
fn install_then_uninstall() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let script = write_script(&temp);
    let root = temp.path().join("client");

    ctl(&config)
        .arg("install")
        .arg(&script)
        .arg("--name")
        .arg("Hundred")
        .assert()
        .success()
        .stdout(contains("Install of 100"));

    assert_eq!(slot_ids(&root), vec!["100", "200", "201"]);
    assert!(root.join("steamapps/appmanifest_100.acf").exists());
    let vdf = fs::read_to_string(root.join("config/config.vdf")).unwrap();
    assert!(vdf.contains("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));

    ctl(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("Hundred"));

    ctl(&config)
        .args(["inspect", "100"])
        .assert()
        .success()
        .stdout(contains("State: installed"));

    ctl(&config)
        .args(["uninstall", "100"])
        .assert()
        .success()
        .stdout(contains("Slots removed: 3"));

    assert!(slot_ids(&root).is_empty());
    assert!(!root.join("steamapps/appmanifest_100.acf").exists());
}

#[test]
fn install_takes_item_from_file_name() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let script = temp.path().join("100.lua");
    fs::write(
        &script,
        "addappid(100, 1, \"cccccccccccccccccccccccccccccccc\")\n\
         addappid(200, 1, \"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\")\n",
    )
    .unwrap();
    let root = temp.path().join("client");

    ctl(&config)
        .arg("install")
        .arg(&script)
        .assert()
        .success()
        .stdout(contains("Install of 100"));

    assert_eq!(slot_ids(&root), vec!["100", "200"]);
    assert!(root.join("steamapps/appmanifest_100.acf").exists());

    let unnamed = temp.path().join("package.lua");
    fs::copy(&script, &unnamed).unwrap();
    ctl(&config)
        .arg("install")
        .arg(&unnamed)
        .assert()
        .failure()
        .stderr(contains("no item id"));
}

#[test]
fn install_with_depot_selection() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let script = write_script(&temp);

    ctl(&config)
        .arg("install")
        .arg(&script)
        .args(["--depot", "201"])
        .assert()
        .success();

    assert_eq!(slot_ids(&temp.path().join("client")), vec!["100", "201"]);

    ctl(&config)
        .arg("install")
        .arg(&script)
        .args(["--depot", "999"])
        .assert()
        .failure()
        .stderr(contains("999"));
}

#[test]
fn install_fails_when_slots_are_full() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let script = write_script(&temp);
    let slots = temp.path().join("client/AppList");
    fs::create_dir_all(&slots).unwrap();
    for n in 0..127 {
        fs::write(slots.join(format!("{n}.txt")), (5000 + n).to_string()).unwrap();
    }

    ctl(&config)
        .arg("install")
        .arg(&script)
        .assert()
        .failure()
        .stderr(contains("not enough free slots"));

    ctl(&config)
        .args(["slots", "count"])
        .assert()
        .success()
        .stdout(contains("Used: 127"))
        .stdout(contains("Free: 1"));
    assert!(!temp.path().join("client/steamapps/appmanifest_100.acf").exists());
}

#[test]
fn dry_run_reports_plan_only() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let script = write_script(&temp);

    ctl(&config)
        .arg("install")
        .arg(&script)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(contains("Dependents requested: 2"));

    assert!(slot_ids(&temp.path().join("client")).is_empty());
}

#[test]
fn keys_extracts_from_script() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let script = write_script(&temp);

    ctl(&config)
        .arg("keys")
        .arg(&script)
        .assert()
        .success()
        .stdout(contains("200"))
        .stdout(contains("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("fresh.toml");

    ctl(&path).args(["config", "init"]).assert().success();
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[client]"));
    assert!(contents.contains("steam.exe"));

    ctl(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(contains("--force"));
    ctl(&path).args(["config", "init", "--force"]).assert().success();
}
