use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_tiermint")
}

fn unique_temp_path(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("tiermint-cli-{name}-{stamp}"))
}

fn address(tag: u8, i: usize) -> String {
    format!("0x{tag:02x}{i:038x}")
}

fn write_balances(path: &Path, count: usize) {
    let mut body = String::from("HolderAddress,Balance\n");
    for i in 0..count {
        body.push_str(&format!("{},{}\n", address(0, i), count - i));
    }
    fs::write(path, body).expect("balance snapshot should be written");
}

fn write_project(root: &Path) -> PathBuf {
    fs::create_dir_all(root.join("data/collections")).expect("data dir should be created");
    write_balances(&root.join("data/exec.csv"), 100);
    let config = root.join("campaign.yaml");
    fs::write(
        &config,
        "project: cli\ndata_dir: data\noutput_dir: out\ntoken:\n  label: EXEC\n  sources: [exec.csv]\n",
    )
    .expect("config should be written");
    config
}

#[test]
fn unknown_command_prints_usage() {
    let output = Command::new(bin())
        .arg("serve")
        .output()
        .expect("tiermint should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: tiermint <generate|collect|delegate|validate>"));
}

#[test]
fn generate_command_writes_tier_files() {
    let root = unique_temp_path("generate");
    let config = write_project(&root);

    let output = Command::new(bin())
        .arg("generate")
        .arg(&config)
        .output()
        .expect("generate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("generate complete: tiers=7"));
    assert!(root.join("out/tier_01.json").is_file());
    assert!(root.join("out/tier_07.json").is_file());
    assert!(root.join("out/manifest.json").is_file());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn validate_command_rejects_bad_breakpoints() {
    let root = unique_temp_path("validate");
    fs::create_dir_all(&root).expect("temp dir should be created");
    let config = root.join("campaign.yaml");
    fs::write(
        &config,
        "project: bad\ndata_dir: data\nbreakpoints: [5, 2]\ntoken:\n  label: EXEC\n  sources: []\n",
    )
    .expect("config should be written");

    let output = Command::new(bin())
        .arg("validate")
        .arg(&config)
        .output()
        .expect("validate should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("breakpoints[1]"));
    assert!(stderr.contains("token.sources"));
    assert!(stderr.contains("validation failed: 2 issue(s)"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn validate_command_accepts_project_config() {
    let root = unique_temp_path("validate-ok");
    let config = write_project(&root);

    let output = Command::new(bin())
        .arg("validate")
        .arg(&config)
        .output()
        .expect("validate should run");

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("validation passed"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn collect_command_returns_usage_without_paths() {
    let output = Command::new(bin())
        .arg("collect")
        .output()
        .expect("collect should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: tiermint collect"));
}

#[test]
fn collect_command_writes_unique_addresses() {
    let root = unique_temp_path("collect");
    fs::create_dir_all(&root).expect("temp dir should be created");
    fs::write(
        root.join("a.csv"),
        format!("HolderAddress,Quantity\n{},1\n{},2\n", address(1, 1), address(1, 2)),
    )
    .expect("snapshot should be written");
    fs::write(
        root.join("b.csv"),
        format!("HolderAddress\n{}\n{}\n", address(1, 2), address(1, 3)),
    )
    .expect("snapshot should be written");
    let target = root.join("out/unique.json");

    let output = Command::new(bin())
        .arg("collect")
        .arg(&root)
        .arg(&target)
        .output()
        .expect("collect should run");

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("addresses=3"));
    let written: Vec<String> =
        serde_json::from_str(&fs::read_to_string(&target).expect("output should exist"))
            .expect("output should be a json array");
    assert_eq!(written, vec![address(1, 1), address(1, 2), address(1, 3)]);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn collect_command_fails_without_snapshots() {
    let root = unique_temp_path("collect-empty");
    fs::create_dir_all(&root).expect("temp dir should be created");

    let output = Command::new(bin())
        .arg("collect")
        .arg(&root)
        .arg(root.join("unique.json"))
        .output()
        .expect("collect should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no CSV files found"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn delegate_command_rewrites_only_affected_tiers() {
    let root = unique_temp_path("delegate");
    let tiers = root.join("tiers");
    fs::create_dir_all(&tiers).expect("tier dir should be created");
    let vault = address(7, 1);
    let hot = address(8, 1);
    let untouched = address(9, 1);
    fs::write(
        tiers.join("tier_01.json"),
        format!("{{\"day\": 1, \"name\": \"first\", \"addresses\": [\"{vault}\", \"{untouched}\"]}}"),
    )
    .expect("tier should be written");
    fs::write(
        tiers.join("tier_02.json"),
        format!("{{\"day\": 2, \"name\": \"second\", \"addresses\": [\"{untouched}\"]}}"),
    )
    .expect("tier should be written");
    fs::write(tiers.join("manifest.json"), "{\"tiers\": []}").expect("manifest should be written");
    let events = root.join("events.json");
    fs::write(
        &events,
        format!("[{{\"vault\": \"{vault}\", \"delegate\": \"{hot}\", \"enabled\": true}}]"),
    )
    .expect("events should be written");
    let out = root.join("delegated");

    let output = Command::new(bin())
        .arg("delegate")
        .arg(&events)
        .arg(&tiers)
        .arg(&out)
        .output()
        .expect("delegate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("delegate complete: delegates=1, files_rewritten=1"));
    assert!(!out.join("tier_02.json").exists());

    let rewritten: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.join("tier_01.json")).expect("rewritten tier should exist"),
    )
    .expect("rewritten tier should parse");
    assert_eq!(rewritten["name"], "first");
    assert_eq!(rewritten["addresses"][0], hot.as_str());
    assert_eq!(rewritten["addresses"][1], untouched.as_str());

    let _ = fs::remove_dir_all(root);
}
