#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use omniclone_sync::{LockManager, LockScope};
use predicates::prelude::*;
use tempfile::TempDir;

/// Stand-in for rclone: records its arguments, fails for destinations
/// containing "fail".
const FAKE_TOOL: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
echo "transferred: 1 file"
case "$3" in
  *fail*) echo "remote refused" >&2; exit 5 ;;
esac
exit 0
"#;

struct Fixture {
    config: TempDir,
    locks: TempDir,
    tool_dir: TempDir,
}

impl Fixture {
    fn new(tasks: &str) -> Self {
        let config = TempDir::new().unwrap();
        let locks = TempDir::new().unwrap();
        let tool_dir = TempDir::new().unwrap();

        let tool = tool_dir.path().join("rclone");
        fs::write(&tool, FAKE_TOOL).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let config_json = format!(
            r#"{{
                "executable": "{}",
                "connectivity": {{"method": "none"}},
                "tasks": {tasks}
            }}"#,
            tool.display()
        );
        fs::write(config.path().join("config.json"), config_json).unwrap();
        fs::write(
            config.path().join("flags.json"),
            r#"{"base": ["-v"], "backup": ["--fast-list"], "bisync": ["--resilient"]}"#,
        )
        .unwrap();

        Self {
            config,
            locks,
            tool_dir,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("omniclone").unwrap();
        cmd.env_remove("OMNICLONE_CONFIG_DIR")
            .env_remove("OMNICLONE_LOCK_DIR")
            .env_remove("RUST_LOG")
            .arg("--config-dir")
            .arg(self.config.path())
            .arg("--lock-dir")
            .arg(self.locks.path());
        cmd
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.tool_dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn data_dir(&self, name: &str) -> PathBuf {
        let dir = self.config.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}

fn two_targets(ok_dst: &str, second_dst: &str) -> String {
    format!(
        r#"{{
            "backup": {{"docs": {{"src": "docs", "dst": "{ok_dst}"}}}},
            "bisync": {{"notes": {{"src": "notes", "dst": "{second_dst}"}}}}
        }}"#
    )
}

#[test]
fn run_executes_every_target_and_exits_zero() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:notes"));
    fx.data_dir("docs");
    fx.data_dir("notes");

    fx.cmd()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded, 0 failed"));

    let calls = fx.calls();
    assert_eq!(calls.len(), 2, "calls: {calls:?}");
    assert!(calls[0].starts_with("sync "));
    assert!(calls[0].ends_with("remote:docs -v --fast-list"));
    assert!(calls[1].starts_with("bisync "));
    assert!(calls[1].ends_with("remote:notes -v --resilient"));
}

#[test]
fn failing_target_exits_one_and_others_still_run() {
    let fx = Fixture::new(&two_targets("remote:fail", "remote:notes"));

    fx.cmd().arg("run").assert().code(1);
    assert_eq!(fx.calls().len(), 2);
}

#[test]
fn held_lock_exits_two_without_running() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:notes"));
    let scope = LockScope::new("omniclone", fx.config.path());
    let manager = LockManager::new(fx.locks.path());
    let _held = manager.acquire(&scope, fx.config.path()).unwrap();

    fx.cmd()
        .arg("run")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("another run holds"));
    assert!(fx.calls().is_empty());
}

#[test]
fn run_json_reports_outcomes_and_writes_the_run_log() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:fail"));

    let output = fx.cmd().args(["run", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["status"]["kind"], "completed");
    let outcomes = summary["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["result"], "succeeded");
    assert_eq!(outcomes[1]["result"], "failed");
    assert_eq!(outcomes[1]["exit_code"], 5);

    let log = fs::read_to_string(fx.config.path().join("omniclone.log")).unwrap();
    assert!(log.contains("remote refused"), "log: {log}");
}

const ROTATE_AT: usize = 5 * 1024 * 1024;

#[test]
fn locked_out_run_leaves_the_run_log_alone() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:notes"));
    let log = fx.config.path().join("omniclone.log");
    fs::write(&log, vec![b'x'; ROTATE_AT]).unwrap();
    let scope = LockScope::new("omniclone", fx.config.path());
    let _held = LockManager::new(fx.locks.path())
        .acquire(&scope, fx.config.path())
        .unwrap();

    fx.cmd().arg("run").assert().code(2);

    assert!(!fx.config.path().join("omniclone.log.1").exists());
    assert!(fs::metadata(&log).unwrap().len() >= ROTATE_AT as u64);
}

#[test]
fn run_rotates_an_oversized_log_once_locked() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:notes"));
    let log = fx.config.path().join("omniclone.log");
    fs::write(&log, vec![b'x'; ROTATE_AT]).unwrap();

    fx.cmd().arg("run").assert().success();

    let backup = fx.config.path().join("omniclone.log.1");
    assert!(fs::metadata(&backup).unwrap().len() >= ROTATE_AT as u64);
    let fresh = fs::read_to_string(&log).unwrap();
    assert!(fresh.contains("transferred: 1 file"), "log: {fresh}");
}

#[test]
fn mistyped_config_dir_is_not_created() {
    let parent = TempDir::new().unwrap();
    let typo = parent.path().join("omnclone");

    Command::cargo_bin("omniclone")
        .unwrap()
        .env_remove("OMNICLONE_CONFIG_DIR")
        .arg("--config-dir")
        .arg(&typo)
        .arg("run")
        .assert()
        .code(3);
    assert!(!typo.exists());
}

#[test]
fn lock_is_released_after_a_run() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:notes"));
    fx.cmd().arg("run").assert().success();
    fx.cmd().arg("run").assert().success();

    let leftovers = fs::read_dir(fx.locks.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn plan_lists_commands_without_running_them() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:notes"));
    fs::write(fx.config.path().join("filters.backup.txt"), "- *.tmp\n").unwrap();

    fx.cmd()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("docs [backup]"))
        .stdout(predicate::str::contains("--filter-from"))
        .stdout(predicate::str::contains("notes [bisync]"));
    assert!(fx.calls().is_empty());
}

#[test]
fn plan_json_is_an_array_of_invocations() {
    let fx = Fixture::new(&two_targets("remote:docs", "remote:notes"));
    let output = fx.cmd().args(["plan", "--json"]).output().unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let plan = plan.as_array().unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0]["target"], "docs");
    assert_eq!(plan[0]["mode"], "backup");
    assert_eq!(plan[1]["args"][0], "bisync");
}

#[test]
fn missing_configuration_is_fatal() {
    let empty = TempDir::new().unwrap();
    Command::cargo_bin("omniclone")
        .unwrap()
        .env_remove("OMNICLONE_CONFIG_DIR")
        .arg("--config-dir")
        .arg(empty.path())
        .arg("plan")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("config.json"));
}

#[test]
fn config_dir_can_come_from_the_environment() {
    let fx = Fixture::new("{}");
    Command::cargo_bin("omniclone")
        .unwrap()
        .env("OMNICLONE_CONFIG_DIR", fx.config.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No enabled targets"));
}
