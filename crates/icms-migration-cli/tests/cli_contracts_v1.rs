#![allow(clippy::single_match_else, clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use icms_migration_store_sqlite::fixture::write_legacy_replica;
use rusqlite::Connection;
use serde_json::Value;
use ulid::Ulid;

const MIGRATION_ENV: [&str; 6] = [
    "ICMS_MIGRATION_DB",
    "ICMS_V1_REPLICA_DSN",
    "ALLOW_DATA_MIGRATION",
    "DATA_MIGRATION_BATCH_SIZE",
    "DATA_MIGRATION_EMAIL_DOMAIN_EXCLUDE",
    "RUST_LOG",
];

struct Workspace {
    db: PathBuf,
    legacy: PathBuf,
}

impl Workspace {
    fn new(label: &str) -> Self {
        let run = Ulid::new();
        let db = std::env::temp_dir().join(format!("icms-migrate-{label}-{run}.sqlite3"));
        let legacy = std::env::temp_dir().join(format!("icms-v1-{label}-{run}.sqlite3"));
        if let Err(err) = write_legacy_replica(&legacy) {
            panic!("failed to seed legacy replica: {err:#}");
        }
        Self { db, legacy }
    }

    fn dsn(&self) -> String {
        format!("sqlite://{}", self.legacy.display())
    }

    fn scalar(&self, sql: &str) -> i64 {
        let conn = match Connection::open(&self.db) {
            Ok(conn) => conn,
            Err(err) => panic!("failed to open target db: {err}"),
        };
        match conn.query_row(sql, [], |row| row.get(0)) {
            Ok(value) => value,
            Err(err) => panic!("query failed {sql}: {err}"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db);
        let _ = std::fs::remove_file(&self.legacy);
    }
}

fn icms_migrate() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_icms-migrate"));
    for key in MIGRATION_ENV {
        command.env_remove(key);
    }
    command.current_dir(std::env::temp_dir());
    command
}

fn run(workspace: &Workspace, args: &[&str]) -> Output {
    let mut command = icms_migrate();
    command
        .arg("--db")
        .arg(&workspace.db)
        .arg("--legacy-dsn")
        .arg(workspace.dsn())
        .arg("--allow-data-migration");
    command.args(args);
    match command.output() {
        Ok(output) => output,
        Err(err) => panic!("failed to run icms-migrate {:?}: {err}", args),
    }
}

fn stdout_json(output: &Output) -> Value {
    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value) => value,
        Err(err) => panic!(
            "failed to parse stdout as JSON: {err}\nstdout={}\nstderr={}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn help_lists_every_stage() {
    let output = match icms_migrate().arg("--help").output() {
        Ok(output) => output,
        Err(err) => panic!("failed to run help command: {err}"),
    };
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for required in [
        "export-from-v1",
        "extract-v1-xml",
        "import-v1-data",
        "create-tasks",
        "check",
        "run",
        "reset",
        "runs",
    ] {
        assert!(
            stdout.contains(required),
            "expected help output to contain {required}; output={stdout}"
        );
    }
}

#[test]
fn interlock_off_refuses_before_touching_the_target() {
    let workspace = Workspace::new("interlock");
    let output = match icms_migrate()
        .arg("--db")
        .arg(&workspace.db)
        .arg("--legacy-dsn")
        .arg(workspace.dsn())
        .arg("run")
        .output()
    {
        Ok(output) => output,
        Err(err) => panic!("failed to run icms-migrate: {err}"),
    };

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("ALLOW_DATA_MIGRATION must be true"),
        "stderr={stderr}"
    );
    assert!(output.stdout.is_empty());
    assert!(!Path::new(&workspace.db).exists());
}

#[test]
fn interlock_reads_the_environment() {
    let workspace = Workspace::new("interlock-env");
    let output = match icms_migrate()
        .env("ICMS_MIGRATION_DB", &workspace.db)
        .env("ICMS_V1_REPLICA_DSN", workspace.dsn())
        .env("ALLOW_DATA_MIGRATION", "true")
        .args(["export-from-v1", "--skip-user", "--skip-ia"])
        .output()
    {
        Ok(output) => output,
        Err(err) => panic!("failed to run icms-migrate: {err}"),
    };

    assert_success(&output);
    let report = stdout_json(&output);
    assert_eq!(report["stage"], Value::from("export_from_v1"));
    assert_eq!(report["data_types"], serde_json::json!(["reference"]));
    assert_eq!(report["rows"]["country"], Value::from(3));
}

#[test]
fn missing_legacy_dsn_is_a_configuration_error() {
    let workspace = Workspace::new("no-dsn");
    let output = match icms_migrate()
        .arg("--db")
        .arg(&workspace.db)
        .args(["--allow-data-migration", "export-from-v1"])
        .output()
    {
        Ok(output) => output,
        Err(err) => panic!("failed to run icms-migrate: {err}"),
    };

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ICMS_V1_REPLICA_DSN"), "stderr={stderr}");
}

#[test]
fn full_run_loads_every_group_and_passes_checks() {
    let workspace = Workspace::new("full-run");
    let output = run(&workspace, &["--batch-size", "2", "run"]);
    assert_success(&output);

    let reports = stdout_json(&output);
    let stages: Vec<&str> = match reports.as_array() {
        Some(reports) => reports
            .iter()
            .filter_map(|report| report["stage"].as_str())
            .collect(),
        None => panic!("run should print one report per stage: {reports}"),
    };
    assert_eq!(stages, vec!["export_from_v1", "extract_v1_xml", "import_v1_data"]);

    let checks = match reports[2]["checks"].as_array() {
        Some(checks) => checks.clone(),
        None => panic!("import report has no checks: {}", reports[2]),
    };
    assert!(!checks.is_empty());
    assert!(checks.iter().all(|check| check["passed"] == Value::Bool(true)));

    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_country"), 3);
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_user"), 2);
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_office"), 3);
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_importapplication"), 4);
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_task"), 2);
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM data_migration_run"), 3);

    let runs = run(&workspace, &["runs"]);
    assert_success(&runs);
    let listed = stdout_json(&runs);
    assert_eq!(listed["runs"][0]["stage"], Value::from("import_v1_data"));
}

#[test]
fn skip_task_leaves_tasks_for_create_tasks() {
    let workspace = Workspace::new("skip-task");
    assert_success(&run(&workspace, &["run", "--skip-task"]));
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_task"), 0);

    let output = run(&workspace, &["create-tasks"]);
    assert_success(&output);
    let report = stdout_json(&output);
    assert_eq!(report["rows"]["web_task"], Value::from(2));
    assert_eq!(
        workspace.scalar("SELECT COUNT(*) FROM web_task WHERE task_type = 'prepare'"),
        1
    );
}

#[test]
fn rerunning_import_fails_until_reset() {
    let workspace = Workspace::new("rerun");
    assert_success(&run(&workspace, &["run"]));

    let again = run(&workspace, &["import-v1-data"]);
    assert!(!again.status.success());
    let stderr = String::from_utf8_lossy(&again.stderr);
    assert!(stderr.contains("duplicate primary key"), "stderr={stderr}");

    let reset = run(&workspace, &["reset"]);
    assert_success(&reset);
    assert_eq!(stdout_json(&reset)["stage"], Value::from("reset"));
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_country"), 0);
    assert_eq!(
        workspace.scalar("SELECT COUNT(*) FROM data_migration_staging"),
        0
    );

    assert_success(&run(&workspace, &["run"]));
    assert_eq!(workspace.scalar("SELECT COUNT(*) FROM web_task"), 2);
}

#[test]
fn check_reports_mismatches_on_an_empty_target() {
    let workspace = Workspace::new("check");
    let output = run(&workspace, &["check", "--skip-user", "--skip-ia"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Country found 0 expected 3"), "stderr={stderr}");
}
