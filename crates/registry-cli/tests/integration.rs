#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn registry(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("registry").unwrap();
    cmd.current_dir(dir.path())
        .env("REGISTRY_ROOT", dir.path())
        .env_remove("REGISTRY_USER")
        .env_remove("REGISTRY_ROLE");
    cmd
}

fn as_role(dir: &TempDir, user: &str, role: &str) -> Command {
    let mut cmd = registry(dir);
    cmd.args(["--user", user, "--role", role]);
    cmd
}

fn init_registry(dir: &TempDir) {
    registry(dir).arg("init").assert().success();
}

fn json_out(cmd: &mut Command) -> Value {
    let out = cmd.arg("--json").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

const STUDENT: [&str; 18] = [
    "--first-name",
    "أَحمد",
    "--father-name",
    "علي",
    "--gender",
    "ذكر",
    "--dob",
    "2005",
    "--registry-type",
    "صباحي",
    "--registry-number",
    "12",
    "--registry-page",
    "3",
    "--specialist",
    "كهرباء",
    "--status",
    "مستمر",
];

fn create_as(dir: &TempDir, user: &str, role: &str) -> Value {
    json_out(
        as_role(dir, user, role)
            .args(["student", "create"])
            .args(STUDENT),
    )
}

// ---------------------------------------------------------------------------
// registry init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_registry_files() {
    let dir = TempDir::new().unwrap();
    registry(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created"));

    assert!(dir.path().join(".registry").is_dir());
    assert!(dir.path().join(".registry/config.yaml").exists());
    assert!(dir.path().join(".registry/records.yaml").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    registry(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));
}

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    registry(&dir)
        .args(["student", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn meta_reports_school_and_catalog() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    let meta = json_out(registry(&dir).arg("meta"));
    assert_eq!(meta["school"], "اعدادية الديوانية الصناعية");
    assert_eq!(meta["specialists"].as_array().unwrap().len(), 9);
    assert_eq!(meta["registry_types"]["صباحي"], "R");
}

// ---------------------------------------------------------------------------
// Create and approval
// ---------------------------------------------------------------------------

#[test]
fn supervisor_create_commits_immediately() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);

    let out = create_as(&dir, "sara", "supervisor");
    assert_eq!(out["status"], "committed");
    assert_eq!(out["record"]["RollNumberID"], "EL05R01200003");
    assert_eq!(out["record"]["FirstName"], "احمد");
    assert_eq!(out["record"]["DoB"], "2005-07-01");

    let list = json_out(registry(&dir).args(["student", "list"]));
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[test]
fn writer_create_waits_for_supervisor() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);

    let out = create_as(&dir, "clerk", "writer");
    assert_eq!(out["status"], "pending");
    assert_eq!(out["pending"]["id"], "P1");
    assert_eq!(out["pending"]["payload"]["RollNumberID"], "EL05R01200003");

    let list = json_out(registry(&dir).args(["student", "list"]));
    assert!(list.as_array().unwrap().is_empty());

    as_role(&dir, "clerk", "writer")
        .args(["pending", "approve", "P1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("forbidden"));

    as_role(&dir, "sara", "supervisor")
        .args(["pending", "approve", "P1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EL05R01200003"));

    let list = json_out(registry(&dir).args(["student", "list"]));
    assert_eq!(list[0]["RollNumberID"], "EL05R01200003");
    let pending = json_out(as_role(&dir, "sara", "supervisor").args(["pending", "list"]));
    assert!(pending.as_array().unwrap().is_empty());
}

#[test]
fn rejected_pending_item_never_lands() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    create_as(&dir, "clerk", "writer");

    as_role(&dir, "sara", "supervisor")
        .args(["pending", "reject", "P1", "--reason", "duplicate entry"])
        .assert()
        .success();

    let list = json_out(registry(&dir).args(["student", "list"]));
    assert!(list.as_array().unwrap().is_empty());
    let audit = json_out(as_role(&dir, "sara", "supervisor").arg("audit"));
    assert_eq!(audit[0]["action"], "reject_pending");
    assert_eq!(audit[0]["payload"]["reason"], "duplicate entry");
}

#[test]
fn missing_required_field_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    as_role(&dir, "sara", "supervisor")
        .args(["student", "create", "--first-name", "علي"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing FatherName"));
}

#[test]
fn status_tag_with_delimiter_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    as_role(&dir, "root", "admin")
        .args(["student", "create"])
        .args(&STUDENT[..16])
        .args(["--status", "pass|fail"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not contain '|'"));
}

#[test]
fn update_recomputes_roll_number() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    let out = create_as(&dir, "sara", "supervisor");
    let id = out["record"]["id"].as_str().unwrap().to_string();

    let out = json_out(
        as_role(&dir, "sara", "supervisor")
            .args(["student", "update", id.as_str(), "--registry-page", "45"]),
    );
    assert_eq!(out["record"]["RollNumberID"], "EL05R01200045");
    assert_eq!(out["record"]["FatherName"], "علي");
}

// ---------------------------------------------------------------------------
// Archive and trust levels
// ---------------------------------------------------------------------------

#[test]
fn writer_cannot_archive() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    let out = create_as(&dir, "root", "admin");
    let id = out["record"]["id"].as_str().unwrap().to_string();

    as_role(&dir, "clerk", "writer")
        .args(["student", "archive", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires admin"));

    let shown = json_out(registry(&dir).args(["student", "show", id.as_str()]));
    assert_eq!(shown["archived"], false);

    let audit = json_out(as_role(&dir, "root", "admin").arg("audit"));
    assert_eq!(audit[0]["action"], "denied");
    assert_eq!(audit[0]["user"], "clerk");

    as_role(&dir, "root", "admin")
        .args(["student", "archive", id.as_str()])
        .assert()
        .success();
    let list = json_out(registry(&dir).args(["student", "list"]));
    assert!(list.as_array().unwrap().is_empty());
}

#[test]
fn unknown_role_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    registry(&dir)
        .args(["--role", "janitor", "student", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown trust level"));
}

#[test]
fn audit_is_supervisor_only() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    registry(&dir)
        .arg("audit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("forbidden"));

    let audit = json_out(as_role(&dir, "sara", "supervisor").args(["audit", "--limit", "5"]));
    assert_eq!(audit[0]["action"], "denied");
    assert_eq!(audit[0]["user"], "anonymous");
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn search_ignores_diacritics_and_variants() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    create_as(&dir, "sara", "supervisor");

    let hits = json_out(registry(&dir).args(["search", "أحمد عَلي"]));
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let hits = json_out(registry(&dir).args(["search", "زيد"]));
    assert!(hits.as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// CSV transfer
// ---------------------------------------------------------------------------

#[test]
fn export_requires_admin() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    as_role(&dir, "sara", "supervisor")
        .arg("export")
        .assert()
        .failure()
        .stderr(predicate::str::contains("forbidden"));
}

#[test]
fn export_then_import_reproduces_records() {
    let src = TempDir::new().unwrap();
    init_registry(&src);
    create_as(&src, "root", "admin");
    as_role(&src, "root", "admin")
        .args(["student", "create"])
        .args([
            "--first-name", "مريم", "--father-name", "حسن", "--gender", "انثى",
            "--dob", "2004-09", "--registry-type", "مسائي", "--registry-number", "7",
            "--registry-page", "45", "--specialist", "textile", "--note", "a, b",
        ])
        .assert()
        .success();

    let csv_path = src.path().join("students.csv");
    as_role(&src, "root", "admin")
        .args(["export", "--out", csv_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2"));

    let dst = TempDir::new().unwrap();
    init_registry(&dst);
    let report = json_out(
        as_role(&dst, "root", "admin").args(["import", csv_path.to_str().unwrap()]),
    );
    assert_eq!(report["imported"], 2);
    assert!(report["failures"].as_array().unwrap().is_empty());

    let before = json_out(registry(&src).args(["student", "list"]));
    let after = json_out(registry(&dst).args(["student", "list"]));
    assert_eq!(before, after);
    assert_eq!(after[1]["RollNumberID"], "TE04E00700045");
}

#[test]
fn import_reports_bad_rows() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    let csv = "FirstName,FatherName,Gender,DoB,RegistryType,RegistryNumber,RegistryPage,Specialist\n\
               علي,حسن,ذكر,2005,صباحي,1,1,كهرباء\n\
               عمر,,ذكر,2005,صباحي,1,1,كهرباء\n";
    as_role(&dir, "root", "admin")
        .args(["import", "-"])
        .write_stdin(csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 row(s), skipped 1"))
        .stdout(predicate::str::contains("missing FatherName"));
}

// ---------------------------------------------------------------------------
// Offline sync
// ---------------------------------------------------------------------------

#[test]
fn replayed_sync_batch_creates_one_item() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    let batch = r#"{"operations":[{"opId":"7f1c","type":"create","payload":{
        "FirstName":"علي","FatherName":"حسن","Gender":"ذكر","DoB":2005,
        "RegistryType":"صباحي","RegistryNumber":12,"RegistryPage":3,"Specialist":"كهرباء"}}]}"#;
    let file = dir.path().join("queue.json");
    std::fs::write(&file, batch).unwrap();

    let first = json_out(as_role(&dir, "field", "writer").args(["sync", file.to_str().unwrap()]));
    assert_eq!(first["results"][0]["outcome"], "pending");
    assert_eq!(first["results"][0]["pendingId"], "P1");

    let second = json_out(as_role(&dir, "field", "writer").args(["sync", file.to_str().unwrap()]));
    assert_eq!(second["results"][0]["ok"], true);
    assert_eq!(second["results"][0]["outcome"], "duplicate");

    let pending = json_out(as_role(&dir, "sara", "supervisor").args(["pending", "list"]));
    assert_eq!(pending.as_array().unwrap().len(), 1);
}

#[test]
fn sync_reports_malformed_ops_in_place() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    let batch = r#"[{"opId":"a","type":"delete"},{"opId":"b","type":"update","targetId":"ghost","payload":{}}]"#;
    let out = json_out(
        as_role(&dir, "sara", "supervisor")
            .args(["sync", "-"])
            .write_stdin(batch),
    );
    let results = out["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["error"]["kind"], "validation");
    assert_eq!(results[1]["error"]["kind"], "not_found");
}

// ---------------------------------------------------------------------------
// registry config
// ---------------------------------------------------------------------------

#[test]
fn default_config_validates() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    registry(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn malformed_catalog_blocks_commands() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    std::fs::write(
        dir.path().join(".registry/config.yaml"),
        "catalog:\n  specialists:\n    - {code: ELEC, short_name: a, full_name: b, machine_name: c}\n  registry_types: {}\n",
    )
    .unwrap();
    registry(&dir)
        .args(["student", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid catalog"));
}

#[test]
fn broken_config_fails_validation() {
    let dir = TempDir::new().unwrap();
    init_registry(&dir);
    std::fs::write(
        dir.path().join(".registry/config.yaml"),
        "catalog:\n  specialists:\n    - {code: el, short_name: a, full_name: b, machine_name: c}\n  registry_types: {}\n",
    )
    .unwrap();
    registry(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("two uppercase"));
}
