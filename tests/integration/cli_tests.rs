use predicates::prelude::*;

use super::{fixture_repo, threatscope, write};

#[test]
fn test_cli_version() {
    threatscope().arg("--version").assert().success();
}

#[test]
fn test_cli_help_lists_commands() {
    threatscope()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("document"))
        .stdout(predicate::str::contains("diagram"))
        .stdout(predicate::str::contains("rate"));
}

#[test]
fn test_rate_prints_breakdown() {
    let output = threatscope()
        .args(["rate", "--likelihood", "9,9,9,9,9,9,9,9", "--impact", "9,9,9,9"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["severity"], "Critical");
    assert_eq!(value["overallRiskScore"], 81.0);
}

#[test]
fn test_rate_wrong_arity_is_config_error() {
    threatscope()
        .args(["rate", "--likelihood", "1,2,3", "--impact", "1,2,3,4"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("8 values"));
}

#[test]
fn test_diagram_of_local_repo() {
    let repo = fixture_repo();
    threatscope()
        .arg("diagram")
        .arg(repo.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("flowchart TD"))
        .stdout(predicate::str::contains("-->|\"HTTPS\"|"));
}

#[test]
fn test_analyze_offline_json() {
    let repo = fixture_repo();
    let output = threatscope()
        .arg("analyze")
        .arg(repo.path())
        .args(["--offline", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["synthesis"], "rules");
    assert_eq!(report["framework"], "stride");
    let threats = report["threats"].as_array().unwrap();
    assert!(!threats.is_empty());
    assert!(threats
        .iter()
        .all(|t| t["id"].as_str().unwrap().starts_with("TM-")));
    assert_eq!(
        report["summary"]["total"].as_u64().unwrap() as usize,
        threats.len()
    );
}

#[test]
fn test_analyze_text_to_file() {
    let repo = fixture_repo();
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("report.txt");
    threatscope()
        .arg("analyze")
        .arg(repo.path())
        .arg("--offline")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Report written to"));

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("Threat model for"));
    assert!(text.contains("Hardcoded credential in config/settings.json"));
    assert!(!text.contains("\u{1b}["), "file output is never colored");
}

#[test]
fn test_document_offline() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "design.md",
        "# Orders\n\nA browser frontend calls a REST API that stores orders in Postgres.\n",
    );
    threatscope()
        .arg("document")
        .arg(dir.path().join("design.md"))
        .args(["--offline", "--framework", "pasta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Threat model for design.md"))
        .stdout(predicate::str::contains("framework: pasta"));
}

#[test]
fn test_bad_locator_exit_code() {
    threatscope()
        .args(["analyze", "definitely not a repo", "--offline"])
        .assert()
        .code(3);
}

#[test]
fn test_missing_config_file_exit_code() {
    threatscope()
        .args(["-c", "/nonexistent/threatscope.toml", "rate"])
        .args(["--likelihood", "1,1,1,1,1,1,1,1", "--impact", "1,1,1,1"])
        .assert()
        .code(2);
}
