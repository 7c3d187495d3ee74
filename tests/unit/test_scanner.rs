//! Unit tests for the pattern scanner

use threatscope::config::Limits;
use threatscope::model::Severity;
use threatscope::scanner::{snippet_at, Scanner, DETECTOR_ROWS, HARDCODED_SECRET};

fn scan(relative: &str, text: &str) -> Vec<threatscope::model::Finding> {
    Scanner::new(&Limits::default()).scan_text(relative, text)
}

fn detectors(findings: &[threatscope::model::Finding]) -> Vec<&str> {
    findings.iter().map(|f| f.detector.as_str()).collect()
}

#[test]
fn test_registry_compiles_every_row() {
    assert_eq!(threatscope::scanner::registry().len(), DETECTOR_ROWS.len());
}

#[test]
fn test_secret_line_numbers_are_one_based() {
    let text = "const a = 1;\nconst b = 2;\nconst apiKey = \"sk_live_0123456789abcdef\";\n";
    let findings = scan("src/keys.js", text);
    assert_eq!(detectors(&findings), vec![HARDCODED_SECRET]);
    assert_eq!(findings[0].line, 3);
    assert_eq!(findings[0].severity, Severity::Critical);
    assert_eq!(findings[0].file, "src/keys.js");
    assert!(findings[0].description.contains("CWE-798"));
}

#[test]
fn test_short_secret_values_are_ignored() {
    assert!(scan("a.py", "password = \"hunter2\"").is_empty());
}

#[test]
fn test_sql_concatenation() {
    let text = "db.query(\"SELECT * FROM users WHERE id = \" + req.params.id);";
    assert_eq!(detectors(&scan("routes/users.js", text)), vec!["sql_injection"]);
}

#[test]
fn test_python_patterns() {
    let text = "import pickle, subprocess\n\
                data = pickle.loads(blob)\n\
                subprocess.run(cmd, shell=True)\n\
                requests.get(url, verify=False)\n";
    let findings = scan("worker.py", text);
    let found = detectors(&findings);
    assert!(found.contains(&"insecure_deserialization"));
    assert!(found.contains(&"command_injection"));
    assert!(found.contains(&"tls_verification_disabled"));
}

#[test]
fn test_debug_flag_only_at_line_start() {
    assert_eq!(detectors(&scan("settings.py", "DEBUG = True\n")), vec!["debug_enabled"]);
    assert!(scan("settings.py", "# keep DEBUG = True out of prod\n").is_empty());
}

#[test]
fn test_per_file_cap() {
    let text = "eval(a)\n".repeat(50);
    let limits = Limits {
        max_findings_per_file: 4,
        ..Limits::default()
    };
    let findings = Scanner::new(&limits).scan_text("x.js", &text);
    assert_eq!(findings.len(), 4);
    assert_eq!(findings.last().unwrap().line, 4);
}

#[test]
fn test_zero_cap_yields_nothing() {
    let limits = Limits {
        max_findings_per_file: 0,
        ..Limits::default()
    };
    assert!(Scanner::new(&limits).scan_text("x.js", "eval(a)").is_empty());
}

#[test]
fn test_snippet_is_trimmed_line_and_bounded() {
    let text = "first\n    el.innerHTML = userInput;   \nlast";
    let offset = text.find("el.").unwrap();
    assert_eq!(snippet_at(text, offset, 200), "el.innerHTML = userInput;");
    assert_eq!(snippet_at(text, offset, 5).chars().count(), 5);
}
