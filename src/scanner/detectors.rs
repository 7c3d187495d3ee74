//! Detector registry
//!
//! Every detector is a data row: name, pattern, severity, CWE and
//! description. Adding a detector means adding a row.

use regex::Regex;
use std::sync::OnceLock;

use crate::model::Severity;

/// Declarative detector definition.
#[derive(Debug, Clone, Copy)]
pub struct DetectorRow {
    pub name: &'static str,
    pub pattern: &'static str,
    pub severity: Severity,
    pub cwe: &'static str,
    pub description: &'static str,
}

/// A compiled detector.
#[derive(Debug)]
pub struct Detector {
    pub name: &'static str,
    pub severity: Severity,
    pub cwe: &'static str,
    pub description: &'static str,
    pub regex: Regex,
}

pub const HARDCODED_SECRET: &str = "hardcoded_secret";

pub const DETECTOR_ROWS: &[DetectorRow] = &[
    DetectorRow {
        name: HARDCODED_SECRET,
        pattern: r#"(?i)(?:client[_-]?secret|secret|password|passwd|pwd|api[_-]?key|access[_-]?key|auth[_-]?token|token)[\w-]*["']?\s*[:=]\s*["'][^"'\s]{16,}["']"#,
        severity: Severity::Critical,
        cwe: "CWE-798",
        description: "Long literal assigned to a secret-named key",
    },
    DetectorRow {
        name: "private_key",
        pattern: r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |ENCRYPTED )?PRIVATE KEY-----",
        severity: Severity::Critical,
        cwe: "CWE-321",
        description: "Private key material committed to the repository",
    },
    DetectorRow {
        name: "aws_access_key",
        pattern: r"\bAKIA[0-9A-Z]{16}\b",
        severity: Severity::Critical,
        cwe: "CWE-798",
        description: "AWS access key id in source",
    },
    DetectorRow {
        name: "sql_injection",
        pattern: r#"(?i)(?:\.(?:query|execute|raw)\s*\(\s*["'][^"'\n]*["']\s*(?:\+|%)|["'`](?:SELECT|INSERT\s+INTO|UPDATE|DELETE\s+FROM)\b[^"'`\n]*["'`]\s*\+|`(?:SELECT|INSERT|UPDATE|DELETE)\b[^`]*\$\{|\bf["'](?:SELECT|INSERT|UPDATE|DELETE)\b|format!\s*\(\s*"(?:SELECT|INSERT|UPDATE|DELETE)\b)"#,
        severity: Severity::High,
        cwe: "CWE-89",
        description: "SQL query built by string concatenation or interpolation",
    },
    DetectorRow {
        name: "command_injection",
        pattern: r"(?:\bexec(?:Sync)?\s*\([^)\n]*\+|\bos\.system\s*\(|\bsubprocess\.\w+\([^)\n]*shell\s*=\s*True|Runtime\.getRuntime\(\)\.exec\s*\(|Command::new\s*\(\s*&?format!)",
        severity: Severity::Critical,
        cwe: "CWE-78",
        description: "Shell command built from dynamic input",
    },
    DetectorRow {
        name: "code_eval",
        pattern: r"(?:\beval\s*\(|\bnew\s+Function\s*\()",
        severity: Severity::High,
        cwe: "CWE-95",
        description: "Dynamic code evaluation",
    },
    DetectorRow {
        name: "xss",
        pattern: r"(?:\.innerHTML\s*=|dangerouslySetInnerHTML|document\.write\s*\(|\bv-html\s*=|\|\s*safe\b|\bmark_safe\s*\()",
        severity: Severity::High,
        cwe: "CWE-79",
        description: "Unescaped HTML rendering",
    },
    DetectorRow {
        name: "weak_crypto",
        pattern: r#"(?:createHash\s*\(\s*["'](?:md5|sha1)["']|hashlib\.(?:md5|sha1)\s*\(|MessageDigest\.getInstance\s*\(\s*"(?:MD5|SHA-?1)"|\bmd5\s*\(|Cipher\.getInstance\s*\(\s*"DES|\bRC4\b)"#,
        severity: Severity::Medium,
        cwe: "CWE-327",
        description: "Broken or weak cryptographic primitive",
    },
    DetectorRow {
        name: "insecure_deserialization",
        pattern: r"(?:\bpickle\.loads?\s*\(|\byaml\.load\s*\(|\bObjectInputStream\s*\(|\bunserialize\s*\(|\bMarshal\.load\b|node-serialize)",
        severity: Severity::High,
        cwe: "CWE-502",
        description: "Deserialization of potentially untrusted data",
    },
    DetectorRow {
        name: "tls_verification_disabled",
        pattern: r#"(?:rejectUnauthorized\s*:\s*false|\bverify\s*=\s*False|InsecureSkipVerify\s*:\s*true|NODE_TLS_REJECT_UNAUTHORIZED["']?\s*[=:]\s*["']?0|danger_accept_invalid_certs\s*\(\s*true)"#,
        severity: Severity::High,
        cwe: "CWE-295",
        description: "TLS certificate verification disabled",
    },
    DetectorRow {
        name: "permissive_cors",
        pattern: r#"(?:Access-Control-Allow-Origin["']?\s*[,:]\s*["']\*|\borigin\s*:\s*["']\*["']|CORS_ORIGIN_ALLOW_ALL\s*=\s*True|AllowAnyOrigin\s*\(|allow_origins\s*=\s*\[\s*["']\*)"#,
        severity: Severity::Medium,
        cwe: "CWE-942",
        description: "CORS policy allows any origin",
    },
    DetectorRow {
        name: "path_traversal",
        pattern: r"(?:(?:readFile(?:Sync)?|createReadStream|sendFile|open|path\.join)\s*\([^)\n]*(?:req\.(?:params|query|body)|request\.(?:args|GET|POST|form)))",
        severity: Severity::High,
        cwe: "CWE-22",
        description: "File path derived from request input",
    },
    DetectorRow {
        name: "jwt_none_algorithm",
        pattern: r#"(?:(?i:algorithms?)\s*[:=]\s*\[?\s*["'](?i:none)["']|jwt\.decode\s*\([^)\n]*verify\s*=\s*False|verify_signature["']?\s*:\s*False)"#,
        severity: Severity::High,
        cwe: "CWE-347",
        description: "JWT signature verification disabled",
    },
    DetectorRow {
        name: "debug_enabled",
        pattern: r"(?m:^\s*DEBUG\s*=\s*True\b)|app\.run\s*\([^)\n]*debug\s*=\s*True",
        severity: Severity::Low,
        cwe: "CWE-489",
        description: "Debug mode enabled",
    },
];

static REGISTRY: OnceLock<Vec<Detector>> = OnceLock::new();

/// Compiled registry in row order. Rows that fail to compile are skipped.
pub fn registry() -> &'static [Detector] {
    REGISTRY.get_or_init(|| compile(DETECTOR_ROWS))
}

pub fn compile(rows: &[DetectorRow]) -> Vec<Detector> {
    rows.iter()
        .filter_map(|row| match Regex::new(row.pattern) {
            Ok(regex) => Some(Detector {
                name: row.name,
                severity: row.severity,
                cwe: row.cwe,
                description: row.description,
                regex,
            }),
            Err(e) => {
                tracing::warn!("Detector {} has an invalid pattern: {}", row.name, e);
                None
            }
        })
        .collect()
}

pub fn find(name: &str) -> Option<&'static Detector> {
    registry().iter().find(|d| d.name == name)
}
