//! Unit tests for architecture extraction and diagram rendering

use std::path::PathBuf;
use threatscope::collector::{SourceFile, SourceSet};
use threatscope::config::Limits;
use threatscope::diagram;
use threatscope::extractor::{extract, extract_document, EXTERNAL_BOUNDARY, FALLBACK_SERVICE};
use threatscope::model::{ComponentType, END_USER};

fn inline_set(files: &[(&str, &str)]) -> SourceSet {
    SourceSet::from_files(
        PathBuf::from("/virtual"),
        files
            .iter()
            .map(|(rel, content)| SourceFile::inline(*rel, *content))
            .collect(),
    )
}

fn names(result: &threatscope::model::AnalysisResult) -> Vec<&str> {
    result.components.iter().map(|c| c.name.as_str()).collect()
}

fn flow_pairs(result: &threatscope::model::AnalysisResult) -> Vec<(&str, &str)> {
    result
        .data_flows
        .iter()
        .map(|f| (f.from.as_str(), f.to.as_str()))
        .collect()
}

mod extract_tests {
    use super::*;

    #[test]
    fn test_layered_web_app() {
        let set = inline_set(&[
            ("src/pages/Home.jsx", "export default function Home() { return null }"),
            ("src/routes/users.js", "const mysql = require('mysql2');"),
            ("src/auth/login.js", "module.exports = function login() {}"),
        ]);
        let result = extract(&set, Vec::new(), &Limits::default());

        assert_eq!(
            names(&result),
            vec!["Frontend", "API Server", "Auth Service", "Database", END_USER]
        );
        assert_eq!(
            flow_pairs(&result),
            vec![
                ("Frontend", "API Server"),
                ("API Server", "Auth Service"),
                ("API Server", "Database"),
                ("Auth Service", "Database"),
            ]
        );
        assert_eq!(result.data_flows[0].protocol.as_deref(), Some("HTTPS"));
        assert_eq!(result.data_flows[1].label(), "Credentials and tokens");
        assert_eq!(result.languages, vec!["JavaScript"]);
        assert!(result
            .entry_points
            .contains(&"src/routes/users.js".to_string()));
        assert_eq!(result.trust_boundaries.len(), 2);
    }

    #[test]
    fn test_unrecognized_layout_gets_fallback_service() {
        let set = inline_set(&[("lib/util.py", "def add(a, b):\n    return a + b\n")]);
        let result = extract(&set, Vec::new(), &Limits::default());

        assert_eq!(names(&result), vec![FALLBACK_SERVICE, END_USER]);
        assert_eq!(flow_pairs(&result), vec![(END_USER, FALLBACK_SERVICE)]);
        assert_eq!(
            result.first_of_type(ComponentType::Service).unwrap().files,
            vec!["lib/util.py".to_string()]
        );
    }

    #[test]
    fn test_config_adds_infrastructure_boundary() {
        let set = inline_set(&[
            ("api/server.go", "package main"),
            ("Dockerfile", "FROM alpine"),
        ]);
        let result = extract(&set, Vec::new(), &Limits::default());
        let boundary_names: Vec<&str> = result
            .trust_boundaries
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(
            boundary_names,
            vec!["Internal Network", EXTERNAL_BOUNDARY, "Infrastructure"]
        );
    }

    #[test]
    fn test_gateway_matched_on_file_name_only() {
        let set = inline_set(&[("src/proxy_utils/db.rs", "pub fn connect() {}")]);
        let result = extract(&set, Vec::new(), &Limits::default());
        assert!(result.first_of_type(ComponentType::Gateway).is_none());
        assert_eq!(names(&result), vec![FALLBACK_SERVICE, END_USER]);

        let set = inline_set(&[("src/edge/gateway.ts", "export const route = 1;")]);
        let result = extract(&set, Vec::new(), &Limits::default());
        assert_eq!(
            result.first_of_type(ComponentType::Gateway).unwrap().files,
            vec!["src/edge/gateway.ts".to_string()]
        );
    }

    #[test]
    fn test_file_tree_cap() {
        let files: Vec<(String, String)> = (0..10)
            .map(|i| (format!("f{}.txt", i), String::new()))
            .collect();
        let borrowed: Vec<(&str, &str)> = files
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let limits = Limits {
            file_tree_cap: 4,
            ..Limits::default()
        };
        let result = extract(&inline_set(&borrowed), Vec::new(), &limits);
        assert_eq!(result.file_tree.len(), 4);
    }

    #[test]
    fn test_document_keywords() {
        let text = "Users sign in through the browser. The REST API stores orders in Postgres \
                    and publishes events to Kafka.";
        let result = extract_document("design.md", text, Vec::new());
        let found = names(&result);
        for expected in ["Frontend", "API Server", "Database", "Message Queue", END_USER] {
            assert!(found.contains(&expected), "missing {}", expected);
        }
        assert_eq!(result.file_tree, vec!["design.md".to_string()]);
    }
}

mod diagram_tests {
    use super::*;

    #[test]
    fn test_rendering_is_deterministic() {
        let set = inline_set(&[
            ("src/routes/orders.ts", "import { Pool } from 'pg'; const pool = createPool()"),
            ("src/views/list.vue", "<template></template>"),
        ]);
        let result = extract(&set, Vec::new(), &Limits::default());
        let first = diagram::render(&result);
        let second = diagram::render(&result);
        assert_eq!(first, second);
        assert!(first.starts_with("flowchart TD\n"));
        assert!(first.contains("-->|\"HTTPS\"|"));
        assert!(first.contains("[(\"Database\")]"));
    }

    #[test]
    fn test_labels_are_sanitized() {
        assert_eq!(diagram::sanitize_label("Auth [v2] \"core\""), "Auth v2 core");
        assert_eq!(diagram::sanitize_label("<>|"), "unnamed");
    }
}
