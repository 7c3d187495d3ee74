//! Unit tests for source collection
//!
//! Tests cover:
//! - Locator parsing and normalization
//! - Bounded walking (exclusions, size cap, file cap)
//! - Local collection through the async collector

use std::fs;
use tempfile::tempdir;
use threatscope::collector::{normalize_repo_url, walk, Collector, SourceLocator};
use threatscope::config::Limits;
use threatscope::errors::CollectionError;

fn write(root: &std::path::Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

// ============================================================================
// Locators
// ============================================================================

mod locator_tests {
    use super::*;

    #[test]
    fn test_existing_directory_is_local() {
        let dir = tempdir().unwrap();
        let locator = SourceLocator::parse(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(locator, SourceLocator::Local(dir.path().to_path_buf()));
    }

    #[test]
    fn test_shorthand_is_remote() {
        let locator = SourceLocator::parse("GitHub.com/owner/repo").unwrap();
        assert_eq!(
            locator,
            SourceLocator::Remote {
                url: "https://github.com/owner/repo.git".to_string()
            }
        );
    }

    #[test]
    fn test_ssh_forms_normalize_to_https() {
        assert_eq!(
            normalize_repo_url("ssh://git@gitlab.com/group/project").unwrap(),
            "https://gitlab.com/group/project.git"
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for raw in ["", "   ", "github.com/only-owner", "ftp://github.com/o/r", "not a url"] {
            let err = SourceLocator::parse(raw).unwrap_err();
            assert!(
                matches!(err, CollectionError::InvalidLocator { .. }),
                "{:?} gave {:?}",
                raw,
                err
            );
        }
    }
}

// ============================================================================
// Walking
// ============================================================================

mod walk_tests {
    use super::*;

    #[test]
    fn test_skips_excluded_dirs_and_binaries() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/app.js", "console.log('hi')");
        write(dir.path(), "node_modules/lib/index.js", "module.exports = {}");
        write(dir.path(), ".git/config", "[core]");
        write(dir.path(), "logo.png", "not really a png");
        write(dir.path(), "package-lock.json", "{}");
        write(dir.path(), ".env", "SECRET=x");
        write(dir.path(), ".cache/blob.txt", "cached");

        let walked = walk(dir.path(), &Limits::default()).unwrap();
        let paths: Vec<&str> = walked.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(paths, vec![".env", "src/app.js"]);
        assert!(!walked.truncated);
    }

    #[test]
    fn test_oversize_files_are_counted_not_read() {
        let dir = tempdir().unwrap();
        write(dir.path(), "small.py", "print(1)");
        write(dir.path(), "big.py", &"x".repeat(2048));
        let limits = Limits {
            max_file_bytes: 1024,
            ..Limits::default()
        };

        let walked = walk(dir.path(), &limits).unwrap();
        assert_eq!(walked.files.len(), 1);
        assert_eq!(walked.files[0].relative, "small.py");
        assert_eq!(walked.skipped_oversize, 1);
    }

    #[test]
    fn test_file_cap_truncates() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            write(dir.path(), &format!("f{}.rs", i), "fn main() {}");
        }
        let limits = Limits {
            max_files: 3,
            ..Limits::default()
        };

        let walked = walk(dir.path(), &limits).unwrap();
        assert_eq!(walked.files.len(), 3);
        assert!(walked.truncated);
    }

    #[test]
    fn test_exactly_at_cap_is_not_truncated() {
        let dir = tempdir().unwrap();
        for i in 0..3 {
            write(dir.path(), &format!("f{}.rs", i), "fn main() {}");
        }
        let limits = Limits {
            max_files: 3,
            ..Limits::default()
        };
        let walked = walk(dir.path(), &limits).unwrap();
        assert_eq!(walked.files.len(), 3);
        assert!(!walked.truncated);
    }

    #[test]
    fn test_missing_root() {
        let err = walk(std::path::Path::new("/nonexistent/threatscope/root"), &Limits::default())
            .unwrap_err();
        assert!(matches!(err, CollectionError::NotFound(_)));
    }
}

// ============================================================================
// Collector
// ============================================================================

mod collector_tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_local_directory() {
        let dir = tempdir().unwrap();
        write(dir.path(), "server.js", "const express = require('express')");
        let collector = Collector::new(Limits::default(), "session-test");

        let set = collector
            .collect(&SourceLocator::Local(dir.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.workspace().is_none(), "local sources are never copied");
        assert_eq!(
            set.files[0].read().unwrap(),
            "const express = require('express')"
        );
    }
}
