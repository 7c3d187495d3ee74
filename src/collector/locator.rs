use std::path::PathBuf;
use url::Url;

use crate::errors::CollectionError;

/// What to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Normalized `https://host/owner/repo.git` URL
    Remote { url: String },
    /// Existing local directory, analyzed in place
    Local(PathBuf),
}

impl SourceLocator {
    /// An existing directory wins; anything else must be a repository URL.
    pub fn parse(raw: &str) -> Result<Self, CollectionError> {
        let trimmed = raw.trim();
        let as_path = PathBuf::from(trimmed);
        if !trimmed.is_empty() && as_path.is_dir() {
            return Ok(SourceLocator::Local(as_path));
        }
        normalize_repo_url(trimmed).map(|url| SourceLocator::Remote { url })
    }

    pub fn display_name(&self) -> String {
        match self {
            SourceLocator::Remote { url } => url.clone(),
            SourceLocator::Local(path) => path.display().to_string(),
        }
    }
}

/// Normalize a repository locator to `https://host/owner/repo.git`.
///
/// Accepts `host/owner/repo`, `http(s)://host/owner/repo[/][.git]`,
/// `ssh://git@host/owner/repo` and `git@host:owner/repo.git`.
pub fn normalize_repo_url(raw: &str) -> Result<String, CollectionError> {
    let invalid = |reason: &str| CollectionError::InvalidLocator {
        locator: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty locator"));
    }

    // scp-like ssh syntax has no scheme
    let candidate = if let Some(rest) = trimmed.strip_prefix("git@") {
        match rest.split_once(':') {
            Some((host, path)) if !host.is_empty() && !path.starts_with('/') => {
                format!("ssh://git@{}/{}", host, path)
            }
            _ => return Err(invalid("malformed ssh locator")),
        }
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
    match parsed.scheme() {
        "https" | "http" | "ssh" | "git+ssh" => {}
        other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
    }
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    if !host.contains('.') && host != "localhost" {
        return Err(invalid("host is not a domain"));
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 2 {
        return Err(invalid("expected owner/repository path"));
    }

    let mut path = segments.join("/");
    if let Some(stripped) = path.strip_suffix(".git") {
        path = stripped.to_string();
    }
    let port = parsed
        .port()
        .filter(|_| parsed.scheme() != "ssh" && parsed.scheme() != "git+ssh")
        .map(|p| format!(":{}", p))
        .unwrap_or_default();

    Ok(format!("https://{}{}/{}.git", host.to_ascii_lowercase(), port, path))
}
