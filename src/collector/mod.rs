//! Source Collector
//!
//! Resolves a source locator, fetches remote repositories into a
//! session-scoped temporary directory, and walks the tree into a bounded
//! [`SourceSet`]. The temporary directory is owned by a [`Workspace`] guard and
//! is removed whenever the guard drops: on success, on error, and when the
//! owning future is cancelled.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Limits;
use crate::errors::{CollectionError, ScanError};

mod locator;

pub use locator::{normalize_repo_url, SourceLocator};

/// Build, VCS, dependency and cache directories never walked.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    "out",
    ".next",
    ".nuxt",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "coverage",
    ".nyc_output",
    "vendor",
    ".venv",
    "venv",
    "bin",
    "obj",
    ".idea",
    ".vscode",
    ".gradle",
];

/// Dotfiles and dot-directories that carry configuration worth scanning.
pub const DOTFILE_ALLOW_LIST: &[&str] = &[
    ".env",
    ".env.example",
    ".env.local",
    ".env.development",
    ".env.production",
    ".env.staging",
    ".github",
    ".gitlab-ci.yml",
    ".travis.yml",
    ".htaccess",
    ".npmrc",
];

const EXCLUDED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "tiff", "psd", "mp3", "mp4",
    "wav", "avi", "mov", "webm", "ogg", "flac", "pdf", "zip", "tar", "gz", "tgz", "bz2", "xz",
    "7z", "rar", "jar", "war", "ear", "class", "exe", "dll", "so", "dylib", "o", "a", "lib",
    "bin", "wasm", "pyc", "pyo", "woff", "woff2", "ttf", "eot", "otf", "map", "lock", "db",
    "sqlite", "sqlite3", "keystore", "dat",
];

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "go.sum",
    "bun.lockb",
];

/// Session-scoped temporary directory. Dropping the guard removes it.
#[derive(Debug)]
pub struct Workspace {
    dir: tempfile::TempDir,
    session: String,
}

impl Workspace {
    pub fn create(session: &str) -> Result<Self, CollectionError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("threatscope-{}-", session))
            .tempdir()
            .map_err(|e| CollectionError::Io {
                path: std::env::temp_dir(),
                message: e.to_string(),
            })?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self {
            dir,
            session: session.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the repository is cloned inside the workspace.
    pub fn checkout_dir(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

/// One retained file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the collection root, `/`-separated
    pub relative: String,
    pub path: PathBuf,
    pub size: u64,
    inline: Option<String>,
}

impl SourceFile {
    pub fn on_disk(relative: impl Into<String>, path: PathBuf, size: u64) -> Self {
        Self {
            relative: relative.into(),
            path,
            size,
            inline: None,
        }
    }

    /// A file whose content is already in memory (design documents).
    pub fn inline(relative: impl Into<String>, content: impl Into<String>) -> Self {
        let relative = relative.into();
        let content = content.into();
        Self {
            path: PathBuf::from(&relative),
            relative,
            size: content.len() as u64,
            inline: Some(content),
        }
    }

    pub fn read(&self) -> Result<String, ScanError> {
        if let Some(content) = &self.inline {
            return Ok(content.clone());
        }
        let bytes = std::fs::read(&self.path).map_err(|e| ScanError::Unreadable {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|_| ScanError::Unreadable {
            path: self.path.clone(),
            message: "not valid UTF-8".to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// The bounded file set handed to the scanner and extractor.
#[derive(Debug)]
pub struct SourceSet {
    pub root: PathBuf,
    pub files: Vec<SourceFile>,
    /// The file-count cap cut the walk short
    pub truncated: bool,
    pub skipped_oversize: usize,
    workspace: Option<Workspace>,
}

impl SourceSet {
    pub fn from_files(root: PathBuf, files: Vec<SourceFile>) -> Self {
        Self {
            root,
            files,
            truncated: false,
            skipped_oversize: 0,
            workspace: None,
        }
    }

    pub fn relative_paths(&self) -> Vec<String> {
        self.files.iter().map(|f| f.relative.clone()).collect()
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

pub struct Collector {
    limits: Limits,
    session: String,
}

impl Collector {
    pub fn new(limits: Limits, session: impl Into<String>) -> Self {
        Self {
            limits,
            session: session.into(),
        }
    }

    /// Fetch (if remote) and walk the source. Remote clones run on the
    /// blocking pool with the workspace guard moved into the task.
    pub async fn collect(&self, locator: &SourceLocator) -> Result<SourceSet, CollectionError> {
        match locator {
            SourceLocator::Local(root) => {
                let root = root.clone();
                let limits = self.limits.clone();
                let walked = tokio::task::spawn_blocking(move || walk(&root, &limits).map(|w| (root, w)))
                    .await
                    .map_err(|e| CollectionError::Git(format!("walk task failed: {}", e)))?;
                let (root, walked) = walked?;
                Ok(walked.into_set(root, None))
            }
            SourceLocator::Remote { url } => {
                let workspace = Workspace::create(&self.session)?;
                let url = url.clone();
                let limits = self.limits.clone();
                info!("Cloning {} (depth {})", url, limits.clone_depth);

                let result = tokio::task::spawn_blocking(move || {
                    let checkout = workspace.checkout_dir();
                    clone_repo(&url, &checkout, limits.clone_depth)?;
                    let walked = walk(&checkout, &limits)?;
                    Ok::<_, CollectionError>((workspace, checkout, walked))
                })
                .await
                .map_err(|e| CollectionError::Git(format!("clone task failed: {}", e)))?;

                let (workspace, checkout, walked) = result?;
                Ok(walked.into_set(checkout, Some(workspace)))
            }
        }
    }
}

/// Walk output before it is tied to a root.
#[derive(Debug, Default)]
pub struct Walked {
    pub files: Vec<SourceFile>,
    pub truncated: bool,
    pub skipped_oversize: usize,
}

impl Walked {
    fn into_set(self, root: PathBuf, workspace: Option<Workspace>) -> SourceSet {
        SourceSet {
            root,
            files: self.files,
            truncated: self.truncated,
            skipped_oversize: self.skipped_oversize,
            workspace,
        }
    }
}

/// Bounded, deterministic walk. Stops as soon as one eligible file beyond
/// `max_files` is seen.
pub fn walk(root: &Path, limits: &Limits) -> Result<Walked, CollectionError> {
    if !root.is_dir() {
        return Err(CollectionError::NotFound(root.display().to_string()));
    }

    let mut walked = Walked::default();
    let iter = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || keep_entry(e));

    for entry in iter {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_excluded_file(&name) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if size > limits.max_file_bytes {
            walked.skipped_oversize += 1;
            continue;
        }

        if walked.files.len() >= limits.max_files {
            walked.truncated = true;
            warn!(
                "File cap of {} reached; remaining files are not analyzed",
                limits.max_files
            );
            break;
        }

        let relative = relative_path(root, entry.path());
        walked
            .files
            .push(SourceFile::on_disk(relative, entry.into_path(), size));
    }

    info!(
        "Collected {} files ({} oversize skipped, truncated: {})",
        walked.files.len(),
        walked.skipped_oversize,
        walked.truncated
    );
    Ok(walked)
}

fn keep_entry(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() && EXCLUDED_DIRS.contains(&name.as_ref()) {
        return false;
    }
    if name.starts_with('.') {
        return DOTFILE_ALLOW_LIST.contains(&name.as_ref());
    }
    true
}

/// Binary, media, archive and lock files.
pub fn is_excluded_file(name: &str) -> bool {
    if LOCK_FILES.contains(&name) {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".min.js") || lower.ends_with(".min.css") {
        return true;
    }
    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => EXCLUDED_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn clone_repo(url: &str, dest: &Path, depth: u32) -> Result<(), CollectionError> {
    let mut fetch = git2::FetchOptions::new();
    if depth > 0 {
        fetch.depth(depth.min(i32::MAX as u32) as i32);
    }
    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch);
    builder
        .clone(url, dest)
        .map(|_| ())
        .map_err(|e| map_git_error(url, &e))
}

/// Classify a clone failure so callers can fail fast with a typed error.
pub fn map_git_error(url: &str, e: &git2::Error) -> CollectionError {
    let message = e.message().to_string();
    let lower = message.to_ascii_lowercase();

    if e.code() == git2::ErrorCode::Auth
        || lower.contains("authentication")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("credentials")
    {
        return CollectionError::Authentication(url.to_string());
    }
    if e.code() == git2::ErrorCode::NotFound
        || lower.contains("404")
        || lower.contains("not found")
    {
        return CollectionError::NotFound(url.to_string());
    }
    match e.class() {
        git2::ErrorClass::Net | git2::ErrorClass::Http | git2::ErrorClass::Ssl | git2::ErrorClass::Ssh => {
            CollectionError::Network {
                url: url.to_string(),
                message,
            }
        }
        _ => CollectionError::Git(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn limits() -> Limits {
        Limits::default()
    }

    #[test]
    fn test_excluded_files() {
        assert!(is_excluded_file("logo.PNG"));
        assert!(is_excluded_file("package-lock.json"));
        assert!(is_excluded_file("Cargo.lock"));
        assert!(is_excluded_file("bundle.min.js"));
        assert!(!is_excluded_file("server.js"));
        assert!(!is_excluded_file("Dockerfile"));
        assert!(!is_excluded_file(".env"));
    }

    #[test]
    fn test_walk_excludes_dirs_and_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::create_dir_all(root.join(".github/workflows")).unwrap();
        fs::write(root.join("src/app.js"), "const x = 1;").unwrap();
        fs::write(root.join("node_modules/lib/index.js"), "x").unwrap();
        fs::write(root.join(".cache/blob"), "x").unwrap();
        fs::write(root.join(".secret_notes"), "x").unwrap();
        fs::write(root.join(".env"), "API_KEY=x").unwrap();
        fs::write(root.join(".github/workflows/ci.yml"), "on: push").unwrap();
        fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();

        let walked = walk(root, &limits()).unwrap();
        let rels: Vec<_> = walked.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(rels, vec![".env", ".github/workflows/ci.yml", "src/app.js"]);
        assert!(!walked.truncated);
    }

    #[test]
    fn test_walk_skips_oversize() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.js"), "a".repeat(60 * 1024)).unwrap();
        fs::write(dir.path().join("small.js"), "a").unwrap();
        let walked = walk(dir.path(), &limits()).unwrap();
        assert_eq!(walked.files.len(), 1);
        assert_eq!(walked.skipped_oversize, 1);
    }

    #[test]
    fn test_walk_caps_file_count() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            fs::write(dir.path().join(format!("f{}.py", i)), "pass").unwrap();
        }
        let mut l = limits();
        l.max_files = 5;
        let walked = walk(dir.path(), &l).unwrap();
        assert_eq!(walked.files.len(), 5);
        assert!(walked.truncated);
        assert_eq!(walked.files[0].relative, "f0.py");
    }

    #[test]
    fn test_walk_exact_cap_is_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            fs::write(dir.path().join(format!("f{}.py", i)), "pass").unwrap();
        }
        let mut l = limits();
        l.max_files = 3;
        let walked = walk(dir.path(), &l).unwrap();
        assert_eq!(walked.files.len(), 3);
        assert!(!walked.truncated);
    }

    #[test]
    fn test_walk_missing_root() {
        let err = walk(Path::new("/definitely/not/here"), &limits()).unwrap_err();
        assert!(matches!(err, CollectionError::NotFound(_)));
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let ws = Workspace::create("abc123").unwrap();
        let path = ws.path().to_path_buf();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("threatscope-abc123-"));
        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn test_source_file_read_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.TS");
        fs::write(&p, "let a = 1;").unwrap();
        let f = SourceFile::on_disk("src/a.TS", p, 10);
        assert_eq!(f.read().unwrap(), "let a = 1;");
        assert_eq!(f.extension().as_deref(), Some("ts"));
        assert_eq!(f.file_name(), "a.TS");

        let env = SourceFile::inline(".env", "X=1");
        assert_eq!(env.extension(), None);
        assert_eq!(env.read().unwrap(), "X=1");
    }

    #[test]
    fn test_unreadable_binary_content() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("blob.txt");
        fs::write(&p, [0xffu8, 0xfe, 0x00]).unwrap();
        let f = SourceFile::on_disk("blob.txt", p, 3);
        assert!(matches!(f.read(), Err(ScanError::Unreadable { .. })));
    }

    #[test]
    fn test_map_git_error_classes() {
        let auth = git2::Error::new(
            git2::ErrorCode::Auth,
            git2::ErrorClass::Http,
            "remote authentication required",
        );
        assert!(matches!(
            map_git_error("u", &auth),
            CollectionError::Authentication(_)
        ));

        let missing = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Http,
            "unexpected http status code: 404",
        );
        assert!(matches!(
            map_git_error("u", &missing),
            CollectionError::NotFound(_)
        ));

        let net = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Net,
            "failed to resolve address",
        );
        assert!(matches!(
            map_git_error("u", &net),
            CollectionError::Network { .. }
        ));
    }

    #[tokio::test]
    async fn test_collect_local_directory_in_place() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        let collector = Collector::new(limits(), "s1");
        let set = collector
            .collect(&SourceLocator::Local(dir.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.workspace().is_none());
        assert_eq!(set.root, dir.path());
    }
}
