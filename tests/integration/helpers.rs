use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// The binary with model configuration scrubbed from the environment.
#[allow(deprecated)]
pub fn threatscope() -> Command {
    let mut cmd = Command::cargo_bin("threatscope").unwrap();
    cmd.env_remove("THREATSCOPE_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("THREATSCOPE_SYNTHESIS")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// A small Express-style service with one injectable query and one
/// committed secret.
pub fn fixture_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "routes/users.js",
        "router.get('/u/:id', (req, res) => {\n  db.query(\"SELECT * FROM users WHERE id = \" + req.params.id);\n});\n",
    );
    write(
        dir.path(),
        "config/settings.json",
        "{\n  \"apiSecret\": \"s3cr3t-value-that-is-long-enough\"\n}\n",
    );
    dir
}

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
