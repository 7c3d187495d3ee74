//! Lookup tables for language, framework and component classification.

use regex::Regex;
use std::sync::OnceLock;

/// Extension → language.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("py", "Python"),
    ("rb", "Ruby"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("scala", "Scala"),
    ("cs", "C#"),
    ("php", "PHP"),
    ("swift", "Swift"),
    ("c", "C"),
    ("h", "C"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("hpp", "C++"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("sh", "Shell"),
    ("sql", "SQL"),
];

pub fn language_for(ext: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Extensions accepted as frontend sources under page/view/component paths.
pub const FRONTEND_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "vue", "svelte", "html"];

/// Prose extensions whose content is sniffed alongside source files.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "adoc"];

/// Entry-point file stems.
pub const ENTRY_STEMS: &[&str] = &["main", "index", "app", "server", "wsgi", "asgi", "manage"];

/// Framework name, manifest files it is declared in, declaration pattern.
pub struct FrameworkSignature {
    pub name: &'static str,
    pub manifests: &'static [&'static str],
    pub pattern: &'static str,
}

const NPM: &[&str] = &["package.json"];
const PY: &[&str] = &["requirements.txt", "pyproject.toml", "Pipfile", "setup.py"];
const JVM: &[&str] = &["pom.xml", "build.gradle", "build.gradle.kts"];

pub const FRAMEWORKS: &[FrameworkSignature] = &[
    FrameworkSignature { name: "Express", manifests: NPM, pattern: r#""express"\s*:"# },
    FrameworkSignature { name: "React", manifests: NPM, pattern: r#""react"\s*:"# },
    FrameworkSignature { name: "Next.js", manifests: NPM, pattern: r#""next"\s*:"# },
    FrameworkSignature { name: "Vue", manifests: NPM, pattern: r#""vue"\s*:"# },
    FrameworkSignature { name: "Angular", manifests: NPM, pattern: r#""@angular/core"\s*:"# },
    FrameworkSignature { name: "NestJS", manifests: NPM, pattern: r#""@nestjs/core"\s*:"# },
    FrameworkSignature { name: "Fastify", manifests: NPM, pattern: r#""fastify"\s*:"# },
    FrameworkSignature { name: "Django", manifests: PY, pattern: r"(?i)\bdjango\b" },
    FrameworkSignature { name: "Flask", manifests: PY, pattern: r"(?i)\bflask\b" },
    FrameworkSignature { name: "FastAPI", manifests: PY, pattern: r"(?i)\bfastapi\b" },
    FrameworkSignature { name: "Spring", manifests: JVM, pattern: r"org\.springframework|spring-boot" },
    FrameworkSignature { name: "Rails", manifests: &["Gemfile"], pattern: r#"gem\s+['"]rails['"]"# },
    FrameworkSignature { name: "Gin", manifests: &["go.mod"], pattern: r"github\.com/gin-gonic/gin" },
    FrameworkSignature { name: "Actix Web", manifests: &["Cargo.toml"], pattern: r"(?m)^\s*actix-web\b" },
    FrameworkSignature { name: "Axum", manifests: &["Cargo.toml"], pattern: r"(?m)^\s*axum\b" },
    FrameworkSignature { name: "Laravel", manifests: &["composer.json"], pattern: r#""laravel/framework"\s*:"# },
];

/// File names that are infrastructure or environment configuration.
pub const INFRA_FILE_NAMES: &[&str] = &[
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
    "Jenkinsfile",
    "Procfile",
    "Makefile",
    "Chart.yaml",
    "values.yaml",
    "kustomization.yaml",
    "serverless.yml",
    "app.yaml",
    ".gitlab-ci.yml",
    ".travis.yml",
    "vercel.json",
    "netlify.toml",
    "fly.toml",
];

/// Extensions treated as configuration when they sit in a config directory.
pub const CONFIG_EXTENSIONS: &[&str] = &[
    "json", "yml", "yaml", "toml", "ini", "properties", "conf", "cfg", "env", "tf", "tfvars",
    "hcl",
];

struct Heuristics {
    api_path: Regex,
    frontend_path: Regex,
    database_content: Regex,
    queue_content: Regex,
    auth_name: Regex,
    gateway_name: Regex,
    config_path: Regex,
    frameworks: Vec<(usize, Regex)>,
}

static HEURISTICS: OnceLock<Option<Heuristics>> = OnceLock::new();

fn heuristics() -> Option<&'static Heuristics> {
    HEURISTICS
        .get_or_init(|| {
            let build = || -> Result<Heuristics, regex::Error> {
                Ok(Heuristics {
                    api_path: Regex::new(
                        r"(?i)(?:^|/)(?:routes?|routers?|controllers?|api|handlers?|endpoints?|resolvers?)(?:/|\.|$)|(?:^|/)urls\.py$",
                    )?,
                    frontend_path: Regex::new(
                        r"(?i)(?:^|/)(?:pages?|views?|components?|screens?|layouts?|templates?)/",
                    )?,
                    database_content: Regex::new(
                        r#"(?i)\b(?:mongoose|sequelize|typeorm|prisma|knex|mysql2?|sqlite3|psycopg2?|sqlalchemy|pymongo|MongoClient|gorm|diesel|sqlx|jdbc|ActiveRecord|createPool|redis)\b|require\(\s*['"]pg['"]\s*\)|from\s+['"]pg['"]"#,
                    )?,
                    queue_content: Regex::new(
                        r"(?i)\b(?:amqplib|amqp|rabbitmq|kafkajs|kafka|bullmq|celery|sqs|pika|nats|pubsub|zeromq|sidekiq|lapin)\b",
                    )?,
                    auth_name: Regex::new(r"(?i)(?:auth|login|passport|session|jwt|oauth|token)")?,
                    gateway_name: Regex::new(
                        r"(?i)(?:gateway|proxy|middleware|nginx|kong|envoy|traefik|ingress)",
                    )?,
                    config_path: Regex::new(
                        r"(?i)(?:^|/)(?:config|configs|conf|settings|deploy|deployment|k8s|kubernetes|helm|terraform|infra|\.github/workflows)/",
                    )?,
                    frameworks: FRAMEWORKS
                        .iter()
                        .enumerate()
                        .map(|(i, f)| Regex::new(f.pattern).map(|r| (i, r)))
                        .collect::<Result<_, _>>()?,
                })
            };
            match build() {
                Ok(h) => Some(h),
                Err(e) => {
                    tracing::error!("Invalid extractor heuristic: {}", e);
                    None
                }
            }
        })
        .as_ref()
}

pub fn is_api_path(relative: &str) -> bool {
    heuristics().is_some_and(|h| h.api_path.is_match(relative))
}

pub fn is_frontend_path(relative: &str) -> bool {
    heuristics().is_some_and(|h| h.frontend_path.is_match(relative))
}

pub fn mentions_database(content: &str) -> bool {
    heuristics().is_some_and(|h| h.database_content.is_match(content))
}

pub fn mentions_queue(content: &str) -> bool {
    heuristics().is_some_and(|h| h.queue_content.is_match(content))
}

pub fn is_auth_name(file_name: &str) -> bool {
    heuristics().is_some_and(|h| h.auth_name.is_match(file_name))
}

pub fn is_gateway_name(file_name: &str) -> bool {
    heuristics().is_some_and(|h| h.gateway_name.is_match(file_name))
}

/// Infrastructure manifests, env files, and config-directory files.
pub fn is_config_file(relative: &str, file_name: &str, ext: Option<&str>) -> bool {
    if INFRA_FILE_NAMES.contains(&file_name)
        || file_name.starts_with("Dockerfile")
        || file_name.starts_with("docker-compose")
        || file_name == ".env"
        || file_name.starts_with(".env.")
    {
        return true;
    }
    let Some(ext) = ext else {
        return false;
    };
    if matches!(ext, "tf" | "tfvars" | "hcl" | "env") {
        return true;
    }
    let stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(file_name);
    let config_named = matches!(stem.to_ascii_lowercase().as_str(), "config" | "settings");
    CONFIG_EXTENSIONS.contains(&ext)
        && (config_named || heuristics().is_some_and(|h| h.config_path.is_match(relative)))
}

/// Framework names declared in one manifest file, in table order.
pub fn frameworks_in_manifest(file_name: &str, content: &str) -> Vec<&'static str> {
    let Some(h) = heuristics() else {
        return Vec::new();
    };
    h.frameworks
        .iter()
        .filter(|(i, _)| FRAMEWORKS[*i].manifests.contains(&file_name))
        .filter(|(_, re)| re.is_match(content))
        .map(|(i, _)| FRAMEWORKS[*i].name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristics_compile() {
        assert!(heuristics().is_some());
    }

    #[test]
    fn test_api_paths() {
        assert!(is_api_path("src/routes/users.js"));
        assert!(is_api_path("app/controllers/users_controller.rb"));
        assert!(is_api_path("api/index.ts"));
        assert!(is_api_path("shop/urls.py"));
        assert!(!is_api_path("src/util/rapid.js"));
    }

    #[test]
    fn test_frontend_paths() {
        assert!(is_frontend_path("src/components/Button.tsx"));
        assert!(is_frontend_path("pages/index.vue"));
        assert!(!is_frontend_path("src/componentsLib.ts"));
    }

    #[test]
    fn test_config_files() {
        assert!(is_config_file("Dockerfile", "Dockerfile", None));
        assert!(is_config_file("deploy/Dockerfile.prod", "Dockerfile.prod", Some("prod")));
        assert!(is_config_file(".env", ".env", None));
        assert!(is_config_file("config/settings.json", "settings.json", Some("json")));
        assert!(is_config_file("k8s/deploy.yaml", "deploy.yaml", Some("yaml")));
        assert!(is_config_file("infra/main.tf", "main.tf", Some("tf")));
        assert!(!is_config_file("package.json", "package.json", Some("json")));
        assert!(!is_config_file("src/app.js", "app.js", Some("js")));
    }

    #[test]
    fn test_content_sniffs() {
        assert!(mentions_database("const mongoose = require('mongoose');"));
        assert!(mentions_database("const { Pool } = require('pg');"));
        assert!(!mentions_database("const page = 1;"));
        assert!(mentions_queue("import amqp from 'amqplib';"));
        assert!(!mentions_queue("const queueLength = 3;"));
    }

    #[test]
    fn test_frameworks_in_manifest() {
        let pkg = r#"{"dependencies": {"express": "^4.18.0", "react": "^18.0.0"}}"#;
        assert_eq!(frameworks_in_manifest("package.json", pkg), vec!["Express", "React"]);
        assert_eq!(
            frameworks_in_manifest("requirements.txt", "Flask==3.0\ngunicorn"),
            vec!["Flask"]
        );
        assert!(frameworks_in_manifest("README.md", pkg).is_empty());
    }
}
