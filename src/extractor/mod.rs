//! Architecture Extractor
//!
//! Classifies retained files into coarse component categories, then derives
//! data flows from a fixed rule table and groups components into trust
//! boundaries. The result is a signal for threat synthesis, not a verified
//! architecture diagram.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::collector::{SourceFile, SourceSet};
use crate::config::Limits;
use crate::model::{AnalysisResult, Component, ComponentType, DataFlow, Finding, TrustBoundary, END_USER};

pub mod signatures;

use signatures::*;

/// Most file paths attached to a single component.
const MAX_COMPONENT_FILES: usize = 50;

pub const INTERNAL_BOUNDARY: &str = "Internal Network";
pub const EXTERNAL_BOUNDARY: &str = "External / Internet";
pub const INFRA_BOUNDARY: &str = "Infrastructure";

/// Component categories, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Frontend,
    Gateway,
    Api,
    Auth,
    Database,
    Queue,
    Config,
}

impl Category {
    pub fn component_name(&self) -> &'static str {
        match self {
            Category::Frontend => "Frontend",
            Category::Gateway => "API Gateway",
            Category::Api => "API Server",
            Category::Auth => "Auth Service",
            Category::Database => "Database",
            Category::Queue => "Message Queue",
            Category::Config => "Configuration",
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Category::Frontend => ComponentType::Frontend,
            Category::Gateway => ComponentType::Gateway,
            Category::Api => ComponentType::Api,
            Category::Auth => ComponentType::Service,
            Category::Database => ComponentType::Database,
            Category::Queue => ComponentType::Queue,
            Category::Config => ComponentType::Config,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Category::Frontend => "User-facing pages, views and UI components",
            Category::Gateway => "Gateway, proxy and middleware layer in front of the API",
            Category::Api => "HTTP routes, controllers and request handlers",
            Category::Auth => "Authentication and session handling",
            Category::Database => "Persistent data store accessed through a database driver",
            Category::Queue => "Message broker or background job queue",
            Category::Config => "Infrastructure manifests and environment configuration",
        }
    }
}

pub const FALLBACK_SERVICE: &str = "Application Service";

/// Files grouped by category, built one file at a time.
#[derive(Debug, Default)]
pub struct Classification {
    pub categories: BTreeMap<Category, Vec<String>>,
    pub source_files: Vec<String>,
    language_counts: BTreeMap<&'static str, usize>,
    frameworks: BTreeSet<usize>,
    entry_points: BTreeSet<String>,
}

impl Classification {
    fn add(&mut self, category: Category, relative: &str) {
        self.categories
            .entry(category)
            .or_default()
            .push(relative.to_string());
    }

    /// Classify one file. `content` is `None` when the file could not be read.
    pub fn observe(&mut self, file: &SourceFile, content: Option<&str>) {
        let relative = file.relative.as_str();
        let name = file.file_name();
        let ext = file.extension();
        let ext = ext.as_deref();
        let language = ext.and_then(language_for);

        if let Some(lang) = language {
            *self.language_counts.entry(lang).or_default() += 1;
            self.source_files.push(relative.to_string());
        }
        let is_source = language.is_some();
        let is_document = ext.is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e));
        let stem = name.split('.').next().unwrap_or(name).to_ascii_lowercase();

        if is_source && is_api_path(relative) {
            self.add(Category::Api, relative);
            self.entry_points.insert(relative.to_string());
        }
        if ext.is_some_and(|e| FRONTEND_EXTENSIONS.contains(&e)) && is_frontend_path(relative) {
            self.add(Category::Frontend, relative);
        }
        if is_source && is_auth_name(&stem) {
            self.add(Category::Auth, relative);
        }
        if is_gateway_name(name) && (is_source || ext.is_some_and(|e| CONFIG_EXTENSIONS.contains(&e))) {
            self.add(Category::Gateway, relative);
        }
        if is_config_file(relative, name, ext) {
            self.add(Category::Config, relative);
        }
        if is_source && ENTRY_STEMS.contains(&stem.as_str()) {
            self.entry_points.insert(relative.to_string());
        }

        if let Some(text) = content {
            if is_source || is_document {
                if mentions_database(text) {
                    self.add(Category::Database, relative);
                }
                if mentions_queue(text) {
                    self.add(Category::Queue, relative);
                }
            }
            for fw in frameworks_in_manifest(name, text) {
                if let Some(i) = FRAMEWORKS.iter().position(|f| f.name == fw) {
                    self.frameworks.insert(i);
                }
            }
        }
    }

    /// Languages by file count descending, then name.
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<(&str, usize)> = self
            .language_counts
            .iter()
            .map(|(l, c)| (*l, *c))
            .collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        langs.into_iter().map(|(l, _)| l.to_string()).collect()
    }

    pub fn frameworks(&self) -> Vec<String> {
        self.frameworks
            .iter()
            .map(|i| FRAMEWORKS[*i].name.to_string())
            .collect()
    }

    /// One component per matched category, or the fallback service, plus End User.
    pub fn components(&self) -> Vec<Component> {
        let mut components: Vec<Component> = self
            .categories
            .iter()
            .map(|(cat, files)| {
                let mut files = files.clone();
                files.truncate(MAX_COMPONENT_FILES);
                Component::new(cat.component_name(), cat.component_type())
                    .with_files(files)
                    .with_description(cat.description())
            })
            .collect();

        if components.is_empty() {
            let mut files = self.source_files.clone();
            files.truncate(MAX_COMPONENT_FILES);
            components.push(
                Component::new(FALLBACK_SERVICE, ComponentType::Service)
                    .with_files(files)
                    .with_description("Application code with no recognizable architectural layer"),
            );
        }

        components.push(
            Component::new(END_USER, ComponentType::External)
                .with_description("Users and clients reaching the system from outside"),
        );
        components
    }
}

/// Fixed precedence rule table, evaluated once.
pub fn infer_flows(components: &[Component]) -> Vec<DataFlow> {
    let has = |name: &str| components.iter().any(|c| c.name == name);
    let frontend = Category::Frontend.component_name();
    let gateway = Category::Gateway.component_name();
    let api = Category::Api.component_name();
    let auth = Category::Auth.component_name();
    let database = Category::Database.component_name();
    let queue = Category::Queue.component_name();

    let mut flows = Vec::new();

    if has(frontend) && has(api) {
        flows.push(DataFlow::new(frontend, api, Some("HTTPS"), "API requests"));
    } else if has(gateway) {
        flows.push(DataFlow::new(END_USER, gateway, Some("HTTPS"), "User requests"));
    } else if has(api) {
        flows.push(DataFlow::new(END_USER, api, Some("HTTPS"), "User requests"));
    } else if has(FALLBACK_SERVICE) {
        flows.push(DataFlow::new(END_USER, FALLBACK_SERVICE, Some("HTTPS"), "User requests"));
    }
    if has(gateway) && has(api) {
        flows.push(DataFlow::new(gateway, api, Some("HTTP"), "Proxied requests"));
    }
    if has(api) && has(auth) {
        flows.push(DataFlow::new(api, auth, None, "Credentials and tokens"));
    }
    if has(api) && has(database) {
        flows.push(DataFlow::new(api, database, Some("TCP"), "Queries"));
    }
    if has(auth) && has(database) {
        flows.push(DataFlow::new(auth, database, Some("TCP"), "User records"));
    }
    if has(api) && has(queue) {
        flows.push(DataFlow::new(api, queue, Some("AMQP"), "Messages"));
    }
    flows
}

/// Internal, external and (with a config component) infrastructure boundaries.
pub fn trust_boundaries(components: &[Component]) -> Vec<TrustBoundary> {
    let internal: Vec<String> = components
        .iter()
        .filter(|c| c.component_type != ComponentType::External)
        .map(|c| c.name.clone())
        .collect();
    let external: Vec<String> = components
        .iter()
        .filter(|c| c.component_type == ComponentType::External)
        .map(|c| c.name.clone())
        .collect();

    let mut boundaries = vec![
        TrustBoundary {
            name: INTERNAL_BOUNDARY.to_string(),
            components: internal,
        },
        TrustBoundary {
            name: EXTERNAL_BOUNDARY.to_string(),
            components: external,
        },
    ];

    let infra: Vec<String> = components
        .iter()
        .filter(|c| c.component_type == ComponentType::Config)
        .map(|c| c.name.clone())
        .collect();
    if !infra.is_empty() {
        boundaries.push(TrustBoundary {
            name: INFRA_BOUNDARY.to_string(),
            components: infra,
        });
    }
    boundaries
}

/// Build the full [`AnalysisResult`] for a collected source set.
pub fn extract(sources: &SourceSet, findings: Vec<Finding>, limits: &Limits) -> AnalysisResult {
    let mut classification = Classification::default();
    for file in &sources.files {
        let content = match file.read() {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("Classifying {} by path only: {}", file.relative, e);
                None
            }
        };
        classification.observe(file, content.as_deref());
    }

    let components = classification.components();
    let data_flows = infer_flows(&components);
    let trust_boundaries = trust_boundaries(&components);

    let mut entry_points: Vec<String> = classification.entry_points.iter().cloned().collect();
    entry_points.truncate(limits.entry_points_cap);

    let mut file_tree = sources.relative_paths();
    file_tree.truncate(limits.file_tree_cap);

    debug!(
        "Extracted {} components, {} flows",
        components.len(),
        data_flows.len()
    );

    AnalysisResult {
        languages: classification.languages(),
        frameworks: classification.frameworks(),
        components,
        data_flows,
        trust_boundaries,
        security_findings: findings,
        file_tree,
        entry_points,
        truncated: sources.truncated,
    }
}

/// Keyword sniffs for design documents, which have no meaningful file paths.
pub fn extract_document(name: &str, text: &str, findings: Vec<Finding>) -> AnalysisResult {
    let lower = text.to_ascii_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let mut classification = Classification::default();
    if mentions(&["frontend", "front-end", "web app", "single-page", "browser", "mobile app"]) {
        classification.add(Category::Frontend, name);
    }
    if mentions(&["gateway", "reverse proxy", "load balancer", "nginx"]) {
        classification.add(Category::Gateway, name);
    }
    if mentions(&[" api", "endpoint", "rest", "graphql", "grpc"]) {
        classification.add(Category::Api, name);
    }
    if mentions(&["authentication", "login", "oauth", "sso", "jwt", "session"]) {
        classification.add(Category::Auth, name);
    }
    if mentions(&["database", "postgres", "mysql", "mongodb", "sql"]) || mentions_database(text) {
        classification.add(Category::Database, name);
    }
    if mentions(&["queue", "kafka", "rabbitmq", "message broker", "pub/sub"]) || mentions_queue(text) {
        classification.add(Category::Queue, name);
    }
    if mentions(&["docker", "kubernetes", "terraform", "helm"]) {
        classification.add(Category::Config, name);
    }

    let components = classification.components();
    AnalysisResult {
        languages: Vec::new(),
        frameworks: Vec::new(),
        data_flows: infer_flows(&components),
        trust_boundaries: trust_boundaries(&components),
        components,
        security_findings: findings,
        file_tree: vec![name.to_string()],
        entry_points: Vec::new(),
        truncated: false,
    }
}
