use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::error::ExportError;

/// Which OSF deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Test,
}

impl Environment {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "production" => Some(Environment::Production),
            "test" => Some(Environment::Test),
            _ => None,
        }
    }

    /// Root of the JSON API, without a trailing slash.
    pub fn api_base(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.osf.io/v2",
            Environment::Test => "https://api.test.osf.io/v2",
        }
    }

    pub fn web_base(&self) -> &'static str {
        match self {
            Environment::Production => "https://osf.io",
            Environment::Test => "https://test.osf.io",
        }
    }

    /// Canonical browser URL for a project; rendered on the cover and
    /// encoded into the QR codes.
    pub fn project_url(&self, project_id: &str) -> String {
        format!("{}/{}/", self.web_base(), project_id)
    }
}

/// Declared visibility of the project being exported. Private projects
/// require a token before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Which projects an export run covers.
#[derive(Debug, Clone)]
pub enum ProjectSelector {
    /// A single project by id.
    Single(String),
    /// Every project the token's owner contributes to.
    AllContributed,
}

/// Fully merged settings for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub selector: ProjectSelector,
    pub environment: Environment,
    pub visibility: Visibility,
    pub token: Option<String>,
    pub storage_provider: String,
    pub output_dir: PathBuf,
    /// Overrides the timestamped default file name. Single exports only.
    pub output_file: Option<PathBuf>,
    pub dry_run: bool,
}

impl ExportConfig {
    pub fn trace_loaded(&self) {
        info!(
            selector = ?self.selector,
            environment = ?self.environment,
            visibility = ?self.visibility,
            token_present = self.token.is_some(),
            storage_provider = %self.storage_provider,
            output_dir = %self.output_dir.display(),
            dry_run = self.dry_run,
            "Loaded ExportConfig"
        );
    }
}

/// Accepts a full OSF URL ("https://osf.io/kzc68/") or a bare id ("kzc68")
/// and returns the project id.
pub fn parse_project_ref(raw: &str) -> Result<String, ExportError> {
    let candidate = raw.trim();
    let url_re = Regex::new(r"^https?://(?:[\w-]+\.)*osf\.io/([A-Za-z0-9]+)/?$").unwrap();
    if let Some(caps) = url_re.captures(candidate) {
        return Ok(caps[1].to_string());
    }
    let id_re = Regex::new(r"^[A-Za-z0-9]+$").unwrap();
    if id_re.is_match(candidate) {
        return Ok(candidate.to_string());
    }
    Err(ExportError::InvalidProjectRef(raw.to_string()))
}
