use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::Environment;

/// Defaults read from an optional YAML file. Every field can be
/// overridden on the command line.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub storage_provider: Option<String>,
}

/// Loads the YAML defaults file. The file holds no secrets; the access
/// token only ever comes from the command line or the environment.
pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let file_conf: FileConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(file_conf)
}

/// Resolves the access token. An explicit flag wins; otherwise the
/// OSF_TOKEN environment variable is consulted. A missing token is not
/// an error here since public exports do not need one.
pub fn resolve_token(flag: Option<String>) -> Option<String> {
    if flag.is_some() {
        info!("Using token passed on the command line");
        return flag;
    }
    match std::env::var("OSF_TOKEN") {
        Ok(token) if !token.trim().is_empty() => {
            info!("OSF_TOKEN found in env");
            Some(token)
        }
        _ => None,
    }
}
