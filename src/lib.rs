pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod files;
pub mod load_config;
pub mod models;
pub mod pdf;
pub mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use config::{Environment, ExportConfig, ProjectSelector, Visibility};
use load_config::{load_file_config, resolve_token, FileConfig};

#[derive(Parser)]
#[clap(
    name = "osf-export",
    version,
    about = "Export OSF projects (metadata, contributors, files, wikis, components) to PDF"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
    /// Raise log verbosity (-v debug, -vv trace)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export one project to a PDF document
    Export {
        /// Project URL ("https://osf.io/abcde/") or bare id ("abcde")
        project: String,
        /// OSF deployment: "production" or "test"
        #[clap(long, short = 'e')]
        environment: Option<String>,
        /// Declared visibility: "public" or "private"
        #[clap(long)]
        visibility: Option<String>,
        /// Personal access token; falls back to the OSF_TOKEN env var
        #[clap(long)]
        token: Option<String>,
        /// Exact output path, overriding the timestamped default name
        #[clap(long)]
        output: Option<PathBuf>,
        /// Directory for timestamped output files
        #[clap(long)]
        output_dir: Option<PathBuf>,
        /// Storage provider to walk
        #[clap(long)]
        provider: Option<String>,
        /// Resolve and report without writing anything
        #[clap(long)]
        dry_run: bool,
        /// Path to a YAML defaults file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Export every contributed project into a zip of PDFs
    ExportAll {
        /// OSF deployment: "production" or "test"
        #[clap(long, short = 'e')]
        environment: Option<String>,
        /// Personal access token; falls back to the OSF_TOKEN env var
        #[clap(long)]
        token: Option<String>,
        /// Directory for the zip bundle
        #[clap(long)]
        output_dir: Option<PathBuf>,
        /// Storage provider to walk
        #[clap(long)]
        provider: Option<String>,
        /// Resolve and report without writing anything
        #[clap(long)]
        dry_run: bool,
        /// Path to a YAML defaults file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let result = match cli.command {
        Commands::Export {
            project,
            environment,
            visibility,
            token,
            output,
            output_dir,
            provider,
            dry_run,
            config,
        } => {
            let file_conf = match &config {
                Some(path) => load_file_config(path)?,
                None => FileConfig::default(),
            };
            let project_id = config::parse_project_ref(&project)?;
            let export_config = ExportConfig {
                selector: ProjectSelector::Single(project_id),
                environment: resolve_environment(environment.as_deref(), &file_conf)?,
                visibility: resolve_visibility(visibility.as_deref())?,
                token: resolve_token(token),
                storage_provider: resolve_provider(provider, &file_conf),
                output_dir: resolve_output_dir(output_dir, &file_conf),
                output_file: output,
                dry_run,
            };
            execute(&export_config).await
        }
        Commands::ExportAll {
            environment,
            token,
            output_dir,
            provider,
            dry_run,
            config,
        } => {
            let file_conf = match &config {
                Some(path) => load_file_config(path)?,
                None => FileConfig::default(),
            };
            let export_config = ExportConfig {
                selector: ProjectSelector::AllContributed,
                environment: resolve_environment(environment.as_deref(), &file_conf)?,
                // Listing contributed projects is always an authenticated call.
                visibility: Visibility::Private,
                token: resolve_token(token),
                storage_provider: resolve_provider(provider, &file_conf),
                output_dir: resolve_output_dir(output_dir, &file_conf),
                output_file: None,
                dry_run,
            };
            execute(&export_config).await
        }
    };

    let exit_span = tracing::info_span!("exit");
    exit_span.in_scope(|| {
        tracing::info!("emitting exit for structured tracing");
    });

    result
}

async fn execute(config: &ExportConfig) -> Result<()> {
    println!("Export starting...");
    match export::run_export(config).await {
        Ok(report) => {
            println!("Export complete.\nReport:");
            println!("{report:#?}");
            Ok(())
        }
        Err(e) => {
            eprintln!("[ERROR] Export failed: {e}");
            Err(e.into())
        }
    }
}

fn resolve_environment(flag: Option<&str>, file_conf: &FileConfig) -> Result<Environment> {
    match flag {
        Some(name) => match Environment::from_name(name) {
            Some(env) => Ok(env),
            None => {
                tracing::error!(environment = %name, "Unsupported environment");
                anyhow::bail!("Unsupported environment: {name} (expected production or test)")
            }
        },
        None => Ok(file_conf.environment.unwrap_or(Environment::Production)),
    }
}

fn resolve_visibility(flag: Option<&str>) -> Result<Visibility> {
    match flag {
        Some(name) => match Visibility::from_name(name) {
            Some(v) => Ok(v),
            None => {
                tracing::error!(visibility = %name, "Unsupported visibility");
                anyhow::bail!("Unsupported visibility: {name} (expected public or private)")
            }
        },
        None => Ok(Visibility::Public),
    }
}

fn resolve_provider(flag: Option<String>, file_conf: &FileConfig) -> String {
    flag.or_else(|| file_conf.storage_provider.clone())
        .unwrap_or_else(|| "osfstorage".to_string())
}

fn resolve_output_dir(flag: Option<PathBuf>, file_conf: &FileConfig) -> PathBuf {
    flag.or_else(|| file_conf.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("exported_pdfs"))
}
