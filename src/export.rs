//! Coordinating module for the fetch-render-write pipeline.

use chrono::{Local, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::api::OsfClient;
use crate::config::{ExportConfig, ProjectSelector, Visibility};
use crate::error::ExportError;
use crate::files::walk_file_tree;
use crate::models::WikiPage;
use crate::pdf::render_document;
use crate::render::{self, Block};

/// What one export run produced.
#[derive(Debug)]
pub struct ExportReport {
    /// The written PDF or zip bundle; `None` for dry runs.
    pub artifact: Option<PathBuf>,
    pub projects: Vec<ProjectReport>,
}

#[derive(Debug)]
pub struct ProjectReport {
    pub project_id: String,
    pub title: String,
    /// Canonical web URL linked on the cover and encoded in the QR codes.
    pub project_url: String,
    pub page_count: usize,
    pub file_count: usize,
    pub component_count: usize,
    /// Sections whose fetch failed and were carried inline instead.
    pub degraded_sections: Vec<String>,
}

/// Entrypoint: export according to config, constructing the API client
/// from the configured environment and token.
pub async fn run_export(config: &ExportConfig) -> Result<ExportReport, ExportError> {
    // A private project can never be fetched anonymously; fail before
    // the first request.
    if config.visibility == Visibility::Private && config.token.is_none() {
        error!("[EXPORT] Private project requested without a token");
        return Err(ExportError::AuthRequired(String::from(
            "private projects require a personal access token",
        )));
    }
    let client = OsfClient::new(config.environment, config.token.clone())?;
    run_export_with_client(config, &client).await
}

/// Same pipeline against a caller-supplied client. Integration tests use
/// this to point the run at a local API double.
pub async fn run_export_with_client(
    config: &ExportConfig,
    client: &OsfClient,
) -> Result<ExportReport, ExportError> {
    info!("[EXPORT] Starting export pipeline");
    config.trace_loaded();
    match &config.selector {
        ProjectSelector::Single(project_id) => export_single(config, client, project_id).await,
        ProjectSelector::AllContributed => export_all(config, client).await,
    }
}

async fn export_single(
    config: &ExportConfig,
    client: &OsfClient,
    project_id: &str,
) -> Result<ExportReport, ExportError> {
    if config.dry_run {
        let metadata = client.fetch_project(project_id).await?;
        info!(
            project_id = %project_id,
            title = %metadata.title,
            "[EXPORT][DRY-RUN] Would export project"
        );
        let project_url = config.environment.project_url(&metadata.id);
        return Ok(ExportReport {
            artifact: None,
            projects: vec![ProjectReport {
                project_id: project_id.to_string(),
                title: metadata.title,
                project_url,
                page_count: 0,
                file_count: 0,
                component_count: 0,
                degraded_sections: Vec::new(),
            }],
        });
    }

    let (bytes, report) = export_project(config, client, project_id).await?;
    let path = match &config.output_file {
        Some(explicit) => explicit.clone(),
        None => config.output_dir.join(default_pdf_name(project_id)),
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "[EXPORT] Wrote PDF");
    Ok(ExportReport {
        artifact: Some(path),
        projects: vec![report],
    })
}

async fn export_all(
    config: &ExportConfig,
    client: &OsfClient,
) -> Result<ExportReport, ExportError> {
    let projects = client.fetch_contributed_projects().await?;
    info!(count = projects.len(), "[EXPORT] Listed contributed projects");

    if config.dry_run {
        for project in &projects {
            info!(
                project_id = %project.id,
                title = %project.title,
                "[EXPORT][DRY-RUN] Would export project"
            );
        }
        return Ok(ExportReport {
            artifact: None,
            projects: projects
                .into_iter()
                .map(|p| {
                    let project_url = config.environment.project_url(&p.id);
                    ProjectReport {
                        project_id: p.id,
                        title: p.title,
                        project_url,
                        page_count: 0,
                        file_count: 0,
                        component_count: 0,
                        degraded_sections: Vec::new(),
                    }
                })
                .collect(),
        });
    }

    // PDFs are staged in a temp dir and bundled once all of them exist.
    let staging = tempfile::tempdir()?;
    let mut reports = Vec::new();
    let mut staged: Vec<(String, PathBuf)> = Vec::new();
    for project in &projects {
        info!(project_id = %project.id, "[EXPORT] Exporting project");
        let (bytes, report) = export_project(config, client, &project.id).await?;
        let file_name = default_pdf_name(&project.id);
        let path = staging.path().join(&file_name);
        fs::write(&path, &bytes)?;
        staged.push((file_name, path));
        reports.push(report);
    }

    fs::create_dir_all(&config.output_dir)?;
    let zip_path = config.output_dir.join(default_zip_name());
    write_zip(&zip_path, &staged)?;
    info!(path = %zip_path.display(), projects = staged.len(), "[EXPORT] Wrote bundle");
    Ok(ExportReport {
        artifact: Some(zip_path),
        projects: reports,
    })
}

/// Fetches everything for one project and renders it into PDF bytes.
/// Metadata, contributors, components and the main file tree are
/// required; wiki and component file trees degrade to inline notices.
pub async fn export_project(
    config: &ExportConfig,
    client: &OsfClient,
    project_id: &str,
) -> Result<(Vec<u8>, ProjectReport), ExportError> {
    info!(project_id = %project_id, "[EXPORT] Fetching project metadata");
    let metadata = client.fetch_project(project_id).await?;
    info!(title = %metadata.title, "[EXPORT] Metadata fetched");
    let contributors = client.fetch_contributors(project_id).await?;
    let components = client.fetch_components(project_id).await?;
    let main_files = walk_file_tree(client, project_id, &config.storage_provider).await?;

    let mut degraded: Vec<String> = Vec::new();
    let wiki = fetch_wiki(client, project_id).await;
    if let Err(e) = &wiki {
        warn!(project_id = %project_id, error = ?e, "[EXPORT] Wiki listing failed; carrying error inline");
        degraded.push("wiki".to_string());
    }

    let exported_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    // The cover and footer link with the id the API reports as canonical,
    // which can differ from the alias the caller passed in.
    let project_url = config.environment.project_url(&metadata.id);

    let mut blocks = Vec::new();
    blocks.extend(render::render_cover(&metadata.title, &project_url));
    blocks.extend(render::render_metadata(&metadata, &exported_at));
    blocks.extend(render::render_contributors(&contributors));
    blocks.push(Block::PageBreak);
    blocks.extend(render::render_file_table(
        &main_files,
        Some("Files in Main Project"),
    ));
    blocks.extend(render::render_wiki(
        wiki.as_ref().map(|pages| pages.as_slice()),
    ));

    blocks.push(render::render_components_heading());
    for component in &components {
        let fallback = config.environment.project_url(&component.id);
        blocks.extend(render::render_component_intro(component, &fallback));
        match walk_file_tree(client, &component.id, &config.storage_provider).await {
            Ok(files) => blocks.extend(render::render_file_table(&files, None)),
            Err(e) => {
                warn!(
                    component_id = %component.id,
                    error = ?e,
                    "[EXPORT] Component file walk failed; carrying error inline"
                );
                degraded.push(format!("files:{}", component.id));
                blocks.extend(render::render_section_error("files", &e));
            }
        }
    }

    info!(blocks = blocks.len(), "[EXPORT] Rendering PDF");
    let (bytes, page_count) =
        render_document(&metadata.title, &blocks, &exported_at, &project_url)?;
    info!(pages = page_count, bytes = bytes.len(), "[EXPORT] PDF rendered");
    let report = ProjectReport {
        project_id: project_id.to_string(),
        title: metadata.title,
        project_url,
        page_count,
        file_count: main_files.len(),
        component_count: components.len(),
        degraded_sections: degraded,
    };
    Ok((bytes, report))
}

async fn fetch_wiki(
    client: &OsfClient,
    project_id: &str,
) -> Result<Vec<WikiPage>, ExportError> {
    let index = client.fetch_wiki_index(project_id).await?;
    let mut pages = Vec::new();
    for resource in index {
        let name = resource
            .attributes
            .name
            .clone()
            .unwrap_or_else(|| "Untitled".to_string());
        let content = match client.fetch_wiki_content(&resource.id).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(wiki_id = %resource.id, error = ?e, "[EXPORT] Wiki content fetch failed");
                None
            }
        };
        pages.push(WikiPage {
            id: resource.id,
            name,
            content,
        });
    }
    Ok(pages)
}

fn default_pdf_name(project_id: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("OSF_Project_{project_id}_exported_{timestamp}.pdf")
}

fn default_zip_name() -> String {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("OSF_Projects_exported_{timestamp}.zip")
}

fn write_zip(zip_path: &Path, files: &[(String, PathBuf)]) -> Result<(), ExportError> {
    let file = fs::File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, path) in files {
        zip.start_file(name.as_str(), options)?;
        let content = fs::read(path)?;
        zip.write_all(&content)?;
    }
    zip.finish()?;
    Ok(())
}
