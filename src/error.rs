use thiserror::Error;

/// Errors surfaced by the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The OSF API answered with a non-success status.
    #[error("OSF API returned {status} for {url}: {body}")]
    Remote {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    /// Access was denied and no personal access token was supplied.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// The project reference was neither an OSF URL nor a bare project id.
    #[error("not an OSF project URL or id: {0:?}")]
    InvalidProjectRef(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf generation failed: {0}")]
    Pdf(String),

    #[error("qr encoding failed: {0}")]
    Qr(String),

    #[error("zip bundling failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}
