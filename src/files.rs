//! Depth-first walk of a node's storage tree.

use futures::future::BoxFuture;
use tracing::debug;

use crate::api::OsfClient;
use crate::error::ExportError;
use crate::models::FileEntry;

/// Lists every file under the node's storage provider. Folders are
/// entered in listing order and contribute their name to the paths of
/// everything below them.
pub async fn walk_file_tree(
    client: &OsfClient,
    node_id: &str,
    provider: &str,
) -> Result<Vec<FileEntry>, ExportError> {
    let root = client.storage_root_url(node_id, provider);
    let entries = walk_level(client, root, String::new()).await?;
    debug!(
        node_id = %node_id,
        provider = %provider,
        files = entries.len(),
        "[FILES] Storage walk complete"
    );
    Ok(entries)
}

// Async recursion needs the boxed indirection.
fn walk_level<'a>(
    client: &'a OsfClient,
    url: String,
    prefix: String,
) -> BoxFuture<'a, Result<Vec<FileEntry>, ExportError>> {
    Box::pin(async move {
        let mut entries = Vec::new();
        for resource in client.list_folder(&url).await? {
            let full_path = if prefix.is_empty() {
                resource.attributes.name.clone()
            } else {
                format!("{}/{}", prefix, resource.attributes.name)
            };
            match resource.attributes.kind.as_str() {
                "file" => entries.push(FileEntry {
                    path: format!("/{full_path}"),
                    size_bytes: resource.attributes.size,
                    download_url: resource.links.download.unwrap_or_default(),
                }),
                "folder" => {
                    if let Some(contents) = resource.contents_url() {
                        entries
                            .extend(walk_level(client, contents.to_string(), full_path).await?);
                    }
                }
                // Anything else in the listing is not storage content.
                _ => {}
            }
        }
        Ok(entries)
    })
}
