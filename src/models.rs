//! Wire types for the OSF v2 JSON API and the plain records the rest of
//! the pipeline works with.

use serde::Deserialize;

// --- JSON:API envelopes ---

/// A single-resource response: `{"data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: T,
}

/// A list response: `{"data": [...], "links": {"next": ...}}`.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageLinks {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceLinks {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub download: Option<String>,
}

// --- Node (project/component) resources ---

#[derive(Debug, Deserialize)]
pub struct NodeResource {
    pub id: String,
    pub attributes: NodeAttributes,
    #[serde(default)]
    pub embeds: Option<NodeEmbeds>,
    #[serde(default)]
    pub links: ResourceLinks,
}

#[derive(Debug, Deserialize)]
pub struct NodeAttributes {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub registration: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub current_user_permissions: Vec<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NodeEmbeds {
    #[serde(default)]
    pub affiliated_institutions: Option<Page<InstitutionResource>>,
}

#[derive(Debug, Deserialize)]
pub struct InstitutionResource {
    pub attributes: InstitutionAttributes,
}

#[derive(Debug, Deserialize)]
pub struct InstitutionAttributes {
    pub name: String,
}

// --- Contributor resources ---

#[derive(Debug, Deserialize)]
pub struct ContributorResource {
    pub attributes: ContributorAttributes,
    #[serde(default)]
    pub embeds: Option<ContributorEmbeds>,
}

#[derive(Debug, Deserialize)]
pub struct ContributorAttributes {
    #[serde(default)]
    pub bibliographic: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ContributorEmbeds {
    #[serde(default)]
    pub users: Option<Document<UserResource>>,
}

#[derive(Debug, Deserialize)]
pub struct UserResource {
    pub attributes: UserAttributes,
}

#[derive(Debug, Deserialize)]
pub struct UserAttributes {
    #[serde(default)]
    pub full_name: Option<String>,
    // Only present for token-scoped responses; the public API omits it.
    #[serde(default)]
    pub email: Option<String>,
}

// --- Storage (file/folder) resources ---

#[derive(Debug, Deserialize)]
pub struct FileResource {
    pub attributes: FileAttributes,
    #[serde(default)]
    pub links: ResourceLinks,
    #[serde(default)]
    pub relationships: Option<FileRelationships>,
}

#[derive(Debug, Deserialize)]
pub struct FileAttributes {
    pub name: String,
    /// "file" or "folder".
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct FileRelationships {
    #[serde(default)]
    pub files: Option<RelatedFiles>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedFiles {
    pub links: RelatedLinks,
}

#[derive(Debug, Deserialize)]
pub struct RelatedLinks {
    pub related: RelatedHref,
}

#[derive(Debug, Deserialize)]
pub struct RelatedHref {
    pub href: String,
}

impl FileResource {
    /// The listing URL of a folder's own contents, if the API provided one.
    pub fn contents_url(&self) -> Option<&str> {
        self.relationships
            .as_ref()
            .and_then(|r| r.files.as_ref())
            .map(|f| f.links.related.href.as_str())
    }
}

// --- Wiki resources ---

#[derive(Debug, Deserialize)]
pub struct WikiResource {
    pub id: String,
    pub attributes: WikiAttributes,
}

#[derive(Debug, Deserialize)]
pub struct WikiAttributes {
    #[serde(default)]
    pub name: Option<String>,
}

// --- Domain records ---

/// A project's descriptive fields as fetched, before any formatting.
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub public: Option<bool>,
    pub registration: Option<bool>,
    pub tags: Vec<String>,
    pub current_user_permissions: Vec<String>,
    pub doi: Option<String>,
    pub affiliated_institutions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Contributor {
    pub name: Option<String>,
    pub bibliographic: Option<bool>,
    pub email: Option<String>,
}

/// One file found by the storage walk. `path` always starts with "/" and
/// joins folder names with "/".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub size_bytes: Option<u64>,
    pub download_url: String,
}

/// A child node of the exported project.
#[derive(Debug, Clone)]
pub struct Component {
    pub id: String,
    pub title: String,
    pub html_url: Option<String>,
}

/// A wiki page with its raw markdown body. `content` is `None` when the
/// body could not be fetched.
#[derive(Debug, Clone)]
pub struct WikiPage {
    pub id: String,
    pub name: String,
    pub content: Option<String>,
}

impl NodeResource {
    pub fn into_metadata(self) -> ProjectMetadata {
        let affiliated_institutions = self
            .embeds
            .and_then(|e| e.affiliated_institutions)
            .map(|page| {
                page.data
                    .into_iter()
                    .map(|i| i.attributes.name)
                    .collect()
            })
            .unwrap_or_default();
        ProjectMetadata {
            id: self.id,
            title: self.attributes.title,
            description: self.attributes.description,
            category: self.attributes.category,
            date_created: self.attributes.date_created,
            date_modified: self.attributes.date_modified,
            public: self.attributes.public,
            registration: self.attributes.registration,
            tags: self.attributes.tags,
            current_user_permissions: self.attributes.current_user_permissions,
            doi: self.attributes.doi,
            affiliated_institutions,
        }
    }

    pub fn into_component(self) -> Component {
        Component {
            id: self.id,
            title: self.attributes.title,
            html_url: self.links.html,
        }
    }
}

impl ContributorResource {
    pub fn into_contributor(self) -> Contributor {
        let user = self
            .embeds
            .and_then(|e| e.users)
            .map(|doc| doc.data.attributes);
        Contributor {
            name: user.as_ref().and_then(|u| u.full_name.clone()),
            bibliographic: self.attributes.bibliographic,
            email: user.and_then(|u| u.email),
        }
    }
}
