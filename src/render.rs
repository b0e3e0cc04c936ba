//! Section renderers: pure transforms from fetched records to the block
//! list the PDF writer lays out. Every user-visible string of the
//! document body lives here.

use crate::error::ExportError;
use crate::models::{Component, Contributor, FileEntry, ProjectMetadata, WikiPage};

pub const NO_DESCRIPTION: &str = "No description provided";
pub const WIKI_CONTENT_UNAVAILABLE: &str = "No content returned or unauthorized access";
const NOT_AVAILABLE: &str = "N/A";

/// One layout element of the document body.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading1(String),
    Heading2(String),
    Heading3(String),
    /// Body line with a bold lead-in label.
    Labelled { label: String, value: String },
    Text(String),
    /// Body line whose URL doubles as the link target.
    LinkLine { label: String, url: String },
    Table(TableBlock),
    /// QR image pointing at `url`, square, sized in inches.
    QrImage { url: String, side_inches: f32 },
    Spacer,
    PageBreak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Column widths in inches.
    pub col_widths: Vec<f32>,
    pub header_font_size: f32,
    pub body_font_size: f32,
}

/// Cover lines: project title, canonical URL and the QR pointing at it.
pub fn render_cover(title: &str, project_url: &str) -> Vec<Block> {
    vec![
        Block::Heading1(title.to_string()),
        Block::LinkLine {
            label: "Project URL".to_string(),
            url: project_url.to_string(),
        },
        Block::QrImage {
            url: project_url.to_string(),
            side_inches: 1.5,
        },
        Block::Spacer,
    ]
}

/// The "1. Project Metadata" section. `exported_at` is the run timestamp
/// shown in the document.
pub fn render_metadata(metadata: &ProjectMetadata, exported_at: &str) -> Vec<Block> {
    let mut blocks = vec![Block::Heading2("1. Project Metadata".to_string())];
    let description = metadata
        .description
        .clone()
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());
    let fields = [
        ("Title", metadata.title.clone()),
        ("Description", description),
        ("Date Created", date_only(&metadata.date_created)),
        ("Last Modified", date_only(&metadata.date_modified)),
        ("Category", or_na(&metadata.category)),
        ("Public?", yes_no(metadata.public).to_string()),
        ("Registration?", yes_no(metadata.registration).to_string()),
        ("Tags", join_or_na(&metadata.tags)),
        (
            "Current Permissions",
            join_or_na(&metadata.current_user_permissions),
        ),
        ("DOI", or_na(&metadata.doi)),
        ("Exported At", exported_at.to_string()),
    ];
    for (label, value) in fields {
        blocks.push(Block::Labelled {
            label: label.to_string(),
            value,
        });
    }
    let institutions = if metadata.affiliated_institutions.is_empty() {
        "None listed".to_string()
    } else {
        metadata.affiliated_institutions.join(", ")
    };
    blocks.push(Block::Labelled {
        label: "Affiliated Institution(s)".to_string(),
        value: institutions,
    });
    blocks.push(Block::Spacer);
    blocks
}

/// The "2. Contributors" section.
pub fn render_contributors(contributors: &[Contributor]) -> Vec<Block> {
    let mut blocks = vec![Block::Heading2("2. Contributors".to_string())];
    if contributors.is_empty() {
        blocks.push(Block::Text("No contributors found.".to_string()));
        return blocks;
    }
    let rows = contributors
        .iter()
        .map(|c| {
            vec![
                or_na(&c.name),
                yes_no(c.bibliographic).to_string(),
                or_na(&c.email),
            ]
        })
        .collect();
    blocks.push(Block::Table(TableBlock {
        headers: vec![
            "Name".to_string(),
            "Bibliographic?".to_string(),
            "Email (if available)".to_string(),
        ],
        rows,
        col_widths: vec![2.5, 1.0, 2.5],
        header_font_size: 10.0,
        body_font_size: 10.0,
    }));
    blocks.push(Block::Spacer);
    blocks
}

/// File table for one node. `extra_heading` is only set for the main
/// project, which gets its own title above the shared section heading.
pub fn render_file_table(files: &[FileEntry], extra_heading: Option<&str>) -> Vec<Block> {
    let mut blocks = Vec::new();
    if let Some(heading) = extra_heading {
        blocks.push(Block::Heading2(heading.to_string()));
    }
    if files.is_empty() {
        blocks.push(Block::Text("3. No files available.".to_string()));
        return blocks;
    }
    blocks.push(Block::Heading2("3. Files OSF Storage".to_string()));
    let rows = files
        .iter()
        .map(|f| {
            vec![
                f.path.clone(),
                size_mb(f.size_bytes),
                f.download_url.clone(),
            ]
        })
        .collect();
    blocks.push(Block::Table(TableBlock {
        headers: vec![
            "File Name".to_string(),
            "Size \n(MB)".to_string(),
            "Download Link".to_string(),
        ],
        rows,
        col_widths: vec![4.0, 0.5, 2.8],
        header_font_size: 12.0,
        body_font_size: 8.0,
    }));
    blocks.push(Block::Spacer);
    blocks
}

/// The "4. Wiki" section. A page without content renders the unavailable
/// notice; a failed page listing keeps the heading and carries the error
/// inline.
pub fn render_wiki(outcome: Result<&[WikiPage], &ExportError>) -> Vec<Block> {
    let mut blocks = vec![Block::Heading2("4. Wiki".to_string())];
    match outcome {
        Ok(pages) if pages.is_empty() => {
            blocks.push(Block::Text("No wiki pages found.".to_string()));
        }
        Ok(pages) => {
            for page in pages {
                blocks.push(Block::Heading3(page.name.clone()));
                match &page.content {
                    Some(content) if !content.is_empty() => {
                        blocks.push(Block::Text(content.clone()));
                    }
                    _ => blocks.push(Block::Text(WIKI_CONTENT_UNAVAILABLE.to_string())),
                }
                blocks.push(Block::Spacer);
            }
        }
        Err(e) => blocks.extend(render_section_error("wiki", e)),
    }
    blocks
}

pub fn render_components_heading() -> Block {
    Block::Heading2("5. Components and Their Files".to_string())
}

/// Title and link line introducing one component; its file table follows.
pub fn render_component_intro(component: &Component, fallback_url: &str) -> Vec<Block> {
    let url = component
        .html_url
        .clone()
        .unwrap_or_else(|| fallback_url.to_string());
    vec![
        Block::Heading3(component.title.clone()),
        Block::LinkLine {
            label: "Component URL".to_string(),
            url,
        },
    ]
}

/// Inline diagnostic for a section whose fetch failed. The export keeps
/// going; the failure is carried in the document body.
pub fn render_section_error(what: &str, error: &impl std::fmt::Display) -> Vec<Block> {
    vec![
        Block::Heading3("Error".to_string()),
        Block::Text(format!("Could not fetch {what}: {error}")),
    ]
}

fn or_na(value: &Option<String>) -> String {
    value
        .clone()
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn date_only(value: &Option<String>) -> String {
    or_na(value).chars().take(10).collect()
}

fn yes_no(value: Option<bool>) -> &'static str {
    if value.unwrap_or(false) {
        "Yes"
    } else {
        "No"
    }
}

fn join_or_na(items: &[String]) -> String {
    if items.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        items.join(", ")
    }
}

/// Bytes to MB, rounded to two decimals. Sizes that round to zero
/// (unknown, empty, or under half a hundredth of a MB) render "N/A".
fn size_mb(size_bytes: Option<u64>) -> String {
    let bytes = size_bytes.unwrap_or(0);
    let rounded = (bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0;
    if rounded == 0.0 {
        NOT_AVAILABLE.to_string()
    } else {
        format!("{rounded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_metadata() -> ProjectMetadata {
        ProjectMetadata {
            id: "abc12".to_string(),
            title: "Bare Project".to_string(),
            description: None,
            category: None,
            date_created: None,
            date_modified: None,
            public: None,
            registration: None,
            tags: vec![],
            current_user_permissions: vec![],
            doi: None,
            affiliated_institutions: vec![],
        }
    }

    fn labelled_value<'a>(blocks: &'a [Block], wanted: &str) -> &'a str {
        blocks
            .iter()
            .find_map(|b| match b {
                Block::Labelled { label, value } if label == wanted => Some(value.as_str()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn metadata_fields_keep_their_order() {
        let blocks = render_metadata(&sparse_metadata(), "2025-01-01 00:00:00 UTC");
        let labels: Vec<&str> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Labelled { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                "Title",
                "Description",
                "Date Created",
                "Last Modified",
                "Category",
                "Public?",
                "Registration?",
                "Tags",
                "Current Permissions",
                "DOI",
                "Exported At",
                "Affiliated Institution(s)",
            ]
        );
        assert_eq!(blocks[0], Block::Heading2("1. Project Metadata".to_string()));
    }

    #[test]
    fn missing_metadata_fields_fall_back() {
        let blocks = render_metadata(&sparse_metadata(), "ts");
        assert_eq!(labelled_value(&blocks, "Description"), NO_DESCRIPTION);
        assert_eq!(labelled_value(&blocks, "Date Created"), "N/A");
        assert_eq!(labelled_value(&blocks, "Category"), "N/A");
        assert_eq!(labelled_value(&blocks, "Public?"), "No");
        assert_eq!(labelled_value(&blocks, "Registration?"), "No");
        assert_eq!(labelled_value(&blocks, "Tags"), "N/A");
        assert_eq!(labelled_value(&blocks, "DOI"), "N/A");
        assert_eq!(
            labelled_value(&blocks, "Affiliated Institution(s)"),
            "None listed"
        );
    }

    #[test]
    fn dates_are_truncated_and_lists_joined() {
        let mut metadata = sparse_metadata();
        metadata.description = Some("A study.".to_string());
        metadata.date_created = Some("2023-04-01T12:30:00.000000".to_string());
        metadata.public = Some(true);
        metadata.registration = Some(true);
        metadata.tags = vec!["meta".to_string(), "open-science".to_string()];
        metadata.affiliated_institutions = vec!["UoM".to_string(), "CoS".to_string()];
        let blocks = render_metadata(&metadata, "ts");
        assert_eq!(labelled_value(&blocks, "Date Created"), "2023-04-01");
        assert_eq!(labelled_value(&blocks, "Public?"), "Yes");
        assert_eq!(labelled_value(&blocks, "Registration?"), "Yes");
        assert_eq!(labelled_value(&blocks, "Tags"), "meta, open-science");
        assert_eq!(
            labelled_value(&blocks, "Affiliated Institution(s)"),
            "UoM, CoS"
        );
    }

    #[test]
    fn no_contributors_renders_notice() {
        let blocks = render_contributors(&[]);
        assert_eq!(
            blocks,
            vec![
                Block::Heading2("2. Contributors".to_string()),
                Block::Text("No contributors found.".to_string()),
            ]
        );
    }

    #[test]
    fn contributors_fill_the_table() {
        let contributors = vec![
            Contributor {
                name: Some("Ada Lovelace".to_string()),
                bibliographic: Some(true),
                email: None,
            },
            Contributor {
                name: None,
                bibliographic: None,
                email: Some("x@example.org".to_string()),
            },
        ];
        let blocks = render_contributors(&contributors);
        let table = blocks
            .iter()
            .find_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            table.headers,
            vec!["Name", "Bibliographic?", "Email (if available)"]
        );
        assert_eq!(table.rows[0], vec!["Ada Lovelace", "Yes", "N/A"]);
        assert_eq!(table.rows[1], vec!["N/A", "No", "x@example.org"]);
        assert_eq!(table.col_widths, vec![2.5, 1.0, 2.5]);
    }

    #[test]
    fn empty_file_table_renders_notice_under_extra_heading() {
        let blocks = render_file_table(&[], Some("Files in Main Project"));
        assert_eq!(
            blocks,
            vec![
                Block::Heading2("Files in Main Project".to_string()),
                Block::Text("3. No files available.".to_string()),
            ]
        );
    }

    #[test]
    fn file_table_sizes_round_to_two_decimals() {
        let files = vec![
            FileEntry {
                path: "/a.txt".to_string(),
                size_bytes: Some(2_621_440),
                download_url: "https://osf.io/download/a/".to_string(),
            },
            FileEntry {
                path: "/b.bin".to_string(),
                size_bytes: Some(1_336_934),
                download_url: "https://osf.io/download/b/".to_string(),
            },
            FileEntry {
                path: "/empty".to_string(),
                size_bytes: Some(0),
                download_url: String::new(),
            },
        ];
        let blocks = render_file_table(&files, None);
        assert_eq!(blocks[0], Block::Heading2("3. Files OSF Storage".to_string()));
        let table = blocks
            .iter()
            .find_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(table.rows[0], vec!["/a.txt", "2.5", "https://osf.io/download/a/"]);
        assert_eq!(table.rows[1][1], "1.27");
        assert_eq!(table.rows[2][1], "N/A");
        assert_eq!(table.headers[1], "Size \n(MB)");
    }

    #[test]
    fn sizes_that_round_to_zero_render_na() {
        // 5242 bytes is the largest size that still rounds to 0.00 MB.
        let files = vec![
            FileEntry {
                path: "/README.md".to_string(),
                size_bytes: Some(100),
                download_url: "https://osf.io/download/r/".to_string(),
            },
            FileEntry {
                path: "/under.txt".to_string(),
                size_bytes: Some(5_242),
                download_url: "https://osf.io/download/u/".to_string(),
            },
            FileEntry {
                path: "/over.txt".to_string(),
                size_bytes: Some(5_243),
                download_url: "https://osf.io/download/o/".to_string(),
            },
        ];
        let blocks = render_file_table(&files, None);
        let table = blocks
            .iter()
            .find_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(table.rows[0][1], "N/A");
        assert_eq!(table.rows[1][1], "N/A");
        assert_eq!(table.rows[2][1], "0.01");
    }

    #[test]
    fn wiki_pages_render_content_or_notice() {
        let pages = vec![
            WikiPage {
                id: "w1".to_string(),
                name: "home".to_string(),
                content: Some("# Welcome\nLine two".to_string()),
            },
            WikiPage {
                id: "w2".to_string(),
                name: "empty".to_string(),
                content: Some(String::new()),
            },
            WikiPage {
                id: "w3".to_string(),
                name: "broken".to_string(),
                content: None,
            },
        ];
        let blocks = render_wiki(Ok(&pages));
        assert_eq!(blocks[0], Block::Heading2("4. Wiki".to_string()));
        assert!(blocks.contains(&Block::Text("# Welcome\nLine two".to_string())));
        assert_eq!(
            blocks
                .iter()
                .filter(|b| **b == Block::Text(WIKI_CONTENT_UNAVAILABLE.to_string()))
                .count(),
            2
        );
    }

    #[test]
    fn failed_wiki_listing_is_carried_inline() {
        let err = ExportError::Pdf("boom".to_string());
        let blocks = render_wiki(Err(&err));
        assert_eq!(blocks[0], Block::Heading2("4. Wiki".to_string()));
        assert_eq!(blocks[1], Block::Heading3("Error".to_string()));
        assert!(matches!(
            &blocks[2],
            Block::Text(t) if t.starts_with("Could not fetch wiki:")
        ));
    }

    #[test]
    fn component_intro_falls_back_to_canonical_url() {
        let component = Component {
            id: "sub01".to_string(),
            title: "Analysis".to_string(),
            html_url: None,
        };
        let blocks = render_component_intro(&component, "https://osf.io/sub01/");
        assert_eq!(
            blocks,
            vec![
                Block::Heading3("Analysis".to_string()),
                Block::LinkLine {
                    label: "Component URL".to_string(),
                    url: "https://osf.io/sub01/".to_string(),
                },
            ]
        );
    }
}
