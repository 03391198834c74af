//! Remote document models.
//!
//! A deliberately small subset of what Notion can express: enough structure
//! for the converter to produce markup and for the orchestrator to discover
//! parent pointers and references to other documents.

use tether_ident::{RemoteId, RemoteType};
use time::UtcDateTime;

/// Where a remote resource lives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Parent {
    /// Top-level page in the workspace.
    #[default]
    Workspace,
    Page(RemoteId),
    Database(RemoteId),
    /// Nested inside a block of another page (columns, toggles, ...).
    Block(RemoteId),
}
impl Parent {
    /// The parent's id, when the parent is itself a document.
    pub fn document_id(&self) -> Option<&RemoteId> {
        match self {
            Self::Page(id) | Self::Database(id) => Some(id),
            Self::Workspace | Self::Block(_) => None,
        }
    }
}

/// Top-level properties of a remote page or database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageProperties {
    pub id: RemoteId,
    pub kind: RemoteType,
    pub title: String,
    /// Informational URL as reported by the remote source.
    pub url: String,
    pub last_edited: UtcDateTime,
    pub parent: Parent,
    pub archived: bool,
}
impl PageProperties {
    /// Properties for a top-level, non-archived page with no URL.
    pub fn page(id: impl AsRef<str>, title: impl Into<String>, last_edited: UtcDateTime) -> Self {
        Self {
            id: RemoteId::new(id),
            kind: RemoteType::Page,
            title: title.into(),
            url: String::new(),
            last_edited,
            parent: Parent::Workspace,
            archived: false,
        }
    }

    pub fn with_parent(mut self, parent: Parent) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// A run of text sharing the same annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub href: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}
impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }
}

pub type RichText = Vec<Span>;

/// Flattens rich text into its plain text content.
pub fn plain_text(text: &[Span]) -> String {
    text.iter().map(|s| s.text.as_str()).collect()
}

/// Content of a single block, without its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph(RichText),
    Heading { level: u8, text: RichText },
    BulletedListItem(RichText),
    NumberedListItem(RichText),
    ToDo { text: RichText, checked: bool },
    Quote(RichText),
    Code { language: String, text: RichText },
    Divider,
    Image { url: String, caption: RichText },
    /// A sub-page. The block id *is* the child page's id.
    ChildPage { title: String },
    /// An inline database. The block id *is* the database's id.
    ChildDatabase { title: String },
    LinkToPage(RemoteId),
    /// Anything the converter does not know about, named by its remote type.
    Unsupported(String),
}

/// A block and its (already fetched) children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
    pub children: Vec<Block>,
}
impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self { id: id.into(), kind, children: Vec::new() }
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }
}

/// Another remote document mentioned by a block tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub id: RemoteId,
    pub kind: RemoteType,
    /// Known for sub-pages and inline databases, not for page links.
    pub title: Option<String>,
    /// Position among the sub-pages/databases of the document, if it is one.
    pub position: Option<usize>,
}

/// Collects every document referenced from `blocks`, depth-first, in
/// document order. Duplicates are kept out; the first mention wins.
pub fn collect_references(blocks: &[Block]) -> Vec<Reference> {
    fn walk(blocks: &[Block], found: &mut Vec<Reference>, position: &mut usize) {
        for block in blocks {
            let reference = match &block.kind {
                BlockKind::ChildPage { title } => Some((RemoteType::Page, title)),
                BlockKind::ChildDatabase { title } => Some((RemoteType::Database, title)),
                BlockKind::LinkToPage(id) => {
                    if !found.iter().any(|r| &r.id == id) {
                        found.push(Reference { id: id.clone(), kind: RemoteType::Page, title: None, position: None });
                    }
                    None
                },
                _ => None,
            };
            if let Some((kind, title)) = reference {
                let id = RemoteId::new(&block.id);
                let slot = *position;
                *position += 1;
                match found.iter_mut().find(|r| r.id == id) {
                    // A link seen earlier is upgraded with the title and position.
                    Some(existing) => {
                        existing.title = existing.title.take().or_else(|| Some(title.clone()));
                        existing.position = existing.position.or(Some(slot));
                    },
                    None => found.push(Reference { id, kind, title: Some(title.clone()), position: Some(slot) }),
                }
            }
            walk(&block.children, found, position);
        }
    }
    let mut found = Vec::new();
    let mut position = 0;
    walk(blocks, &mut found, &mut position);
    found
}
