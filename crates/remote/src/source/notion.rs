//! Thin Notion REST API client.

use crate::RemoteSource;
use crate::error::{ErrorKind, Result};
use crate::models::{Block, BlockKind, PageProperties, Parent, RichText, Span};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tether_ident::{RemoteId, RemoteType};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcDateTime};
use tracing::instrument;

pub const DEFAULT_API_BASE: &str = "https://api.notion.com";
pub const DEFAULT_API_VERSION: &str = "2022-06-28";
/// Notion refuses page sizes over 100.
const PAGE_SIZE: u32 = 100;
const DEFAULT_MAX_DEPTH: usize = 8;

#[derive(Deserialize)]
struct BlockList {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Authenticated client for the Notion API.
///
/// Only reads. Nested blocks are fetched recursively up to
/// [`with_max_depth`](Self::with_max_depth) levels; sub-pages are never
/// descended into.
pub struct NotionClient {
    http: Client,
    base: String,
    token: String,
    version: String,
    max_depth: usize,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            version: DEFAULT_API_VERSION.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/v1/{path}", self.base))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
            .send()
            .await
            .map_err(|e| exn::Exn::from(ErrorKind::Network(e.to_string())))?;
        let status = response.status();
        if status.is_success() {
            return response.json().await.or_raise(|| ErrorKind::InvalidResponse("body is not JSON"));
        }
        // Error pages from proxies in front of the API are often not JSON.
        let body = response.text().await.unwrap_or_default();
        exn::bail!(error_kind(status, path, &body))
    }

    async fn children(&self, id: &str, depth: usize) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            // Cursors are opaque UUIDs; nothing in them needs escaping.
            let mut path = format!("blocks/{id}/children?page_size={PAGE_SIZE}");
            if let Some(cursor) = cursor.take() {
                path.push_str(&format!("&start_cursor={cursor}"));
            }
            let page: BlockList = serde_json::from_value(self.get(&path).await?)
                .or_raise(|| ErrorKind::InvalidResponse("block list"))?;
            for raw in &page.results {
                let mut block = parse_block(raw)?;
                let descend = raw["has_children"].as_bool().unwrap_or(false)
                    && !matches!(block.kind, BlockKind::ChildPage { .. } | BlockKind::ChildDatabase { .. });
                if descend && depth < self.max_depth {
                    // Async recursion needs the indirection.
                    block.children = Box::pin(self.children(&block.id, depth + 1)).await?;
                }
                blocks.push(block);
            }
            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(blocks)
    }
}

#[async_trait]
impl RemoteSource for NotionClient {
    fn name(&self) -> &str {
        "notion"
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn fetch_properties(&self, id: &RemoteId) -> Result<PageProperties> {
        // Pages and databases live behind different endpoints and an id alone
        // doesn't say which one it is.
        let body = match self.get(&format!("pages/{}", id.delimited())).await {
            Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => {
                self.get(&format!("databases/{}", id.delimited())).await?
            },
            other => other?,
        };
        parse_properties(&body)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn fetch_blocks(&self, id: &RemoteId) -> Result<Vec<Block>> {
        self.children(id.delimited(), 0).await
    }
}

fn error_kind(status: StatusCode, path: &str, body: &str) -> ErrorKind {
    let error = serde_json::from_str::<ApiError>(body).ok();
    tracing::debug!(%status, code = error.as_ref().map(|e| e.code.as_str()), "Notion API returned an error");
    match status {
        StatusCode::NOT_FOUND => ErrorKind::NotFound(path.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
        _ => ErrorKind::Api {
            status: status.as_u16(),
            message: error
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_default(),
        },
    }
}

fn parse_timestamp(value: &Value) -> Result<UtcDateTime> {
    let raw = value.as_str().ok_or_else(|| exn::Exn::from(ErrorKind::InvalidResponse("missing timestamp")))?;
    Ok(OffsetDateTime::parse(raw, &Rfc3339).or_raise(|| ErrorKind::InvalidResponse("timestamp"))?.to_utc())
}

fn parse_rich_text(value: &Value) -> RichText {
    value
        .as_array()
        .map(|spans| {
            spans
                .iter()
                .map(|span| Span {
                    text: span["plain_text"].as_str().unwrap_or_default().to_string(),
                    href: span["href"].as_str().map(str::to_string),
                    bold: span["annotations"]["bold"].as_bool().unwrap_or(false),
                    italic: span["annotations"]["italic"].as_bool().unwrap_or(false),
                    code: span["annotations"]["code"].as_bool().unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_parent(value: &Value) -> Parent {
    let id = |key: &str| value[key].as_str().map(RemoteId::new);
    match value["type"].as_str() {
        Some("page_id") => id("page_id").map(Parent::Page).unwrap_or_default(),
        Some("database_id") => id("database_id").map(Parent::Database).unwrap_or_default(),
        Some("block_id") => id("block_id").map(Parent::Block).unwrap_or_default(),
        _ => Parent::Workspace,
    }
}

fn parse_properties(body: &Value) -> Result<PageProperties> {
    let id = body["id"].as_str().ok_or_else(|| exn::Exn::from(ErrorKind::InvalidResponse("missing id")))?;
    let kind = match body["object"].as_str() {
        Some("database") => RemoteType::Database,
        Some("page") => RemoteType::Page,
        _ => exn::bail!(ErrorKind::InvalidResponse("unknown object type")),
    };
    let title = match kind {
        RemoteType::Database => parse_rich_text(&body["title"]),
        // A page's title is whichever property has type "title"; its name varies.
        RemoteType::Page => body["properties"]
            .as_object()
            .and_then(|props| props.values().find(|p| p["type"] == "title"))
            .map(|p| parse_rich_text(&p["title"]))
            .unwrap_or_default(),
    };
    Ok(PageProperties {
        id: RemoteId::new(id),
        kind,
        title: crate::models::plain_text(&title),
        url: body["url"].as_str().unwrap_or_default().to_string(),
        last_edited: parse_timestamp(&body["last_edited_time"])?,
        parent: parse_parent(&body["parent"]),
        archived: body["archived"].as_bool().unwrap_or(false) || body["in_trash"].as_bool().unwrap_or(false),
    })
}

fn parse_block(raw: &Value) -> Result<Block> {
    let id = raw["id"].as_str().ok_or_else(|| exn::Exn::from(ErrorKind::InvalidResponse("block without id")))?;
    let kind_name = raw["type"].as_str().unwrap_or("unknown");
    let data = &raw[kind_name];
    let text = || parse_rich_text(&data["rich_text"]);
    let kind = match kind_name {
        "paragraph" => BlockKind::Paragraph(text()),
        "heading_1" => BlockKind::Heading { level: 1, text: text() },
        "heading_2" => BlockKind::Heading { level: 2, text: text() },
        "heading_3" => BlockKind::Heading { level: 3, text: text() },
        "bulleted_list_item" => BlockKind::BulletedListItem(text()),
        "numbered_list_item" => BlockKind::NumberedListItem(text()),
        "to_do" => BlockKind::ToDo { text: text(), checked: data["checked"].as_bool().unwrap_or(false) },
        "quote" => BlockKind::Quote(text()),
        "code" => BlockKind::Code {
            language: data["language"].as_str().unwrap_or_default().to_string(),
            text: text(),
        },
        "divider" => BlockKind::Divider,
        "image" => {
            let source = data["type"].as_str().unwrap_or("external");
            BlockKind::Image {
                url: data[source]["url"].as_str().unwrap_or_default().to_string(),
                caption: parse_rich_text(&data["caption"]),
            }
        },
        "child_page" => BlockKind::ChildPage { title: data["title"].as_str().unwrap_or_default().to_string() },
        "child_database" => BlockKind::ChildDatabase { title: data["title"].as_str().unwrap_or_default().to_string() },
        "link_to_page" => match data["type"].as_str().and_then(|t| data[t].as_str()) {
            Some(target) => BlockKind::LinkToPage(RemoteId::new(target)),
            None => BlockKind::Unsupported(kind_name.to_string()),
        },
        other => BlockKind::Unsupported(other.to_string()),
    };
    Ok(Block::new(id, kind))
}
