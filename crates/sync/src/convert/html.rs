use super::error::{ErrorKind, Result};
use super::{Converter, Links};
use std::fmt::Write;
use tether_ident::RemoteId;
use tether_remote::models::{Block, BlockKind, Span, plain_text};

/// Renders blocks as HTML fragments suitable for a post body.
///
/// In strict mode an unknown block type fails the whole conversion; otherwise
/// it leaves an HTML comment behind.
#[derive(Clone, Debug, Default)]
pub struct HtmlConverter {
    strict: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum List {
    Bulleted,
    Numbered,
}
impl List {
    fn of(kind: &BlockKind) -> Option<Self> {
        match kind {
            BlockKind::BulletedListItem(_) => Some(Self::Bulleted),
            BlockKind::NumberedListItem(_) => Some(Self::Numbered),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Bulleted => "ul",
            Self::Numbered => "ol",
        }
    }
}

impl HtmlConverter {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    fn blocks(&self, out: &mut String, blocks: &[Block], links: &Links) -> Result<()> {
        let mut open: Option<List> = None;
        for block in blocks {
            let list = List::of(&block.kind);
            if open != list {
                if let Some(previous) = open {
                    _ = write!(out, "</{}>", previous.tag());
                }
                if let Some(next) = list {
                    _ = write!(out, "<{}>", next.tag());
                }
                open = list;
            }
            self.block(out, block, links)?;
        }
        if let Some(previous) = open {
            _ = write!(out, "</{}>", previous.tag());
        }
        Ok(())
    }

    fn block(&self, out: &mut String, block: &Block, links: &Links) -> Result<()> {
        match &block.kind {
            BlockKind::Paragraph(text) => wrap(out, "p", text),
            BlockKind::Heading { level, text } => wrap(out, &format!("h{}", (*level).clamp(1, 3)), text),
            BlockKind::BulletedListItem(text) | BlockKind::NumberedListItem(text) => {
                out.push_str("<li>");
                rich(out, text);
                // Nested items belong inside their parent item.
                self.blocks(out, &block.children, links)?;
                out.push_str("</li>");
                return Ok(());
            },
            BlockKind::ToDo { text, checked } => {
                let checked = if *checked { " checked" } else { "" };
                _ = write!(out, "<p class=\"to-do\"><input type=\"checkbox\" disabled{checked}> ");
                rich(out, text);
                out.push_str("</p>");
            },
            BlockKind::Quote(text) => wrap(out, "blockquote", text),
            BlockKind::Code { language, text } => {
                _ = write!(out, "<pre><code class=\"language-{}\">{}</code></pre>", escape(language), escape(&plain_text(text)));
            },
            BlockKind::Divider => out.push_str("<hr>"),
            BlockKind::Image { url, caption } => {
                let alt = plain_text(caption);
                _ = write!(out, "<figure><img src=\"{}\" alt=\"{}\">", escape(url), escape(&alt));
                if !caption.is_empty() {
                    out.push_str("<figcaption>");
                    rich(out, caption);
                    out.push_str("</figcaption>");
                }
                out.push_str("</figure>");
            },
            BlockKind::ChildPage { title } | BlockKind::ChildDatabase { title } => {
                anchor(out, &RemoteId::new(&block.id), Some(title), links);
                // A sub-page's own content belongs to the sub-page.
                return Ok(());
            },
            BlockKind::LinkToPage(target) => anchor(out, target, None, links),
            BlockKind::Unsupported(kind) => {
                if self.strict {
                    exn::bail!(ErrorKind::Unsupported(kind.clone()));
                }
                tracing::debug!(block = %block.id, kind = %kind, "skipping unsupported block");
                _ = write!(out, "<!-- unsupported block: {} -->", escape(kind).replace("--", "- -"));
            },
        }
        self.blocks(out, &block.children, links)
    }
}

impl Converter for HtmlConverter {
    fn convert(&self, blocks: &[Block], links: &Links) -> Result<String> {
        let mut out = String::new();
        self.blocks(&mut out, blocks, links)?;
        Ok(out)
    }
}

fn wrap(out: &mut String, tag: &str, text: &[Span]) {
    _ = write!(out, "<{tag}>");
    rich(out, text);
    _ = write!(out, "</{tag}>");
}

fn anchor(out: &mut String, target: &RemoteId, title: Option<&String>, links: &Links) {
    let known = links.get(target);
    let label = title.map(String::as_str).or(known.map(|t| t.title.as_str())).unwrap_or(target.compact());
    match links.href(target) {
        Some(href) => {
            _ = write!(out, "<p><a href=\"{}\">{}</a></p>", escape(&href), escape(label));
        },
        None => {
            _ = write!(out, "<p>{}</p>", escape(label));
        },
    }
}

fn rich(out: &mut String, text: &[Span]) {
    for span in text {
        let mut html = escape(&span.text);
        if span.code {
            html = format!("<code>{html}</code>");
        }
        if span.italic {
            html = format!("<em>{html}</em>");
        }
        if span.bold {
            html = format!("<strong>{html}</strong>");
        }
        if let Some(href) = &span.href {
            html = format!("<a href=\"{}\">{html}</a>", escape(href));
        }
        out.push_str(&html);
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
