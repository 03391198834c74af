use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::UtcDateTime;

/// Publication state of a local content record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    /// Deleted by a human; still present in the store but has no permalink.
    Trashed,
}
impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "publish",
            Self::Trashed => "trash",
        }
    }
}
impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for ContentStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "publish" => Ok(Self::Published),
            "trash" => Ok(Self::Trashed),
            other => exn::bail!(ErrorKind::InvalidData(format!("content status {other:?}"))),
        }
    }
}

/// A record to create.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewContent {
    /// Content type, e.g. `page`.
    pub kind: String,
    pub title: String,
    pub body: String,
    pub status: ContentStatus,
    pub menu_order: i64,
    pub meta: BTreeMap<String, String>,
}
impl NewContent {
    pub fn new(kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self { kind: kind.into(), title: title.into(), ..Default::default() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// A partial update. `None` fields are left alone; `meta` entries are
/// upserted, existing keys not mentioned are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<ContentStatus>,
    pub menu_order: Option<i64>,
    pub meta: BTreeMap<String, String>,
}
impl ContentUpdate {
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Applies the update onto an existing record.
    pub fn apply(self, record: &mut ContentRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(body) = self.body {
            record.body = body;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(order) = self.menu_order {
            record.menu_order = order;
        }
        record.meta.extend(self.meta);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub status: ContentStatus,
    pub menu_order: i64,
    pub meta: BTreeMap<String, String>,
    pub modified_at: UtcDateTime,
}
impl ContentRecord {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

/// Who created a menu item.
///
/// Menu synchronization only ever touches [`Origin::System`] items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Origin {
    System,
    #[default]
    Manual,
}
impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Manual => "manual",
        }
    }
}
impl FromStr for Origin {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Self::System),
            "manual" => Ok(Self::Manual),
            other => exn::bail!(ErrorKind::InvalidData(format!("menu item origin {other:?}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Menu {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMenuItem {
    pub parent_id: Option<i64>,
    pub local_content_id: Option<i64>,
    pub title: String,
    pub order: i64,
    pub origin: Origin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub id: i64,
    pub menu_id: i64,
    pub parent_id: Option<i64>,
    pub local_content_id: Option<i64>,
    pub title: String,
    pub order: i64,
    pub origin: Origin,
}

/// Where a menu item sits, and what it is labelled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub parent_id: Option<i64>,
    pub order: i64,
    pub title: String,
}
