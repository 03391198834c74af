//! Idempotent create-or-update of local content from a remote document.

use crate::convert::{Converter, HtmlConverter, LinkTarget, Links};
use crate::error::{ErrorKind, Result};
use crate::listener::SyncListener;
use std::sync::Arc;
use tether_content::{
    ContentHandle, ContentStatus, ContentUpdate, META_PARENT_REMOTE_ID, META_REMOTE_ID, META_REMOTE_LAST_EDITED,
    NewContent,
};
use tether_db::{LinkRegistry, Registration};
use tether_ident::RemoteId;
use tether_remote::RemoteHandle;
use tether_remote::models::{PageProperties, Parent, Reference, collect_references};
use time::UtcDateTime;
use tracing::instrument;

/// Static knobs of the orchestrator.
#[derive(Clone, Debug)]
pub struct SyncSettings {
    /// Routing prefix used for links between synced documents.
    pub route_prefix: String,
    /// Local content type of created records.
    pub content_type: String,
}
impl Default for SyncSettings {
    fn default() -> Self {
        Self { route_prefix: "notion".to_string(), content_type: "page".to_string() }
    }
}

/// What a successful sync did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub remote_id: RemoteId,
    pub local_content_id: i64,
    /// The local record did not exist before this sync.
    pub created: bool,
    pub title: String,
}

/// Pulls one remote document into the local content store.
///
/// Steps run strictly in order, each depending on the previous one:
/// validate → fetch → find or create the local record → convert → persist →
/// record in the registry. Once a local record exists for a remote id, every
/// later sync of that id (in any spelling) updates that same record.
pub struct SyncOrchestrator {
    remote: RemoteHandle,
    content: ContentHandle,
    registry: LinkRegistry,
    converter: Arc<dyn Converter>,
    settings: SyncSettings,
    listeners: Vec<Arc<dyn SyncListener>>,
}

impl SyncOrchestrator {
    pub fn new(remote: RemoteHandle, content: ContentHandle, registry: LinkRegistry, settings: SyncSettings) -> Self {
        Self {
            remote,
            content,
            registry,
            converter: Arc::new(HtmlConverter::default()),
            settings,
            listeners: Vec::new(),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn SyncListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    /// Sync one remote document.
    ///
    /// Failures after the local record was created report its id through
    /// [`ErrorKind::local_content_id`]. Every failure except validation is
    /// also recorded as the registry entry's sync error.
    #[instrument(skip(self), fields(remote = self.remote.name()))]
    pub async fn sync(&self, remote_id: &str) -> Result<SyncReport> {
        let result = self.sync_inner(remote_id).await;
        match &result {
            Ok(report) => {
                if let Some(entry) = self.registry.find_by_remote_id(report.remote_id.compact()).await {
                    self.listeners.iter().for_each(|l| l.on_synced(&entry));
                }
            },
            Err(e) => {
                if !matches!(**e, ErrorKind::Validation(_)) {
                    self.registry.update_sync_error(remote_id, &(**e).to_string()).await;
                }
                self.listeners.iter().for_each(|l| l.on_failed(remote_id, &**e));
            },
        }
        result
    }

    async fn sync_inner(&self, remote_id: &str) -> Result<SyncReport> {
        let id = RemoteId::parse(remote_id).map_err(|e| {
            exn::Exn::from(ErrorKind::Validation(format!("{:?}: {}", remote_id.trim(), *e)))
        })?;

        let properties = self.remote.fetch_properties(&id).await.map_err(|e| fetch_error(&e))?;
        let blocks = self.remote.fetch_blocks(&id).await.map_err(|e| fetch_error(&e))?;
        let title = match properties.title.trim() {
            "" => id.compact().to_string(),
            t => t.to_string(),
        };
        self.registry
            .register(Registration::new(id.compact(), &title, properties.kind).with_remote_url(&properties.url))
            .await
            .map_err(|e| exn::Exn::from(ErrorKind::Registry((*e).to_string())))?;

        let (local_content_id, created) = match self.find_local(&id).await? {
            Some(existing) => (existing, false),
            None => {
                // Created before conversion so later steps have a stable id to
                // point at, even if they fail.
                let placeholder = NewContent::new(&self.settings.content_type, &title)
                    .with_meta(META_REMOTE_ID, id.compact());
                let created = self.content.create(placeholder).await.map_err(storage_error)?;
                tracing::debug!(local_content_id = created, "created placeholder");
                (created, true)
            },
        };

        let references = collect_references(&blocks);
        let links = self.register_references(&references).await;
        let body = self.converter.convert(&blocks, &links).map_err(|e| {
            exn::Exn::from(ErrorKind::Conversion { local_content_id, message: (*e).to_string() })
        })?;

        self.content
            .update(local_content_id, content_update(&properties, &title, body))
            .await
            .map_err(|e| exn::Exn::from(ErrorKind::Persist { local_content_id, message: (*e).to_string() }))?;

        self.registry.mark_synced(id.compact(), local_content_id, &self.settings.content_type).await;
        self.registry.update_sync_timestamps(id.compact(), properties.last_edited, UtcDateTime::now()).await;
        self.adopt_children(&id, &references).await;

        tracing::info!(remote_id = %id, local_content_id, created, "sync complete");
        Ok(SyncReport { remote_id: id, local_content_id, created, title })
    }

    /// Existing local record for `id`, by either stored spelling.
    async fn find_local(&self, id: &RemoteId) -> Result<Option<i64>> {
        for spelling in [id.compact(), id.delimited()] {
            let found = self.content.find_by_meta(META_REMOTE_ID, spelling).await.map_err(storage_error)?;
            if let Some(first) = found.first() {
                if found.len() > 1 {
                    tracing::warn!(remote_id = %id, ?found, "several local records claim the same remote id");
                }
                return Ok(Some(*first));
            }
        }
        Ok(None)
    }

    /// Makes sure every referenced document has a registry entry (and thus a
    /// slug), and maps each to its public path.
    async fn register_references(&self, references: &[Reference]) -> Links {
        let mut links = Links::new(&self.settings.route_prefix);
        for reference in references {
            let known = self.registry.find_by_remote_id(reference.id.compact()).await;
            // Page links carry no title; keep whatever is known rather than
            // churning the slug.
            let title = reference
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .or_else(|| known.as_ref().map(|e| e.remote_title.clone()))
                .unwrap_or_else(|| reference.id.compact().to_string());
            let registered = self.registry.register(Registration::new(reference.id.compact(), &title, reference.kind)).await;
            let entry = match registered {
                Ok(entry_id) => self.registry.find_by_id(entry_id).await,
                Err(e) => {
                    tracing::warn!(reference = %reference.id, error = %(*e), "could not register reference");
                    known
                },
            };
            if let Some(entry) = entry {
                links.insert(reference.id.clone(), LinkTarget { slug: entry.slug, title: entry.remote_title });
            }
        }
        links
    }

    /// Sub-pages already synced locally take their sibling order from their
    /// position in the parent document, and the parent as their parent. The
    /// latter matters for pages nested in toggles or columns, whose own
    /// properties only name a block as parent.
    async fn adopt_children(&self, parent: &RemoteId, references: &[Reference]) {
        for reference in references {
            let Some(position) = reference.position else { continue };
            let Ok(Some(child)) = self.find_local(&reference.id).await else { continue };
            let update = ContentUpdate { menu_order: i64::try_from(position).ok(), ..Default::default() }
                .with_meta(META_PARENT_REMOTE_ID, parent.compact());
            if let Err(e) = self.content.update(child, update).await {
                tracing::warn!(child, error = %(*e), "could not reorder child page");
            }
        }
    }
}

fn fetch_error(e: &tether_remote::error::Error) -> crate::error::Error {
    exn::Exn::from(ErrorKind::Fetch((**e).to_string()))
}

fn storage_error(e: tether_content::error::Error) -> crate::error::Error {
    exn::Exn::from(ErrorKind::Storage((*e).to_string()))
}

fn content_update(properties: &PageProperties, title: &str, body: String) -> ContentUpdate {
    let update = ContentUpdate {
        title: Some(title.to_string()),
        body: Some(body),
        status: Some(if properties.archived { ContentStatus::Draft } else { ContentStatus::Published }),
        ..Default::default()
    }
    .with_meta(META_REMOTE_ID, properties.id.compact())
    .with_meta(META_REMOTE_LAST_EDITED, properties.last_edited.unix_timestamp().to_string());
    match &properties.parent {
        // The owning page is only known from its side; leave what it recorded.
        Parent::Block(_) => update,
        parent => update.with_meta(
            META_PARENT_REMOTE_ID,
            parent.document_id().map(|p| p.compact().to_string()).unwrap_or_default(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::SyncListener;
    use std::sync::Mutex;
    use tether_content::{ContentStore, MemoryStore};
    use tether_db::{Database, RegistryEntry, SyncState};
    use tether_remote::MockRemote;
    use tether_remote::error::ErrorKind as RemoteErrorKind;
    use tether_remote::models::{Block, BlockKind, Span};
    use time::Duration;

    const PAGE: &str = "0123456789abcdef0123456789abcdef";
    const PAGE_DELIMITED: &str = "01234567-89ab-cdef-0123-456789abcdef";
    const CHILD: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const LINKED: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    struct Fixture {
        remote: Arc<MockRemote>,
        content: Arc<MemoryStore>,
        registry: LinkRegistry,
        orchestrator: SyncOrchestrator,
    }

    fn page_blocks() -> Vec<Block> {
        vec![
            Block::new("p1", BlockKind::Paragraph(vec![Span::plain("Welcome")])),
            Block::new(CHILD, BlockKind::ChildPage { title: "Child Page".into() }),
            Block::new("l1", BlockKind::LinkToPage(RemoteId::new(LINKED))),
        ]
    }

    async fn fixture() -> Fixture {
        let remote = Arc::new(MockRemote::default().with_page(
            PageProperties::page(PAGE, "Getting Started", UtcDateTime::now() - Duration::minutes(5)),
            page_blocks(),
        ));
        let content = Arc::new(MemoryStore::new("https://example.com"));
        let registry = LinkRegistry::from(&Database::connect_in_memory().await.unwrap());
        let orchestrator =
            SyncOrchestrator::new(remote.clone(), content.clone(), registry.clone(), SyncSettings::default());
        Fixture { remote, content, registry, orchestrator }
    }

    #[tokio::test]
    async fn test_sync_creates_then_updates() {
        let f = fixture().await;
        let first = f.orchestrator.sync(PAGE).await.unwrap();
        assert!(first.created);
        let second = f.orchestrator.sync(PAGE_DELIMITED).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.local_content_id, second.local_content_id);
        assert_eq!(f.content.find_by_meta(META_REMOTE_ID, PAGE).await.unwrap().len(), 1);

        let entry = f.registry.find_by_remote_id(PAGE).await.unwrap();
        assert_eq!(entry.sync_status, SyncState::Synced);
        assert_eq!(entry.local_content_id, Some(first.local_content_id));
        assert_eq!(entry.slug, "getting-started");
        assert!(entry.local_last_synced.is_some());
        assert!(!entry.is_outdated());

        let record = f.content.get(first.local_content_id).await.unwrap().unwrap();
        assert_eq!(record.title, "Getting Started");
        assert_eq!(record.status, ContentStatus::Published);
        assert!(record.body.starts_with("<p>Welcome</p>"));
        assert_eq!(record.meta(META_PARENT_REMOTE_ID), Some(""));
    }

    #[tokio::test]
    async fn test_references_are_registered_and_linked() {
        let f = fixture().await;
        let report = f.orchestrator.sync(PAGE).await.unwrap();
        let child = f.registry.find_by_remote_id(CHILD).await.unwrap();
        assert_eq!(child.slug, "child-page");
        assert_eq!(child.sync_status, SyncState::NotSynced);
        // Untitled link target: placeholder slug is the raw id.
        let linked = f.registry.find_by_remote_id(LINKED).await.unwrap();
        assert_eq!(linked.slug, LINKED);

        let body = f.content.get(report.local_content_id).await.unwrap().unwrap().body;
        assert!(body.contains("<a href=\"/notion/child-page\">Child Page</a>"), "{body}");
        assert!(body.contains(&format!("<a href=\"/notion/{LINKED}\">")), "{body}");
    }

    #[tokio::test]
    async fn test_child_order_follows_parent_blocks() {
        let f = fixture().await;
        f.remote
            .insert(
                PageProperties::page(CHILD, "Child Page", UtcDateTime::now())
                    .with_parent(Parent::Page(RemoteId::new(PAGE))),
                vec![],
            )
            .await;
        let child = f.orchestrator.sync(CHILD).await.unwrap();
        let record = f.content.get(child.local_content_id).await.unwrap().unwrap();
        assert_eq!(record.meta(META_PARENT_REMOTE_ID), Some(PAGE));

        // Child page is the second block but the first sub-page.
        f.content.update(child.local_content_id, ContentUpdate { menu_order: Some(9), ..Default::default() }).await.unwrap();
        f.orchestrator.sync(PAGE).await.unwrap();
        assert_eq!(f.content.get(child.local_content_id).await.unwrap().unwrap().menu_order, 0);
    }

    #[tokio::test]
    async fn test_page_nested_in_block_is_adopted_by_parent() {
        let f = fixture().await;
        let toggle = "cccccccccccccccccccccccccccccccc";
        f.remote
            .insert(
                PageProperties::page(PAGE, "Getting Started", UtcDateTime::now()),
                vec![Block::new(toggle, BlockKind::Unsupported("toggle".into()))
                    .with_children(vec![Block::new(CHILD, BlockKind::ChildPage { title: "Child Page".into() })])],
            )
            .await;
        f.remote
            .insert(
                PageProperties::page(CHILD, "Child Page", UtcDateTime::now())
                    .with_parent(Parent::Block(RemoteId::new(toggle))),
                vec![],
            )
            .await;

        let child = f.orchestrator.sync(CHILD).await.unwrap();
        let record = f.content.get(child.local_content_id).await.unwrap().unwrap();
        assert_eq!(record.meta(META_PARENT_REMOTE_ID), None);

        f.orchestrator.sync(PAGE).await.unwrap();
        let record = f.content.get(child.local_content_id).await.unwrap().unwrap();
        assert_eq!(record.meta(META_PARENT_REMOTE_ID), Some(PAGE));

        // Re-syncing the child does not lose the parent again.
        f.orchestrator.sync(CHILD).await.unwrap();
        let record = f.content.get(child.local_content_id).await.unwrap().unwrap();
        assert_eq!(record.meta(META_PARENT_REMOTE_ID), Some(PAGE));
    }

    #[rstest::rstest]
    #[case("")]
    #[case("not/valid")]
    #[case("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0")]
    #[tokio::test]
    async fn test_validation_rejects_before_io(#[case] remote_id: &str) {
        let f = fixture().await;
        let err = f.orchestrator.sync(remote_id).await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Validation(_)));
        assert_eq!(f.remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_has_no_side_effects() {
        let f = fixture().await;
        f.remote.fail_with(&RemoteId::new(PAGE), RemoteErrorKind::RateLimited).await;
        let err = f.orchestrator.sync(PAGE).await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Fetch(_)));
        assert!(err.is_retryable());
        assert_eq!(err.local_content_id(), None);
        assert!(f.content.is_empty().await);
        assert!(f.registry.find_by_remote_id(PAGE).await.is_none());
    }

    #[tokio::test]
    async fn test_create_failure_is_reported_verbatim() {
        let f = fixture().await;
        f.content.fail_creates(Some("database is locked")).await;
        let err = f.orchestrator.sync(PAGE).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Storage("database is locked".into()));
        let entry = f.registry.find_by_remote_id(PAGE).await.unwrap();
        assert_eq!(entry.error(), Some("database is locked"));
        assert_eq!(entry.sync_status, SyncState::NotSynced);
    }

    #[tokio::test]
    async fn test_conversion_failure_reports_local_id() {
        let f = fixture().await;
        f.remote
            .insert(
                PageProperties::page(PAGE, "Getting Started", UtcDateTime::now()),
                vec![Block::new("x", BlockKind::Unsupported("synced_block".into()))],
            )
            .await;
        let orchestrator = SyncOrchestrator::new(
            f.remote.clone(),
            f.content.clone(),
            f.registry.clone(),
            SyncSettings::default(),
        )
        .with_converter(Arc::new(HtmlConverter::new(true)));
        let err = orchestrator.sync(PAGE).await.unwrap_err();
        let local_id = err.local_content_id().expect("placeholder was created");
        assert!(f.content.get(local_id).await.unwrap().is_some());

        // Retrying after the problem is gone reuses the same record.
        let report = f.orchestrator.sync(PAGE).await.unwrap();
        assert_eq!(report.local_content_id, local_id);
        assert_eq!(f.content.len().await, 1);
        assert_eq!(f.registry.find_by_remote_id(PAGE).await.unwrap().error(), None);
    }

    #[tokio::test]
    async fn test_update_failure_reports_local_id() {
        let f = fixture().await;
        f.content.fail_updates(Some("read-only")).await;
        let err = f.orchestrator.sync(PAGE).await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Persist { .. }));
        assert!(err.local_content_id().is_some());
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);
    impl SyncListener for Recorder {
        fn on_synced(&self, entry: &RegistryEntry) {
            self.0.lock().unwrap().push(format!("synced {}", entry.slug));
        }

        fn on_failed(&self, remote_id: &str, _error: &ErrorKind) {
            self.0.lock().unwrap().push(format!("failed {remote_id}"));
        }
    }

    #[tokio::test]
    async fn test_listeners_are_notified() {
        let f = fixture().await;
        let recorder = Arc::new(Recorder::default());
        let orchestrator = SyncOrchestrator::new(f.remote.clone(), f.content.clone(), f.registry.clone(), SyncSettings::default())
            .with_listener(recorder.clone());
        orchestrator.sync(PAGE).await.unwrap();
        orchestrator.sync(CHILD).await.unwrap_err();
        assert_eq!(*recorder.0.lock().unwrap(), vec!["synced getting-started".to_string(), format!("failed {CHILD}")]);
    }
}
