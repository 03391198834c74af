//! Wiring of configured components.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;
use tether_config::Config;
use tether_db::{BatchRepository, Database, LinkRegistry, SqliteContentStore};
use tether_hierarchy::{HierarchyBuilder, MenuSynchronizer};
use tether_http::{AppState, UrlRouter};
use tether_remote::{NotionClient, RemoteHandle};
use tether_sync::convert::HtmlConverter;
use tether_sync::{LogListener, StatusResolver, SyncOrchestrator, SyncSettings};

pub struct App {
    pub config: Config,
    pub db: Database,
    pub registry: LinkRegistry,
    pub batches: BatchRepository,
    pub content: Arc<SqliteContentStore>,
}

impl App {
    pub async fn open(config: Config) -> Result<Self> {
        if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        let db = Database::connect(&config.database.path).await.or_raise(|| ErrorKind::Database)?;
        let content = Arc::new(SqliteContentStore::new(&db, &config.routing.permalink_base));
        Ok(Self { registry: LinkRegistry::from(&db), batches: BatchRepository::from(&db), content, db, config })
    }

    fn remote(&self) -> Result<RemoteHandle> {
        let notion = &self.config.notion;
        let token = notion.token.as_deref().filter(|t| !t.is_empty()).ok_or_else(|| exn::Exn::from(ErrorKind::MissingToken))?;
        Ok(Arc::new(
            NotionClient::new(token)
                .with_base(&notion.api_base)
                .with_version(&notion.api_version)
                .with_max_depth(self.config.sync.max_block_depth),
        ))
    }

    pub fn orchestrator(&self) -> Result<SyncOrchestrator> {
        let settings = SyncSettings { route_prefix: self.config.route_prefix().to_string(), ..Default::default() };
        Ok(SyncOrchestrator::new(self.remote()?, self.content.clone(), self.registry.clone(), settings)
            .with_converter(Arc::new(HtmlConverter::new(self.config.sync.strict)))
            .with_listener(Arc::new(LogListener)))
    }

    pub fn status(&self) -> StatusResolver {
        StatusResolver::new(self.registry.clone(), self.batches.clone())
    }

    pub fn http_state(&self) -> AppState {
        AppState {
            router: UrlRouter::new(self.registry.clone(), self.content.clone(), &self.config.routing.remote_origin),
            status: self.status(),
        }
    }

    pub fn hierarchy(&self) -> HierarchyBuilder {
        HierarchyBuilder::new(self.content.clone())
            .with_max_depth(self.config.hierarchy.max_depth)
            .with_max_root_iterations(self.config.hierarchy.max_root_iterations)
    }

    pub fn menus(&self) -> MenuSynchronizer {
        MenuSynchronizer::new(self.content.clone())
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}
