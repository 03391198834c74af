use std::sync::Arc;
use tether_content::{ContentStore, MenuStore, NewMenuItem, Origin};
use tether_db::{BatchRepository, Database, LinkRegistry, Registration, SqliteContentStore, SyncState};
use tether_hierarchy::{HierarchyBuilder, MenuSynchronizer};
use tether_http::{Route, UrlRouter};
use tether_ident::{RemoteId, RemoteType};
use tether_remote::MockRemote;
use tether_remote::models::{Block, BlockKind, PageProperties, Parent, Span};
use tether_sync::{StatusResolver, SyncOrchestrator, SyncSettings};
use time::{Duration, UtcDateTime};

const ORIGIN: &str = "https://www.notion.so";
const ROOT: &str = "abc123";
const CHILD: &str = "0123456789abcdef0123456789abcdef";

struct World {
    registry: LinkRegistry,
    content: Arc<SqliteContentStore>,
    remote: Arc<MockRemote>,
    orchestrator: SyncOrchestrator,
    router: UrlRouter,
    status: StatusResolver,
}

async fn world() -> World {
    let db = Database::connect_in_memory().await.unwrap();
    let registry = LinkRegistry::from(&db);
    let content = Arc::new(SqliteContentStore::new(&db, "https://site.example"));
    let edited = UtcDateTime::now() - Duration::hours(1);
    let remote = Arc::new(
        MockRemote::default()
            .with_page(PageProperties::page(ROOT, "Getting Started", edited), vec![
                Block::new("p", BlockKind::Paragraph(vec![Span::plain("Hello")])),
                Block::new(CHILD, BlockKind::ChildPage { title: "Install".into() }),
            ])
            .with_page(
                PageProperties::page(CHILD, "Install", edited).with_parent(Parent::Page(RemoteId::new(ROOT))),
                vec![],
            ),
    );
    let orchestrator = SyncOrchestrator::new(remote.clone(), content.clone(), registry.clone(), SyncSettings::default());
    let router = UrlRouter::new(registry.clone(), content.clone(), ORIGIN);
    let status = StatusResolver::new(registry.clone(), BatchRepository::from(&db));
    World { registry, content, remote, orchestrator, router, status }
}

#[tokio::test]
async fn register_route_sync_route() {
    let w = world().await;

    w.registry.register(Registration::new(ROOT, "Getting Started", RemoteType::Page)).await.unwrap();
    let entry = w.registry.find_by_remote_id(ROOT).await.unwrap();
    assert_eq!(entry.slug, "getting-started");
    assert_eq!(w.status.status_for(ROOT).await.as_str(), "not_synced");
    // Before syncing, the public link still works: it goes to the source.
    assert_eq!(w.router.resolve("getting-started").await, Route::Remote(format!("{ORIGIN}/{ROOT}")));

    let report = w.orchestrator.sync(ROOT).await.unwrap();
    assert!(report.created);
    assert_eq!(
        w.router.resolve("getting-started").await,
        Route::Local(format!("https://site.example/?page_id={}", report.local_content_id))
    );
    assert_eq!(w.status.status_for(ROOT).await.as_str(), "synced");

    let again = w.orchestrator.sync(ROOT).await.unwrap();
    assert_eq!(again.local_content_id, report.local_content_id);
    w.registry.register(Registration::new(ROOT, "Getting Started", RemoteType::Page)).await.unwrap();
    let entry = w.registry.find_by_remote_id(ROOT).await.unwrap();
    assert_eq!(entry.slug, "getting-started");
    assert_eq!(entry.sync_status, SyncState::Synced);
    assert_eq!(entry.access_count, 2);

    let body = w.content.get(report.local_content_id).await.unwrap().unwrap().body;
    assert!(body.contains("<a href=\"/notion/install\">Install</a>"), "{body}");
}

#[tokio::test]
async fn failed_sync_is_visible_and_still_routes() {
    let w = world().await;
    w.orchestrator.sync(ROOT).await.unwrap();
    w.remote
        .fail_with(&RemoteId::new(ROOT), tether_remote::error::ErrorKind::Network("connection reset".into()))
        .await;
    assert!(w.orchestrator.sync(ROOT).await.is_err());
    assert_eq!(w.status.status_for(ROOT).await.as_str(), "failed");
    assert!(matches!(w.router.resolve("getting-started").await, Route::Local(_)));
}

#[tokio::test]
async fn hierarchy_and_menu() {
    let w = world().await;
    let child = w.orchestrator.sync(CHILD).await.unwrap();
    let root = w.orchestrator.sync(ROOT).await.unwrap();

    let hierarchy = HierarchyBuilder::new(w.content.clone());
    assert_eq!(hierarchy.find_root(CHILD).await.unwrap(), RemoteId::new(ROOT));
    let tree = hierarchy.build_tree(ROOT).await.unwrap();
    assert_eq!(tree.local_id, root.local_content_id);
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].local_id, child.local_content_id);

    let menus = MenuSynchronizer::new(w.content.clone());
    let summary = menus.sync_menu("Docs", &tree, true).await.unwrap();
    assert_eq!(summary.created, 2);
    w.content
        .create_item(summary.menu_id, NewMenuItem {
            parent_id: None,
            local_content_id: None,
            title: "Contact".into(),
            order: 9,
            origin: Origin::Manual,
        })
        .await
        .unwrap();

    let only_root = tether_hierarchy::HierarchyNode { children: vec![], ..tree };
    let summary = menus.sync_menu("Docs", &only_root, true).await.unwrap();
    assert_eq!(summary.deleted, 1);
    let items = w.content.items(summary.menu_id).await.unwrap();
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Getting Started", "Contact"]);
}

#[tokio::test]
async fn manual_menu_item_survives_removed_parent_page() {
    let w = world().await;
    let child = w.orchestrator.sync(CHILD).await.unwrap();
    w.orchestrator.sync(ROOT).await.unwrap();
    let hierarchy = HierarchyBuilder::new(w.content.clone());
    let tree = hierarchy.build_tree(ROOT).await.unwrap();

    let menus = MenuSynchronizer::new(w.content.clone());
    let menu_id = menus.sync_menu("Docs", &tree, true).await.unwrap().menu_id;
    let items = w.content.items(menu_id).await.unwrap();
    let item_for = |local: i64| items.iter().find(|i| i.local_content_id == Some(local)).map(|i| i.id);
    let nested = w
        .content
        .create_item(menu_id, NewMenuItem {
            parent_id: item_for(child.local_content_id),
            local_content_id: None,
            title: "FAQ".into(),
            order: 4,
            origin: Origin::Manual,
        })
        .await
        .unwrap();

    let only_root = tether_hierarchy::HierarchyNode { children: vec![], ..tree.clone() };
    assert_eq!(menus.sync_menu("Docs", &only_root, true).await.unwrap().deleted, 1);
    let after = w.content.items(menu_id).await.unwrap();
    let faq = after.iter().find(|i| i.id == nested).unwrap();
    assert_eq!(faq.parent_id, item_for(tree.local_id));
    assert_eq!((faq.order, faq.origin), (4, Origin::Manual));
}

#[tokio::test]
async fn page_inside_toggle_appears_in_tree() {
    let w = world().await;
    let toggle = "1111111111111111111111111111111f";
    let nested = "22222222222222222222222222222222";
    w.remote
        .insert(
            PageProperties::page(ROOT, "Getting Started", UtcDateTime::now()),
            vec![Block::new(toggle, BlockKind::Unsupported("toggle".into()))
                .with_children(vec![Block::new(nested, BlockKind::ChildPage { title: "Hidden".into() })])],
        )
        .await;
    w.remote
        .insert(
            PageProperties::page(nested, "Hidden", UtcDateTime::now()).with_parent(Parent::Block(RemoteId::new(toggle))),
            vec![],
        )
        .await;

    let child = w.orchestrator.sync(nested).await.unwrap();
    w.orchestrator.sync(ROOT).await.unwrap();
    let tree = HierarchyBuilder::new(w.content.clone()).build_tree(ROOT).await.unwrap();
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].local_id, child.local_content_id);
}
