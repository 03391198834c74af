mod app;
mod cli;
mod error;

use crate::app::App;
use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use std::io::Write;
use std::process::ExitCode;
use tether_config::Config;
use tether_db::Registration;
use tether_ident::RemoteType;
use tether_sync::{BatchEvent, run_batch};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            if e.is_retryable() {
                // EX_TEMPFAIL: the same invocation may succeed later.
                eprintln!("This failure may be temporary; retrying may help.");
                return ExitCode::from(75);
            }
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let app = App::open(config).await?;
    let result = match cli.command {
        Command::Serve { bind } => serve(&app, bind).await,
        Command::Sync { ids } => sync(&app, &ids).await,
        Command::Status { ids, batch } => status(&app, &ids, batch.as_deref()).await,
        Command::Register { id, title, slug, database } => register(&app, id, title, slug, database).await,
        Command::Menu { id, name, include_root } => menu(&app, &id, name, include_root).await,
    };
    app.close().await;
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn serve(app: &App, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| app.config.server.bind.clone());
    let router = tether_http::app(app.http_state(), app.config.route_prefix());
    tether_http::serve(router, &bind, shutdown_signal()).await.or_raise(|| ErrorKind::Server)
}

async fn sync(app: &App, ids: &[String]) -> Result<()> {
    let orchestrator = app.orchestrator()?;
    let batch = app.batches.create(ids).await.or_raise(|| ErrorKind::Sync)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "batch {}", batch.batch_id).or_raise(|| ErrorKind::Output)?;

    let mut events = Box::pin(run_batch(&orchestrator, &app.batches, &batch.batch_id));
    while let Some(event) = events.next().await {
        let written = match event.or_raise(|| ErrorKind::Sync)? {
            BatchEvent::Started => Ok(()),
            BatchEvent::Discovered(total) => writeln!(out, "syncing {total} page(s)"),
            BatchEvent::Item { remote_id, local_content_id: Some(local), error: None } => {
                writeln!(out, "  ok      {remote_id} -> {local}")
            },
            BatchEvent::Item { remote_id, local_content_id, error } => {
                let local = local_content_id.map(|id| format!(" (local {id})")).unwrap_or_default();
                writeln!(out, "  failed  {remote_id}{local}: {}", error.unwrap_or_default())
            },
            BatchEvent::Complete(done) => {
                writeln!(out, "done: {} synced, {} failed", done.successful, done.failed).or_raise(|| ErrorKind::Output)?;
                if done.failed > 0 {
                    exn::bail!(ErrorKind::BatchItems(done.failed, done.total));
                }
                Ok(())
            },
            BatchEvent::Aborted(reason) => {
                writeln!(out, "aborted: {}", reason.as_deref().unwrap_or("batch was marked failed"))
            },
        };
        written.or_raise(|| ErrorKind::Output)?;
    }
    Ok(())
}

async fn status(app: &App, ids: &[String], batch: Option<&str>) -> Result<()> {
    let report = app.status().status_for_many(ids, batch).await;
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &report).or_raise(|| ErrorKind::Output)?;
    writeln!(out).or_raise(|| ErrorKind::Output)
}

async fn register(app: &App, id: String, title: String, slug: Option<String>, database: bool) -> Result<()> {
    let kind = if database { RemoteType::Database } else { RemoteType::Page };
    let mut registration = Registration::new(id.as_str(), title, kind);
    if let Some(slug) = slug {
        registration = registration.with_slug(slug);
    }
    let entry_id = app.registry.register(registration).await.or_raise(|| ErrorKind::Register)?;
    let entry = app.registry.find_by_id(entry_id).await.ok_or_else(|| exn::Exn::from(ErrorKind::Register))?;
    writeln!(std::io::stdout(), "/{}/{}", app.config.route_prefix(), entry.slug).or_raise(|| ErrorKind::Output)
}

async fn menu(app: &App, id: &str, name: Option<String>, include_root: bool) -> Result<()> {
    let hierarchy = app.hierarchy();
    let root = hierarchy.find_root(id).await.or_raise(|| ErrorKind::Menu)?;
    let tree = hierarchy.build_tree(root.compact()).await.or_raise(|| ErrorKind::Menu)?;
    let name = name.unwrap_or_else(|| app.config.menu.name.clone());
    let include_root = include_root || app.config.menu.include_root;
    let summary = app.menus().sync_menu(&name, &tree, include_root).await.or_raise(|| ErrorKind::Menu)?;
    writeln!(
        std::io::stdout(),
        "menu {name:?} ({}): {} page(s), {} created, {} updated, {} deleted",
        summary.menu_id,
        tree.len(),
        summary.created,
        summary.updated,
        summary.deleted,
    )
    .or_raise(|| ErrorKind::Output)
}
