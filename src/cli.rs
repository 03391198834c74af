use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Keeps a local content store in step with a Notion workspace")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve public slug redirects and the status endpoint.
    Serve {
        /// Listen address, overriding `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Queue the given pages as a batch and sync them one by one.
    Sync {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show the sync status of pages.
    Status {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Also report this batch.
        #[arg(long)]
        batch: Option<String>,
    },
    /// Register a page (or database) so its slug routes before it is synced.
    Register {
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: Option<String>,
        /// The id is a database, not a page.
        #[arg(long)]
        database: bool,
    },
    /// Rebuild the navigation menu from the page tree containing ID.
    Menu {
        id: String,
        /// Menu name, overriding `menu.name`.
        #[arg(long)]
        name: Option<String>,
        /// Include the root page itself, overriding `menu.include_root`.
        #[arg(long)]
        include_root: bool,
    },
}
