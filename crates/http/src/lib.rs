//! Public HTTP surface: slug redirects and the status query.

pub mod error;
mod router;
mod server;

pub use crate::router::{Route, UrlRouter};
pub use crate::server::{AppState, app, serve};
