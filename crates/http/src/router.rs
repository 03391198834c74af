use tether_content::ContentHandle;
use tether_db::LinkRegistry;
use tether_ident::remote_url;
use tracing::instrument;

/// Where a public slug leads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    NotFound,
    /// Permalink of the synced local record.
    Local(String),
    /// The remote origin, for anything not (or no longer) available locally.
    Remote(String),
}
impl Route {
    /// Redirect target, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::NotFound => None,
            Self::Local(url) | Self::Remote(url) => Some(url),
        }
    }
}

/// Resolves public slugs to redirect targets.
///
/// A known slug always resolves to something: the local permalink when the
/// entry is synced and its record is still live, the remote origin otherwise.
#[derive(Clone)]
pub struct UrlRouter {
    registry: LinkRegistry,
    content: ContentHandle,
    remote_origin: String,
}

impl UrlRouter {
    pub fn new(registry: LinkRegistry, content: ContentHandle, remote_origin: impl Into<String>) -> Self {
        Self { registry, content, remote_origin: remote_origin.into() }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, slug: &str) -> Route {
        let Some(entry) = self.registry.find_by_slug(slug).await else {
            return Route::NotFound;
        };
        self.registry.increment_access(entry.id).await;

        if let (true, Some(local_id)) = (entry.is_synced(), entry.local_content_id) {
            match self.content.permalink(local_id).await {
                Ok(Some(url)) => return Route::Local(url),
                Ok(None) => {
                    tracing::info!(slug, local_id, "local content is gone, unlinking");
                    self.registry.mark_not_synced(&entry.remote_id_compact).await;
                },
                Err(e) => tracing::warn!(slug, local_id, error = %(*e), "could not resolve permalink"),
            }
        }
        Route::Remote(remote_url(&self.remote_origin, &entry.remote_id()))
    }
}
