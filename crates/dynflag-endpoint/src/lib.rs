//! HTTP introspection and mutation endpoint for dynamic flags.
//!
//! The endpoint lists every registered flag (HTML table, or JSON with
//! `?format=json`) and optionally accepts form-encoded set requests for
//! dynamic flags. It performs no authentication; gating the mount path is
//! the embedding server's responsibility.

pub mod error;
pub mod handlers;

pub use error::{EndpointError, EndpointResult};
pub use handlers::FlagInfo;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use dynflag::FlagSet;

struct Inner {
    flags: FlagSet,
    list_url: String,
    set_url: Option<String>,
}

/// Introspection and mutation surface over one [`FlagSet`].
///
/// Passing `None` (or an empty string) as the set URL disables mutation
/// entirely; the listing is still served.
#[derive(Clone)]
pub struct FlagsEndpoint {
    inner: Arc<Inner>,
}

impl FlagsEndpoint {
    pub fn new(flags: FlagSet, list_url: impl Into<String>, set_url: Option<&str>) -> Self {
        let set_url = set_url
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        Self {
            inner: Arc::new(Inner {
                flags,
                list_url: list_url.into(),
                set_url,
            }),
        }
    }

    pub fn flags(&self) -> &FlagSet {
        &self.inner.flags
    }

    pub fn list_url(&self) -> &str {
        &self.inner.list_url
    }

    pub fn set_url(&self) -> Option<&str> {
        self.inner.set_url.as_deref()
    }

    /// A router serving `GET` on the list URL and, when enabled, `POST` on
    /// the set URL, ready to merge into the embedder's router.
    pub fn router(&self) -> Router {
        let mut router = Router::new().route(&self.inner.list_url, get(handlers::list_flags));
        if let Some(set_url) = &self.inner.set_url {
            router = router.route(set_url, post(handlers::set_flag));
        }
        router.with_state(self.clone())
    }
}
