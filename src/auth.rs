//! Stream authentication seam.
//!
//! Issuing and verifying credentials belongs to an external service; the
//! pipeline only needs an authenticated principal before it hands out a
//! realtime subscription. `StreamGuard` is that seam. The built-in
//! implementation checks a shared token from the environment; a deployment
//! with a real identity provider plugs its own guard in here.

use std::sync::Arc;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
}

pub trait StreamGuard: Send + Sync {
    /// Validate the presented token and return the principal it names.
    fn authorize(&self, token: Option<&str>) -> Option<Principal>;
}

pub type DynStreamGuard = Arc<dyn StreamGuard>;

/// Accepts exactly the configured shared token.
pub struct SharedTokenGuard {
    secret: String,
}

impl SharedTokenGuard {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl StreamGuard for SharedTokenGuard {
    fn authorize(&self, token: Option<&str>) -> Option<Principal> {
        match token {
            Some(t) if !self.secret.is_empty() && t == self.secret => Some(Principal {
                subject: "stream-client".to_string(),
            }),
            _ => None,
        }
    }
}

/// Development guard: admits everyone.
pub struct AllowAllGuard;

impl StreamGuard for AllowAllGuard {
    fn authorize(&self, _token: Option<&str>) -> Option<Principal> {
        Some(Principal {
            subject: "anonymous".to_string(),
        })
    }
}

/// `STREAM_AUTH_TOKEN` set → shared-token guard; unset → open access with a
/// startup warning (local development).
pub fn build_guard_from_env() -> DynStreamGuard {
    match std::env::var("STREAM_AUTH_TOKEN") {
        Ok(secret) if !secret.is_empty() => Arc::new(SharedTokenGuard::new(secret)),
        _ => {
            warn!("STREAM_AUTH_TOKEN not set; realtime stream is unauthenticated");
            Arc::new(AllowAllGuard)
        }
    }
}
