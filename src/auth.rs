//! Credential acquisition and request signing seam (spec §1 non-goal:
//! "credential acquisition and signing (IAM and username/password
//! authenticators)").

use crate::errors::Result;
use async_trait::async_trait;

/// Produces the auth header content for one request and, when it changes,
/// a hash the server uses to detect a stale token (spec §6.1 "optional
/// auth-content hash").
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn auth_string(&self) -> Result<String>;

    /// True when the cached auth content hash must be recomputed and resent
    /// (e.g. after a token refresh). Defaults to "always resend".
    fn content_changed(&self) -> bool {
        true
    }
}

/// An authenticator that always reports the same fixed string, useful for
/// on-premise secure-or-plain deployments with a static credential and in
/// tests that don't exercise signing.
#[derive(Debug, Clone)]
pub struct FixedAuthenticator {
    content: String,
}

impl FixedAuthenticator {
    pub fn new(content: impl Into<String>) -> Self {
        FixedAuthenticator {
            content: content.into(),
        }
    }
}

#[async_trait]
impl Authenticator for FixedAuthenticator {
    async fn auth_string(&self) -> Result<String> {
        Ok(self.content.clone())
    }

    fn content_changed(&self) -> bool {
        false
    }
}
