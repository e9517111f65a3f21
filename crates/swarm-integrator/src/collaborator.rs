//! Pull-request creation is delegated to whatever forge API the node is
//! configured against; the integrator only needs a yes/no answer and a URL.

use async_trait::async_trait;

#[async_trait]
pub trait GitCollaborator: Send + Sync {
    /// Opens a pull request for `branch` against the default branch.
    /// Returns `Ok(None)` when no PR should be opened (auto-merge tasks
    /// never call this).
    async fn open_pull_request(&self, branch: &str, title: &str) -> Result<Option<String>, String>;
}

/// Used when no forge integration is configured: integration still
/// succeeds, just without a PR URL attached.
pub struct NoopCollaborator;

#[async_trait]
impl GitCollaborator for NoopCollaborator {
    async fn open_pull_request(&self, _branch: &str, _title: &str) -> Result<Option<String>, String> {
        Ok(None)
    }
}
