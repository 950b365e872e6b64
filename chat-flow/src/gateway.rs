use async_trait::async_trait;

use crate::error::Result;
use crate::session::AudienceMode;

/// The hosted-model collaborator.
///
/// Implementations hold one conversation continuation at a time, scoped to an
/// audience mode: `generate` must restart the continuation whenever the
/// requested mode differs from the one it currently holds, and `reset` drops
/// it entirely. The session layer calls `reset` on every role, mode or
/// privacy transition.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send one prompt under the given audience mode and return the raw
    /// reply text, which is expected (but not guaranteed) to be JSON matching
    /// [`crate::schema::StructuredResponse`].
    async fn generate(&self, mode: AudienceMode, prompt: &str) -> Result<String>;

    /// Drop the current conversation continuation, if any.
    async fn reset(&self);
}
