use async_trait::async_trait;

use crate::shield::errors::ShieldError;
use crate::shield::types::ShieldBlock;

/// The host's session record, seen through the shield's namespaced block.
///
/// The shield never stores anything outside of this record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether a host session is active for this request
    async fn exists(&self) -> bool;

    async fn get_block(&self) -> Result<Option<ShieldBlock>, ShieldError>;

    async fn set_block(&mut self, block: ShieldBlock) -> Result<(), ShieldError>;

    /// Flush pending writes and re-read the authoritative record. Anything
    /// another request wrote in the meantime becomes visible afterwards.
    async fn reopen(&mut self) -> Result<(), ShieldError>;

    /// Drop the whole host session, shield block included
    async fn destroy_all(&mut self) -> Result<(), ShieldError>;
}

/// The host's authentication subsystem
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Logged-in member, 0 for anonymous
    async fn current_identity(&self) -> i64;

    /// Clear the authentication state of the current request
    async fn logout(&mut self) -> Result<(), ShieldError>;
}
