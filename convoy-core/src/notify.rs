use async_trait::async_trait;
use convoy_shared::RideEvent;

use crate::NotifyError;

/// Delivers ride events after a mutation commits. Callers treat failures as
/// best-effort and never roll back on them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &RideEvent) -> Result<(), NotifyError>;
}
