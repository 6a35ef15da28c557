//! Session refresh and retry
//!
//! Every backend call goes through [`with_session_retry`]: a
//! session-expired answer triggers one silent refresh and exactly one
//! retry. Any other failure is returned untouched; generic failures are
//! never retried automatically.

use crate::backend::SessionRefresher;
use crate::error::{BackendError, BackendResult};
use approval_types::SessionContext;
use std::future::Future;

/// Run `call`, refreshing the session and retrying once on expiry.
pub async fn with_session_retry<T, F, Fut>(
    refresher: &dyn SessionRefresher,
    session: &SessionContext,
    op: &str,
    mut call: F,
) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BackendResult<T>>,
{
    match call().await {
        Err(BackendError::SessionExpired) => {
            tracing::warn!(op, principal = %session.principal, "Session expired, refreshing");
            refresher.refresh(session).await?;
            let result = call().await;
            if let Err(err) = &result {
                tracing::warn!(op, error = %err, "Retry after session refresh failed");
            }
            result
        }
        other => other,
    }
}
