// External collaborator clients
//
// Everything the ordering core talks to over a network boundary lives
// here, behind injectable traits: the payment gateway, the restaurant
// live-order feed, and the audit trail. All outbound calls are bounded by
// EXTERNAL_CALL_TIMEOUT; a timeout is surfaced, never guessed into a
// success.

pub mod audit;
pub mod notify;
pub mod payment;

pub use audit::*;
pub use notify::*;
pub use payment::*;

use std::future::Future;
use std::time::Duration;

/// Upper bound on any single call to an external collaborator.
pub const EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a collaborator call with the standard bound; `None` on timeout.
pub async fn bounded<F, T>(future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(EXTERNAL_CALL_TIMEOUT, future).await.ok()
}
