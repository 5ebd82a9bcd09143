//! Lock-contention retry for progress writes
//!
//! The progress store is written by job forwarders while SSE pollers read it.
//! WAL mode keeps readers out of the way, but a second writer can still hit
//! `SQLITE_BUSY`; those writes back off and try again.

use listgen_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const FIRST_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Run `operation` until it succeeds, fails with a non-lock error, or
/// `max_wait_ms` has passed since the first attempt
pub async fn retry_on_lock<F, Fut, T>(label: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    let mut backoff = FIRST_BACKOFF;
    let mut retries = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    debug!(operation = label, retries, "Write succeeded after lock retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_lock_error() => err,
            Err(err) => return Err(err),
        };

        let now = Instant::now();
        if now >= deadline {
            warn!(operation = label, retries, error = %err, "Giving up on locked database");
            return Err(Error::Internal(format!(
                "{}: database still locked after {} retries",
                label, retries
            )));
        }

        retries += 1;
        tokio::time::sleep(backoff.min(deadline - now)).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
