use std::{future::Future, time::Duration};
use tokio::{runtime::Handle, task::JoinHandle};

/// Upper bound for the exponential back-off between retries.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// The delay before retry number `attempt` (starting at 0): `base * 2^attempt`, capped at
/// [`MAX_RETRY_DELAY`](./constant.MAX_RETRY_DELAY.html).
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    1u32.checked_shl(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

pub(crate) fn spawn<T: Send + 'static>(fut: impl Future<Output = T> + Send + 'static) -> JoinHandle<T> {
    tokio::spawn(fut)
}

/// Spawns `fut` if there is a runtime to run it on. Safe to call from `Drop`.
pub(crate) fn try_spawn(fut: impl Future<Output = ()> + Send + 'static) -> bool {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
            true
        }
        Err(_) => false
    }
}
