use crate::{
    cache::{AnyResult, BeginFetch, QueryCache, Refetch},
    error::ClientError,
    types::OperationOptions,
    utils::retry_delay,
    QueryKey, QueryOptions
};
use futures::future::{Abortable, Aborted};
use tracing::{debug, warn};

pub(crate) struct ClientImpl {
    pub(crate) cache: QueryCache,
    pub(crate) defaults: OperationOptions
}

/// Releases the fetch slot if the leading future is dropped before it finishes, so anyone who
/// joined it isn't left waiting forever.
struct FetchGuard<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
    generation: u64,
    done: bool
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!(key = %self.key, "fetch dropped before completion");
            self.cache.abandon_fetch(self.key, self.generation);
        }
    }
}

impl ClientImpl {
    pub(crate) fn new(defaults: OperationOptions) -> Self {
        ClientImpl {
            cache: QueryCache::new(),
            defaults
        }
    }

    pub(crate) fn resolve_options(&self, options: QueryOptions) -> OperationOptions {
        OperationOptions {
            request_policy: options
                .request_policy
                .unwrap_or(self.defaults.request_policy),
            stale_time: options.stale_time.unwrap_or(self.defaults.stale_time),
            retry: options.retry.unwrap_or(self.defaults.retry),
            retry_delay: options.retry_delay.unwrap_or(self.defaults.retry_delay),
            enabled: options.enabled.unwrap_or(self.defaults.enabled)
        }
    }

    /// Runs `fetcher` for `key` unless an identical fetch is already running, in which case its
    /// result is shared. The result is only written to the cache if the fetch wasn't cancelled
    /// while it ran.
    pub(crate) async fn fetch_entry(
        &self,
        key: QueryKey,
        fetcher: Refetch,
        options: &OperationOptions
    ) -> AnyResult {
        let (generation, registration) = match self.cache.begin_fetch(&key) {
            BeginFetch::Join(receiver) => {
                debug!(key = %key, "joined in-flight fetch");
                return receiver
                    .await
                    .unwrap_or_else(|_| Err(ClientError::Cancelled(key.clone()).into()));
            }
            BeginFetch::Lead {
                generation,
                registration
            } => (generation, registration)
        };

        let mut guard = FetchGuard {
            cache: &self.cache,
            key: &key,
            generation,
            done: false
        };
        debug!(key = %key, generation, "fetching");
        let result = match Abortable::new(fetch_with_retry(&key, &fetcher, options), registration).await
        {
            Ok(result) => result,
            Err(Aborted) => Err(ClientError::Cancelled(key.clone()).into())
        };
        guard.done = true;

        if self.cache.finish_fetch(&key, generation, &result) {
            result
        } else {
            debug!(key = %key, generation, "discarded result of cancelled fetch");
            Err(ClientError::Cancelled(key.clone()).into())
        }
    }
}

async fn fetch_with_retry(
    key: &QueryKey,
    fetcher: &Refetch,
    options: &OperationOptions
) -> AnyResult {
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(data) => return Ok(data),
            Err(e) if e.is_cancelled() || attempt >= options.retry => {
                warn!(key = %key, error = %e, "fetch failed");
                return Err(e);
            }
            Err(e) => {
                let delay = retry_delay(options.retry_delay, attempt);
                debug!(key = %key, attempt, ?delay, error = %e, "fetch failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
