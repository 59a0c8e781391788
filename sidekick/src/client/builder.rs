use crate::{
    client::{ClientImpl, QueryClient},
    types::OperationOptions,
    RequestPolicy
};
use std::{sync::Arc, time::Duration};

/// Builds a [`QueryClient`](./struct.QueryClient.html) with custom defaults.
///
/// The defaults are `CacheFirst` with a stale time of zero (so every query refetches unless a
/// longer stale time is set), three retries starting at one second, and queries enabled.
pub struct QueryClientBuilder {
    request_policy: RequestPolicy,
    stale_time: Duration,
    retry: u32,
    retry_delay: Duration
}

impl Default for QueryClientBuilder {
    fn default() -> Self {
        QueryClientBuilder {
            request_policy: RequestPolicy::CacheFirst,
            stale_time: Duration::from_secs(0),
            retry: 3,
            retry_delay: Duration::from_secs(1)
        }
    }
}

impl QueryClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_policy(mut self, request_policy: RequestPolicy) -> Self {
        self.request_policy = request_policy;
        self
    }

    /// How long fetched data counts as fresh for `CacheFirst` queries.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// How many times a failed fetch is retried before the error is returned.
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// The delay before the first retry. It doubles with every further attempt.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn build(self) -> QueryClient {
        let defaults = OperationOptions {
            request_policy: self.request_policy,
            stale_time: self.stale_time,
            retry: self.retry,
            retry_delay: self.retry_delay,
            enabled: true
        };

        QueryClient(Arc::new(ClientImpl::new(defaults)))
    }
}
