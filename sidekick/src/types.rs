use std::time::{Duration, Instant};

/// Decides whether a query is answered from the cache, the network, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPolicy {
    /// Return cached data that is younger than `stale_time`, otherwise fetch.
    CacheFirst,
    /// Never fetch. Returns whatever is in the cache.
    CacheOnly,
    /// Always fetch, ignoring the cache.
    NetworkOnly,
    /// Return cached data immediately and refetch it in the background.
    /// Fetches in the foreground if nothing is cached yet.
    CacheAndNetwork
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Network
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    /// The query is disabled and didn't run.
    Idle,
    Success
}

/// Per-query overrides. Any field left as `None` falls back to the client default.
#[derive(Default, Clone, Debug)]
pub struct QueryOptions {
    pub request_policy: Option<RequestPolicy>,
    pub stale_time: Option<Duration>,
    pub retry: Option<u32>,
    pub retry_delay: Option<Duration>,
    /// Set to `false` to hold a query until its inputs are known, e.g. a query depending on the
    /// result of another one.
    pub enabled: Option<bool>
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_policy(mut self, request_policy: RequestPolicy) -> Self {
        self.request_policy = Some(request_policy);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}

/// Options after merging the per-query overrides with the client defaults.
#[derive(Clone, Debug)]
pub(crate) struct OperationOptions {
    pub request_policy: RequestPolicy,
    pub stale_time: Duration,
    pub retry: u32,
    pub retry_delay: Duration,
    pub enabled: bool
}

/// The outcome of a query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    pub source: ResultSource,
    /// When the returned data was last written to the cache.
    pub updated_at: Option<Instant>
}

impl<T> QueryResult<T> {
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    /// Projects the data, leaving the rest of the result untouched.
    ///
    /// ```
    /// # use sidekick::{QueryResult, QueryStatus, ResultSource};
    /// let result = QueryResult {
    ///     data: Some(vec![("Batman", "Bruce Wayne"), ("Superman", "Clark Kent")]),
    ///     status: QueryStatus::Success,
    ///     source: ResultSource::Network,
    ///     updated_at: None
    /// };
    /// let names = result.select(|heroes| heroes.into_iter().map(|(name, _)| name).collect::<Vec<_>>());
    /// assert_eq!(names.data, Some(vec!["Batman", "Superman"]));
    /// ```
    pub fn select<U, F: FnOnce(T) -> U>(self, f: F) -> QueryResult<U> {
        QueryResult {
            data: self.data.map(f),
            status: self.status,
            source: self.source,
            updated_at: self.updated_at
        }
    }
}
