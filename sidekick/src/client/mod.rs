use crate::{
    cache::{downcast, AnyData, Refetch},
    error::ClientError,
    types::OperationOptions,
    utils::spawn,
    QueryError, QueryKey, QueryOptions, QueryResult, QueryStatus, RequestPolicy, ResultSource
};
use futures::{future::join_all, FutureExt};
use std::{future::Future, sync::Arc, time::Instant};
use tracing::{debug, warn};

mod builder;
mod r#impl;
mod observable;

pub use builder::QueryClientBuilder;
pub(crate) use r#impl::ClientImpl;
pub use observable::Observable;

/// The handle to a query cache and everything that reads or writes it.
///
/// Cloning is cheap and every clone shares the same cache, so pass it to wherever queries and
/// mutations run instead of keeping it in a global.
#[derive(Clone)]
#[repr(transparent)]
pub struct QueryClient(pub(crate) Arc<ClientImpl>);

impl Default for QueryClient {
    fn default() -> Self {
        QueryClientBuilder::default().build()
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Refetch
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, QueryError>> + Send + 'static
{
    Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|data| -> AnyData { Arc::new(data) }) }.boxed()
    })
}

fn from_cache<T: Clone + 'static>(
    data: Option<T>,
    updated_at: Option<Instant>,
    status: QueryStatus
) -> QueryResult<T> {
    QueryResult {
        data,
        status,
        source: ResultSource::Cache,
        updated_at
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryClientBuilder {
        QueryClientBuilder::new()
    }

    /// Fetches `key` with the client's default options. See
    /// [`fetch_query_with_options`](#method.fetch_query_with_options).
    pub async fn fetch_query<T, K, F, Fut>(&self, key: K, fetcher: F) -> Result<QueryResult<T>, QueryError>
    where
        T: Clone + Send + Sync + 'static,
        K: Into<QueryKey>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static
    {
        self.fetch_query_with_options(key, fetcher, QueryOptions::default())
            .await
    }

    /// Reads `key` from the cache or fetches it with `fetcher`, depending on the request policy.
    ///
    /// The fetcher is remembered, so invalidating the key later refetches it in the background.
    /// A disabled query leaves its fetcher out, and invalidation won't run it. Concurrent calls
    /// for the same key share a single fetch.
    ///
    /// ```
    /// # tokio_test::block_on(async {
    /// use sidekick::{QueryClient, QueryOptions};
    ///
    /// let client = QueryClient::new();
    /// let result = client
    ///     .fetch_query_with_options(
    ///         "super-heroes",
    ///         || async { Ok(vec!["Batman".to_string(), "Superman".to_string()]) },
    ///         QueryOptions::new().retry(0)
    ///     )
    ///     .await
    ///     .unwrap();
    ///
    /// assert_eq!(result.data.unwrap().len(), 2);
    /// # });
    /// ```
    pub async fn fetch_query_with_options<T, K, F, Fut>(
        &self,
        key: K,
        fetcher: F,
        options: QueryOptions
    ) -> Result<QueryResult<T>, QueryError>
    where
        T: Clone + Send + Sync + 'static,
        K: Into<QueryKey>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static
    {
        let key = key.into();
        let options = self.0.resolve_options(options);
        let fetcher = erase(fetcher);

        let cached = self.0.cache.peek(&key).and_then(|cached| {
            let data = downcast::<T>(&cached.data)?;
            Some((data, cached))
        });

        if !options.enabled {
            debug!(key = %key, "query is disabled");
            let (data, updated_at) = match cached {
                Some((data, cached)) => (Some(data), cached.updated_at),
                None => (None, None)
            };
            return Ok(from_cache(data, updated_at, QueryStatus::Idle));
        }
        self.0.cache.register_fetcher(&key, fetcher.clone());

        match (options.request_policy, cached) {
            (RequestPolicy::CacheOnly, cached) => {
                let (data, updated_at) = match cached {
                    Some((data, cached)) => (Some(data), cached.updated_at),
                    None => (None, None)
                };
                return Ok(from_cache(data, updated_at, QueryStatus::Success));
            }
            (RequestPolicy::CacheFirst, Some((data, cached)))
                if cached.is_fresh(options.stale_time) =>
            {
                return Ok(from_cache(Some(data), cached.updated_at, QueryStatus::Success));
            }
            (RequestPolicy::CacheAndNetwork, Some((data, cached))) => {
                self.refetch_in_background(key, fetcher, options);
                return Ok(from_cache(Some(data), cached.updated_at, QueryStatus::Success));
            }
            _ => {}
        }

        let data = self.0.fetch_entry(key.clone(), fetcher, &options).await?;
        let data = downcast::<T>(&data).ok_or(ClientError::TypeMismatch(key))?;
        Ok(QueryResult {
            data: Some(data),
            status: QueryStatus::Success,
            source: ResultSource::Network,
            updated_at: Some(Instant::now())
        })
    }

    /// Fetches several queries of the same type at once. Results are returned in input order.
    pub async fn fetch_queries<T, K, F, Fut>(
        &self,
        queries: Vec<(K, F)>
    ) -> Vec<Result<QueryResult<T>, QueryError>>
    where
        T: Clone + Send + Sync + 'static,
        K: Into<QueryKey>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static
    {
        join_all(
            queries
                .into_iter()
                .map(|(key, fetcher)| self.fetch_query(key, fetcher))
        )
        .await
    }

    /// Same as [`fetch_query`](#method.fetch_query), but only for its side effect of filling
    /// the cache. Errors are logged and dropped.
    pub async fn prefetch_query<T, K, F, Fut>(&self, key: K, fetcher: F)
    where
        T: Clone + Send + Sync + 'static,
        K: Into<QueryKey>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static
    {
        let key = key.into();
        if let Err(e) = self.fetch_query::<T, _, _, _>(key.clone(), fetcher).await {
            warn!(key = %key, error = %e, "prefetch failed");
        }
    }

    fn refetch_in_background(&self, key: QueryKey, fetcher: Refetch, options: OperationOptions) {
        let client = self.0.clone();
        spawn(async move {
            if let Err(e) = client.fetch_entry(key.clone(), fetcher, &options).await {
                if !e.is_cancelled() {
                    warn!(key = %key, error = %e, "background refetch failed");
                }
            }
        });
    }

    pub fn get_query_data<T: Clone + 'static, K: Into<QueryKey>>(&self, key: K) -> Option<T> {
        self.0.cache.get(&key.into())
    }

    /// The error of the last failed fetch for `key`. Cleared by the next successful write.
    pub fn get_query_error<K: Into<QueryKey>>(&self, key: K) -> Option<QueryError> {
        self.0.cache.last_error(&key.into())
    }

    /// Writes `data` under `key`. The write is visible to every reader and observable as soon as
    /// this returns.
    pub fn set_query_data<T: Send + Sync + 'static, K: Into<QueryKey>>(&self, key: K, data: T) {
        self.0.cache.set(&key.into(), data)
    }

    /// Replaces the data under `key` with whatever `updater` returns. Returning `None` clears it.
    pub fn update_query_data<T, K, F>(&self, key: K, updater: F)
    where
        T: Clone + Send + Sync + 'static,
        K: Into<QueryKey>,
        F: FnOnce(Option<T>) -> Option<T>
    {
        self.0.cache.update(&key.into(), updater)
    }

    /// Like [`update_query_data`](#method.update_query_data), but returns the value that was
    /// replaced. Nothing else can write to `key` between the read and the write.
    pub fn replace_query_data<T, K, F>(&self, key: K, updater: F) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
        K: Into<QueryKey>,
        F: FnOnce(Option<&T>) -> Option<T>
    {
        self.0.cache.replace(&key.into(), updater)
    }

    /// Cancels every in-flight fetch whose key starts with `key`. A response that arrives after
    /// this returns is never written to the cache. Does nothing if nothing is in flight.
    pub async fn cancel_queries<K: Into<QueryKey>>(&self, key: K) {
        let key = key.into();
        let cancelled = self.0.cache.cancel(&key);
        if cancelled > 0 {
            debug!(key = %key, cancelled, "cancelled queries");
        }
    }

    /// Marks every query whose key starts with `key` as stale and refetches the ones that have
    /// been fetched before. Resolves once the refetches have finished. Refetch errors are logged,
    /// and the failed entries keep their stale data.
    pub async fn invalidate_queries<K: Into<QueryKey>>(&self, key: K) {
        let key = key.into();
        let targets = self.0.cache.invalidate(&key);
        debug!(key = %key, refetching = targets.len(), "invalidated queries");

        let options = self.0.defaults.clone();
        let refetches = targets.into_iter().map(|(key, fetcher)| {
            let options = &options;
            async move {
                let result = self.0.fetch_entry(key.clone(), fetcher, options).await;
                (key, result)
            }
        });
        for (key, result) in join_all(refetches).await {
            if let Err(e) = result {
                warn!(key = %key, error = %e, "refetch after invalidation failed");
            }
        }
    }

    /// Drops every entry whose key starts with `key`, cancelling its fetch. Returns how many
    /// entries were removed.
    pub fn remove_queries<K: Into<QueryKey>>(&self, key: K) -> usize {
        self.0.cache.remove(&key.into())
    }

    pub fn clear(&self) {
        self.0.cache.clear()
    }

    /// How many queries whose key starts with `key` are fetching right now.
    pub fn is_fetching<K: Into<QueryKey>>(&self, key: K) -> usize {
        self.0.cache.is_fetching(&key.into())
    }

    /// Watches `key`, fetching it according to `options`. The returned stream yields the cached
    /// value first, if there is one, followed by every later write: fetches, background
    /// refetches after invalidation, optimistic updates and rollbacks. `None` means the data was
    /// cleared.
    pub fn watch_query<T, K, F, Fut>(&self, key: K, fetcher: F, options: QueryOptions) -> Observable<T>
    where
        T: Clone + Send + Sync + 'static,
        K: Into<QueryKey>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static
    {
        let key = key.into();
        let options = self.0.resolve_options(options);
        let fetcher = erase(fetcher);
        if options.enabled {
            self.0.cache.register_fetcher(&key, fetcher.clone());
        }
        let subscription = self.0.cache.subscribe(&key);

        let should_fetch = options.enabled
            && match (options.request_policy, self.0.cache.peek(&key)) {
                (RequestPolicy::CacheOnly, _) => false,
                (RequestPolicy::NetworkOnly, _) | (_, None) => true,
                (RequestPolicy::CacheFirst, Some(cached)) => !cached.is_fresh(options.stale_time),
                (RequestPolicy::CacheAndNetwork, Some(_)) => true
            };
        if should_fetch {
            self.refetch_in_background(key.clone(), fetcher, options);
        }

        Observable::new(key, subscription, self.0.clone())
    }
}
