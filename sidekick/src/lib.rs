//! An async query cache with deduplicated fetching, background refetching and optimistic
//! mutations
//!
//! # Getting Started
//!
//! Every piece of server state lives in the cache under a [`QueryKey`](./struct.QueryKey.html).
//! A query names its key and a fetcher that knows how to load the data; the client decides
//! whether the cached value is good enough or the fetcher has to run.
//!
//! ```
//! # tokio_test::block_on(async {
//! use sidekick::{query_key, QueryClient, QueryOptions};
//!
//! let client = QueryClient::builder()
//!     .with_retry(0)
//!     .build();
//!
//! let heroes = client
//!     .fetch_query("super-heroes", || async {
//!         Ok(vec!["Batman".to_string(), "Superman".to_string()])
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(heroes.data.unwrap().len(), 2);
//!
//! // The channel ID isn't known yet, so the query waits
//! let channel_id: Option<String> = None;
//! let courses = client
//!     .fetch_query_with_options(
//!         query_key!["courses", channel_id.clone().unwrap_or_default()],
//!         || async { Ok(vec!["react".to_string()]) },
//!         QueryOptions::new().enabled(channel_id.is_some())
//!     )
//!     .await
//!     .unwrap();
//! assert!(courses.is_idle());
//! # });
//! ```
//!
//! For more info see the relevant method and struct documentation.
//!
//! # Keys
//!
//! Keys are lists of strings and integers, like `["super-hero", 1]`. Operations that take a
//! filter (`cancel_queries`, `invalidate_queries`, `remove_queries`, `is_fetching`) match every
//! key that starts with it, so `"super-hero"` matches all individual heroes.
//!
//! # Fetching
//!
//! Identical queries that run at the same time share a single fetch. A failed fetch is retried
//! with exponential back-off, and cancelling a query guarantees its response is never written to
//! the cache, however late it arrives.
//!
//! # Mutations
//!
//! A [`Mutation`](./mutation/struct.Mutation.html) runs a write against the server. Its
//! [`MutationLifecycle`](./mutation/trait.MutationLifecycle.html) keeps the cache in step: the
//! built-in [`OptimisticAppend`](./mutation/struct.OptimisticAppend.html) shows a new item in
//! a cached list right away, rolls it back if the write fails and refetches the list once the
//! write has settled.
//!
//! # Features
//!
//! * `rest` **(default)** - Include [`RestClient`](./rest/struct.RestClient.html), a small JSON
//! client built on `reqwest` for writing fetchers.

//#![warn(missing_docs)]
//#![deny(warnings)]

#[macro_use]
extern crate async_trait;

mod cache;
pub mod client;
mod error;
mod key;
pub mod mutation;
#[cfg(feature = "rest")]
pub mod rest;
mod types;
pub mod utils;

pub use client::{Observable, QueryClient, QueryClientBuilder};
pub use error::{ClientError, QueryError, QueryErrorCompat};
pub use key::{KeyPart, QueryKey};
pub use mutation::{Mutation, MutationLifecycle, MutationStatus, OptimisticAppend};
#[cfg(feature = "rest")]
pub use rest::RestClient;
pub use types::{QueryOptions, QueryResult, QueryStatus, RequestPolicy, ResultSource};
