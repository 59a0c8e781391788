//! Mutations and the hooks that run around them.
//!
//! A [`Mutation`](./struct.Mutation.html) pairs a function that writes to the server with a
//! [`MutationLifecycle`](./trait.MutationLifecycle.html) that keeps the cache in step with it.
//! [`OptimisticAppend`](./struct.OptimisticAppend.html) is the lifecycle for adding an item to a
//! cached list before the server has confirmed it.

use crate::{
    error::ClientError,
    utils::{spawn, try_spawn},
    QueryClient, QueryError, QueryKey
};
use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::{future::Future, marker::PhantomData, sync::Arc};
use tracing::{debug, warn};

mod optimistic;

pub use optimistic::{Collection, MutationPhase, OptimisticAppend, Provisional, Snapshot};

type MutationFn<V, R> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<R, QueryError>> + Send + Sync>;

/// Hooks that run around a mutation.
///
/// `on_mutate` runs before the request is sent and produces a context that is handed to
/// `on_success` or `on_error`. `on_settled` runs last, whatever the outcome. The caller of
/// [`Mutation::mutate`](./struct.Mutation.html#method.mutate) only gets the result once every
/// hook has finished.
#[async_trait]
pub trait MutationLifecycle<V, R>: Send + Sync + 'static
where
    V: Send + Sync + 'static,
    R: Send + Sync + 'static
{
    type Context: Send + Sync + 'static;

    async fn on_mutate(&self, client: &QueryClient, variables: &V) -> Self::Context;

    async fn on_success(
        &self,
        _client: &QueryClient,
        _data: &R,
        _variables: &V,
        _context: &Self::Context
    ) {
    }

    async fn on_error(
        &self,
        _client: &QueryClient,
        _error: &QueryError,
        _variables: &V,
        _context: Self::Context
    ) {
    }

    async fn on_settled(&self, _client: &QueryClient, _variables: &V) {}
}

/// The lifecycle that does nothing.
#[async_trait]
impl<V, R> MutationLifecycle<V, R> for ()
where
    V: Send + Sync + 'static,
    R: Send + Sync + 'static
{
    type Context = ();

    async fn on_mutate(&self, _client: &QueryClient, _variables: &V) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error
}

struct MutationState<R> {
    status: MutationStatus,
    data: Option<R>,
    error: Option<QueryError>
}

impl<R> Default for MutationState<R> {
    fn default() -> Self {
        MutationState {
            status: MutationStatus::Idle,
            data: None,
            error: None
        }
    }
}

/// A reusable mutation. Every call to [`mutate`](#method.mutate) is an independent attempt;
/// overlapping calls are not deduplicated, and the status reflects the one that finished last.
pub struct Mutation<V, R, L = ()> {
    client: QueryClient,
    mutation_fn: MutationFn<V, R>,
    lifecycle: Arc<L>,
    state: Arc<Mutex<MutationState<R>>>,
    v: PhantomData<fn(V)>
}

impl<V, R, L> Clone for Mutation<V, R, L> {
    fn clone(&self) -> Self {
        Mutation {
            client: self.client.clone(),
            mutation_fn: self.mutation_fn.clone(),
            lifecycle: self.lifecycle.clone(),
            state: self.state.clone(),
            v: PhantomData
        }
    }
}

impl<V, R, L> Mutation<V, R, L>
where
    V: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    L: MutationLifecycle<V, R>
{
    pub fn new<F, Fut>(client: QueryClient, mutation_fn: F, lifecycle: L) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, QueryError>> + Send + 'static
    {
        Mutation {
            client,
            mutation_fn: Arc::new(move |variables| mutation_fn(variables).boxed()),
            lifecycle: Arc::new(lifecycle),
            state: Arc::new(Mutex::new(MutationState::default())),
            v: PhantomData
        }
    }

    /// Swaps the lifecycle, keeping the mutation function. Resets the status.
    pub fn with_lifecycle<L2: MutationLifecycle<V, R>>(self, lifecycle: L2) -> Mutation<V, R, L2> {
        Mutation {
            client: self.client,
            mutation_fn: self.mutation_fn,
            lifecycle: Arc::new(lifecycle),
            state: Arc::new(Mutex::new(MutationState::default())),
            v: PhantomData
        }
    }

    /// Runs the mutation. The error of a failed attempt is returned after `on_error` and
    /// `on_settled` have run, so the cache is consistent again by the time the caller sees it.
    ///
    /// Dropping the returned future while the request is in flight drops the request too. The
    /// attempt then fails with `ClientError::Abandoned`, and `on_error` and `on_settled` run in
    /// the background. Once the server has answered, the remaining hooks finish even if the
    /// future is dropped.
    pub async fn mutate(&self, variables: V) -> Result<R, QueryError> {
        {
            let mut state = self.state.lock();
            state.status = MutationStatus::Pending;
            state.error = None;
        }

        let mut guard = AttemptGuard {
            attempt: Attempt {
                client: self.client.clone(),
                lifecycle: self.lifecycle.clone(),
                state: self.state.clone(),
                variables: variables.clone()
            },
            context: None,
            armed: true
        };
        guard.context = Some(self.lifecycle.on_mutate(&self.client, &variables).await);
        let result = (self.mutation_fn)(variables).await;
        let (attempt, context) = guard.disarm();

        match spawn(attempt.settle(result, context)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ClientError::Message(e.to_string()).into())
        }
    }

    pub fn status(&self) -> MutationStatus {
        self.state.lock().status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == MutationStatus::Pending
    }

    /// The data returned by the last successful attempt.
    pub fn data(&self) -> Option<R> {
        self.state.lock().data.clone()
    }

    /// The error of the last attempt, if it failed.
    pub fn error(&self) -> Option<QueryError> {
        self.state.lock().error.clone()
    }

    pub fn reset(&self) {
        *self.state.lock() = MutationState::default();
    }
}

/// Everything a single `mutate` call needs after the request has been sent.
struct Attempt<V, R, L> {
    client: QueryClient,
    lifecycle: Arc<L>,
    state: Arc<Mutex<MutationState<R>>>,
    variables: V
}

impl<V: Clone, R, L> Clone for Attempt<V, R, L> {
    fn clone(&self) -> Self {
        Attempt {
            client: self.client.clone(),
            lifecycle: self.lifecycle.clone(),
            state: self.state.clone(),
            variables: self.variables.clone()
        }
    }
}

impl<V, R, L> Attempt<V, R, L>
where
    V: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    L: MutationLifecycle<V, R>
{
    /// Runs the hooks that follow the request and records the outcome. `context` is `None` if
    /// `on_mutate` never finished, in which case `on_error` is skipped.
    async fn settle(
        self,
        result: Result<R, QueryError>,
        context: Option<L::Context>
    ) -> Result<R, QueryError> {
        match (&result, context) {
            (Ok(data), Some(context)) => {
                debug!("mutation succeeded");
                self.lifecycle
                    .on_success(&self.client, data, &self.variables, &context)
                    .await;
            }
            (Ok(_), None) => {}
            (Err(e), context) => {
                warn!(error = %e, "mutation failed");
                if let Some(context) = context {
                    self.lifecycle
                        .on_error(&self.client, e, &self.variables, context)
                        .await;
                }
            }
        }
        self.lifecycle.on_settled(&self.client, &self.variables).await;

        let mut state = self.state.lock();
        match result {
            Ok(ref data) => {
                state.status = MutationStatus::Success;
                state.data = Some(data.clone());
            }
            Err(ref e) => {
                state.status = MutationStatus::Error;
                state.error = Some(e.clone());
            }
        }
        result
    }
}

/// Settles an attempt whose `mutate` future was dropped before the server answered.
struct AttemptGuard<V, R, L>
where
    V: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    L: MutationLifecycle<V, R>
{
    attempt: Attempt<V, R, L>,
    context: Option<L::Context>,
    armed: bool
}

impl<V, R, L> AttemptGuard<V, R, L>
where
    V: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    L: MutationLifecycle<V, R>
{
    fn disarm(mut self) -> (Attempt<V, R, L>, Option<L::Context>) {
        self.armed = false;
        (self.attempt.clone(), self.context.take())
    }
}

impl<V, R, L> Drop for AttemptGuard<V, R, L>
where
    V: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    L: MutationLifecycle<V, R>
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!("mutation dropped before the server answered");
        let attempt = self.attempt.clone();
        let context = self.context.take();
        let settle = async move {
            let _ = attempt.settle(Err(ClientError::Abandoned.into()), context).await;
        };
        if !try_spawn(settle) {
            warn!("no runtime to roll back the dropped mutation on");
            let mut state = self.attempt.state.lock();
            state.status = MutationStatus::Error;
            state.error = Some(ClientError::Abandoned.into());
        }
    }
}

impl QueryClient {
    /// Creates a mutation without any cache hooks.
    pub fn mutation<V, R, F, Fut>(&self, mutation_fn: F) -> Mutation<V, R>
    where
        V: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, QueryError>> + Send + 'static
    {
        Mutation::new(self.clone(), mutation_fn, ())
    }

    /// Creates a mutation that appends its input to the collection cached under `key` before the
    /// request is sent, rolls it back if the request fails and refetches `key` once it settles.
    ///
    /// ```
    /// # tokio_test::block_on(async {
    /// use sidekick::{mutation::Provisional, QueryClient, QueryError};
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// struct Todo {
    ///     id: usize,
    ///     title: String
    /// }
    ///
    /// impl Provisional for Todo {
    ///     fn assign_provisional_id(&mut self, collection_len: usize) {
    ///         self.id = collection_len + 1;
    ///     }
    /// }
    ///
    /// let client = QueryClient::new();
    /// client.set_query_data("todos", vec![Todo { id: 1, title: "Write docs".into() }]);
    ///
    /// let add_todo = client.optimistic_append::<Vec<Todo>, _, _, _>("todos", |todo: Todo| async move {
    ///     Err::<Todo, _>(QueryError::msg("offline"))
    /// });
    /// let result = add_todo.mutate(Todo { id: 0, title: "Ship it".into() }).await;
    ///
    /// assert!(result.is_err());
    /// let todos: Vec<Todo> = client.get_query_data("todos").unwrap();
    /// assert_eq!(todos.len(), 1);
    /// # });
    /// ```
    pub fn optimistic_append<C, R, F, Fut>(
        &self,
        key: impl Into<QueryKey>,
        mutation_fn: F
    ) -> Mutation<C::Item, R, OptimisticAppend<C>>
    where
        C: Collection + Clone + Send + Sync + 'static,
        C::Item: Provisional + Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, QueryError>> + Send + 'static
    {
        Mutation::new(self.clone(), mutation_fn, OptimisticAppend::new(key))
    }
}
