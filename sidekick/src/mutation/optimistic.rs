use crate::{mutation::MutationLifecycle, QueryClient, QueryError, QueryKey};
use std::{fmt, marker::PhantomData};
use tracing::debug;

/// A cached value that items can be appended to.
pub trait Collection: Default {
    type Item;

    fn len(&self) -> usize;
    fn push(&mut self, item: Self::Item);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Collection for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn push(&mut self, item: T) {
        Vec::push(self, item)
    }
}

/// An item that can stand in for itself before the server has assigned it an identity.
///
/// The placeholder is only shown until the collection is refetched, so it just has to be
/// distinguishable from the items already in the collection.
pub trait Provisional {
    fn assign_provisional_id(&mut self, collection_len: usize);
}

/// The cached collection as it was right before the optimistic write. `None` if nothing was
/// cached.
#[derive(Clone, Debug)]
pub struct Snapshot<C> {
    pub previous: Option<C>
}

/// The steps an optimistic append goes through, in order. `RolledBack` only happens when the
/// request fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationPhase {
    CancellingReads,
    SpeculativeApplied,
    RolledBack,
    Reconciling,
    Idle
}

impl fmt::Display for MutationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            MutationPhase::CancellingReads => "cancelling-reads",
            MutationPhase::SpeculativeApplied => "speculative-applied",
            MutationPhase::RolledBack => "rolled-back",
            MutationPhase::Reconciling => "reconciling",
            MutationPhase::Idle => "idle"
        };
        write!(f, "{}", phase)
    }
}

/// Appends the submitted item to the collection under `key` as soon as the mutation starts.
///
/// 1. Any fetch of `key` still in flight is cancelled, so a response read before the write
///    can't overwrite it.
/// 2. The item gets a provisional ID and is appended. The collection it replaced is kept as the
///    mutation's context.
/// 3. If the request fails, the collection is put back exactly as it was.
/// 4. Either way, `key` is invalidated and refetched, so the server's version replaces the
///    provisional item.
///
/// The rollback restores the snapshot taken by this mutation. If two mutations overlap and the
/// first one fails, its rollback also hides the second one's provisional item until the final
/// refetch brings it back.
pub struct OptimisticAppend<C> {
    key: QueryKey,
    c: PhantomData<fn() -> C>
}

impl<C> OptimisticAppend<C> {
    pub fn new(key: impl Into<QueryKey>) -> Self {
        OptimisticAppend {
            key: key.into(),
            c: PhantomData
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

#[async_trait]
impl<C, R> MutationLifecycle<C::Item, R> for OptimisticAppend<C>
where
    C: Collection + Clone + Send + Sync + 'static,
    C::Item: Provisional + Clone + Send + Sync + 'static,
    R: Send + Sync + 'static
{
    type Context = Snapshot<C>;

    async fn on_mutate(&self, client: &QueryClient, item: &C::Item) -> Snapshot<C> {
        debug!(key = %self.key, phase = %MutationPhase::CancellingReads);
        client.cancel_queries(self.key.clone()).await;

        let mut item = item.clone();
        let previous = client.replace_query_data::<C, _, _>(self.key.clone(), move |current| {
            let mut next = current.cloned().unwrap_or_default();
            item.assign_provisional_id(next.len());
            next.push(item);
            Some(next)
        });
        debug!(key = %self.key, phase = %MutationPhase::SpeculativeApplied, "appended provisional item");

        Snapshot { previous }
    }

    async fn on_error(
        &self,
        client: &QueryClient,
        _error: &QueryError,
        _item: &C::Item,
        snapshot: Snapshot<C>
    ) {
        let previous = snapshot.previous;
        client.update_query_data::<C, _, _>(self.key.clone(), move |_| previous);
        debug!(key = %self.key, phase = %MutationPhase::RolledBack, "restored snapshot");
    }

    async fn on_settled(&self, client: &QueryClient, _item: &C::Item) {
        debug!(key = %self.key, phase = %MutationPhase::Reconciling, "refetching");
        client.invalidate_queries(self.key.clone()).await;
        debug!(key = %self.key, phase = %MutationPhase::Idle);
    }
}
