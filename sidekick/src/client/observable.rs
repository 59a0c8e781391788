use crate::{
    cache::{downcast, AnyData, Subscription},
    client::ClientImpl,
    QueryKey
};
use futures::{channel::mpsc::UnboundedReceiver, ready, task::Context, Stream, StreamExt};
use std::{marker::PhantomData, pin::Pin, sync::Arc, task::Poll};
use tracing::warn;

/// A stream of the values written to one cache entry.
///
/// Dropping it unregisters the listener. `None` means the data was cleared. Values of a
/// different type than `T` are skipped.
pub struct Observable<T> {
    inner: UnboundedReceiver<Option<AnyData>>,
    client: Arc<ClientImpl>,
    key: QueryKey,
    entry_id: u64,
    index: usize,
    t: PhantomData<fn() -> T>
}

impl<T> Observable<T> {
    pub(crate) fn new(key: QueryKey, subscription: Subscription, client: Arc<ClientImpl>) -> Self {
        Observable {
            inner: subscription.receiver,
            client,
            key,
            entry_id: subscription.entry_id,
            index: subscription.index,
            t: PhantomData
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<T: Clone + 'static> Stream for Observable<T> {
    type Item = Option<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Some(data)) => match downcast::<T>(&data) {
                    Some(value) => return Poll::Ready(Some(Some(value))),
                    None => warn!(key = %this.key, "skipping written value of a different type")
                },
                Some(None) => return Poll::Ready(Some(None)),
                None => return Poll::Ready(None)
            }
        }
    }
}

impl<T> Drop for Observable<T> {
    fn drop(&mut self) {
        self.client
            .cache
            .unsubscribe(&self.key, self.entry_id, self.index)
    }
}
