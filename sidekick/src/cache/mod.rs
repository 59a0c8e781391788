//! The query cache. It stores one type-erased value per [`QueryKey`](../struct.QueryKey.html)
//! along with the bookkeeping needed to deduplicate, cancel and refetch the request that fills it.
//!
//! Every operation takes the lock once and does all of its work inside it, so a reader never
//! sees a read-modify-write half done.

use crate::{error::ClientError, QueryError, QueryKey};
use futures::{
    channel::{mpsc, oneshot},
    future::{AbortHandle, AbortRegistration, BoxFuture}
};
use parking_lot::Mutex;
use stable_vec::StableVec;
use std::{
    any::Any,
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc
    },
    time::{Duration, Instant}
};
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;
pub(crate) type AnyResult = Result<AnyData, QueryError>;
/// A fetcher with its output type erased, so it can be stored next to the entry and rerun when
/// the entry is invalidated.
pub(crate) type Refetch = Arc<dyn Fn() -> BoxFuture<'static, AnyResult> + Send + Sync>;
pub(crate) type Listener = mpsc::UnboundedSender<Option<AnyData>>;

pub(crate) fn downcast<T: Clone + 'static>(data: &AnyData) -> Option<T> {
    (**data).downcast_ref::<T>().cloned()
}

struct InFlight {
    generation: u64,
    abort: AbortHandle,
    waiters: Vec<oneshot::Sender<AnyResult>>
}

impl InFlight {
    fn cancel(self, key: &QueryKey) {
        self.abort.abort();
        for waiter in self.waiters {
            let _ = waiter.send(Err(ClientError::Cancelled(key.clone()).into()));
        }
    }
}

struct CacheEntry {
    id: u64,
    data: Option<AnyData>,
    updated_at: Option<Instant>,
    invalidated: bool,
    error: Option<QueryError>,
    generation: u64,
    in_flight: Option<InFlight>,
    fetcher: Option<Refetch>,
    listeners: StableVec<Listener>
}

impl CacheEntry {
    fn new(id: u64) -> Self {
        CacheEntry {
            id,
            data: None,
            updated_at: None,
            invalidated: false,
            error: None,
            generation: 0,
            in_flight: None,
            fetcher: None,
            listeners: StableVec::new()
        }
    }

    fn write(&mut self, data: Option<AnyData>) {
        self.updated_at = data.as_ref().map(|_| Instant::now());
        self.data = data;
        self.invalidated = false;
        self.error = None;
        for listener in self.listeners.values() {
            // A closed receiver is unregistered by its observable when dropped
            let _ = listener.unbounded_send(self.data.clone());
        }
    }

    fn typed<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let data = self.data.as_ref()?;
        let typed = downcast::<T>(data);
        if typed.is_none() {
            warn!(key = %key, "cached data has a different type than requested");
        }
        typed
    }
}

/// A cached value together with the metadata needed to decide if it's still fresh.
pub(crate) struct Cached {
    pub data: AnyData,
    pub updated_at: Option<Instant>,
    pub invalidated: bool
}

impl Cached {
    pub fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated
            && self
                .updated_at
                .map_or(false, |updated_at| updated_at.elapsed() < stale_time)
    }
}

pub(crate) enum BeginFetch {
    /// Another fetch for the key is running. The receiver resolves with its result.
    Join(oneshot::Receiver<AnyResult>),
    /// The caller runs the fetch and must report back with `finish_fetch` or `abandon_fetch`.
    Lead {
        generation: u64,
        registration: AbortRegistration
    }
}

/// A listener registration. The entry ID guards against unsubscribing from an entry that was
/// removed and recreated under the same key.
pub(crate) struct Subscription {
    pub entry_id: u64,
    pub index: usize,
    pub receiver: mpsc::UnboundedReceiver<Option<AnyData>>
}

pub(crate) struct QueryCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    next_entry_id: AtomicU64
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache {
            entries: Mutex::new(HashMap::new()),
            next_entry_id: AtomicU64::new(0)
        }
    }

    fn entry<'a>(
        &self,
        entries: &'a mut HashMap<QueryKey, CacheEntry>,
        key: &QueryKey
    ) -> &'a mut CacheEntry {
        entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(self.next_entry_id.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn get<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let entries = self.entries.lock();
        entries.get(key).and_then(|entry| entry.typed::<T>(key))
    }

    pub fn peek(&self, key: &QueryKey) -> Option<Cached> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        entry.data.as_ref().map(|data| Cached {
            data: data.clone(),
            updated_at: entry.updated_at,
            invalidated: entry.invalidated
        })
    }

    pub fn last_error(&self, key: &QueryKey) -> Option<QueryError> {
        let entries = self.entries.lock();
        entries.get(key).and_then(|entry| entry.error.clone())
    }

    pub fn set<T: Send + Sync + 'static>(&self, key: &QueryKey, data: T) {
        let mut entries = self.entries.lock();
        let entry = self.entry(&mut entries, key);
        entry.write(Some(Arc::new(data)));
        debug!(key = %key, "wrote query data");
    }

    /// Runs `updater` against the current value and stores what it returns. Returning `None`
    /// clears the entry's data.
    pub fn update<T, F>(&self, key: &QueryKey, updater: F)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Option<T>) -> Option<T>
    {
        let mut entries = self.entries.lock();
        let entry = self.entry(&mut entries, key);
        let current = entry.typed::<T>(key);
        let next = updater(current).map(|data| -> AnyData { Arc::new(data) });
        entry.write(next);
        debug!(key = %key, "updated query data");
    }

    /// Like `update`, but returns the value that was replaced. The read and the write happen
    /// under the same lock, so nothing can be written between them.
    pub fn replace<T, F>(&self, key: &QueryKey, updater: F) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Option<&T>) -> Option<T>
    {
        let mut entries = self.entries.lock();
        let entry = self.entry(&mut entries, key);
        let previous = entry.typed::<T>(key);
        let next = updater(previous.as_ref()).map(|data| -> AnyData { Arc::new(data) });
        entry.write(next);
        debug!(key = %key, "replaced query data");
        previous
    }

    pub fn register_fetcher(&self, key: &QueryKey, fetcher: Refetch) {
        let mut entries = self.entries.lock();
        let entry = self.entry(&mut entries, key);
        entry.fetcher = Some(fetcher);
    }

    pub fn begin_fetch(&self, key: &QueryKey) -> BeginFetch {
        let mut entries = self.entries.lock();
        let entry = self.entry(&mut entries, key);
        if let Some(in_flight) = entry.in_flight.as_mut() {
            let (sender, receiver) = oneshot::channel();
            in_flight.waiters.push(sender);
            return BeginFetch::Join(receiver);
        }

        entry.generation += 1;
        let (abort, registration) = AbortHandle::new_pair();
        entry.in_flight = Some(InFlight {
            generation: entry.generation,
            abort,
            waiters: Vec::new()
        });
        BeginFetch::Lead {
            generation: entry.generation,
            registration
        }
    }

    /// Stores the result of a fetch and hands it to everyone who joined it. Returns `false`
    /// without touching the entry if the fetch was cancelled in the meantime.
    pub fn finish_fetch(&self, key: &QueryKey, generation: u64, result: &AnyResult) -> bool {
        let mut entries = self.entries.lock();
        let entry = match entries.get_mut(key) {
            Some(entry) => entry,
            None => return false
        };
        let is_current = entry
            .in_flight
            .as_ref()
            .map_or(false, |in_flight| in_flight.generation == generation);
        if !is_current {
            return false;
        }

        let in_flight = entry.in_flight.take();
        match result {
            Ok(data) => entry.write(Some(data.clone())),
            Err(e) => entry.error = Some(e.clone())
        }
        if let Some(in_flight) = in_flight {
            for waiter in in_flight.waiters {
                let _ = waiter.send(result.clone());
            }
        }
        true
    }

    /// Releases the fetch slot of a leader that went away without a result.
    pub fn abandon_fetch(&self, key: &QueryKey, generation: u64) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            let is_current = entry
                .in_flight
                .as_ref()
                .map_or(false, |in_flight| in_flight.generation == generation);
            if is_current {
                if let Some(in_flight) = entry.in_flight.take() {
                    in_flight.cancel(key);
                }
            }
        }
    }

    /// Cancels every in-flight fetch whose key starts with `prefix`. Returns how many were
    /// cancelled.
    pub fn cancel(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.lock();
        let mut cancelled = 0;
        for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            if let Some(in_flight) = entry.in_flight.take() {
                debug!(key = %key, generation = in_flight.generation, "cancelled fetch");
                in_flight.cancel(key);
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Marks every entry whose key starts with `prefix` as stale and cancels its in-flight
    /// fetch. Returns the entries that know how to refetch themselves.
    pub fn invalidate(&self, prefix: &QueryKey) -> Vec<(QueryKey, Refetch)> {
        let mut entries = self.entries.lock();
        let mut to_refetch = Vec::new();
        for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            entry.invalidated = true;
            if let Some(in_flight) = entry.in_flight.take() {
                in_flight.cancel(key);
            }
            if let Some(ref fetcher) = entry.fetcher {
                to_refetch.push((key.clone(), fetcher.clone()));
            }
        }
        to_refetch
    }

    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.lock();
        let keys: Vec<QueryKey> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        for key in keys.iter() {
            if let Some(mut entry) = entries.remove(key) {
                if let Some(in_flight) = entry.in_flight.take() {
                    in_flight.cancel(key);
                }
            }
        }
        keys.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        for (key, mut entry) in entries.drain() {
            if let Some(in_flight) = entry.in_flight.take() {
                in_flight.cancel(&key);
            }
        }
    }

    pub fn is_fetching(&self, prefix: &QueryKey) -> usize {
        let entries = self.entries.lock();
        entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.in_flight.is_some())
            .count()
    }

    /// Registers a listener that receives every future write to `key`. The current value, if
    /// any, is sent right away.
    pub fn subscribe(&self, key: &QueryKey) -> Subscription {
        let (sender, receiver) = mpsc::unbounded();
        let mut entries = self.entries.lock();
        let entry = self.entry(&mut entries, key);
        if let Some(ref data) = entry.data {
            let _ = sender.unbounded_send(Some(data.clone()));
        }
        let index = entry.listeners.push(sender);
        Subscription {
            entry_id: entry.id,
            index,
            receiver
        }
    }

    pub fn unsubscribe(&self, key: &QueryKey, entry_id: u64, index: usize) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            if entry.id == entry_id {
                entry.listeners.remove(index);
            }
        }
    }
}
