use super::{AnyData, AnyResult, BeginFetch, QueryCache, Refetch};
use crate::{query_key, QueryError, QueryKey};
use futures::{future::BoxFuture, StreamExt};
use std::sync::Arc;

fn heroes() -> QueryKey {
    QueryKey::from("super-heroes")
}

fn any<T: Send + Sync + 'static>(data: T) -> AnyData {
    Arc::new(data)
}

#[test]
fn returns_none_for_unknown_keys() {
    let cache = QueryCache::new();
    assert_eq!(cache.get::<Vec<String>>(&heroes()), None);
}

#[test]
fn mismatched_types_read_as_none() {
    let cache = QueryCache::new();
    cache.set(&heroes(), vec!["Batman".to_string()]);

    assert_eq!(cache.get::<u32>(&heroes()), None);
    assert_eq!(
        cache.get::<Vec<String>>(&heroes()),
        Some(vec!["Batman".to_string()])
    );
}

#[test]
fn update_with_none_clears_data() {
    let cache = QueryCache::new();
    cache.set(&heroes(), 1u32);
    cache.update::<u32, _>(&heroes(), |_| None);

    assert_eq!(cache.get::<u32>(&heroes()), None);
    assert!(cache.peek(&heroes()).is_none());
}

#[test]
fn replace_returns_previous_value() {
    let cache = QueryCache::new();
    cache.set(&heroes(), vec![1u32]);

    let previous = cache.replace::<Vec<u32>, _>(&heroes(), |current| {
        let mut next = current.cloned().unwrap_or_default();
        next.push(2);
        Some(next)
    });

    assert_eq!(previous, Some(vec![1]));
    assert_eq!(cache.get::<Vec<u32>>(&heroes()), Some(vec![1, 2]));
}

#[tokio::test]
async fn second_fetch_joins_the_first() {
    let cache = QueryCache::new();

    let generation = match cache.begin_fetch(&heroes()) {
        BeginFetch::Lead { generation, .. } => generation,
        BeginFetch::Join(_) => panic!("First fetch should lead")
    };
    let receiver = match cache.begin_fetch(&heroes()) {
        BeginFetch::Join(receiver) => receiver,
        BeginFetch::Lead { .. } => panic!("Second fetch should join")
    };
    assert_eq!(cache.is_fetching(&heroes()), 1);

    assert!(cache.finish_fetch(&heroes(), generation, &Ok(any(7u32))));

    let joined = receiver.await.unwrap().unwrap();
    assert_eq!(joined.downcast_ref::<u32>(), Some(&7));
    assert_eq!(cache.get::<u32>(&heroes()), Some(7));
    assert_eq!(cache.is_fetching(&heroes()), 0);
}

#[tokio::test]
async fn cancelled_fetch_never_writes() {
    let cache = QueryCache::new();
    cache.set(&heroes(), 1u32);

    let generation = match cache.begin_fetch(&heroes()) {
        BeginFetch::Lead { generation, .. } => generation,
        BeginFetch::Join(_) => panic!("First fetch should lead")
    };
    let receiver = match cache.begin_fetch(&heroes()) {
        BeginFetch::Join(receiver) => receiver,
        BeginFetch::Lead { .. } => panic!("Second fetch should join")
    };

    assert_eq!(cache.cancel(&heroes()), 1);
    let joined = receiver.await.unwrap();
    assert!(joined.unwrap_err().is_cancelled());

    // The late response is dropped on the floor
    assert!(!cache.finish_fetch(&heroes(), generation, &Ok(any(2u32))));
    assert_eq!(cache.get::<u32>(&heroes()), Some(1));
}

#[test]
fn cancel_without_in_flight_fetch_is_a_no_op() {
    let cache = QueryCache::new();
    cache.set(&heroes(), 1u32);

    assert_eq!(cache.cancel(&heroes()), 0);
    assert_eq!(cache.get::<u32>(&heroes()), Some(1));
}

#[test]
fn invalidate_matches_by_prefix() {
    let cache = QueryCache::new();
    let fetcher: Refetch = Arc::new(|| -> BoxFuture<'static, AnyResult> {
        Box::pin(async { Ok::<AnyData, QueryError>(any(1u32)) })
    });
    cache.register_fetcher(&query_key!["super-hero", 1], fetcher.clone());
    cache.register_fetcher(&query_key!["super-hero", 2], fetcher);
    cache.set(&query_key!["super-hero", 3], 3u32);
    cache.set(&heroes(), 0u32);

    let targets = cache.invalidate(&QueryKey::from("super-hero"));
    let mut keys: Vec<String> = targets.iter().map(|(key, _)| key.to_string()).collect();
    keys.sort();

    assert_eq!(keys, vec![r#"["super-hero", 1]"#, r#"["super-hero", 2]"#]);
    assert!(cache.peek(&query_key!["super-hero", 3]).unwrap().invalidated);
    assert!(!cache.peek(&heroes()).unwrap().invalidated);
}

#[tokio::test]
async fn listeners_see_every_write() {
    let cache = QueryCache::new();
    cache.set(&heroes(), 1u32);

    let mut subscription = cache.subscribe(&heroes());
    cache.set(&heroes(), 2u32);
    cache.update::<u32, _>(&heroes(), |_| None);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let value = subscription.receiver.next().await.unwrap();
        seen.push(value.map(|data| *data.downcast_ref::<u32>().unwrap()));
    }
    assert_eq!(seen, vec![Some(1), Some(2), None]);

    cache.unsubscribe(&heroes(), subscription.entry_id, subscription.index);
    cache.set(&heroes(), 3u32);
    assert!(subscription.receiver.next().await.is_none());
}

#[test]
fn unsubscribe_ignores_recreated_entries() {
    let cache = QueryCache::new();
    let old = cache.subscribe(&heroes());
    cache.remove(&heroes());

    let new = cache.subscribe(&heroes());
    cache.unsubscribe(&heroes(), old.entry_id, old.index);

    cache.set(&heroes(), 1u32);
    drop(old);
    let mut receiver = new.receiver;
    assert!(receiver.try_next().unwrap().is_some());
}
