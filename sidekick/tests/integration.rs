use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sidekick::{
    mutation::Provisional, query_key, ClientError, QueryClient, QueryOptions, ResultSource,
    RestClient
};
use sidekick_test::{FakeBackend, Route};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hero {
    id: u64,
    name: String,
    alter_ego: String
}

impl Provisional for Hero {
    fn assign_provisional_id(&mut self, collection_len: usize) {
        self.id = collection_len as u64 + 1;
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    channel_id: String
}

#[derive(Clone, Debug, Deserialize)]
struct Channel {
    courses: Vec<String>
}

lazy_static! {
    static ref SEEDED_NAMES: Vec<&'static str> = vec!["Batman", "Superman", "Wonder Woman", "Flash"];
}

fn build_client() -> QueryClient {
    QueryClient::builder()
        .with_retry(0)
        .with_stale_time(Duration::from_secs(60))
        .build()
}

fn new_hero(name: &str, alter_ego: &str) -> Hero {
    Hero {
        id: 0,
        name: name.to_string(),
        alter_ego: alter_ego.to_string()
    }
}

async fn fetch_heroes(client: &QueryClient, api: &RestClient) -> Vec<Hero> {
    let api = api.clone();
    let result = client
        .fetch_query("super-heroes", move || {
            let api = api.clone();
            async move { api.get_json::<Vec<Hero>>("superheroes").await }
        })
        .await;

    assert!(result.is_ok(), "Query returned an error");
    result.unwrap().data.expect("Query didn't return any data")
}

#[tokio::test]
async fn test_query() {
    let backend = FakeBackend::start().await;
    let api = RestClient::new(&backend.url()).unwrap();
    let client = build_client();

    let heroes = fetch_heroes(&client, &api).await;

    let names: Vec<&str> = heroes.iter().map(|hero| hero.name.as_str()).collect();
    assert_eq!(names, *SEEDED_NAMES, "Returned the wrong heroes");
    assert_eq!(heroes[0].alter_ego, "Bruce Wayne", "Returned the wrong alter ego");
}

#[tokio::test]
async fn test_cache() {
    let backend = FakeBackend::start().await;
    let api = RestClient::new(&backend.url()).unwrap();
    let client = build_client();

    fetch_heroes(&client, &api).await;
    let result = client
        .fetch_query("super-heroes", || async {
            Err::<Vec<Hero>, _>(sidekick::QueryError::msg("Should have been cached"))
        })
        .await
        .unwrap();

    assert_eq!(result.source, ResultSource::Cache, "Result didn't come from the cache");
    assert_eq!(backend.hits(Route::SuperHeroes), 1, "List was fetched twice");
}

#[tokio::test]
async fn test_dedup() {
    let backend = FakeBackend::start().await;
    backend.set_delay(Duration::from_millis(50));
    let api = RestClient::new(&backend.url()).unwrap();
    let client = build_client();

    let fetch = |id: u64| {
        let api = api.clone();
        client.fetch_query(query_key!["super-hero", id], move || {
            let api = api.clone();
            async move { api.get_json::<Hero>(&format!("superheroes/{}", id)).await }
        })
    };
    let (first, second, third) = futures::join!(fetch(1), fetch(1), fetch(3));

    assert_eq!(first.unwrap().data.unwrap().name, "Batman");
    assert_eq!(second.unwrap().data.unwrap().name, "Batman");
    assert_eq!(third.unwrap().data.unwrap().name, "Wonder Woman");
    assert_eq!(backend.hits(Route::SuperHero), 2, "Identical queries weren't deduplicated");
}

#[tokio::test]
async fn test_status_error() {
    let backend = FakeBackend::start().await;
    let api = RestClient::new(&backend.url()).unwrap();
    let client = build_client();

    let err = client
        .fetch_query(query_key!["super-hero", 99], move || {
            let api = api.clone();
            async move { api.get_json::<Hero>("superheroes/99").await }
        })
        .await
        .unwrap_err();

    match err.kind() {
        Some(ClientError::Status { status, .. }) => assert_eq!(*status, 404),
        other => panic!("Expected a status error, got {:?}", other)
    }
    assert!(
        client.get_query_error(query_key!["super-hero", 99]).is_some(),
        "Error wasn't recorded"
    );
}

#[tokio::test]
async fn test_dependent_query() {
    let backend = FakeBackend::start().await;
    let api = RestClient::new(&backend.url()).unwrap();
    let client = build_client();
    let email = "vishwas@example.com";

    let courses = |channel_id: Option<String>| {
        let api = api.clone();
        let id = channel_id.clone().unwrap_or_default();
        client.fetch_query_with_options(
            query_key!["courses", id.clone()],
            move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.get_json::<Channel>(&format!("channels/{}", id)).await }
            },
            QueryOptions::new().enabled(channel_id.is_some())
        )
    };

    let waiting = courses(None).await.unwrap();
    assert!(waiting.is_idle(), "Courses were fetched without a channel");
    assert_eq!(backend.hits(Route::Channel), 0);

    let user = client
        .fetch_query(query_key!["user", email], {
            let api = api.clone();
            move || {
                let api = api.clone();
                async move { api.get_json::<User>(&format!("users/{}", email)).await }
            }
        })
        .await
        .unwrap()
        .data
        .unwrap();
    let channel = courses(Some(user.channel_id)).await.unwrap();

    assert_eq!(
        channel.data.unwrap().courses,
        vec!["react", "vue", "angular"],
        "Returned the wrong courses"
    );
}

#[tokio::test]
async fn test_optimistic_add() {
    let backend = FakeBackend::start().await;
    backend.set_next_id(7);
    let api = RestClient::new(&backend.url()).unwrap();
    let client = build_client();
    fetch_heroes(&client, &api).await;

    let add_hero = client.optimistic_append::<Vec<Hero>, _, _, _>("super-heroes", move |hero: Hero| {
        let api = api.clone();
        async move { api.post_json::<_, Hero>("superheroes", &hero).await }
    });

    backend.set_delay(Duration::from_millis(100));
    let pending = tokio::spawn({
        let add_hero = add_hero.clone();
        async move { add_hero.mutate(new_hero("Aquaman", "Arthur Curry")).await }
    });
    while client.get_query_data::<Vec<Hero>, _>("super-heroes").map(|h| h.len()) != Some(5) {
        tokio::task::yield_now().await;
    }
    let provisional: Vec<Hero> = client.get_query_data("super-heroes").unwrap();
    assert_eq!(provisional[4].id, 5, "Provisional hero has the wrong ID");

    let created = pending.await.unwrap().unwrap();
    assert_eq!(created.id, 7, "Server assigned the wrong ID");

    let heroes: Vec<Hero> = client.get_query_data("super-heroes").unwrap();
    assert_eq!(heroes.len(), 5);
    assert_eq!(heroes[4], created, "List wasn't refetched after the mutation");
    assert_eq!(backend.hits(Route::SuperHeroes), 2, "List wasn't refetched exactly once");
}

#[tokio::test]
async fn test_optimistic_rollback() {
    let backend = FakeBackend::start().await;
    backend.fail_creates(true);
    let api = RestClient::new(&backend.url()).unwrap();
    let client = build_client();
    let before = fetch_heroes(&client, &api).await;

    let add_hero = client.optimistic_append::<Vec<Hero>, _, _, _>("super-heroes", move |hero: Hero| {
        let api = api.clone();
        async move { api.post_json::<_, Hero>("superheroes", &hero).await }
    });
    let err = add_hero
        .mutate(new_hero("Aquaman", "Arthur Curry"))
        .await
        .unwrap_err();

    assert!(
        matches!(err.kind(), Some(ClientError::Status { status: 500, .. })),
        "Expected the server error"
    );
    let after: Vec<Hero> = client.get_query_data("super-heroes").unwrap();
    assert_eq!(after, before, "Rollback didn't restore the list");
    assert_eq!(backend.heroes().len(), SEEDED_NAMES.len());
}
