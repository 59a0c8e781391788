use sidekick::{QueryClient, QueryStatus};
use sidekick_demo::{api, pages, Hero, SuperHeroApi};
use sidekick_test::{FakeBackend, Route};
use std::time::Duration;

fn build_client() -> QueryClient {
    QueryClient::builder()
        .with_retry(0)
        .with_stale_time(Duration::from_secs(60))
        .build()
}

#[tokio::test]
async fn test_super_heroes_page() {
    let backend = FakeBackend::start().await;
    let api = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let names = pages::super_heroes_page(&client, &api).await.unwrap();

    assert_eq!(names, vec!["Batman", "Superman", "Wonder Woman", "Flash"]);
}

#[tokio::test]
async fn test_super_hero_page() {
    let backend = FakeBackend::start().await;
    let api = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let lines = pages::super_hero_page(&client, &api, 2).await.unwrap();

    assert_eq!(lines, vec!["Superman - Clark Kent"]);
    let cached: Option<Hero> = client.get_query_data(api::super_hero_key(2));
    assert!(cached.is_some(), "Hero wasn't cached under its ID");
}

#[tokio::test]
async fn test_parallel_queries_page() {
    let backend = FakeBackend::start().await;
    let api = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let lines = pages::parallel_queries_page(&client, &api).await.unwrap();

    assert_eq!(lines.len(), 7, "Expected four heroes and three friends");
    assert_eq!(backend.hits(Route::SuperHeroes), 1);
    assert_eq!(backend.hits(Route::Friends), 1);
}

#[tokio::test]
async fn test_dynamic_parallel_page() {
    let backend = FakeBackend::start().await;
    let api = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let names = pages::dynamic_parallel_page(&client, &api, &[1, 3, 42]).await;

    assert_eq!(names, vec!["Batman", "Wonder Woman"], "Missing hero wasn't skipped");
    assert_eq!(backend.hits(Route::SuperHero), 3);
}

#[tokio::test]
async fn test_dependent_queries_page() {
    let backend = FakeBackend::start().await;
    let api = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let courses = pages::dependent_queries_page(&client, &api, "vishwas@example.com")
        .await
        .unwrap();

    assert_eq!(courses, vec!["react", "vue", "angular"]);
    assert_eq!(backend.hits(Route::User), 1);
    assert_eq!(backend.hits(Route::Channel), 1);
}

#[tokio::test]
async fn test_courses_wait_for_channel() {
    let backend = FakeBackend::start().await;
    let api_client = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let result = client
        .fetch_query_with_options(
            api::courses_key(None),
            move || {
                let api = api_client.clone();
                async move { api.fetch_courses_by_channel_id("").await }
            },
            sidekick::QueryOptions::new().enabled(false)
        )
        .await
        .unwrap();

    assert_eq!(result.status, QueryStatus::Idle);
    assert_eq!(backend.hits(Route::Channel), 0);
}

#[tokio::test]
async fn test_add_hero_page() {
    let backend = FakeBackend::start().await;
    backend.set_next_id(7);
    let api = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let lines = pages::add_hero_page(&client, &api, Hero::new("Aquaman", "Arthur Curry"))
        .await
        .unwrap();

    assert_eq!(lines.last().map(String::as_str), Some("7 - Aquaman"));
    assert_eq!(lines.len(), 5);
    assert_eq!(backend.hits(Route::CreateSuperHero), 1);
}

#[tokio::test]
async fn test_add_hero_page_rolls_back() {
    let backend = FakeBackend::start().await;
    backend.fail_creates(true);
    let api = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    let result = pages::add_hero_page(&client, &api, Hero::new("Aquaman", "Arthur Curry")).await;

    assert!(result.is_err(), "Failed create was reported as a success");
    let heroes: Vec<Hero> = client.get_query_data(api::SUPER_HEROES).unwrap();
    assert_eq!(heroes.len(), 4, "Provisional hero wasn't rolled back");
}

#[tokio::test]
async fn test_email_is_sent_as_one_segment() {
    let backend = FakeBackend::start().await;
    let api = SuperHeroApi::new(&backend.url()).unwrap();

    let err = api
        .fetch_user_by_email("vishwas@example.com?admin=true")
        .await
        .unwrap_err();

    assert!(
        matches!(err.kind(), Some(sidekick::ClientError::Status { status: 404, .. })),
        "Query string in the email reached the server"
    );
    assert_eq!(backend.hits(Route::User), 1);
}

#[tokio::test]
async fn test_waiting_courses_are_not_refetched() {
    let backend = FakeBackend::start().await;
    let api_client = SuperHeroApi::new(&backend.url()).unwrap();
    let client = build_client();

    client
        .fetch_query_with_options(
            api::courses_key(None),
            move || {
                let api = api_client.clone();
                async move { api.fetch_courses_by_channel_id("").await }
            },
            sidekick::QueryOptions::new().enabled(false)
        )
        .await
        .unwrap();
    client.invalidate_queries(api::courses_key(None)).await;

    assert_eq!(backend.hits(Route::Channel), 0, "Courses were fetched without a channel");
}
