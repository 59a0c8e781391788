//! Each page loads what it needs through the query client and renders it as lines of text.

use crate::api::{
    add_super_hero_data, courses_key, super_hero_data, super_hero_key, super_heroes_data,
    user_key, Hero, SuperHeroApi
};
use sidekick::{QueryClient, QueryError, QueryOptions};
use tracing::{info, warn};

/// The names of all heroes.
pub async fn super_heroes_page(
    client: &QueryClient,
    api: &SuperHeroApi
) -> Result<Vec<String>, QueryError> {
    let result = super_heroes_data(client, api).await;
    match result {
        Ok(ref heroes) => info!(source = ?heroes.source, "fetched super heroes"),
        Err(ref e) => warn!(error = %e, "failed to fetch super heroes")
    }

    let names = result?.select(|heroes| heroes.into_iter().map(|hero| hero.name).collect::<Vec<_>>());
    Ok(names.data.unwrap_or_default())
}

pub async fn super_hero_page(
    client: &QueryClient,
    api: &SuperHeroApi,
    id: u64
) -> Result<Vec<String>, QueryError> {
    let hero = super_hero_data(client, api, id).await?;
    Ok(hero
        .data
        .map(|hero| format!("{} - {}", hero.name, hero.alter_ego))
        .into_iter()
        .collect())
}

/// Heroes and friends, fetched at the same time.
pub async fn parallel_queries_page(
    client: &QueryClient,
    api: &SuperHeroApi
) -> Result<Vec<String>, QueryError> {
    let friends_api = api.clone();
    let (heroes, friends) = futures::join!(
        super_heroes_data(client, api),
        client.fetch_query("friends", move || {
            let api = friends_api.clone();
            async move { api.fetch_friends().await }
        })
    );

    let mut lines: Vec<String> = heroes?
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|hero| hero.name)
        .collect();
    lines.extend(
        friends?
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|friend| friend.name)
    );
    Ok(lines)
}

/// One query per ID, all fetched at once. Heroes that failed to load are skipped.
pub async fn dynamic_parallel_page(
    client: &QueryClient,
    api: &SuperHeroApi,
    hero_ids: &[u64]
) -> Vec<String> {
    let queries = hero_ids
        .iter()
        .map(|&id| {
            let api = api.clone();
            let fetcher = move || {
                let api = api.clone();
                async move { api.fetch_super_hero(id).await }
            };
            (super_hero_key(id), fetcher)
        })
        .collect();

    client
        .fetch_queries::<Hero, _, _, _>(queries)
        .await
        .into_iter()
        .zip(hero_ids)
        .filter_map(|(result, id)| match result {
            Ok(hero) => hero.data.map(|hero| hero.name),
            Err(e) => {
                warn!(id, error = %e, "failed to fetch super hero");
                None
            }
        })
        .collect()
}

/// The courses of the channel the user with `email` owns. The courses query waits until the
/// user, and with it the channel ID, is known.
pub async fn dependent_queries_page(
    client: &QueryClient,
    api: &SuperHeroApi,
    email: &str
) -> Result<Vec<String>, QueryError> {
    let user = {
        let api = api.clone();
        let email = email.to_string();
        client
            .fetch_query(user_key(&email), move || {
                let api = api.clone();
                let email = email.clone();
                async move { api.fetch_user_by_email(&email).await }
            })
            .await?
    };

    let channel_id = user.data.map(|user| user.channel_id);
    let courses = {
        let api = api.clone();
        let id = channel_id.clone().unwrap_or_default();
        client
            .fetch_query_with_options(
                courses_key(channel_id.as_deref()),
                move || {
                    let api = api.clone();
                    let id = id.clone();
                    async move { api.fetch_courses_by_channel_id(&id).await }
                },
                QueryOptions::new().enabled(channel_id.is_some())
            )
            .await?
    };

    if courses.is_idle() {
        info!(email, "user has no channel, skipping courses");
    }
    Ok(courses.data.map(|channel| channel.courses).unwrap_or_default())
}

/// Adds a hero and returns the list as the server has it afterwards.
pub async fn add_hero_page(
    client: &QueryClient,
    api: &SuperHeroApi,
    hero: Hero
) -> Result<Vec<String>, QueryError> {
    // Load the list first so there's something to append to
    super_heroes_data(client, api).await?;

    let add_hero = add_super_hero_data(client, api);
    let created = add_hero.mutate(hero).await?;
    info!(id = created.id, name = %created.name, "added super hero");

    let heroes: Vec<Hero> = client.get_query_data(crate::api::SUPER_HEROES).unwrap_or_default();
    Ok(heroes
        .into_iter()
        .map(|hero| format!("{} - {}", hero.id, hero.name))
        .collect())
}
