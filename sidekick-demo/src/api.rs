//! The superhero API: its types, one fetcher per endpoint, and the queries built on top of them.

use serde::{Deserialize, Serialize};
use sidekick::{
    mutation::Provisional, query_key, Mutation, OptimisticAppend, QueryClient, QueryError,
    QueryKey, QueryResult, RestClient
};

pub const SUPER_HEROES: &str = "super-heroes";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hero {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub alter_ego: String
}

impl Hero {
    /// A hero that hasn't been saved yet. The server assigns the ID.
    pub fn new(name: impl Into<String>, alter_ego: impl Into<String>) -> Self {
        Hero {
            id: 0,
            name: name.into(),
            alter_ego: alter_ego.into()
        }
    }
}

impl Provisional for Hero {
    fn assign_provisional_id(&mut self, collection_len: usize) {
        self.id = collection_len as u64 + 1;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Friend {
    pub id: u64,
    pub name: String
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub channel_id: String
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: String,
    pub courses: Vec<String>
}

pub fn super_hero_key(id: u64) -> QueryKey {
    query_key!["super-hero", id]
}

pub fn user_key(email: &str) -> QueryKey {
    query_key!["user", email]
}

pub fn courses_key(channel_id: Option<&str>) -> QueryKey {
    match channel_id {
        Some(channel_id) => query_key!["courses", channel_id],
        None => QueryKey::from("courses")
    }
}

/// Cheap to clone, so every fetcher can own a copy.
#[derive(Clone, Debug)]
pub struct SuperHeroApi {
    rest: RestClient
}

impl SuperHeroApi {
    pub fn new(base_url: &str) -> Result<Self, QueryError> {
        Ok(SuperHeroApi {
            rest: RestClient::new(base_url)?
        })
    }

    pub async fn fetch_super_heroes(&self) -> Result<Vec<Hero>, QueryError> {
        self.rest.get_json("superheroes").await
    }

    pub async fn fetch_super_hero(&self, id: u64) -> Result<Hero, QueryError> {
        self.rest.get_json(&format!("superheroes/{}", id)).await
    }

    pub async fn fetch_friends(&self) -> Result<Vec<Friend>, QueryError> {
        self.rest.get_json("friends").await
    }

    pub async fn fetch_user_by_email(&self, email: &str) -> Result<User, QueryError> {
        self.rest.get_json_segments(&["users", email]).await
    }

    pub async fn fetch_courses_by_channel_id(&self, channel_id: &str) -> Result<Channel, QueryError> {
        self.rest.get_json_segments(&["channels", channel_id]).await
    }

    pub async fn add_super_hero(&self, hero: &Hero) -> Result<Hero, QueryError> {
        self.rest.post_json("superheroes", hero).await
    }
}

pub async fn super_heroes_data(
    client: &QueryClient,
    api: &SuperHeroApi
) -> Result<QueryResult<Vec<Hero>>, QueryError> {
    let api = api.clone();
    client
        .fetch_query(SUPER_HEROES, move || {
            let api = api.clone();
            async move { api.fetch_super_heroes().await }
        })
        .await
}

pub async fn super_hero_data(
    client: &QueryClient,
    api: &SuperHeroApi,
    id: u64
) -> Result<QueryResult<Hero>, QueryError> {
    let api = api.clone();
    client
        .fetch_query(super_hero_key(id), move || {
            let api = api.clone();
            async move { api.fetch_super_hero(id).await }
        })
        .await
}

/// Adds a hero to the cached list right away and reconciles it with the server afterwards.
pub fn add_super_hero_data(
    client: &QueryClient,
    api: &SuperHeroApi
) -> Mutation<Hero, Hero, OptimisticAppend<Vec<Hero>>> {
    let api = api.clone();
    client.optimistic_append(SUPER_HEROES, move |hero: Hero| {
        let api = api.clone();
        async move { api.add_super_hero(&hero).await }
    })
}
