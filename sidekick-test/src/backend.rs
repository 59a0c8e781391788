use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc
    },
    time::Duration
};
use tokio::{net::TcpListener, sync::oneshot};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHero {
    pub id: u64,
    pub name: String,
    pub alter_ego: String
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewHero {
    name: String,
    alter_ego: String
}

/// The endpoints of the fake API, used to read request counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    SuperHeroes,
    SuperHero,
    CreateSuperHero,
    Friends,
    User,
    Channel
}

struct BackendState {
    heroes: Mutex<Vec<BackendHero>>,
    next_id: AtomicU64,
    fail_creates: AtomicBool,
    delay: Mutex<Duration>,
    hits: Mutex<HashMap<Route, usize>>
}

impl BackendState {
    async fn hit(&self, route: Route) {
        *self.hits.lock().entry(route).or_insert(0) += 1;
        let delay = *self.delay.lock();
        if delay > Duration::from_secs(0) {
            tokio::time::sleep(delay).await;
        }
    }
}

fn seed_heroes() -> Vec<BackendHero> {
    [
        (1, "Batman", "Bruce Wayne"),
        (2, "Superman", "Clark Kent"),
        (3, "Wonder Woman", "Princess Diana"),
        (4, "Flash", "Barry Allen")
    ]
    .iter()
    .map(|(id, name, alter_ego)| BackendHero {
        id: *id,
        name: name.to_string(),
        alter_ego: alter_ego.to_string()
    })
    .collect()
}

/// The superhero API the demo talks to, served from memory on a random local port.
///
/// The server shuts down when this is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    shutdown: Option<oneshot::Sender<()>>
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            heroes: Mutex::new(seed_heroes()),
            next_id: AtomicU64::new(5),
            fail_creates: AtomicBool::new(false),
            delay: Mutex::new(Duration::from_secs(0)),
            hits: Mutex::new(HashMap::new())
        });

        let router = Router::new()
            .route("/superheroes", get(super_heroes).post(create_super_hero))
            .route("/superheroes/:id", get(super_hero))
            .route("/friends", get(friends))
            .route("/users/:email", get(user))
            .route("/channels/:id", get(channel))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        let (shutdown, stopped) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = stopped.await;
            });
            if let Err(e) = server.await {
                debug!(error = %e, "fake backend stopped");
            }
        });
        debug!(%addr, "fake backend listening");

        FakeBackend {
            addr,
            state,
            shutdown: Some(shutdown)
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The ID the next created hero gets. IDs keep counting up from there.
    pub fn set_next_id(&self, id: u64) {
        self.state.next_id.store(id, Ordering::SeqCst);
    }

    /// Makes `POST /superheroes` answer with a 500 until switched off again.
    pub fn fail_creates(&self, fail: bool) {
        self.state.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }

    pub fn hits(&self, route: Route) -> usize {
        self.state.hits.lock().get(&route).copied().unwrap_or(0)
    }

    pub fn heroes(&self) -> Vec<BackendHero> {
        self.state.heroes.lock().clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn super_heroes(State(state): State<Arc<BackendState>>) -> Json<Vec<BackendHero>> {
    state.hit(Route::SuperHeroes).await;
    Json(state.heroes.lock().clone())
}

async fn super_hero(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<u64>
) -> Result<Json<BackendHero>, StatusCode> {
    state.hit(Route::SuperHero).await;
    let heroes = state.heroes.lock();
    heroes
        .iter()
        .find(|hero| hero.id == id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_super_hero(
    State(state): State<Arc<BackendState>>,
    Json(hero): Json<NewHero>
) -> Result<(StatusCode, Json<BackendHero>), StatusCode> {
    state.hit(Route::CreateSuperHero).await;
    if state.fail_creates.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let hero = BackendHero {
        id: state.next_id.fetch_add(1, Ordering::SeqCst),
        name: hero.name,
        alter_ego: hero.alter_ego
    };
    state.heroes.lock().push(hero.clone());
    Ok((StatusCode::CREATED, Json(hero)))
}

async fn friends(State(state): State<Arc<BackendState>>) -> Json<Value> {
    state.hit(Route::Friends).await;
    Json(json!([
        { "id": 1, "name": "Chandler Bing" },
        { "id": 2, "name": "Joey Tribbiani" },
        { "id": 3, "name": "Rachel Green" }
    ]))
}

async fn user(
    State(state): State<Arc<BackendState>>,
    Path(email): Path<String>
) -> Result<Json<Value>, StatusCode> {
    state.hit(Route::User).await;
    match email.as_str() {
        "vishwas@example.com" => Ok(Json(json!({
            "id": "vishwas@example.com",
            "channelId": "codevolution"
        }))),
        _ => Err(StatusCode::NOT_FOUND)
    }
}

async fn channel(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>
) -> Result<Json<Value>, StatusCode> {
    state.hit(Route::Channel).await;
    match id.as_str() {
        "codevolution" => Ok(Json(json!({
            "id": "codevolution",
            "courses": ["react", "vue", "angular"]
        }))),
        _ => Err(StatusCode::NOT_FOUND)
    }
}
