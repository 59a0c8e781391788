//! Shared fixtures for the `sidekick` test suites: a call counter and an in-process superhero
//! API to run fetchers against.

mod backend;

pub use backend::{BackendHero, FakeBackend, Route};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc
};

/// A call counter that can be moved into fetchers and read from the test afterwards.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    n: Arc<AtomicUsize>
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.n.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.n.load(Ordering::SeqCst)
    }
}

impl PartialEq<usize> for Counter {
    fn eq(&self, other: &usize) -> bool {
        self.get() == *other
    }
}
