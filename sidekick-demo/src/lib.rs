//! The superhero demo: queries, parallel and dependent queries, and an optimistic add, run
//! against the superhero API at `http://localhost:4000`.

pub mod api;
pub mod pages;

pub use api::{Hero, SuperHeroApi};
