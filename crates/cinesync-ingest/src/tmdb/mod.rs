//! TMDB source API: the change list used for discovery and the movie detail
//! document used for decomposition.

pub mod client;
pub mod models;

pub use client::TmdbClient;
pub use models::{ChangesPage, MovieDocument};
