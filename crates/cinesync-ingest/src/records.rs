//! Relational records produced by decomposition
//!
//! Every record type knows the relation it lands in, its columns, the key the
//! store resolves conflicts on, and which conflict policy applies. The batch
//! writer and the stores only ever see records through [`CatalogRecord`].

use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::query_builder::Separated;
use sqlx::Postgres;

/// What happens when a written record shares its key with a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The incoming record replaces the stored row
    Upsert,
    /// The stored row wins; the incoming record is skipped
    InsertIfAbsent,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Upsert => "upsert",
            ConflictPolicy::InsertIfAbsent => "insert_if_absent",
        }
    }
}

/// A row destined for one relation of the catalog
pub trait CatalogRecord: Clone + fmt::Debug + Send + Sync + 'static {
    type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;

    const RELATION: &'static str;
    const COLUMNS: &'static [&'static str];
    const KEY_COLUMNS: &'static [&'static str];
    const POLICY: ConflictPolicy;

    fn key(&self) -> Self::Key;

    /// Bind this record's values in `COLUMNS` order
    fn bind_row<'qb, 'args: 'qb>(&'args self, row: Separated<'qb, 'args, Postgres, &'static str>);
}

/// Base movie row (scalars only)
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRow {
    pub id: i32,
    pub original_language: Option<String>,
    pub original_title: Option<String>,
    pub title: String,
    pub poster_path: Option<String>,
    pub popularity: f64,
    pub runtime: i32,
    pub budget: i64,
    pub primary_release_date: Option<NaiveDate>,
}

impl CatalogRecord for MovieRow {
    type Key = i32;

    const RELATION: &'static str = "movie";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "original_language",
        "original_title",
        "title",
        "poster_path",
        "popularity",
        "runtime",
        "budget",
        "primary_release_date",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const POLICY: ConflictPolicy = ConflictPolicy::Upsert;

    fn key(&self) -> i32 {
        self.id
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(&self.original_language)
            .push_bind(&self.original_title)
            .push_bind(&self.title)
            .push_bind(&self.poster_path)
            .push_bind(self.popularity)
            .push_bind(self.runtime)
            .push_bind(self.budget)
            .push_bind(self.primary_release_date);
    }
}

/// Actor or director reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRow {
    pub id: i32,
    pub name: String,
}

impl CatalogRecord for PersonRow {
    type Key = i32;

    const RELATION: &'static str = "cinema_person";
    const COLUMNS: &'static [&'static str] = &["id", "name"];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const POLICY: ConflictPolicy = ConflictPolicy::InsertIfAbsent;

    fn key(&self) -> i32 {
        self.id
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.id).push_bind(&self.name);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieActorRow {
    pub movie_id: i32,
    pub actor_id: i32,
}

impl CatalogRecord for MovieActorRow {
    type Key = (i32, i32);

    const RELATION: &'static str = "movie_actor";
    const COLUMNS: &'static [&'static str] = &["movie_id", "actor_id"];
    const KEY_COLUMNS: &'static [&'static str] = &["movie_id", "actor_id"];
    const POLICY: ConflictPolicy = ConflictPolicy::InsertIfAbsent;

    fn key(&self) -> (i32, i32) {
        (self.movie_id, self.actor_id)
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.movie_id).push_bind(self.actor_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieDirectorRow {
    pub movie_id: i32,
    pub director_id: i32,
}

impl CatalogRecord for MovieDirectorRow {
    type Key = (i32, i32);

    const RELATION: &'static str = "movie_director";
    const COLUMNS: &'static [&'static str] = &["movie_id", "director_id"];
    const KEY_COLUMNS: &'static [&'static str] = &["movie_id", "director_id"];
    const POLICY: ConflictPolicy = ConflictPolicy::InsertIfAbsent;

    fn key(&self) -> (i32, i32) {
        (self.movie_id, self.director_id)
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.movie_id).push_bind(self.director_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieGenreRow {
    pub movie_id: i32,
    pub genre_id: i32,
}

impl CatalogRecord for MovieGenreRow {
    type Key = (i32, i32);

    const RELATION: &'static str = "movie_genre";
    const COLUMNS: &'static [&'static str] = &["movie_id", "genre_id"];
    const KEY_COLUMNS: &'static [&'static str] = &["movie_id", "genre_id"];
    const POLICY: ConflictPolicy = ConflictPolicy::InsertIfAbsent;

    fn key(&self) -> (i32, i32) {
        (self.movie_id, self.genre_id)
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.movie_id).push_bind(self.genre_id);
    }
}

/// Production country association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieCountryRow {
    pub movie_id: i32,
    pub country_iso: String,
}

impl CatalogRecord for MovieCountryRow {
    type Key = (i32, String);

    const RELATION: &'static str = "movie_country";
    const COLUMNS: &'static [&'static str] = &["movie_id", "country_iso"];
    const KEY_COLUMNS: &'static [&'static str] = &["movie_id", "country_iso"];
    const POLICY: ConflictPolicy = ConflictPolicy::InsertIfAbsent;

    fn key(&self) -> (i32, String) {
        (self.movie_id, self.country_iso.clone())
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.movie_id).push_bind(&self.country_iso);
    }
}

/// One country in a movie's release list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCountryRow {
    pub id: i64,
    pub iso_3166_1: String,
    pub movie_id: i32,
}

impl CatalogRecord for ReleaseCountryRow {
    type Key = i64;

    const RELATION: &'static str = "release_country";
    const COLUMNS: &'static [&'static str] = &["id", "iso_3166_1", "movie_id"];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const POLICY: ConflictPolicy = ConflictPolicy::InsertIfAbsent;

    fn key(&self) -> i64 {
        self.id
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(&self.iso_3166_1)
            .push_bind(self.movie_id);
    }
}

/// A local release event, child of a [`ReleaseCountryRow`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReleaseRow {
    pub id: i64,
    pub note: Option<String>,
    pub release_date: DateTime<Utc>,
    pub release_type: i16,
    pub certification: Option<String>,
    pub release_country_id: i64,
}

impl CatalogRecord for LocalReleaseRow {
    type Key = i64;

    const RELATION: &'static str = "local_release";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "note",
        "release_date",
        "release_type",
        "certification",
        "release_country_id",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const POLICY: ConflictPolicy = ConflictPolicy::InsertIfAbsent;

    fn key(&self) -> i64 {
        self.id
    }

    fn bind_row<'qb, 'args: 'qb>(&'args self, mut row: Separated<'qb, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(&self.note)
            .push_bind(self.release_date)
            .push_bind(self.release_type)
            .push_bind(&self.certification)
            .push_bind(self.release_country_id);
    }
}
