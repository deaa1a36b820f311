//! Decomposition of a movie document into relational records.
//!
//! Synthetic ids for release rows are derived from the movie id and list
//! positions only, so any number of movies can be decomposed concurrently and
//! re-ingesting an unchanged movie reproduces the same ids.

use chrono::NaiveDate;
use tracing::warn;

use crate::error::{IngestError, Result};
use crate::records::{
    LocalReleaseRow, MovieActorRow, MovieCountryRow, MovieDirectorRow, MovieGenreRow, MovieRow,
    PersonRow, ReleaseCountryRow,
};
use crate::tmdb::models::{LocalReleaseDate, MovieDocument, ReleaseCountry};

/// Synthetic ids reserved per movie
pub const IDS_PER_MOVIE: i64 = 1_000_000;

/// Synthetic ids reserved per release country; also the cap on local
/// releases per country and on release countries per movie.
pub const IDS_PER_COUNTRY: i64 = 1_000;

/// Id of the release country at `position` in a movie's release list.
pub fn release_country_id(movie_id: i32, position: usize) -> Result<i64> {
    let position = bounded_position(movie_id, position, "release country")?;
    Ok(i64::from(movie_id) * IDS_PER_MOVIE + position * IDS_PER_COUNTRY)
}

/// Id of the local release at `local_position` within the release country at
/// `country_position`: `release_country_id(..) + local_position`.
pub fn local_release_id(movie_id: i32, country_position: usize, local_position: usize) -> Result<i64> {
    let parent = release_country_id(movie_id, country_position)?;
    Ok(parent + bounded_position(movie_id, local_position, "local release")?)
}

fn bounded_position(movie_id: i32, position: usize, what: &str) -> Result<i64> {
    i64::try_from(position)
        .ok()
        .filter(|p| *p < IDS_PER_COUNTRY)
        .ok_or_else(|| IngestError::Decompose {
            movie_id,
            reason: format!("{} position {} exceeds {}", what, position, IDS_PER_COUNTRY - 1),
        })
}

/// A release country row with its local releases, in document order
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseGroup {
    pub country: ReleaseCountryRow,
    pub local_releases: Vec<LocalReleaseRow>,
}

/// Everything one movie document turns into
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedMovie {
    pub movie: MovieRow,
    pub people: Vec<PersonRow>,
    pub actors: Vec<MovieActorRow>,
    pub directors: Vec<MovieDirectorRow>,
    pub genres: Vec<MovieGenreRow>,
    pub countries: Vec<MovieCountryRow>,
    pub releases: Vec<ReleaseGroup>,
}

impl DecomposedMovie {
    /// Total records across every relation
    pub fn record_count(&self) -> usize {
        1 + self.people.len()
            + self.actors.len()
            + self.directors.len()
            + self.genres.len()
            + self.countries.len()
            + self
                .releases
                .iter()
                .map(|group| 1 + group.local_releases.len())
                .sum::<usize>()
    }
}

pub fn decompose(doc: &MovieDocument) -> Result<DecomposedMovie> {
    let movie_id = doc.id;

    let movie = MovieRow {
        id: movie_id,
        original_language: doc.original_language.clone(),
        original_title: doc.original_title.clone(),
        title: doc.title.clone(),
        poster_path: doc.poster_path.clone(),
        popularity: doc.popularity,
        runtime: doc.runtime.unwrap_or(0),
        budget: doc.budget.unwrap_or(0),
        primary_release_date: parse_release_date(movie_id, doc.release_date.as_deref()),
    };

    let mut people = Vec::with_capacity(doc.credits.cast.len());
    let mut actors = Vec::with_capacity(doc.credits.cast.len());
    for member in &doc.credits.cast {
        people.push(PersonRow {
            id: member.id,
            name: member.name.clone(),
        });
        actors.push(MovieActorRow {
            movie_id,
            actor_id: member.id,
        });
    }

    let mut directors = Vec::new();
    for member in doc.directors() {
        people.push(PersonRow {
            id: member.id,
            name: member.name.clone(),
        });
        directors.push(MovieDirectorRow {
            movie_id,
            director_id: member.id,
        });
    }

    let genres = doc
        .genres
        .iter()
        .map(|genre| MovieGenreRow {
            movie_id,
            genre_id: genre.id,
        })
        .collect();

    let countries = doc
        .production_countries
        .iter()
        .map(|country| MovieCountryRow {
            movie_id,
            country_iso: country.iso_3166_1.clone(),
        })
        .collect();

    let releases = doc
        .release_dates
        .results
        .iter()
        .enumerate()
        .map(|(position, country)| release_group(movie_id, position, country))
        .collect::<Result<Vec<_>>>()?;

    Ok(DecomposedMovie {
        movie,
        people,
        actors,
        directors,
        genres,
        countries,
        releases,
    })
}

fn release_group(movie_id: i32, position: usize, country: &ReleaseCountry) -> Result<ReleaseGroup> {
    let country_id = release_country_id(movie_id, position)?;

    let local_releases = country
        .release_dates
        .iter()
        .enumerate()
        .map(|(local_position, release)| {
            Ok(local_release_row(
                local_release_id(movie_id, position, local_position)?,
                country_id,
                release,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ReleaseGroup {
        country: ReleaseCountryRow {
            id: country_id,
            iso_3166_1: country.iso_3166_1.clone(),
            movie_id,
        },
        local_releases,
    })
}

fn local_release_row(id: i64, release_country_id: i64, release: &LocalReleaseDate) -> LocalReleaseRow {
    LocalReleaseRow {
        id,
        note: non_empty(release.note.as_deref()),
        release_date: release.release_date,
        release_type: release.release_type,
        certification: non_empty(release.certification.as_deref()),
        release_country_id,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Empty or missing dates are absent; malformed ones are logged and dropped.
fn parse_release_date(movie_id: i32, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.filter(|v| !v.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(movie_id, release_date = raw, error = %e, "Ignoring malformed release date");
            None
        },
    }
}
