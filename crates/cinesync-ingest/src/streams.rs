//! Bounded typed streams between the fetchers and the writers.
//!
//! A stream closes once every sender clone has been dropped; the receiving
//! writer then drains what is left and finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::warn;

use crate::config::StreamCapacities;
use crate::decompose::DecomposedMovie;
use crate::error::{IngestError, Result};
use crate::records::{
    LocalReleaseRow, MovieActorRow, MovieCountryRow, MovieDirectorRow, MovieGenreRow, MovieRow,
    PersonRow, ReleaseCountryRow,
};

/// Sending half of a named bounded stream.
///
/// Sends block while the stream is full. The first time that happens a warning
/// is logged, since a full stream whose writer has not started yet only drains
/// once the stage ahead of it finishes.
pub struct TypedSender<T> {
    name: &'static str,
    tx: Sender<T>,
    stalled: Arc<AtomicBool>,
}

impl<T> Clone for TypedSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            stalled: Arc::clone(&self.stalled),
        }
    }
}

impl<T> TypedSender<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn send(&self, item: T) -> Result<()> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) => {
                if !self.stalled.swap(true, Ordering::Relaxed) {
                    warn!(
                        stream = self.name,
                        capacity = self.tx.max_capacity(),
                        "Stream is full, producers will wait for its writer"
                    );
                }
                self.tx
                    .send(item)
                    .await
                    .map_err(|_| IngestError::StreamClosed(self.name))
            },
            Err(TrySendError::Closed(_)) => Err(IngestError::StreamClosed(self.name)),
        }
    }
}

/// Create a named bounded stream
pub fn typed_channel<T>(name: &'static str, capacity: usize) -> (TypedSender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let sender = TypedSender {
        name,
        tx,
        stalled: Arc::new(AtomicBool::new(false)),
    };
    (sender, rx)
}

/// Senders for the eight record streams. Cloned into every detail task.
#[derive(Clone)]
pub struct RecordSenders {
    pub movies: TypedSender<MovieRow>,
    pub people: TypedSender<PersonRow>,
    pub actors: TypedSender<MovieActorRow>,
    pub directors: TypedSender<MovieDirectorRow>,
    pub genres: TypedSender<MovieGenreRow>,
    pub countries: TypedSender<MovieCountryRow>,
    pub release_countries: TypedSender<ReleaseCountryRow>,
    pub local_releases: TypedSender<LocalReleaseRow>,
}

impl RecordSenders {
    /// Push one decomposed movie onto the streams.
    ///
    /// Each release country goes out before its local releases.
    pub async fn emit(&self, decomposed: DecomposedMovie) -> Result<()> {
        self.movies.send(decomposed.movie).await?;
        for person in decomposed.people {
            self.people.send(person).await?;
        }
        for actor in decomposed.actors {
            self.actors.send(actor).await?;
        }
        for director in decomposed.directors {
            self.directors.send(director).await?;
        }
        for genre in decomposed.genres {
            self.genres.send(genre).await?;
        }
        for country in decomposed.countries {
            self.countries.send(country).await?;
        }
        for group in decomposed.releases {
            self.release_countries.send(group.country).await?;
            for local in group.local_releases {
                self.local_releases.send(local).await?;
            }
        }
        Ok(())
    }
}

pub struct RecordReceivers {
    pub movies: Receiver<MovieRow>,
    pub people: Receiver<PersonRow>,
    pub actors: Receiver<MovieActorRow>,
    pub directors: Receiver<MovieDirectorRow>,
    pub genres: Receiver<MovieGenreRow>,
    pub countries: Receiver<MovieCountryRow>,
    pub release_countries: Receiver<ReleaseCountryRow>,
    pub local_releases: Receiver<LocalReleaseRow>,
}

pub fn record_channels(capacities: &StreamCapacities) -> (RecordSenders, RecordReceivers) {
    let (movies_tx, movies_rx) = typed_channel("movie", capacities.movies);
    let (people_tx, people_rx) = typed_channel("cinema_person", capacities.people);
    let (actors_tx, actors_rx) = typed_channel("movie_actor", capacities.actors);
    let (directors_tx, directors_rx) = typed_channel("movie_director", capacities.directors);
    let (genres_tx, genres_rx) = typed_channel("movie_genre", capacities.genres);
    let (countries_tx, countries_rx) = typed_channel("movie_country", capacities.countries);
    let (release_countries_tx, release_countries_rx) =
        typed_channel("release_country", capacities.release_countries);
    let (local_releases_tx, local_releases_rx) =
        typed_channel("local_release", capacities.local_releases);

    let senders = RecordSenders {
        movies: movies_tx,
        people: people_tx,
        actors: actors_tx,
        directors: directors_tx,
        genres: genres_tx,
        countries: countries_tx,
        release_countries: release_countries_tx,
        local_releases: local_releases_tx,
    };
    let receivers = RecordReceivers {
        movies: movies_rx,
        people: people_rx,
        actors: actors_rx,
        directors: directors_rx,
        genres: genres_rx,
        countries: countries_rx,
        release_countries: release_countries_rx,
        local_releases: local_releases_rx,
    };
    (senders, receivers)
}
