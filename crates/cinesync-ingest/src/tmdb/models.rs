//! Wire types for the TMDB v3 endpoints we read.
//!
//! Fields TMDB sends as `null` on sparse records are optional here; the
//! decomposition step decides what an absent value becomes.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of `/movie/changes`
#[derive(Debug, Clone, Deserialize)]
pub struct ChangesPage {
    #[serde(default)]
    pub results: Vec<ChangedMovie>,
    #[serde(default)]
    pub page: u32,
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

impl ChangesPage {
    /// Ids of every entry not flagged adult, in page order
    pub fn non_adult_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.results
            .iter()
            .filter(|entry| !entry.is_adult())
            .map(|entry| entry.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangedMovie {
    pub id: i32,
    #[serde(default)]
    pub adult: Option<bool>,
}

impl ChangedMovie {
    pub fn is_adult(&self) -> bool {
        self.adult.unwrap_or(false)
    }
}

/// `/movie/{id}` with `append_to_response=release_dates,credits`
#[derive(Debug, Clone, Deserialize)]
pub struct MovieDocument {
    pub id: i32,
    pub original_language: Option<String>,
    pub original_title: Option<String>,
    #[serde(default)]
    pub title: String,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub budget: Option<i64>,
    /// `YYYY-MM-DD`, or an empty string when unknown
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub production_countries: Vec<ProductionCountry>,
    #[serde(default)]
    pub credits: Credits,
    #[serde(default)]
    pub release_dates: ReleaseDates,
}

impl MovieDocument {
    /// Crew members credited with the `Director` job
    pub fn directors(&self) -> impl Iterator<Item = &CrewMember> + '_ {
        self.credits
            .crew
            .iter()
            .filter(|member| member.job.as_deref() == Some("Director"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductionCountry {
    pub iso_3166_1: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub id: i32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrewMember {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub job: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseDates {
    #[serde(default)]
    pub results: Vec<ReleaseCountry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseCountry {
    pub iso_3166_1: String,
    #[serde(default)]
    pub release_dates: Vec<LocalReleaseDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalReleaseDate {
    #[serde(default)]
    pub note: Option<String>,
    pub release_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub release_type: i16,
    #[serde(default)]
    pub certification: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_page_filters_adult_entries() {
        let page: ChangesPage = serde_json::from_str(
            r#"{
                "results": [
                    {"id": 1, "adult": false},
                    {"id": 2, "adult": true},
                    {"id": 3, "adult": null},
                    {"id": 4}
                ],
                "page": 1,
                "total_pages": 7,
                "total_results": 4
            }"#,
        )
        .unwrap();

        assert_eq!(page.total_pages, 7);
        assert_eq!(page.non_adult_ids().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn test_movie_document_tolerates_sparse_fields() {
        let doc: MovieDocument = serde_json::from_str(
            r#"{
                "id": 42,
                "title": "Sparse",
                "original_language": null,
                "poster_path": null,
                "runtime": null,
                "release_date": ""
            }"#,
        )
        .unwrap();

        assert_eq!(doc.id, 42);
        assert!(doc.credits.cast.is_empty());
        assert!(doc.release_dates.results.is_empty());
        assert_eq!(doc.runtime, None);
    }

    #[test]
    fn test_local_release_timestamp_and_type() {
        let release: LocalReleaseDate = serde_json::from_str(
            r#"{"certification": "PG-13", "iso_639_1": "", "note": "Premiere",
                "release_date": "2020-01-01T00:00:00.000Z", "type": 1}"#,
        )
        .unwrap();

        assert_eq!(release.release_type, 1);
        assert_eq!(release.release_date.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert_eq!(release.note.as_deref(), Some("Premiere"));
    }

    #[test]
    fn test_directors_come_from_crew_jobs() {
        let doc: MovieDocument = serde_json::from_str(
            r#"{
                "id": 7,
                "credits": {
                    "cast": [],
                    "crew": [
                        {"id": 10, "name": "A", "job": "Director"},
                        {"id": 11, "name": "B", "job": "Producer"},
                        {"id": 12, "name": "C"}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(doc.directors().map(|d| d.id).collect::<Vec<_>>(), vec![10]);
    }
}
