use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Credit, MovieDetails, RatingSource};
use crate::error::{FetchError, FetchResult};
use crate::settings::Settings;

#[derive(Deserialize)]
struct PersonSearch {
    #[serde(default)]
    results: Vec<PersonHit>,
}

#[derive(Deserialize)]
struct PersonHit {
    id: u64,
}

#[derive(Deserialize)]
struct MovieCredits {
    #[serde(default)]
    cast: Vec<Credit>,
}

#[derive(Deserialize)]
struct OmdbTitle {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "imdbRating", default)]
    imdb_rating: Option<String>,
}

/// TMDB for people and filmographies, OMDb for IMDb ratings.
pub struct TmdbOmdbClient {
    http: Client,
    tmdb_url: String,
    tmdb_key: String,
    omdb_url: String,
    omdb_key: String,
}

impl TmdbOmdbClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let tmdb_key = settings
            .tmdb_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("MOVIEMETA_TMDB_API_KEY environment variable must be set")?;
        let omdb_key = settings
            .omdb_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("MOVIEMETA_OMDB_API_KEY environment variable must be set")?;
        let http = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            tmdb_url: settings.tmdb_api_url.trim_end_matches('/').to_string(),
            tmdb_key,
            omdb_url: settings.omdb_api_url.clone(),
            omdb_key,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, params: &[(&str, &str)]) -> FetchResult<T> {
        let resp = self.http.get(url).query(params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn tmdb<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<T> {
        let url = format!("{}{}", self.tmdb_url, path);
        let mut all = vec![("api_key", self.tmdb_key.as_str())];
        all.extend_from_slice(params);
        self.get_json(&url, &all).await
    }
}

fn parse_rating(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|r| r.trim().parse::<f64>().ok())
        .filter(|r| r.is_finite() && *r > 0.0)
}

#[async_trait]
impl RatingSource for TmdbOmdbClient {
    async fn search_person(&self, name: &str) -> FetchResult<Option<u64>> {
        let found: PersonSearch = self.tmdb("/search/person", &[("query", name)]).await?;
        Ok(found.results.first().map(|p| p.id))
    }

    async fn movie_credits(&self, person_id: u64) -> FetchResult<Vec<Credit>> {
        let credits: MovieCredits = self
            .tmdb(&format!("/person/{}/movie_credits", person_id), &[])
            .await?;
        Ok(credits.cast)
    }

    async fn movie_details(&self, movie_id: u64) -> FetchResult<MovieDetails> {
        self.tmdb(&format!("/movie/{}", movie_id), &[]).await
    }

    async fn imdb_rating(&self, imdb_id: &str) -> FetchResult<Option<f64>> {
        let params = [("i", imdb_id), ("apikey", self.omdb_key.as_str())];
        let title: OmdbTitle = self.get_json(&self.omdb_url, &params).await?;
        if title.response != "True" {
            return Ok(None);
        }
        Ok(parse_rating(title.imdb_rating.as_deref()))
    }
}
