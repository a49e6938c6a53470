pub mod client;
pub mod pool;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::FetchResult;
use crate::settings::RatingConfig;

const EXCLUDED_GENRES: &[&str] = &["Documentary", "TV Movie"];
const REQUIRED_COUNTRY: &str = "US";

/// One cast credit from a person's filmography.
#[derive(Debug, Clone, Deserialize)]
pub struct Credit {
    pub id: u64,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Country {
    pub iso_3166_1: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieDetails {
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub production_countries: Vec<Country>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub imdb_id: Option<String>,
}

/// Person lookup, filmography, and the ratings database.
#[async_trait]
pub trait RatingSource: Send + Sync {
    async fn search_person(&self, name: &str) -> FetchResult<Option<u64>>;
    async fn movie_credits(&self, person_id: u64) -> FetchResult<Vec<Credit>>;
    async fn movie_details(&self, movie_id: u64) -> FetchResult<MovieDetails>;
    async fn imdb_rating(&self, imdb_id: &str) -> FetchResult<Option<f64>>;
}

/// Run-scoped lookups shared by all workers. Grows only; nothing is evicted.
#[derive(Default)]
pub struct LookupCache {
    person_ids: DashMap<String, u64>,
    averages: DashMap<String, Option<f64>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn person_count(&self) -> usize {
        self.person_ids.len()
    }

    pub fn average_count(&self) -> usize {
        self.averages.len()
    }
}

/// Average rating of an actor's eligible films.
pub struct RatingResolver<S: RatingSource> {
    source: S,
    cache: Arc<LookupCache>,
    cfg: RatingConfig,
    today: NaiveDate,
}

impl<S: RatingSource> RatingResolver<S> {
    pub fn new(source: S, cache: Arc<LookupCache>, cfg: RatingConfig) -> Self {
        Self {
            source,
            cache,
            cfg,
            today: chrono::Local::now().date_naive(),
        }
    }

    #[cfg(test)]
    fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &RatingConfig {
        &self.cfg
    }

    /// Person id for a name, retrying transient failures with exponential backoff.
    pub async fn person_id(&self, name: &str) -> Option<u64> {
        let cached = self.cache.person_ids.get(name).map(|id| *id);
        if cached.is_some() {
            return cached;
        }

        let attempts = self.cfg.person_retries;
        for attempt in 0..attempts {
            match self.source.search_person(name).await {
                Ok(Some(id)) => {
                    self.cache.person_ids.insert(name.to_string(), id);
                    return Some(id);
                }
                Ok(None) => {
                    debug!(name, "no person match");
                    return None;
                }
                Err(e) if e.is_retryable() => {
                    if attempt + 1 == attempts {
                        warn!("Person search for {} failed after {} attempts: {}", name, attempts, e);
                        break;
                    }
                    let backoff = backoff_delay(self.cfg.backoff_base, attempt);
                    warn!(
                        "Person search for {} failed (attempt {}/{}), backing off {:.1}s: {}",
                        name,
                        attempt + 1,
                        attempts,
                        backoff.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    debug!(name, error = %e, "person search failed");
                    return None;
                }
            }
        }
        None
    }

    fn eligible_release(&self, credit: &Credit) -> bool {
        let Some(date) = credit
            .release_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            return false;
        };
        date <= self.today && date.year() <= self.cfg.max_release_year
    }

    fn eligible_details(&self, details: &MovieDetails) -> bool {
        if let Some(runtime) = details.runtime {
            if runtime > 0 && runtime < self.cfg.min_runtime_minutes {
                return false;
            }
        }
        if !details
            .production_countries
            .iter()
            .any(|c| c.iso_3166_1 == REQUIRED_COUNTRY)
        {
            return false;
        }
        !details
            .genres
            .iter()
            .any(|g| EXCLUDED_GENRES.contains(&g.name.as_str()))
    }

    /// Distinct IMDb ids of released, feature-length US films, in credit order.
    pub async fn eligible_imdb_ids(&self, person_id: u64) -> Vec<String> {
        let credits = match self.source.movie_credits(person_id).await {
            Ok(c) => c,
            Err(e) => {
                debug!(person_id, error = %e, "credits lookup failed");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for credit in credits.iter().filter(|c| self.eligible_release(c)) {
            let details = match self.source.movie_details(credit.id).await {
                Ok(d) => d,
                Err(e) => {
                    debug!(movie_id = credit.id, error = %e, "details lookup failed");
                    continue;
                }
            };
            if !self.eligible_details(&details) {
                continue;
            }
            if let Some(imdb) = details.imdb_id.filter(|s| !s.is_empty()) {
                if seen.insert(imdb.clone()) {
                    ids.push(imdb);
                }
            }
        }
        ids
    }

    /// Mean rating over the actor's eligible films, two decimals. None if nothing rated.
    pub async fn average_rating(&self, name: &str) -> Option<f64> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let cached = self.cache.averages.get(name).map(|avg| *avg);
        if let Some(avg) = cached {
            return avg;
        }

        let person = self.person_id(name).await?;
        let ids = self.eligible_imdb_ids(person).await;

        let mut ratings = Vec::with_capacity(ids.len());
        for imdb in &ids {
            match self.source.imdb_rating(imdb).await {
                Ok(Some(r)) => ratings.push(r),
                Ok(None) => {}
                Err(e) => debug!(imdb = %imdb, error = %e, "rating lookup failed"),
            }
            tokio::time::sleep(self.cfg.rating_delay).await;
        }

        let avg = mean_rounded(&ratings);
        debug!(name, films = ids.len(), rated = ratings.len(), ?avg, "average rating");
        self.cache.averages.insert(name.to_string(), avg);
        avg
    }
}

/// `base * 2^attempt`, saturating instead of overflowing on long retry budgets.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn mean_rounded(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

// ── Tests ──
