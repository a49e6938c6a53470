use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "moviemeta";
const ENV_PREFIX: &str = "MOVIEMETA";

/// Run settings: defaults, then `moviemeta.toml`, then `MOVIEMETA_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub wiki_api_url: String,
    pub wiki_page_base: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub search_delay_ms: u64,
    pub fetch_delay_ms: u64,
    pub min_plot_chars: usize,
    pub min_paragraph_chars: usize,
    pub checkpoint_interval: usize,

    pub tmdb_api_url: String,
    pub tmdb_api_key: Option<String>,
    pub omdb_api_url: String,
    pub omdb_api_key: Option<String>,
    pub max_release_year: i32,
    pub min_runtime_minutes: u32,
    pub rating_workers: usize,
    pub person_retries: u32,
    pub backoff_base_ms: u64,
    pub rating_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wiki_api_url: "https://en.wikipedia.org/w/api.php".into(),
            wiki_page_base: "https://en.wikipedia.org/wiki/".into(),
            user_agent: "MoviePlotExtractor/1.2 (research-use)".into(),
            request_timeout_secs: 12,
            search_delay_ms: 200,
            fetch_delay_ms: 150,
            min_plot_chars: 120,
            min_paragraph_chars: 30,
            checkpoint_interval: 50,
            tmdb_api_url: "https://api.themoviedb.org/3".into(),
            tmdb_api_key: None,
            omdb_api_url: "https://www.omdbapi.com/".into(),
            omdb_api_key: None,
            max_release_year: 2010,
            min_runtime_minutes: 40,
            rating_workers: 10,
            person_retries: 3,
            backoff_base_ms: 1000,
            rating_delay_ms: 100,
        }
    }
}

/// Knobs the plot resolver needs.
#[derive(Debug, Clone, Copy)]
pub struct PlotConfig {
    pub min_plot_chars: usize,
    pub min_paragraph_chars: usize,
    pub search_delay: Duration,
    pub fetch_delay: Duration,
}

/// Knobs the rating pipeline needs.
#[derive(Debug, Clone, Copy)]
pub struct RatingConfig {
    pub max_release_year: i32,
    pub min_runtime_minutes: u32,
    pub workers: usize,
    pub person_retries: u32,
    pub backoff_base: Duration,
    pub rating_delay: Duration,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .context("Failed to load settings")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn plot_config(&self) -> PlotConfig {
        PlotConfig {
            min_plot_chars: self.min_plot_chars,
            min_paragraph_chars: self.min_paragraph_chars,
            search_delay: Duration::from_millis(self.search_delay_ms),
            fetch_delay: Duration::from_millis(self.fetch_delay_ms),
        }
    }

    pub fn rating_config(&self) -> RatingConfig {
        RatingConfig {
            max_release_year: self.max_release_year,
            min_runtime_minutes: self.min_runtime_minutes,
            workers: self.rating_workers.max(1),
            person_retries: self.person_retries.max(1),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            rating_delay: Duration::from_millis(self.rating_delay_ms),
        }
    }
}
