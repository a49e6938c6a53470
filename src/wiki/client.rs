use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{SectionDescriptor, WikiSource};
use crate::error::{FetchError, FetchResult};
use crate::settings::Settings;

const SEARCH_LIMIT: &str = "5";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ParseResponse {
    #[serde(default)]
    parse: Option<ParseBody>,
}

#[derive(Deserialize)]
struct ParseBody {
    #[serde(default)]
    sections: Vec<SectionDescriptor>,
    #[serde(default)]
    text: Option<ParseText>,
}

#[derive(Deserialize)]
struct ParseText {
    #[serde(rename = "*", default)]
    html: String,
}

/// MediaWiki Action API client.
pub struct WikiClient {
    http: Client,
    api_url: String,
    page_base: String,
}

impl WikiClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            api_url: settings.wiki_api_url.clone(),
            page_base: settings.wiki_page_base.clone(),
        })
    }

    async fn get_text(&self, url: &str, params: &[(&str, &str)]) -> FetchResult<String> {
        let resp = self.http.get(url).query(params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }

    async fn parse(&self, params: &[(&str, &str)]) -> FetchResult<ParseBody> {
        let mut all = vec![("action", "parse"), ("format", "json"), ("redirects", "1")];
        all.extend_from_slice(params);
        let body = self.get_text(&self.api_url, &all).await?;
        let parsed: ParseResponse = serde_json::from_str(&body)?;
        parsed
            .parse
            .ok_or_else(|| FetchError::Parse("missing 'parse' object".into()))
    }

    async fn parse_html(&self, params: &[(&str, &str)]) -> FetchResult<String> {
        let body = self.parse(params).await?;
        match body.text {
            Some(t) if !t.html.is_empty() => Ok(t.html),
            _ => Err(FetchError::Parse("empty rendered text".into())),
        }
    }
}

#[async_trait]
impl WikiSource for WikiClient {
    async fn search_top(&self, query: &str) -> FetchResult<Option<String>> {
        let params = [
            ("action", "query"),
            ("list", "search"),
            ("srsearch", query),
            ("format", "json"),
            ("srlimit", SEARCH_LIMIT),
        ];
        let body = self.get_text(&self.api_url, &params).await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        let top = parsed
            .query
            .and_then(|q| q.search.into_iter().next())
            .map(|hit| hit.title);
        debug!(query, ?top, "search");
        Ok(top)
    }

    async fn sections(&self, page: &str) -> FetchResult<Vec<SectionDescriptor>> {
        let body = self.parse(&[("page", page), ("prop", "sections")]).await?;
        Ok(body.sections)
    }

    async fn section_html(&self, page: &str, index: &str) -> FetchResult<String> {
        self.parse_html(&[("page", page), ("prop", "text"), ("section", index)])
            .await
    }

    async fn page_html(&self, page: &str) -> FetchResult<String> {
        self.parse_html(&[("page", page), ("prop", "text")]).await
    }

    async fn fetch_url(&self, url: &str) -> FetchResult<String> {
        self.get_text(url, &[]).await
    }

    fn page_base(&self) -> &str {
        &self.page_base
    }
}
