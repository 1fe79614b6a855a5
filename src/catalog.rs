//! Series catalog
//!
//! A catalog provider lists the available series and fetches the episode
//! list of one series. Nothing is cached: every call reflects the catalog
//! as it is right now.

use async_trait::async_trait;
use thiserror::Error;

mod twist;

pub use twist::{DEFAULT_CATALOG_URL, TwistCatalog};

use crate::protocol::TOKEN_SEPARATOR;

/// Catalog error types
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Series '{0}' not found")]
    NotFound(String),
    #[error("Catalog fetch error: {0}")]
    Fetch(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

/// One series of the catalog, shown as a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesEntry {
    pub slug: String,
    pub topic: String,
}

/// One episode of a series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeEntry {
    pub slug: String,
    pub number: u32,
    pub source: Option<String>,
}

impl EpisodeEntry {
    pub fn new(slug: impl Into<String>, number: u32) -> Self {
        Self {
            slug: slug.into(),
            number,
            source: None,
        }
    }

    /// Synthetic username of the episode, e.g. `naruto--001`
    pub fn display_token(&self) -> String {
        format!("{}{}{:03}", self.slug, TOKEN_SEPARATOR, self.number)
    }
}

/// Details and episodes of a single series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDetail {
    pub title: String,
    pub alt_title: Option<String>,
    pub episodes: Vec<EpisodeEntry>,
}

impl SeriesDetail {
    pub fn topic(&self) -> String {
        match self.alt_title.as_deref().filter(|alt| !alt.is_empty()) {
            Some(alt) => format!("{} ({})", self.title, alt),
            None => self.title.clone(),
        }
    }
}

/// Source of series and episode listings
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn list_series(&self) -> Result<Vec<SeriesEntry>, CatalogError>;

    async fn get_episodes(&self, slug: &str) -> Result<SeriesDetail, CatalogError>;

    /// Playback URL of one episode
    fn episode_url(&self, slug: &str, number: u32) -> String;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory catalog with a fixed set of series
    #[derive(Default)]
    pub struct StaticCatalog {
        pub series: HashMap<String, SeriesDetail>,
        pub fail_listing: bool,
    }

    impl StaticCatalog {
        pub fn with_series(mut self, slug: &str, title: &str, episodes: &[u32]) -> Self {
            let detail = SeriesDetail {
                title: title.to_string(),
                alt_title: None,
                episodes: episodes
                    .iter()
                    .map(|number| EpisodeEntry::new(slug, *number))
                    .collect(),
            };
            self.series.insert(slug.to_string(), detail);
            self
        }

        pub fn failing_listing(mut self) -> Self {
            self.fail_listing = true;
            self
        }
    }

    #[async_trait]
    impl CatalogProvider for StaticCatalog {
        async fn list_series(&self) -> Result<Vec<SeriesEntry>, CatalogError> {
            if self.fail_listing {
                return Err(CatalogError::Fetch("catalog unreachable".to_string()));
            }
            let mut series: Vec<_> = self
                .series
                .iter()
                .map(|(slug, detail)| SeriesEntry {
                    slug: slug.clone(),
                    topic: detail.topic(),
                })
                .collect();
            series.sort_by(|a, b| a.slug.cmp(&b.slug));
            Ok(series)
        }

        async fn get_episodes(&self, slug: &str) -> Result<SeriesDetail, CatalogError> {
            self.series
                .get(slug)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(slug.to_string()))
        }

        fn episode_url(&self, slug: &str, number: u32) -> String {
            format!("https://catalog.test/a/{}/{}", slug, number)
        }
    }
}
