use super::{CatalogError, CatalogProvider, EpisodeEntry, SeriesDetail, SeriesEntry};
use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::LazyLock;

/// Default catalog site
pub const DEFAULT_CATALOG_URL: &str = "https://twist.moe";

/// Line that precedes the JSON series object on a series page
const SERIES_OBJECT_LINE: &str = r#"<script id="series-object" type="application/json">"#;

static SERIES_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<a href="/a/([a-zA-Z0-9-]+?)" class="series-title" data-title="([^"]*?)"(?: data-alt="([^"]*?)")?>[^<]+"#,
    )
    .expect("series link pattern is valid")
});

#[derive(Debug, Deserialize)]
struct RawSeriesDetail {
    #[serde(alias = "Title")]
    title: String,
    #[serde(default, alias = "altTitle", alias = "AltTitle")]
    alt_title: Option<String>,
    #[serde(default, alias = "Episodes")]
    episodes: Vec<RawEpisode>,
}

#[derive(Debug, Deserialize)]
struct RawEpisode {
    #[serde(alias = "Number")]
    number: u32,
    #[serde(default, alias = "Source")]
    source: Option<String>,
}

/// Catalog scraped from the twist.moe web site
pub struct TwistCatalog {
    base_url: String,
    client: reqwest::Client,
}

impl TwistCatalog {
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("plottwist/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(&self, url: &str) -> Result<String, CatalogError> {
        log::debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl CatalogProvider for TwistCatalog {
    async fn list_series(&self) -> Result<Vec<SeriesEntry>, CatalogError> {
        let body = self.fetch_page(&self.base_url).await?;
        let series = parse_series_list(&body);
        log::debug!("Catalog lists {} series", series.len());
        Ok(series)
    }

    async fn get_episodes(&self, slug: &str) -> Result<SeriesDetail, CatalogError> {
        if !is_valid_slug(slug) {
            return Err(CatalogError::NotFound(slug.to_string()));
        }

        let url = format!("{}/a/{}", self.base_url, slug);
        let body = match self.fetch_page(&url).await {
            Err(CatalogError::Http(e)) if e.status() == Some(StatusCode::NOT_FOUND) => {
                return Err(CatalogError::NotFound(slug.to_string()));
            }
            result => result?,
        };

        parse_series_detail(&body, slug, &self.base_url)
    }

    fn episode_url(&self, slug: &str, number: u32) -> String {
        format!("{}/a/{}/{}", self.base_url, slug, number)
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Extract every series link of the catalog home page
fn parse_series_list(body: &str) -> Vec<SeriesEntry> {
    SERIES_LINK
        .captures_iter(body)
        .filter_map(|caps| {
            let slug = caps.get(1)?.as_str();
            let title = decode_entities(caps.get(2)?.as_str());
            if slug.is_empty() || title.is_empty() {
                return None;
            }

            let topic = match caps.get(3).map(|alt| decode_entities(alt.as_str())) {
                Some(alt) if !alt.is_empty() => format!("{} ({})", title, alt),
                _ => title,
            };

            Some(SeriesEntry {
                slug: slug.to_string(),
                topic,
            })
        })
        .collect()
}

/// Read the JSON series object embedded in a series page
fn parse_series_detail(body: &str, slug: &str, base_url: &str) -> Result<SeriesDetail, CatalogError> {
    let mut lines = body.lines();
    if !lines.by_ref().any(|line| line.trim() == SERIES_OBJECT_LINE) {
        return Err(CatalogError::NotFound(slug.to_string()));
    }

    let json = lines
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| CatalogError::Fetch(format!("empty series object for '{}'", slug)))?;
    let raw: RawSeriesDetail = serde_json::from_str(json)?;

    let episodes = raw
        .episodes
        .into_iter()
        .map(|episode| EpisodeEntry {
            source: episode
                .source
                .map(|source| source.trim().to_string())
                .filter(|source| !source.is_empty())
                .map(|source| format!("{}{}", base_url, source)),
            ..EpisodeEntry::new(slug, episode.number)
        })
        .collect();

    Ok(SeriesDetail {
        title: raw.title,
        alt_title: raw.alt_title,
        episodes,
    })
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HOME_PAGE: &str = r#"<html>
<body>
  <ul class="series">
    <li><a href="/a/naruto" class="series-title" data-title="Naruto">Naruto</a></li>
    <li><a href="/a/shingeki" class="series-title" data-title="Shingeki no Kyojin" data-alt="Attack on Titan">Shingeki no Kyojin</a></li>
    <li><a href="/a/tom-jerry" class="series-title" data-title="Tom &amp; Jerry" data-alt="">Tom &amp; Jerry</a></li>
    <li><a href="/a/untitled" class="series-title" data-title="">?</a></li>
    <li><a href="/a/jojo" class="series-title" data-title="JoJo&#8217;s Bizarre Adventure" data-alt="Pok&eacute;mon &#x2013; Crossover">JoJo</a></li>
    <li><a href="/a/hidden" class="series-title" data-title="Hidden"></a></li>
    <li><a href="/about">About</a></li>
  </ul>
</body>
</html>"#;

    fn series_page(json: &str) -> String {
        format!(
            "<html>\n<head>\n    {}\n    {}\n    </script>\n</head>\n</html>",
            SERIES_OBJECT_LINE, json
        )
    }

    #[test]
    fn test_parse_series_list() {
        let series = parse_series_list(HOME_PAGE);
        assert_eq!(
            series,
            vec![
                SeriesEntry {
                    slug: "naruto".into(),
                    topic: "Naruto".into()
                },
                SeriesEntry {
                    slug: "shingeki".into(),
                    topic: "Shingeki no Kyojin (Attack on Titan)".into()
                },
                SeriesEntry {
                    slug: "tom-jerry".into(),
                    topic: "Tom & Jerry".into()
                },
                SeriesEntry {
                    slug: "jojo".into(),
                    topic: "JoJo\u{2019}s Bizarre Adventure (Pok\u{e9}mon \u{2013} Crossover)".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_series_detail_sets_slug_and_source() {
        let page = series_page(
            r#"{"title":"Naruto","alt_title":"NARUTO","episodes":[{"number":1,"source":" /video/1.mp4 "},{"number":2}]}"#,
        );
        let detail = parse_series_detail(&page, "naruto", "https://catalog.test").unwrap();

        assert_eq!(detail.topic(), "Naruto (NARUTO)");
        assert_eq!(detail.episodes.len(), 2);
        assert_eq!(detail.episodes[0].slug, "naruto");
        assert_eq!(
            detail.episodes[0].source.as_deref(),
            Some("https://catalog.test/video/1.mp4")
        );
        assert_eq!(detail.episodes[1].display_token(), "naruto--002");
        assert_eq!(detail.episodes[1].source, None);
    }

    #[test]
    fn test_parse_series_detail_without_object_is_not_found() {
        let result = parse_series_detail("<html></html>", "naruto", "https://catalog.test");
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_parse_series_detail_bad_json() {
        let page = series_page("{not json");
        let result = parse_series_detail(&page, "naruto", "https://catalog.test");
        assert!(matches!(result, Err(CatalogError::Json(_))));
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("one-piece"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug("a b"));
    }

    #[tokio::test]
    async fn test_list_series_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HOME_PAGE))
            .mount(&server)
            .await;

        let catalog = TwistCatalog::new(&server.uri()).unwrap();
        let series = catalog.list_series().await.unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].slug, "naruto");
    }

    #[tokio::test]
    async fn test_list_series_server_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let catalog = TwistCatalog::new(&server.uri()).unwrap();
        let err = catalog.list_series().await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_episodes_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/naruto"))
            .respond_with(ResponseTemplate::new(200).set_body_string(series_page(
                r#"{"title":"Naruto","episodes":[{"number":1,"source":"/v/1.mp4"}]}"#,
            )))
            .mount(&server)
            .await;

        let catalog = TwistCatalog::new(&server.uri()).unwrap();
        let detail = catalog.get_episodes("naruto").await.unwrap();
        assert_eq!(detail.title, "Naruto");
        assert_eq!(
            detail.episodes[0].source,
            Some(format!("{}/v/1.mp4", server.uri()))
        );
    }

    #[tokio::test]
    async fn test_get_episodes_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let catalog = TwistCatalog::new(&server.uri()).unwrap();
        let err = catalog.get_episodes("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_episodes_rejects_bad_slug_without_request() {
        let catalog = TwistCatalog::new("http://127.0.0.1:9").unwrap();
        let err = catalog.get_episodes("../secret").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_episode_url() {
        let catalog = TwistCatalog::new("https://twist.moe/").unwrap();
        assert_eq!(catalog.base_url(), "https://twist.moe");
        assert_eq!(catalog.episode_url("naruto", 1), "https://twist.moe/a/naruto/1");
    }
}
