use scraper::{Html, Selector};
use url::Url;
use watch_logging::watch_debug;

use crate::{FailureKind, FetchError, Fetcher};

/// Produces the ordered candidate document locations for one task.
#[async_trait::async_trait]
pub trait IndexSource: Send + Sync {
    async fn locations(&self, fetcher: &dyn Fetcher) -> Result<Vec<String>, FetchError>;
}

/// Reads an index page and keeps the anchors whose `href` starts with a path
/// prefix, in document order, resolved against the index URL.
#[derive(Debug, Clone)]
pub struct AnchorIndexSource {
    index_url: Url,
    link_prefix: String,
}

impl AnchorIndexSource {
    pub fn new(index_url: &str, link_prefix: impl Into<String>) -> Result<Self, FetchError> {
        let index_url = Url::parse(index_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        Ok(Self {
            index_url,
            link_prefix: link_prefix.into(),
        })
    }

    pub fn index_url(&self) -> &str {
        self.index_url.as_str()
    }

    /// Scans already-fetched index HTML.
    pub fn scan(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(anchors) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        document
            .select(&anchors)
            .filter_map(|anchor| anchor.value().attr("href"))
            .map(str::trim)
            .filter(|href| href.starts_with(&self.link_prefix))
            .filter_map(|href| match self.index_url.join(href) {
                Ok(url) => Some(url.to_string()),
                Err(err) => {
                    watch_debug!("Skipping unresolvable link {:?}: {}", href, err);
                    None
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl IndexSource for AnchorIndexSource {
    async fn locations(&self, fetcher: &dyn Fetcher) -> Result<Vec<String>, FetchError> {
        let html = fetcher.fetch(self.index_url.as_str()).await?;
        let links = self.scan(&html);
        watch_debug!("Index {} lists {} candidate(s)", self.index_url, links.len());
        Ok(links)
    }
}

/// Fixed list of locations, for tests and one-off checks.
#[derive(Debug, Clone, Default)]
pub struct StaticIndexSource {
    locations: Vec<String>,
}

impl StaticIndexSource {
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locations: locations.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl IndexSource for StaticIndexSource {
    async fn locations(&self, _fetcher: &dyn Fetcher) -> Result<Vec<String>, FetchError> {
        Ok(self.locations.clone())
    }
}
