//! The page store. A [`Site`] pre-renders pages, generates article pages on
//! demand when they were not pre-rendered, and regenerates any page whose
//! last generation is older than the revalidation window. Requests inside
//! the window are answered with the stored page without touching the
//! content API.

use crate::client::{self, ContentSource, QueryOptions};
use crate::listing::ListingView;
use crate::theme::{self, Theme};
use crate::value::{self, Presentation};
use chrono::{DateTime, Duration, Locale, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::io;
use url::form_urlencoded;

/// The store path of the listing page.
pub const LISTING_PATH: &str = "index.html";

/// The largest page size the content API accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Returns the store path (and output file path) of an article page.
/// Identifiers that are already slugs are used as they are; any other
/// identifier is percent-encoded, so distinct identifiers never share a file
/// and none can escape the `post` directory.
pub fn article_path(uid: &str) -> String {
    if slug::slugify(uid) == uid {
        format!("post/{}.html", uid)
    } else {
        let encoded: String = form_urlencoded::byte_serialize(uid.as_bytes()).collect();
        format!("post/{}.html", encoded)
    }
}

/// Which article pages are generated ahead of time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prerender {
    /// Every article.
    All,

    /// The articles on the first page of a query of this size.
    Count(usize),
}

impl<'de> Deserialize<'de> for Prerender {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Prerender, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(usize),
            Keyword(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(n) => Ok(Prerender::Count(n)),
            Raw::Keyword(keyword) if keyword == "all" => Ok(Prerender::All),
            Raw::Keyword(keyword) => Err(DeError::custom(format!(
                "expected `all` or a number of articles, found `{}`",
                keyword
            ))),
        }
    }
}

/// How a [`Site`] generates and serves pages.
#[derive(Clone, Debug)]
pub struct SiteSettings {
    pub site_title: String,
    pub locale: Locale,

    /// The custom type of article documents. Field names in queries are
    /// prefixed with it.
    pub document_type: String,

    /// The number of summaries on the listing page and per "load more".
    pub listing_page_size: usize,
    pub prerender: Prerender,

    /// Whether unknown article identifiers are generated on first request
    /// (`true`) or answered with the not-found page (`false`).
    pub fallback: bool,

    /// How long a generated page is served before it is regenerated.
    pub revalidate: Duration,
}

impl Default for SiteSettings {
    fn default() -> Self {
        SiteSettings {
            site_title: String::from("Spacetravelling"),
            locale: Locale::pt_BR,
            document_type: String::from("post"),
            listing_page_size: 3,
            prerender: Prerender::Count(3),
            fallback: true,
            revalidate: Duration::seconds(86400),
        }
    }
}

impl SiteSettings {
    pub fn presentation(&self) -> Presentation<'_> {
        Presentation {
            site_title: &self.site_title,
            locale: self.locale,
        }
    }

    /// The query behind the listing page: the first page of summaries,
    /// fetching only the fields the listing shows.
    pub fn listing_query(&self) -> QueryOptions {
        QueryOptions {
            fetch_fields: self.fields(&["title", "subtitle", "author"]),
            page_size: self.listing_page_size,
        }
    }

    fn fields(&self, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|name| format!("{}.{}", self.document_type, name))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageStatus {
    Found,

    /// The page is the not-found page for an unknown identifier.
    NotFound,
}

/// A rendered page and when it was rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedPage {
    pub markup: String,
    pub generated_at: DateTime<Utc>,
    pub status: PageStatus,
}

impl GeneratedPage {
    pub fn is_stale(&self, now: DateTime<Utc>, revalidate: Duration) -> bool {
        now.signed_duration_since(self.generated_at) >= revalidate
    }
}

/// What the store holds for a path at a given time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup<'a> {
    /// A page inside the revalidation window.
    Fresh(&'a GeneratedPage),

    /// A page that must be regenerated before it is served again.
    Stale(&'a GeneratedPage),

    /// No page; the loading placeholder is served until one is generated.
    Fallback,

    /// No page, and fallback generation is disabled.
    Missing,
}

/// The answer to an article request.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// A stored page: the article, or the not-found page for an identifier
    /// that is known not to exist.
    Page { markup: String, status: PageStatus },

    /// The article has not been generated yet; this is the loading
    /// placeholder. The page becomes available through
    /// [`Site::generate_article`].
    Fallback(String),

    /// The article was not pre-rendered and fallback generation is disabled.
    NotFound(String),
}

/// Generates and stores the pages of the site.
pub struct Site<S> {
    source: S,
    theme: Theme,
    settings: SiteSettings,
    pages: BTreeMap<String, GeneratedPage>,
}

impl<S: ContentSource> Site<S> {
    pub fn new(source: S, theme: Theme, settings: SiteSettings) -> Site<S> {
        Site {
            source,
            theme,
            settings,
            pages: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub fn page(&self, path: &str) -> Option<&GeneratedPage> {
        self.pages.get(path)
    }

    pub fn pages(&self) -> impl Iterator<Item = (&str, &GeneratedPage)> {
        self.pages.iter().map(|(path, page)| (path.as_str(), page))
    }

    /// Restores a page generated earlier, e.g. by a previous build.
    pub fn seed(&mut self, path: String, page: GeneratedPage) {
        self.pages.insert(path, page);
    }

    pub fn lookup(&self, path: &str, now: DateTime<Utc>) -> Lookup<'_> {
        match self.pages.get(path) {
            Some(page) if page.is_stale(now, self.settings.revalidate) => Lookup::Stale(page),
            Some(page) => Lookup::Fresh(page),
            None if self.settings.fallback => Lookup::Fallback,
            None => Lookup::Missing,
        }
    }

    fn store(&mut self, path: String, page: GeneratedPage) -> &GeneratedPage {
        self.pages.insert(path.clone(), page);
        &self.pages[&path]
    }

    /// Generates the listing page and the configured set of article pages,
    /// skipping pages that are still fresh. Returns the paths of the pages
    /// that were (re)generated.
    ///
    /// A page that fails to regenerate but was generated before keeps its
    /// previous version; a page that was never generated fails the call.
    pub async fn prerender(&mut self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut generated = Vec::new();

        if let Some(stale) = self.needs_generation(LISTING_PATH, now) {
            match self.generate_listing(now).await {
                Ok(_) => generated.push(LISTING_PATH.to_owned()),
                Err(err) if stale => {
                    tracing::warn!(path = LISTING_PATH, error = %err, "keeping stale page")
                }
                Err(err) => return Err(err),
            }
        }

        for uid in self.prerender_uids().await? {
            let path = article_path(&uid);
            if let Some(stale) = self.needs_generation(&path, now) {
                match self.generate_article(&uid, now).await {
                    Ok(_) => generated.push(path),
                    Err(err) if stale => {
                        tracing::warn!(path = %path, error = %err, "keeping stale page")
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        tracing::info!(count = generated.len(), "pre-rendered pages");
        Ok(generated)
    }

    /// Whether pre-rendering must (re)generate `path`: [`None`] for a fresh
    /// page, otherwise whether a stale previous version exists.
    fn needs_generation(&self, path: &str, now: DateTime<Utc>) -> Option<bool> {
        match self.lookup(path, now) {
            Lookup::Fresh(_) => {
                tracing::debug!(path, "page is fresh");
                None
            }
            Lookup::Stale(_) => Some(true),
            Lookup::Fallback | Lookup::Missing => Some(false),
        }
    }

    /// Lists the identifiers of the articles to pre-render.
    async fn prerender_uids(&self) -> Result<Vec<String>> {
        let page_size = match self.settings.prerender {
            Prerender::Count(0) => return Ok(Vec::new()),
            Prerender::Count(n) => n,
            Prerender::All => MAX_PAGE_SIZE,
        };
        let options = QueryOptions {
            fetch_fields: self.settings.fields(&["title"]),
            page_size,
        };
        let mut page = self.source.query_summaries(&options).await?;
        let mut uids: Vec<String> = page.results.drain(..).map(|s| s.uid).collect();

        if self.settings.prerender == Prerender::All {
            while let Some(cursor) = page.next_page.take() {
                page = self.source.next_summaries(&cursor).await?;
                uids.extend(page.results.drain(..).map(|s| s.uid));
            }
        }
        Ok(uids)
    }

    /// Fetches the first page of summaries and renders the listing page.
    pub async fn generate_listing(&mut self, now: DateTime<Utc>) -> Result<&GeneratedPage> {
        let first_page = self
            .source
            .query_summaries(&self.settings.listing_query())
            .await?;
        let view = ListingView::new(first_page);
        let markup = theme::render(
            &self.theme.listing,
            value::listing_value(self.settings.presentation(), &view)?,
        )?;
        tracing::info!(path = LISTING_PATH, articles = view.items().len(), "generated listing page");
        Ok(self.store(
            LISTING_PATH.to_owned(),
            GeneratedPage {
                markup,
                generated_at: now,
                status: PageStatus::Found,
            },
        ))
    }

    /// Fetches and renders the article `uid`. An unknown identifier produces
    /// and stores the not-found page, so it is not fetched again until the
    /// page goes stale.
    pub async fn generate_article(&mut self, uid: &str, now: DateTime<Utc>) -> Result<&GeneratedPage> {
        let path = article_path(uid);
        let page = match self.source.article_by_uid(uid).await? {
            Some(article) => GeneratedPage {
                markup: theme::render(
                    &self.theme.article,
                    value::article_value(self.settings.presentation(), &article)?,
                )?,
                generated_at: now,
                status: PageStatus::Found,
            },
            None => {
                tracing::info!(uid, "article not found");
                GeneratedPage {
                    markup: self.render_not_found(Some(uid))?,
                    generated_at: now,
                    status: PageStatus::NotFound,
                }
            }
        };
        tracing::info!(path = %path, "generated article page");
        Ok(self.store(path, page))
    }

    /// Answers a request for the article `uid`.
    ///
    /// Fresh pages are served as stored. Stale pages are regenerated first;
    /// if that fails the stale page is served. Pages never generated get the
    /// loading placeholder when fallback is enabled, and the not-found page
    /// otherwise.
    pub async fn request_article(&mut self, uid: &str, now: DateTime<Utc>) -> Result<Response> {
        let path = article_path(uid);
        let stale = match self.lookup(&path, now) {
            Lookup::Fresh(_) => false,
            Lookup::Stale(_) => true,
            Lookup::Fallback => return Ok(Response::Fallback(self.render_fallback()?)),
            Lookup::Missing => {
                return Ok(Response::NotFound(self.render_not_found(Some(uid))?));
            }
        };
        if stale {
            if let Err(err) = self.generate_article(uid, now).await {
                tracing::warn!(path = %path, error = %err, "serving stale page");
            }
        }
        let page = &self.pages[&path];
        Ok(Response::Page {
            markup: page.markup.clone(),
            status: page.status,
        })
    }

    /// Renders the loading placeholder.
    pub fn render_fallback(&self) -> Result<String> {
        Ok(theme::render(
            &self.theme.fallback,
            value::fallback_value(self.settings.presentation())?,
        )?)
    }

    /// Renders the not-found page, naming `uid` if given.
    pub fn render_not_found(&self, uid: Option<&str>) -> Result<String> {
        Ok(theme::render(
            &self.theme.not_found,
            value::not_found_value(self.settings.presentation(), uid)?,
        )?)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to generate a page.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when content could not be fetched.
    #[error(transparent)]
    Content(#[from] client::Error),

    /// Returned when a page could not be rendered.
    #[error(transparent)]
    Theme(#[from] theme::Error),

    /// Returned when an article body could not be rendered.
    #[error("rendering article body: {0}")]
    Io(#[from] io::Error),
}
