//! The content client: typed access to the headless CMS.
//!
//! [`ContentSource`] is the seam between page generation and the CMS. The
//! HTTP implementation, [`PrismicClient`], talks to a Prismic `api/v2`
//! repository. Responses are parsed into [`ArticleSummary`] and [`Article`]
//! records right here, so a document of the wrong shape fails the request
//! instead of leaking missing fields into the pages.

use crate::article::{Article, ArticleSummary, ContentBlock};
use crate::date::{self, PublicationDate};
use crate::richtext;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use url::Url;

/// An opaque continuation token: the URL of the next page of results.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Cursor(Url);

impl Cursor {
    pub fn new(url: Url) -> Cursor {
        Cursor(url)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One page of query results and the cursor of the page after it, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsPage<T> {
    pub results: Vec<T>,
    pub next_page: Option<Cursor>,
}

/// Options for [`ContentSource::query_summaries`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryOptions {
    /// Restricts the document fields returned, e.g. `post.title`. Empty means
    /// all fields.
    pub fetch_fields: Vec<String>,

    /// The number of documents per page.
    pub page_size: usize,
}

/// Read access to the articles hosted by the CMS.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches the first page of article summaries.
    async fn query_summaries(&self, options: &QueryOptions) -> Result<ResultsPage<ArticleSummary>>;

    /// Fetches the article with identifier `uid`, or [`None`] if there is no
    /// such article.
    async fn article_by_uid(&self, uid: &str) -> Result<Option<Article>>;

    /// Fetches the page of summaries that `cursor` points to.
    async fn next_summaries(&self, cursor: &Cursor) -> Result<ResultsPage<ArticleSummary>>;
}

/// A [`ContentSource`] backed by a Prismic repository.
pub struct PrismicClient {
    client: Client,

    /// The repository's API entry point, e.g.
    /// `https://my-repo.cdn.prismic.io/api/v2`.
    endpoint: Url,

    /// The custom type of article documents, e.g. `post`.
    document_type: String,

    access_token: Option<String>,
}

impl PrismicClient {
    pub fn new(endpoint: Url, document_type: &str, access_token: Option<String>) -> Result<Self> {
        let client = Client::builder().pool_max_idle_per_host(4).build()?;
        Ok(PrismicClient {
            client,
            endpoint,
            document_type: document_type.to_owned(),
            access_token,
        })
    }

    /// Looks up the repository's master ref, which identifies the currently
    /// published content and must accompany every search.
    async fn master_ref(&self) -> Result<String> {
        let mut url = self.endpoint.clone();
        self.authorize(&mut url);
        let info: ApiInfo = self.get_json(url).await?;
        info.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(Error::NoMasterRef)
    }

    /// Builds a `documents/search` URL for predicate `q` against the current
    /// master ref.
    async fn search_url(&self, q: &str, page_size: usize, fetch: &[String]) -> Result<Url> {
        let master_ref = self.master_ref().await?;
        self.build_search_url(&master_ref, q, page_size, fetch)
    }

    fn build_search_url(
        &self,
        master_ref: &str,
        q: &str,
        page_size: usize,
        fetch: &[String],
    ) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/documents/search",
            self.endpoint.as_str().trim_end_matches('/')
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ref", master_ref);
            query.append_pair("q", q);
            query.append_pair("pageSize", &page_size.to_string());
            if !fetch.is_empty() {
                query.append_pair("fetch", &fetch.join(","));
            }
        }
        self.authorize(&mut url);
        Ok(url)
    }

    /// Appends the access token unless the URL already carries one.
    fn authorize(&self, url: &mut Url) {
        if let Some(token) = &self.access_token {
            if !url.query_pairs().any(|(k, _)| k == "access_token") {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        // the query may hold the access token, so only the path is logged
        let path = url.path().to_owned();
        tracing::debug!(path = %path, "content API request");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                path,
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn query_summaries(&self, options: &QueryOptions) -> Result<ResultsPage<ArticleSummary>> {
        let q = format!(r#"[[at(document.type, "{}")]]"#, quote(&self.document_type));
        let url = self
            .search_url(&q, options.page_size, &options.fetch_fields)
            .await?;
        let response: SearchResponse<SummaryData> = self.get_json(url).await?;
        response.into_summaries()
    }

    async fn article_by_uid(&self, uid: &str) -> Result<Option<Article>> {
        let q = format!(
            r#"[[at(my.{}.uid, "{}")]]"#,
            self.document_type,
            quote(uid)
        );
        let url = self.search_url(&q, 1, &[]).await?;
        let response: SearchResponse<ArticleData> = self.get_json(url).await?;
        match response.results.into_iter().next() {
            Some(document) => Ok(Some(document.into_article()?)),
            None => Ok(None),
        }
    }

    async fn next_summaries(&self, cursor: &Cursor) -> Result<ResultsPage<ArticleSummary>> {
        let mut url = cursor.as_url().clone();
        self.authorize(&mut url);
        let response: SearchResponse<SummaryData> = self.get_json(url).await?;
        response.into_summaries()
    }
}

/// Escapes `s` for use inside a double-quoted predicate argument.
fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Deserialize)]
struct ApiInfo {
    refs: Vec<Ref>,
}

#[derive(Deserialize)]
struct Ref {
    #[serde(rename = "ref")]
    reference: String,

    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

/// The body of a search response: `{results: [...], next_page: string|null}`.
#[derive(Deserialize)]
struct SearchResponse<D> {
    results: Vec<Document<D>>,

    #[serde(default)]
    next_page: Option<Cursor>,
}

impl SearchResponse<SummaryData> {
    fn into_summaries(self) -> Result<ResultsPage<ArticleSummary>> {
        Ok(ResultsPage {
            results: self
                .results
                .into_iter()
                .map(Document::into_summary)
                .collect::<Result<Vec<_>>>()?,
            next_page: self.next_page,
        })
    }
}

#[derive(Deserialize)]
struct Document<D> {
    #[serde(default)]
    uid: Option<String>,

    #[serde(default, deserialize_with = "date::deserialize_optional")]
    first_publication_date: Option<PublicationDate>,

    data: D,
}

impl<D> Document<D> {
    fn uid(&mut self) -> Result<String> {
        self.uid.take().ok_or(Error::MissingUid)
    }
}

impl Document<SummaryData> {
    fn into_summary(mut self) -> Result<ArticleSummary> {
        Ok(ArticleSummary {
            uid: self.uid()?,
            publication_date: self.first_publication_date,
            title: self.data.title,
            subtitle: self.data.subtitle,
            author: self.data.author,
        })
    }
}

impl Document<ArticleData> {
    fn into_article(mut self) -> Result<Article> {
        Ok(Article {
            uid: self.uid()?,
            publication_date: self.first_publication_date,
            title: self.data.title,
            banner_url: self.data.banner.url.unwrap_or_default(),
            author: self.data.author,
            content: self.data.content,
        })
    }
}

// Key-text fields come back as `null` when left empty in the CMS, so they are
// all read through `richtext::nullable`.

#[derive(Deserialize)]
struct SummaryData {
    #[serde(default, deserialize_with = "richtext::nullable")]
    title: String,

    #[serde(default, deserialize_with = "richtext::nullable")]
    subtitle: String,

    #[serde(default, deserialize_with = "richtext::nullable")]
    author: String,
}

#[derive(Deserialize)]
struct ArticleData {
    #[serde(default, deserialize_with = "richtext::nullable")]
    title: String,

    #[serde(default)]
    banner: Banner,

    #[serde(default, deserialize_with = "richtext::nullable")]
    author: String,

    content: Vec<ContentBlock>,
}

#[derive(Default, Deserialize)]
struct Banner {
    #[serde(default)]
    url: Option<String>,
}

/// The result of a content-client operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to fetch content.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the request could not be sent or its body could not be
    /// read.
    #[error("content API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Returned when the content API answers with a non-success status.
    #[error("content API returned {status} for `{path}`: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// Returned when a response body does not have the expected shape.
    #[error("decoding content API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Returned when a request URL cannot be built.
    #[error("building content API URL: {0}")]
    Url(#[from] url::ParseError),

    /// Returned when the repository does not advertise a master ref.
    #[error("content API did not advertise a master ref")]
    NoMasterRef,

    /// Returned when a document in the results has no `uid`.
    #[error("document without a uid in content API results")]
    MissingUid,
}
