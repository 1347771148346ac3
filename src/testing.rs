//! Test fixtures: an in-memory [`ContentSource`] and record builders.

use crate::article::{Article, ArticleSummary, ContentBlock};
use crate::client::{ContentSource, Cursor, Error, QueryOptions, ResultsPage, Result};
use crate::date::PublicationDate;
use crate::richtext::Node;
use crate::theme::Theme;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use url::Url;

/// Serves summaries in pages of whatever size the first query asks for, and
/// articles by uid. Counts every request and can fail the next one.
pub struct MemorySource {
    summaries: Vec<ArticleSummary>,
    articles: HashMap<String, Article>,
    requests: AtomicUsize,
    fail_next: AtomicBool,
}

impl MemorySource {
    pub fn new(summaries: Vec<ArticleSummary>, articles: Vec<Article>) -> MemorySource {
        MemorySource {
            summaries,
            articles: articles.into_iter().map(|a| (a.uid.clone(), a)).collect(),
            requests: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Builds a source whose listing contains exactly `articles`.
    pub fn with_articles(articles: Vec<Article>) -> MemorySource {
        let summaries = articles
            .iter()
            .map(|a| ArticleSummary {
                uid: a.uid.clone(),
                publication_date: a.publication_date,
                title: a.title.clone(),
                subtitle: format!("About {}", a.title),
                author: a.author.clone(),
            })
            .collect();
        MemorySource::new(summaries, articles)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn fail_next_request(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn request(&self, path: &str) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Status {
                path: path.to_owned(),
                status: 503,
                body: String::from("service unavailable"),
            });
        }
        Ok(())
    }

    fn page(&self, offset: usize, size: usize) -> Result<ResultsPage<ArticleSummary>> {
        let end = (offset + size).min(self.summaries.len());
        let next_page = match end < self.summaries.len() {
            false => None,
            true => Some(Cursor::new(Url::parse(&format!(
                "memory://summaries?offset={}&size={}",
                end, size
            ))?)),
        };
        Ok(ResultsPage {
            results: self.summaries[offset.min(end)..end].to_vec(),
            next_page,
        })
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn query_summaries(&self, options: &QueryOptions) -> Result<ResultsPage<ArticleSummary>> {
        self.request("summaries")?;
        self.page(0, options.page_size)
    }

    async fn article_by_uid(&self, uid: &str) -> Result<Option<Article>> {
        self.request(uid)?;
        Ok(self.articles.get(uid).cloned())
    }

    async fn next_summaries(&self, cursor: &Cursor) -> Result<ResultsPage<ArticleSummary>> {
        self.request(cursor.as_url().path())?;
        let param = |name: &str| {
            cursor
                .as_url()
                .query_pairs()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0)
        };
        self.page(param("offset"), param("size"))
    }
}

pub fn date(s: &str) -> Option<PublicationDate> {
    PublicationDate::parse(s)
}

pub fn summary(uid: &str) -> ArticleSummary {
    ArticleSummary {
        uid: uid.to_owned(),
        publication_date: date("2024-03-15T10:30:00+0000"),
        title: format!("Title {}", uid),
        subtitle: format!("Subtitle {}", uid),
        author: String::from("Joseph Oliveira"),
    }
}

pub fn article(uid: &str) -> Article {
    Article {
        uid: uid.to_owned(),
        publication_date: date("2024-03-15T10:30:00+0000"),
        title: format!("Title {}", uid),
        banner_url: String::from("https://images.example/banner.png"),
        author: String::from("Joseph Oliveira"),
        content: vec![ContentBlock {
            heading: String::from("Intro"),
            body: vec![Node::paragraph("hello world test")],
        }],
    }
}

/// The theme shipped in `theme/`.
pub fn theme() -> Theme {
    Theme::parse(
        include_str!("../theme/listing.html"),
        include_str!("../theme/article.html"),
        include_str!("../theme/fallback.html"),
        include_str!("../theme/not_found.html"),
    )
    .unwrap()
}
