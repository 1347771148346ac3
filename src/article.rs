//! Defines the [`Article`] and [`ArticleSummary`] records and the logic for
//! presenting an article: its estimated reading time ([`reading_time`]) and
//! its body flattened into HTML ([`render_body`]).

use crate::date::PublicationDate;
use crate::richtext::{self, Node};
use pulldown_cmark::escape::escape_html;
use serde::Deserialize;
use std::io;

/// The reading speed assumed by [`reading_time`].
pub const WORDS_PER_MINUTE: usize = 200;

/// The fields of an article shown on the listing page.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleSummary {
    /// The article's unique, URL-safe identifier.
    pub uid: String,
    pub publication_date: Option<PublicationDate>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A complete article.
#[derive(Clone, Debug, PartialEq)]
pub struct Article {
    pub uid: String,
    pub publication_date: Option<PublicationDate>,
    pub title: String,

    /// The URL of the banner image shown above the article. Empty when the
    /// article has no banner.
    pub banner_url: String,
    pub author: String,

    /// The article body as a sequence of headed sections.
    pub content: Vec<ContentBlock>,
}

/// A section of an article: a heading and a rich-text body.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ContentBlock {
    #[serde(default, deserialize_with = "richtext::nullable")]
    pub heading: String,

    #[serde(default)]
    pub body: Vec<Node>,
}

/// Counts the words in every heading and every body of `content`.
pub fn word_count(content: &[ContentBlock]) -> usize {
    content
        .iter()
        .map(|block| {
            block.heading.split_whitespace().count()
                + richtext::as_text(&block.body).split_whitespace().count()
        })
        .sum()
}

/// Estimates how many minutes it takes to read `content`, rounding up to the
/// next whole minute. An article without content takes 0 minutes.
pub fn reading_time(content: &[ContentBlock]) -> usize {
    let words = word_count(content);
    (words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE
}

/// Flattens `content` into HTML: for each block, an `<h2>` with the heading
/// followed by the body's HTML. The result is injected into the article page
/// without further escaping.
pub fn render_body(content: &[ContentBlock]) -> io::Result<String> {
    let mut out = String::new();
    for block in content {
        out.push_str("<h2>");
        escape_html(&mut out, &block.heading)?;
        out.push_str("</h2>");
        richtext::push_html(&mut out, &block.body)?;
    }
    Ok(out)
}
