//! Converts the site's records into template [`Value`]s. Every string placed
//! in a value is HTML-escaped, except the rendered article body which the
//! rich-text renderer has already escaped.

use crate::article::{self, Article, ArticleSummary};
use crate::date;
use crate::listing::{ListingView, LoadStatus};
use crate::site::article_path;
use chrono::Locale;
use gtmpl::Value;
use pulldown_cmark::escape::escape_html;
use std::collections::HashMap;
use std::io;

/// Site-wide settings every page needs.
#[derive(Clone, Copy, Debug)]
pub struct Presentation<'a> {
    pub site_title: &'a str,

    /// The locale dates are formatted in.
    pub locale: Locale,
}

fn escaped(s: &str) -> io::Result<Value> {
    let mut out = String::with_capacity(s.len());
    escape_html(&mut out, s)?;
    Ok(Value::String(out))
}

fn object(fields: Vec<(&str, Value)>) -> Value {
    let m: HashMap<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();
    Value::Object(m)
}

/// A formatted date, or nil when there is none.
fn date_value(date: Option<&date::PublicationDate>, locale: Locale) -> Value {
    match date::format_optional(date, locale) {
        Some(formatted) => Value::String(formatted),
        None => Value::Nil,
    }
}

/// A listing entry with fields `uid`, `url`, `title`, `subtitle`, `author`,
/// and `date`.
pub fn summary_value(summary: &ArticleSummary, locale: Locale) -> io::Result<Value> {
    Ok(object(vec![
        ("uid", escaped(&summary.uid)?),
        // file names of non-slug identifiers carry percent signs
        ("url", escaped(&article_path(&summary.uid).replace('%', "%25"))?),
        ("title", escaped(&summary.title)?),
        ("subtitle", escaped(&summary.subtitle)?),
        ("author", escaped(&summary.author)?),
        ("date", date_value(summary.publication_date.as_ref(), locale)),
    ]))
}

/// The listing page: `items`, `next_page` (nil once exhausted),
/// `show_load_more`, and `error` (nil unless the last load failed).
pub fn listing_value(p: Presentation, view: &ListingView) -> io::Result<Value> {
    let items = view
        .items()
        .iter()
        .map(|summary| summary_value(summary, p.locale))
        .collect::<io::Result<Vec<Value>>>()?;
    let error = match view.status() {
        LoadStatus::Failed(message) => escaped(message)?,
        _ => Value::Nil,
    };
    let next_page = match view.next_cursor() {
        Some(cursor) => escaped(cursor.as_url().as_str())?,
        None => Value::Nil,
    };
    Ok(object(vec![
        ("site_title", escaped(p.site_title)?),
        ("items", Value::Array(items)),
        ("next_page", next_page),
        ("show_load_more", Value::Bool(view.can_load_more())),
        ("error", error),
    ]))
}

/// An article page: `title`, `banner_url`, `author`, `date`,
/// `reading_time` (minutes), and `body` (HTML).
pub fn article_value(p: Presentation, article: &Article) -> io::Result<Value> {
    Ok(object(vec![
        ("site_title", escaped(p.site_title)?),
        ("title", escaped(&article.title)?),
        ("banner_url", escaped(&article.banner_url)?),
        ("author", escaped(&article.author)?),
        ("date", date_value(article.publication_date.as_ref(), p.locale)),
        (
            "reading_time",
            Value::String(article::reading_time(&article.content).to_string()),
        ),
        ("body", Value::String(article::render_body(&article.content)?)),
    ]))
}

/// The placeholder page shown while an article is generated.
pub fn fallback_value(p: Presentation) -> io::Result<Value> {
    Ok(object(vec![("site_title", escaped(p.site_title)?)]))
}

/// The not-found page, naming the requested identifier if there was one.
pub fn not_found_value(p: Presentation, uid: Option<&str>) -> io::Result<Value> {
    Ok(object(vec![
        ("site_title", escaped(p.site_title)?),
        (
            "uid",
            match uid {
                Some(uid) => escaped(uid)?,
                None => Value::Nil,
            },
        ),
    ]))
}
