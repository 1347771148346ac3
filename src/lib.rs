//! The library code for the `spacetravelling` blog frontend. Articles live in
//! a headless CMS (Prismic); this crate fetches them and renders static HTML
//! pages. The architecture can be generally broken down into three steps:
//!
//! 1. Fetching article summaries and full articles from the content API
//!    ([`crate::client`]), decoding their rich text ([`crate::richtext`]) and
//!    dates ([`crate::date`])
//! 2. Rendering pages with the theme's templates ([`crate::theme`],
//!    [`crate::value`]) into a page store ([`crate::site`]) that knows which
//!    pages are fresh, which are stale and which were never generated
//! 3. Writing the pages to disk ([`crate::write`], [`crate::build`])
//!
//! The listing page shows the first page of summaries; later pages are
//! appended by "load more" ([`crate::listing`]). Article pages carry an
//! estimated reading time ([`crate::article`]). Pages are regenerated once
//! they are older than the revalidation window, and articles that were not
//! pre-rendered are generated on their first request.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod article;
pub mod build;
pub mod client;
pub mod config;
pub mod date;
pub mod listing;
pub mod richtext;
pub mod site;
pub mod theme;
pub mod value;
pub mod write;

#[cfg(test)]
mod testing;
