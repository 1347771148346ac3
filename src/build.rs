//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: restoring previously generated
//! pages ([`crate::write`]), regenerating the missing or stale ones
//! ([`crate::site`]), writing them, and copying the theme's static assets into
//! the output directory. [`build_article`] is the on-demand counterpart for a
//! single article page.

use crate::client::ContentSource;
use crate::config::Config;
use crate::site::{self, article_path, PageStatus, Response, Site};
use crate::theme::{self, Theme};
use crate::write::{self, copy_dir, Writer};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Loads the theme and restores the pages of an earlier build.
fn open_site<S: ContentSource>(config: &Config, source: S, writer: &Writer) -> Result<Site<S>> {
    let theme = Theme::load(&config.theme_directory)?;
    let mut site = Site::new(source, theme, config.site.clone());
    for (path, page) in writer.load_pages()? {
        site.seed(path, page);
    }
    Ok(site)
}

/// Builds the site described by `config` as of `now`: the listing page, the
/// pre-rendered article pages and the not-found page. Pages an earlier build
/// left in the output directory are kept until they go stale. Returns the
/// paths of the pages that were (re)generated.
pub async fn build_site<S: ContentSource>(
    config: &Config,
    source: S,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let writer = Writer {
        output_directory: &config.output_directory,
    };
    let mut site = open_site(config, source, &writer)?;

    let generated = site.prerender(now).await?;
    let written = writer.write_pages(
        site.pages()
            .filter(|(path, _)| generated.iter().any(|g| g.as_str() == *path)),
    )?;
    writer.write_not_found(&site.render_not_found(None)?)?;

    // Unlike pages, static assets are always replaced.
    rmdir(&config.static_output_directory)?;
    if config.static_source_directory.is_dir() {
        copy_dir(
            &config.static_source_directory,
            &config.static_output_directory,
        )?;
    }

    tracing::info!(
        generated = generated.len(),
        written,
        output = %config.output_directory.display(),
        "built site"
    );
    Ok(generated)
}

/// Produces the page for the article `uid` on demand, the way a request for
/// a page that was not pre-rendered is answered. A fresh page is left as is;
/// a stale or missing one is generated and written. Returns the status of the
/// resulting page, which is [`PageStatus::NotFound`] for unknown identifiers
/// and when fallback generation is disabled.
pub async fn build_article<S: ContentSource>(
    config: &Config,
    source: S,
    uid: &str,
    now: DateTime<Utc>,
) -> Result<PageStatus> {
    let writer = Writer {
        output_directory: &config.output_directory,
    };
    let mut site = open_site(config, source, &writer)?;
    let path = article_path(uid);

    match site.request_article(uid, now).await? {
        Response::Fallback(_) => {
            tracing::info!(uid, "article was not pre-rendered; generating it");
            site.generate_article(uid, now).await?;
        }
        Response::NotFound(_) => {
            tracing::info!(uid, "article was not pre-rendered and fallback is disabled");
            return Ok(PageStatus::NotFound);
        }
        Response::Page { .. } => {}
    }

    match site.page(&path) {
        Some(page) => {
            writer.write_pages(std::iter::once((path.as_str(), page)))?;
            Ok(page.status)
        }
        None => Ok(PageStatus::NotFound),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during loading the
/// theme, generating pages, writing output files, and cleaning output
/// directories.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned for errors loading the theme.
    #[error(transparent)]
    Theme(#[from] theme::Error),

    /// Returned for errors fetching content or rendering pages.
    #[error(transparent)]
    Site(#[from] site::Error),

    /// Returned for errors reading or writing output files.
    #[error(transparent)]
    Write(#[from] write::Error),

    /// Returned for I/O problems while cleaning output directories.
    #[error("cleaning directory '{}': {}", .path.display(), .err)]
    Clean { path: PathBuf, err: std::io::Error },
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}
