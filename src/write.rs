//! Writes generated pages to the output directory and reads them back so a
//! later build can tell which pages are still fresh.

use crate::site::{GeneratedPage, PageStatus, LISTING_PATH};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The file the not-found page is written to.
pub const NOT_FOUND_FILE: &str = "404.html";

/// The output directory of article pages.
const ARTICLE_DIRECTORY: &str = "post";

/// Writes [`GeneratedPage`]s under an output directory. Page paths are store
/// paths such as `index.html` or `post/{slug}.html`.
pub struct Writer<'a> {
    pub output_directory: &'a Path,
}

impl Writer<'_> {
    fn file_path(&self, path: &str) -> PathBuf {
        self.output_directory.join(path)
    }

    /// Writes a single page to disk. The page's directory must exist.
    fn write_page(&self, path: &str, page: &GeneratedPage) -> Result<()> {
        let file_path = self.file_path(path);
        fs::write(&file_path, &page.markup).map_err(|err| Error::Io {
            path: file_path.clone(),
            err,
        })?;
        tracing::debug!(path = %file_path.display(), "wrote page");
        Ok(())
    }

    /// Writes every found page to disk, creating directories as needed.
    /// Not-found pages are not written; the site's [`NOT_FOUND_FILE`] covers
    /// them.
    pub fn write_pages<'p>(
        &self,
        pages: impl Iterator<Item = (&'p str, &'p GeneratedPage)>,
    ) -> Result<usize> {
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        let mut written = 0;
        for (path, page) in pages.filter(|(_, page)| page.status == PageStatus::Found) {
            let file_path = self.file_path(path);
            if let Some(dir) = file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    fs::create_dir_all(dir).map_err(|err| Error::Io {
                        path: dir.to_owned(),
                        err,
                    })?;
                }
            }
            self.write_page(path, page)?;
            written += 1;
        }
        Ok(written)
    }

    /// Writes the site-wide not-found page.
    pub fn write_not_found(&self, markup: &str) -> Result<()> {
        fs::create_dir_all(self.output_directory).map_err(|err| Error::Io {
            path: self.output_directory.to_owned(),
            err,
        })?;
        let file_path = self.file_path(NOT_FOUND_FILE);
        fs::write(&file_path, markup).map_err(|err| Error::Io {
            path: file_path,
            err,
        })
    }

    /// Reads back the listing and article pages of an earlier build. Each
    /// page's generation time is its file's modification time. A missing
    /// output directory yields no pages.
    pub fn load_pages(&self) -> Result<Vec<(String, GeneratedPage)>> {
        let mut pages = Vec::new();
        if !self.output_directory.exists() {
            return Ok(pages);
        }

        let listing = self.file_path(LISTING_PATH);
        if listing.is_file() {
            pages.push((LISTING_PATH.to_owned(), read_page(&listing)?));
        }

        let articles = self.file_path(ARTICLE_DIRECTORY);
        if articles.is_dir() {
            for result in WalkDir::new(&articles).min_depth(1).max_depth(1) {
                let entry = result?;
                let file_name = entry.file_name().to_string_lossy();
                if !entry.file_type().is_file() || !file_name.ends_with(".html") {
                    continue;
                }
                let path = format!("{}/{}", ARTICLE_DIRECTORY, file_name);
                pages.push((path, read_page(entry.path())?));
            }
        }

        tracing::debug!(count = pages.len(), "loaded previously generated pages");
        Ok(pages)
    }
}

fn read_page(file_path: &Path) -> Result<GeneratedPage> {
    let io_err = |err| Error::Io {
        path: file_path.to_owned(),
        err,
    };
    let markup = fs::read_to_string(file_path).map_err(io_err)?;
    let modified = fs::metadata(file_path)
        .and_then(|metadata| metadata.modified())
        .map_err(io_err)?;
    Ok(GeneratedPage {
        markup,
        generated_at: DateTime::<Utc>::from(modified),
        status: PageStatus::Found,
    })
}

/// Copies the contents of `src` into `dst`, creating `dst` and any
/// subdirectories.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src) {
        let entry = result?;
        let relpath = match entry.path().strip_prefix(src) {
            Ok(relpath) => relpath,
            Err(_) => continue,
        };
        let target = dst.join(relpath);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| Error::Io {
                path: target.clone(),
                err,
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|err| Error::Io {
                path: target.clone(),
                err,
            })?;
        }
    }
    Ok(())
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading or writing output files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned for I/O problems on a specific file or directory.
    #[error("accessing '{}': {}", .path.display(), .err)]
    Io { path: PathBuf, err: io::Error },

    /// Returned for errors walking a directory.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::site::article_path;

    // A fresh scratch directory per test.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "spacetravelling-write-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn page(markup: &str, status: PageStatus) -> GeneratedPage {
        GeneratedPage {
            markup: markup.to_owned(),
            generated_at: Utc::now(),
            status,
        }
    }

    #[test]
    fn test_write_and_load_pages() -> Result<()> {
        let dir = scratch("roundtrip");
        let writer = Writer {
            output_directory: &dir,
        };
        let listing = page("<h1>listing</h1>", PageStatus::Found);
        let article = page("<h1>article</h1>", PageStatus::Found);
        let missing = page("not found", PageStatus::NotFound);
        let a = article_path("a");
        let nope = article_path("nope");
        let written = writer.write_pages(
            vec![
                (LISTING_PATH, &listing),
                (a.as_str(), &article),
                (nope.as_str(), &missing),
            ]
            .into_iter(),
        )?;
        assert_eq!(2, written);
        assert!(!dir.join("post/nope.html").exists());

        let mut loaded = writer.load_pages()?;
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        let paths: Vec<&str> = loaded.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(vec!["index.html", "post/a.html"], paths);
        assert_eq!("<h1>article</h1>", loaded[1].1.markup);
        assert!(Utc::now().signed_duration_since(loaded[1].1.generated_at) < chrono::Duration::minutes(5));

        fs::remove_dir_all(&dir).ok();
        Ok(())
    }

    #[test]
    fn test_load_missing_output_directory() -> Result<()> {
        let dir = scratch("missing");
        let writer = Writer {
            output_directory: &dir,
        };
        assert!(writer.load_pages()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_copy_dir() -> Result<()> {
        let dir = scratch("copy");
        copy_dir(Path::new("./theme/static"), &dir)?;
        assert!(dir.join("style.css").is_file());
        assert!(dir.join("images/logo.svg").is_file());
        assert!(dir.join("load-more.js").is_file());
        fs::remove_dir_all(&dir).ok();
        Ok(())
    }
}
