//! Loads the theme's page templates and renders template values with them.

use gtmpl::{Context, Template, Value};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The name of the file in the theme directory that lists the templates.
pub const THEME_FILE: &str = "theme.yaml";

/// The parsed templates for every kind of page the site renders.
pub struct Theme {
    /// The listing (home) page.
    pub listing: Template,

    /// An article page.
    pub article: Template,

    /// The placeholder served while an article page is being generated.
    pub fallback: Template,

    /// The page served for unknown article identifiers.
    pub not_found: Template,
}

/// The contents of `theme.yaml`. Each entry lists template files relative to
/// the theme directory; the files are concatenated before parsing so shared
/// fragments can live in their own files.
#[derive(Deserialize)]
struct ThemeFile {
    listing_template: Vec<PathBuf>,
    article_template: Vec<PathBuf>,
    fallback_template: Vec<PathBuf>,
    not_found_template: Vec<PathBuf>,
}

impl Theme {
    /// Loads the theme described by `{theme_directory}/theme.yaml`.
    pub fn load(theme_directory: &Path) -> Result<Theme> {
        let path = theme_directory.join(THEME_FILE);
        let file = File::open(&path).map_err(|err| Error::OpenTemplateFile {
            path: path.clone(),
            err,
        })?;
        let theme: ThemeFile = serde_yaml::from_reader(file)?;
        let files = |paths: &[PathBuf]| {
            parse_template(paths.iter().map(|relpath| theme_directory.join(relpath)))
        };
        Ok(Theme {
            listing: files(&theme.listing_template)?,
            article: files(&theme.article_template)?,
            fallback: files(&theme.fallback_template)?,
            not_found: files(&theme.not_found_template)?,
        })
    }

    /// Parses a theme from template sources held in memory.
    pub fn parse(listing: &str, article: &str, fallback: &str, not_found: &str) -> Result<Theme> {
        Ok(Theme {
            listing: parse_source(listing)?,
            article: parse_source(article)?,
            fallback: parse_source(fallback)?,
            not_found: parse_source(not_found)?,
        })
    }
}

/// Applies `template` to `value` and returns the resulting markup.
pub fn render(template: &Template, value: Value) -> Result<String> {
    let context = Context::from(value).map_err(|err| Error::Execute(err.to_string()))?;
    let mut out: Vec<u8> = Vec::new();
    template
        .execute(&mut out, &context)
        .map_err(|err| Error::Execute(err.to_string()))?;
    Ok(String::from_utf8(out)?)
}

// Loads the template file contents, concatenates them, and parses the result
// into a template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(template_file)
            .map_err(|err| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err,
            })?
            .read_to_string(&mut contents)?;
        contents.push(' ');
    }
    parse_source(&contents)
}

fn parse_source(contents: &str) -> Result<Template> {
    let mut template = Template::default();
    template
        .parse(contents)
        .map_err(|err| Error::ParseTemplate(err.to_string()))?;
    Ok(template)
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading a theme or rendering a page with it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned for I/O problems while opening the theme or template files.
    #[error("opening template file '{}': {}", .path.display(), .err)]
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned when `theme.yaml` is malformed.
    #[error("parsing theme file: {0}")]
    ThemeFile(#[from] serde_yaml::Error),

    /// Returned for errors parsing template files.
    #[error("parsing template: {0}")]
    ParseTemplate(String),

    /// Returned for errors applying a template.
    #[error("executing template: {0}")]
    Execute(String),

    /// Returned when a template produces invalid UTF-8.
    #[error("template output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
