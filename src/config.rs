use crate::site::{Prerender, SiteSettings, MAX_PAGE_SIZE};
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Locale};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "spacetravelling.yaml";

/// The environment variable holding the content API access token.
pub const ACCESS_TOKEN_VAR: &str = "SPACETRAVELLING_ACCESS_TOKEN";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(3)
    }
}

#[derive(Deserialize)]
struct RevalidateSeconds(i64);
impl Default for RevalidateSeconds {
    fn default() -> Self {
        RevalidateSeconds(86400)
    }
}

#[derive(Deserialize)]
struct LocaleName(String);
impl Default for LocaleName {
    fn default() -> Self {
        LocaleName(String::from("pt_BR"))
    }
}

fn default_document_type() -> String {
    String::from("post")
}

fn default_site_title() -> String {
    String::from("Spacetravelling")
}

fn default_prerender() -> Prerender {
    Prerender::Count(3)
}

fn default_fallback() -> bool {
    true
}

#[derive(Deserialize)]
struct Project {
    api_endpoint: Url,

    #[serde(default = "default_document_type")]
    document_type: String,

    #[serde(default = "default_site_title")]
    site_title: String,

    #[serde(default)]
    locale: LocaleName,

    #[serde(default)]
    listing_page_size: PageSize,

    #[serde(default = "default_prerender")]
    prerender: Prerender,

    #[serde(default = "default_fallback")]
    fallback: bool,

    #[serde(default)]
    revalidate_seconds: RevalidateSeconds,
}

pub struct Config {
    pub api_endpoint: Url,
    pub access_token: Option<String>,
    pub theme_directory: PathBuf,
    pub static_source_directory: PathBuf,
    pub output_directory: PathBuf,
    pub static_output_directory: PathBuf,
    pub site: SiteSettings,
}

impl Config {
    /// Finds the project file in `dir` or the nearest ancestor that has one.
    /// Pages are written to `output_directory`, or to `_output` next to the
    /// project file when it is [`None`].
    pub fn from_directory(dir: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path, output_directory)
                .with_context(|| format!("Loading configuration from `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent, output_directory),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let file = File::open(path)
            .with_context(|| format!("Opening project file `{}`", path.display()))?;
        let project: Project = serde_yaml::from_reader(file)?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;
        let access_token = std::env::var(ACCESS_TOKEN_VAR)
            .ok()
            .filter(|token| !token.is_empty());
        Config::from_project(project, project_root, output_directory, access_token)
    }

    fn from_project(
        project: Project,
        project_root: &Path,
        output_directory: Option<&Path>,
        access_token: Option<String>,
    ) -> Result<Config> {
        let locale = Locale::try_from(project.locale.0.as_str())
            .map_err(|_| anyhow!("Unknown locale `{}`", project.locale.0))?;
        if !(1..=MAX_PAGE_SIZE).contains(&project.listing_page_size.0) {
            return Err(anyhow!(
                "`listing_page_size` must be between 1 and {}",
                MAX_PAGE_SIZE
            ));
        }
        if let Prerender::Count(n) = project.prerender {
            if n > MAX_PAGE_SIZE {
                return Err(anyhow!(
                    "`prerender` must be `all` or at most {}",
                    MAX_PAGE_SIZE
                ));
            }
        }
        if project.revalidate_seconds.0 <= 0 {
            return Err(anyhow!("`revalidate_seconds` must be positive"));
        }

        let theme_directory = project_root.join("theme");
        let output_directory = match output_directory {
            Some(dir) => dir.to_owned(),
            None => project_root.join("_output"),
        };
        Ok(Config {
            api_endpoint: project.api_endpoint,
            access_token,
            static_source_directory: theme_directory.join("static"),
            theme_directory,
            static_output_directory: output_directory.join("static"),
            output_directory,
            site: SiteSettings {
                site_title: project.site_title,
                locale,
                document_type: project.document_type,
                listing_page_size: project.listing_page_size.0,
                prerender: project.prerender,
                fallback: project.fallback,
                revalidate: Duration::seconds(project.revalidate_seconds.0),
            },
        })
    }
}
