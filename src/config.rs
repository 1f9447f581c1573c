//! Loads the project configuration (`quire.yaml`) and the theme
//! configuration (`theme/theme.yaml`) into a [`Config`], which lays out every
//! source and output location of a build.

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "quire.yaml";

#[derive(Deserialize)]
struct PageSize(usize);

impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

fn default_home_page() -> String {
    String::from("pages/index.html")
}

fn default_feeds() -> Vec<FeedFormat> {
    vec![FeedFormat::Atom, FeedFormat::Rss]
}

fn default_aafigure() -> Vec<String> {
    vec![crate::diagram::DEFAULT_PROGRAM.to_owned()]
}

#[derive(Deserialize)]
struct Project {
    title: String,

    #[serde(default)]
    description: String,

    base_url: Url,

    #[serde(default = "default_home_page")]
    home_page: String,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default)]
    index_page_size: PageSize,

    #[serde(default = "default_feeds")]
    feeds: Vec<FeedFormat>,

    #[serde(default)]
    diagram_script: Option<Url>,

    #[serde(default = "default_aafigure")]
    aafigure: Vec<String>,

    #[serde(default)]
    drafts: bool,
}

#[derive(Deserialize)]
struct Theme {
    page_template: Vec<PathBuf>,
    index_template: Vec<PathBuf>,
}

/// The author credited in the feeds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// A feed format the site is published in.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Atom,
    Rss,
}

impl FeedFormat {
    pub fn name(self) -> &'static str {
        match self {
            FeedFormat::Atom => "atom",
            FeedFormat::Rss => "rss",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            FeedFormat::Atom => "application/atom+xml",
            FeedFormat::Rss => "application/rss+xml",
        }
    }

    /// The feed's file name, relative to the output directory and the site
    /// root.
    pub fn file_name(self) -> &'static str {
        match self {
            FeedFormat::Atom => "feed.atom",
            FeedFormat::Rss => "feed.rss",
        }
    }
}

/// The resolved configuration for a build.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: String,
    pub author: Option<Author>,

    /// The URL the site is published at. Always ends in `/`.
    pub site_root: Url,
    pub home_page: Url,

    pub content_source_directory: PathBuf,
    pub root_output_directory: PathBuf,

    pub index_url: Url,
    pub index_output_directory: PathBuf,
    pub index_page_size: usize,

    pub page_template: Vec<PathBuf>,
    pub index_template: Vec<PathBuf>,

    pub static_source_directory: PathBuf,
    pub static_output_directory: PathBuf,
    pub static_url: Url,

    pub feeds: Vec<FeedFormat>,
    pub diagram_script: Option<Url>,

    /// The `aafigure` command: program followed by leading arguments.
    pub aafigure: Vec<String>,

    /// Whether pages marked `Draft` are built.
    pub drafts: bool,
}

impl Config {
    /// Searches `dir` and its ancestors for a [`PROJECT_FILE`] and loads the
    /// first one found.
    pub fn from_directory(dir: &Path, output_directory: &Path) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path, output_directory);
            }
            current = dir.parent();
        }
        Err(Error::ProjectFileNotFound(dir.to_owned()))
    }

    /// Loads the project file at `path` and the theme next to it. All output
    /// locations are rooted at `output_directory`.
    pub fn from_project_file(path: &Path, output_directory: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)
            .map_err(|err| Error::annotate(path, err))?;
        let project_root = path
            .parent()
            .ok_or_else(|| Error::NoParentDirectory(path.to_owned()))?;

        let theme_dir = project_root.join("theme");
        let theme_path = theme_dir.join("theme.yaml");
        let theme: Theme = serde_yaml::from_reader(open(&theme_path, "theme")?)
            .map_err(|err| Error::annotate(&theme_path, err))?;

        if project.index_page_size.0 < 1 {
            return Err(Error::InvalidIndexPageSize);
        }
        if project.aafigure.is_empty() {
            return Err(Error::EmptyAafigureCommand);
        }

        let site_root = with_trailing_slash(project.base_url);
        Ok(Config {
            home_page: site_root.join(&project.home_page)?,
            index_url: site_root.join("pages/")?,
            static_url: site_root.join("static/")?,
            title: project.title,
            description: project.description,
            author: project.author,
            content_source_directory: project_root.join("content"),
            root_output_directory: output_directory.to_owned(),
            index_output_directory: output_directory.join("pages"),
            index_page_size: project.index_page_size.0,
            page_template: theme
                .page_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            index_template: theme
                .index_template
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect(),
            static_source_directory: theme_dir.join("static"),
            static_output_directory: output_directory.join("static"),
            feeds: project.feeds,
            diagram_script: project.diagram_script,
            aafigure: project.aafigure,
            drafts: project.drafts,
            site_root,
        })
    }

    /// The URL a feed is published at.
    pub fn feed_url(&self, format: FeedFormat) -> Result<Url> {
        Ok(self.site_root.join(format.file_name())?)
    }

    /// The file a feed is written to.
    pub fn feed_path(&self, format: FeedFormat) -> PathBuf {
        self.root_output_directory.join(format.file_name())
    }
}

// `Url::join` treats the last path segment as a file name unless it ends in
// a slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn open(path: &Path, kind: &'static str) -> Result<File> {
    File::open(path).map_err(|err| Error::Open {
        kind,
        path: path.to_owned(),
        err,
    })
}

/// The result of a fallible configuration operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading the configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no project file exists in the directory or any of its
    /// ancestors.
    ProjectFileNotFound(PathBuf),

    /// Returned when a configuration file can't be opened.
    Open {
        kind: &'static str,
        path: PathBuf,
        err: std::io::Error,
    },

    /// Returned when a configuration file isn't valid.
    DeserializeYaml { path: PathBuf, err: serde_yaml::Error },

    /// Returned when the project file has no parent directory.
    NoParentDirectory(PathBuf),

    /// Returned when `index_page_size` is zero.
    InvalidIndexPageSize,

    /// Returned when `aafigure` is an empty list.
    EmptyAafigureCommand,

    /// Returned when a configured URL can't be joined.
    UrlParse(url::ParseError),
}

impl Error {
    fn annotate(path: &Path, err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml {
            path: path.to_owned(),
            err,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectFileNotFound(dir) => write!(
                f,
                "Could not find `{}` in `{}` or any parent directory",
                PROJECT_FILE,
                dir.display()
            ),
            Error::Open { kind, path, err } => {
                write!(f, "Opening {} file `{}`: {}", kind, path.display(), err)
            }
            Error::DeserializeYaml { path, err } => {
                write!(f, "Loading `{}`: {}", path.display(), err)
            }
            Error::NoParentDirectory(path) => write!(
                f,
                "Can't get parent directory for project file `{}`",
                path.display()
            ),
            Error::InvalidIndexPageSize => {
                write!(f, "`index_page_size` must be at least 1")
            }
            Error::EmptyAafigureCommand => {
                write!(f, "`aafigure` must name a program")
            }
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProjectFileNotFound(_) => None,
            Error::Open { err, .. } => Some(err),
            Error::DeserializeYaml { err, .. } => Some(err),
            Error::NoParentDirectory(_) => None,
            Error::InvalidIndexPageSize => None,
            Error::EmptyAafigureCommand => None,
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_project_file() -> Result<()> {
        let config = Config::from_project_file(
            Path::new("./testdata/site/quire.yaml"),
            Path::new("/tmp/quire-out"),
        )?;
        assert_eq!("Notes on Languages", config.title);
        assert_eq!("", config.description);
        assert_eq!("https://example.org/blog/", config.site_root.as_str());
        assert_eq!(
            "https://example.org/blog/pages/index.html",
            config.home_page.as_str()
        );
        assert_eq!("https://example.org/blog/pages/", config.index_url.as_str());
        assert_eq!(2, config.index_page_size);
        assert_eq!(vec![FeedFormat::Atom, FeedFormat::Rss], config.feeds);
        assert_eq!(
            PathBuf::from("./testdata/site/content"),
            config.content_source_directory
        );
        assert_eq!(
            vec![
                PathBuf::from("./testdata/site/theme/base.html"),
                PathBuf::from("./testdata/site/theme/page.html"),
            ],
            config.page_template,
        );
        assert_eq!(PathBuf::from("/tmp/quire-out/pages"), config.index_output_directory);
        assert_eq!(
            "https://example.org/blog/feed.atom",
            config.feed_url(FeedFormat::Atom)?.as_str()
        );
        assert_eq!(PathBuf::from("/tmp/quire-out/feed.rss"), config.feed_path(FeedFormat::Rss));
        assert!(!config.drafts);
        Ok(())
    }

    #[test]
    fn test_from_directory_searches_ancestors() -> Result<()> {
        let config = Config::from_directory(
            Path::new("./testdata/site/content/effects"),
            Path::new("/tmp/quire-out"),
        )?;
        assert_eq!("Notes on Languages", config.title);
        Ok(())
    }

    #[test]
    fn test_from_directory_not_found() {
        assert!(matches!(
            Config::from_directory(
                Path::new("/nonexistent/quire/project"),
                Path::new("/tmp/quire-out"),
            ),
            Err(Error::ProjectFileNotFound(_))
        ));
    }

    #[test]
    fn test_with_trailing_slash() -> std::result::Result<(), url::ParseError> {
        assert_eq!(
            "https://example.org/blog/",
            with_trailing_slash(Url::parse("https://example.org/blog")?).as_str()
        );
        assert_eq!(
            "https://example.org/",
            with_trailing_slash(Url::parse("https://example.org")?).as_str()
        );
        Ok(())
    }

    #[test]
    fn test_feed_format_deserialize() -> std::result::Result<(), serde_yaml::Error> {
        let formats: Vec<FeedFormat> = serde_yaml::from_str("[rss, atom]")?;
        assert_eq!(vec![FeedFormat::Rss, FeedFormat::Atom], formats);
        Ok(())
    }
}
