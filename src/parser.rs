//! Defines the [`Parser`] and [`Error`] types: the logic for parsing pages
//! from the content directory into memory.

use std::{
    fmt,
    fs::File,
    path::{Path, PathBuf},
};

use log::debug;
use serde::Deserialize;
use url::Url;
use walkdir::WalkDir;

use crate::{
    diagram::Render,
    markdown,
    page::{Page, POST_KIND},
    taxonomy::{Taxonomies, TAGS},
};

const MARKDOWN_EXTENSION: &str = "md";
const BUNDLE_INDEX: &str = "index.md";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses [`Page`] objects from source files.
pub struct Parser<'a> {
    /// `site_root` is the base URL for pages. The URL for a page is
    /// `{site_root}/{page_id}.html`.
    site_root: &'a Url,

    /// `output_directory` is the directory in which pages will be rendered.
    output_directory: &'a Path,

    /// `diagrams` renders the `aafigure` blocks found in page bodies.
    diagrams: &'a dyn Render,

    /// Whether pages marked `Draft` are kept.
    drafts: bool,
}

impl<'a> Parser<'a> {
    /// Constructs a new parser that drops drafts. See fields on [`Parser`]
    /// for argument descriptions.
    pub fn new(
        site_root: &'a Url,
        output_directory: &'a Path,
        diagrams: &'a dyn Render,
    ) -> Parser<'a> {
        Parser {
            site_root,
            output_directory,
            diagrams,
            drafts: false,
        }
    }

    /// Keeps (`true`) or drops (`false`) pages marked `Draft`.
    pub fn with_drafts(mut self, drafts: bool) -> Parser<'a> {
        self.drafts = drafts;
        self
    }

    /// Searches `source_directory` for pages and returns them in file-name
    /// order, which becomes the site's registration order, along with the
    /// static files of any page bundles. A page is either a markdown file
    /// (extension `.md`) or a bundle: a directory holding an `index.md` plus
    /// assets. Each page source must be structured as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with field `Title` and optionally `Date`, `Type`,
    ///    `Weight`, `Tags`, `Taxonomies` and `Draft`
    /// 3. Terminal frontmatter fence (`---`) on its own line
    /// 4. Page body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// Title: Hello, world!
    /// Date: 2021-04-16
    /// Tags: [greet]
    /// Taxonomies:
    ///   pinned: yes
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    pub fn parse_pages(&self, source_directory: &Path) -> Result<Pages> {
        let mut pages = Vec::new();
        let mut static_files = Vec::new();
        for result in WalkDir::new(source_directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = result?;
            // strip_prefix() should never fail; `source_directory` is the
            // walk's root
            let relative_path = entry
                .path()
                .strip_prefix(source_directory)
                .map_err(|_| InvalidFileNameError(entry.path().to_owned()))?;

            let page = if entry.file_type().is_dir() {
                if !entry.path().join(BUNDLE_INDEX).is_file() {
                    continue;
                }
                self.parse_bundle(source_directory, relative_path, &mut static_files)?
            } else if relative_path.extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION) {
                self.parse_page(source_directory, relative_path)?
            } else {
                continue;
            };

            if let Some(page) = page {
                pages.push(page);
            }
        }

        debug!(pages = pages.len(), static_files = static_files.len(); "parsed content");
        Ok((pages, static_files))
    }

    fn parse_bundle(
        &self,
        source_directory: &Path,
        relative_path: &Path,
        static_files: &mut Vec<StaticFile>,
    ) -> Result<Option<Page>> {
        // We want to make sure we can parse a page before we mutate
        // `static_files`
        let page = match self.parse_page(source_directory, &relative_path.join(BUNDLE_INDEX))? {
            Some(page) => page,
            None => return Ok(None),
        };

        // Mutate `static_files` only after we've confirmed that we've parsed
        // a page we're keeping.
        let abs = source_directory.join(relative_path);
        let bundle_output = self.output_directory.join(&page.id);
        for result in WalkDir::new(&abs).sort_by_file_name() {
            let entry = result?;
            if entry.file_type().is_file() && entry.path() != abs.join(BUNDLE_INDEX) {
                let relative = entry
                    .path()
                    .strip_prefix(&abs)
                    .map_err(|_| InvalidFileNameError(entry.path().to_owned()))?;
                static_files.push((entry.path().to_owned(), bundle_output.join(relative)));
            }
        }

        Ok(Some(page))
    }

    /// Parses a single [`Page`] from the file at `relative_path` (relative to
    /// `source_directory`). Errors are annotated with the path. Returns
    /// `None` for dropped drafts.
    fn parse_page(&self, source_directory: &Path, relative_path: &Path) -> Result<Option<Page>> {
        use std::io::Read;

        let read = || -> Result<String> {
            let mut contents = String::new();
            File::open(source_directory.join(relative_path))?.read_to_string(&mut contents)?;
            Ok(contents)
        };

        read()
            .and_then(|contents| self.parse_source(relative_path, &contents))
            .map_err(|e| {
                let annotation = format!("parsing page `{}`", relative_path.display());
                Error::Annotated(annotation, Box::new(e))
            })
    }

    fn parse_source(&self, relative_path: &Path, input: &str) -> Result<Option<Page>> {
        fn frontmatter_indices(input: &str) -> Result<(usize, usize, usize)> {
            const FENCE: &str = "---";
            if !input.starts_with(FENCE) {
                return Err(Error::FrontmatterMissingStartFence);
            }
            match input[FENCE.len()..].find("\n---") {
                None => Err(Error::FrontmatterMissingEndFence),
                Some(offset) => {
                    let yaml_stop = FENCE.len() + offset + 1;
                    Ok((
                        FENCE.len(),             // yaml_start
                        yaml_stop,               // yaml_stop
                        yaml_stop + FENCE.len(), // body_start
                    ))
                }
            }
        }

        let (yaml_start, yaml_stop, body_start) = frontmatter_indices(input)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(&input[yaml_start..yaml_stop])?;

        if frontmatter.draft && !self.drafts {
            debug!(path:? = relative_path; "skipping draft");
            return Ok(None);
        }
        // Dates are rewritten zero-padded so posts sort chronologically as
        // strings.
        let date = match frontmatter.date {
            Some(date) => Some(
                chrono::NaiveDate::parse_from_str(&date, DATE_FORMAT)
                    .map_err(|err| Error::InvalidDate(date.clone(), err))?
                    .format(DATE_FORMAT)
                    .to_string(),
            ),
            None => None,
        };

        let source_path = relative_path
            .to_str()
            .ok_or_else(|| InvalidFileNameError(relative_path.to_owned()))?;
        let id = page_id(relative_path)?;
        let file_name = format!("{}.html", id);

        let mut taxonomies = frontmatter.taxonomies;
        for tag in &frontmatter.tags {
            taxonomies.insert(TAGS, tag);
        }

        let mut page = Page {
            title: frontmatter.title,
            date,
            kind: frontmatter.kind,
            weight: frontmatter.weight,
            taxonomies,
            file_path: self.output_directory.join(&file_name),
            url: self.site_root.join(&file_name)?,
            body: String::default(),
            uses_client_diagrams: false,
            id,
        };

        let features = markdown::to_html(
            &mut page.body,
            self.site_root,
            source_path,
            &input[body_start..],
            page.url.as_str(),
            self.diagrams,
        )?;
        page.uses_client_diagrams = features.uses_client_diagrams;

        debug!(id = page.id.as_str(), diagrams = features.diagrams; "parsed page");
        Ok(Some(page))
    }
}

/// Derives a page's id from its path relative to the content directory:
/// `ownership.md` is `ownership`, the bundle `effects/index.md` is
/// `effects`.
fn page_id(relative_path: &Path) -> Result<String> {
    let stem = if relative_path.ends_with(BUNDLE_INDEX) {
        relative_path.parent().unwrap_or(relative_path).to_owned()
    } else {
        relative_path.with_extension("")
    };
    stem.to_str()
        .filter(|id| !id.is_empty())
        .map(|id| id.replace('\\', "/"))
        .ok_or_else(|| InvalidFileNameError(relative_path.to_owned()).into())
}

fn default_kind() -> String {
    POST_KIND.to_owned()
}

#[derive(Deserialize, Clone)]
struct Frontmatter {
    /// The title of the page.
    #[serde(rename = "Title")]
    pub title: String,

    /// The date of the page.
    #[serde(default, rename = "Date")]
    pub date: Option<String>,

    /// The page's type; `main` pages are listed in the navigation.
    #[serde(default = "default_kind", rename = "Type")]
    pub kind: String,

    /// Orders weighted listings such as the pinned pages.
    #[serde(default, rename = "Weight")]
    pub weight: i64,

    /// Shorthand for the `tags` taxonomy.
    #[serde(default, rename = "Tags")]
    pub tags: Vec<String>,

    /// The taxonomies the page belongs to.
    #[serde(default, rename = "Taxonomies")]
    pub taxonomies: Taxonomies,

    /// Drafts are left out of the build unless drafts are enabled.
    #[serde(default, rename = "Draft")]
    pub draft: bool,
}

#[derive(Debug)]
pub struct InvalidFileNameError(PathBuf);

impl fmt::Display for InvalidFileNameError {
    /// Displays an [`InvalidFileNameError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid file name: {:?}", &self.0)
    }
}

impl std::error::Error for InvalidFileNameError {
    /// Implements the [`std::error::Error`] trait for [`InvalidFileNameError`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

pub type Pages = (Vec<Page>, Vec<StaticFile>);

/// A file to copy: `(source path, output path)`.
pub type StaticFile = (PathBuf, PathBuf);

/// Represents the result of a [`Page`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Page`] object.
#[derive(Debug)]
pub enum Error {
    /// Returned when a page source file is missing its starting frontmatter
    /// fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when a page source file is missing its terminal frontmatter
    /// fence (`---` i.e., the starting fence was found but the ending one was
    /// missing).
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when the `Date` isn't formatted `YYYY-MM-DD`.
    InvalidDate(String, chrono::ParseError),

    /// Returned when there is a problem parsing URLs.
    UrlParse(url::ParseError),

    /// Returned when converting the body fails, including diagram failures.
    Markdown(markdown::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),

    /// Returned when a source file isn't valid UTF-8.
    InvalidFileName(InvalidFileNameError),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "Page must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::InvalidDate(date, err) => {
                write!(f, "invalid date `{}` (wanted YYYY-MM-DD): {}", date, err)
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::Markdown(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::InvalidFileName(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingStartFence => None,
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::InvalidDate(_, err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Markdown(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::InvalidFileName(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<InvalidFileNameError> for Error {
    fn from(err: InvalidFileNameError) -> Error {
        Error::InvalidFileName(err)
    }
}

impl From<markdown::Error> for Error {
    fn from(err: markdown::Error) -> Error {
        Error::Markdown(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible directory walks.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
