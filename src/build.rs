//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: parsing the pages
//! ([`crate::parser`]), assembling the [`Site`], rendering pages and index
//! pages ([`crate::write`]), copying the static files into the output
//! directory, and generating the feeds ([`crate::feed`]).

use crate::config::Config;
use crate::diagram::Aafigure;
use crate::feed::{write_feed, Error as FeedError, FeedConfig};
use crate::parser::{Error as ParseError, Parser};
use crate::site::{OutputFormat, Site};
use crate::write::{Error as WriteError, Renderer};
use gtmpl::Template;
use log::{debug, info};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Builds the site from a [`Config`] object. This calls into
/// [`Parser::parse_pages`], [`Renderer::write_site`], and [`write_feed`]
/// which do the heavy-lifting. This function also copies the theme's static
/// assets and the page bundles' files to the output directory.
pub fn build_site(config: Config) -> Result<()> {
    let diagrams = Aafigure::new(config.aafigure.clone());
    let parser = Parser::new(&config.site_root, &config.root_output_directory, &diagrams)
        .with_drafts(config.drafts);

    // collect all pages
    let (pages, static_files) = parser.parse_pages(&config.content_source_directory)?;
    info!(pages = pages.len(); "parsed pages");

    let mut alternates = Vec::with_capacity(config.feeds.len());
    for format in &config.feeds {
        alternates.push(OutputFormat {
            name: format.name().to_owned(),
            rel: "alternate".to_owned(),
            mime_type: format.mime_type().to_owned(),
            url: config.feed_url(*format).map_err(Error::FeedUrl)?,
        });
    }

    let site = Site::new(
        config.title.clone(),
        config.description.clone(),
        config.site_root.clone(),
        config.diagram_script.clone(),
        alternates,
        pages,
    );

    // Parse the template files.
    let page_template = parse_template(config.page_template.iter())?;
    let index_template = parse_template(config.index_template.iter())?;

    // Blow away the old output directories so we don't have any collisions.
    // Pages are written straight into the root output directory, so stale
    // pages from a previous build survive; we don't delete the whole root in
    // case the user passes the wrong directory.
    rmdir(&config.index_output_directory)?;
    rmdir(&config.static_output_directory)?;

    // write the pages and index pages
    let renderer = Renderer {
        site: &site,
        page_template: &page_template,
        index_template: &index_template,
        index_url: &config.index_url,
        index_output_directory: &config.index_output_directory,
        index_page_size: config.index_page_size,
        home_page: &config.home_page,
        static_url: &config.static_url,
    };
    renderer.write_site()?;

    // copy static directory
    if config.static_source_directory.is_dir() {
        copy_dir(
            &config.static_source_directory,
            &config.static_output_directory,
        )?;
    }

    // copy the files that live alongside bundled pages
    for (src, dst) in &static_files {
        if let Some(dir) = dst.parent() {
            std::fs::create_dir_all(dir)?;
        }
        debug!(src:? = src, dst:? = dst; "copying static file");
        std::fs::copy(src, dst)?;
    }

    // copy /pages/index.html to /index.html
    let _ = std::fs::copy(
        config.index_output_directory.join("index.html"),
        config.root_output_directory.join("index.html"),
    )?;

    // create the feeds
    let posts = site.posts();
    let feed_config = FeedConfig {
        title: &config.title,
        description: &config.description,
        author: config.author.as_ref(),
        home_page: &config.home_page,
    };
    for format in &config.feeds {
        let path = config.feed_path(*format);
        write_feed(*format, &feed_config, &posts, File::create(&path)?)?;
        info!(format = format.name(), path:? = path; "wrote feed");
    }

    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dst.join(entry.file_name()))?;
        } else {
            std::fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }

    Ok(())
}

// Loads the template files' contents, concatenates them, and parses the
// result into a template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(template_file)
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?
            .read_to_string(&mut contents)?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
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

/// The result of a fallible build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during parsing, writing,
/// cleaning output directories, parsing template files, writing feeds, and
/// other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors during parsing.
    Parse(ParseError),

    /// Returned for errors writing pages to disk as HTML files.
    Write(WriteError),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned when a feed's URL can't be built from the site root.
    FeedUrl(crate::config::Error),

    /// Returned for errors writing the feeds.
    Feed(FeedError),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => write!(f, "Parsing templates: {}", err),
            Error::FeedUrl(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::FeedUrl(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_build_site() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let out = tempfile::tempdir()?;
        let project_file = Path::new("./testdata/site/quire.yaml");
        let config = Config::from_project_file(project_file, out.path())?;
        build_site(config)?;

        let read = |relpath: &str| std::fs::read_to_string(out.path().join(relpath));

        // pages
        let about = read("about.html")?;
        assert!(about.contains("<title>About · Notes on Languages</title>"));
        assert!(!about.contains("mermaid.min.js"));
        assert!(read("traits.html")?.contains("https://cdn.example.org/mermaid.min.js"));
        assert!(read("diagrams.html")?.contains("<div><svg style=\"width:100%\" width=\"100\""));
        assert!(!out.path().join("draft.html").exists());

        // navigation, in file-name order
        let about_link = about.find("https://example.org/blog/about.html");
        let contact_link = about.find("https://example.org/blog/contact.html");
        let projects_link = about.find("https://example.org/blog/projects.html");
        assert!(about_link < contact_link && contact_link < projects_link);

        // index pages: four posts, two per page
        assert!(out.path().join("pages/index.html").is_file());
        assert!(out.path().join("pages/1.html").is_file());
        assert!(!out.path().join("pages/2.html").exists());
        assert_eq!(read("pages/index.html")?, read("index.html")?);

        // static files
        assert!(out.path().join("static/style.css").is_file());
        assert!(out.path().join("effects/handlers.txt").is_file());

        // feeds
        assert!(read("feed.atom")?.contains("https://example.org/blog/effects.html"));
        assert!(read("feed.rss")?.contains("https://example.org/blog/effects.html"));
        assert!(about.contains("https://example.org/blog/feed.atom"));
        Ok(())
    }

    #[test]
    fn test_copy_dir_recurses() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let src = tempfile::tempdir()?;
        let dst = tempfile::tempdir()?;
        std::fs::create_dir_all(src.path().join("fonts/mono"))?;
        std::fs::write(src.path().join("style.css"), "body {}")?;
        std::fs::write(src.path().join("fonts/mono/font.woff"), "woff")?;

        copy_dir(src.path(), &dst.path().join("static"))?;
        assert!(dst.path().join("static/style.css").is_file());
        assert_eq!(
            "woff",
            std::fs::read_to_string(dst.path().join("static/fonts/mono/font.woff"))?
        );
        Ok(())
    }

    #[test]
    fn test_parse_template_missing_file() {
        assert!(matches!(
            parse_template([Path::new("./testdata/site/theme/missing.html")].iter()),
            Err(Error::OpenTemplateFile { .. })
        ));
    }
}
