//! Converts a content file's markdown body into HTML. See [`to_html`].

use crate::diagram::Render;
use crate::htmlrenderer::{self, Features, HtmlRenderer};
use crate::url::LinkRewriter;
use pulldown_cmark::*;
use std::fmt;
use url::{ParseError as UrlParseError, Url};

/// Converts markdown to HTML, writing the result into `w`, and returns the
/// [`Features`] the document needed.
///
/// * `site_root` is the prefix for page URLs (e.g., https://example.org/).
///   This should end in a trailing slash.
/// * `source_path` is the relative path to the source file from the content
///   directory.
/// * `markdown` is the body of the source file.
/// * `footnote_prefix` is the prefix to prepend onto footnote links.
/// * `diagrams` renders the `aafigure` blocks.
pub fn to_html(
    w: &mut String,
    site_root: &Url,
    source_path: &str,
    markdown: &str,
    footnote_prefix: &str,
    diagrams: &dyn Render,
) -> Result<Features, Error> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let event_converter = EventConverter {
        links: LinkRewriter::new(site_root, source_path)?,
    };
    let mut html_renderer = HtmlRenderer::new(footnote_prefix, diagrams);
    for ev in Parser::new_ext(markdown, options) {
        html_renderer.on_event(w, event_converter.convert(ev)?)?;
    }
    Ok(html_renderer.features())
}

struct EventConverter<'a> {
    links: LinkRewriter<'a>,
}

impl EventConverter<'_> {
    fn convert_tag<'b>(&self, tag: Tag<'b>) -> Result<Tag<'b>, UrlParseError> {
        Ok(match tag {
            // Headings in the body sit below the site title (h1) and the
            // page title (h2), so `#` becomes h3.
            Tag::Heading(s) => Tag::Heading((s + 2).min(6)),

            // Links to other content files point at their source (`foo.md`)
            // and need to point at the rendered page (`foo.html`).
            Tag::Link(
                link @ (LinkType::Inline
                | LinkType::Reference
                | LinkType::ReferenceUnknown
                | LinkType::Shortcut
                | LinkType::Autolink
                | LinkType::Collapsed
                | LinkType::CollapsedUnknown),
                url,
                title,
            ) => Tag::Link(
                link,
                CowStr::Boxed(self.links.rewrite(&url)?.into_boxed_str()),
                title,
            ),
            _ => tag,
        })
    }

    fn convert<'b>(&self, ev: Event<'b>) -> Result<Event<'b>, UrlParseError> {
        Ok(match ev {
            Event::Start(tag) => Event::Start(self.convert_tag(tag)?),
            Event::End(Tag::Heading(s)) => Event::End(Tag::Heading((s + 2).min(6))),
            _ => ev,
        })
    }
}

/// Represents an error converting markdown to HTML.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a problem parsing URLs.
    UrlParse(UrlParseError),

    /// Returned when rendering the HTML fails, including diagram failures.
    Render(htmlrenderer::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UrlParse(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UrlParse(err) => Some(err),
            Error::Render(err) => Some(err),
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<htmlrenderer::Error> for Error {
    fn from(err: htmlrenderer::Error) -> Error {
        Error::Render(err)
    }
}
