//! Implements a custom HTML renderer for markdown [`Event`]s. It differs from
//! [`pulldown_cmark::html::push_html`] in three ways:
//!
//! * Footnote links carry a prefix (the page URL), so footnote references
//!   above the fold still work from the index pages, where the footnote
//!   definition isn't on the same page.
//! * Fenced `aafigure` blocks are handed to a [`Render`] implementation and
//!   replaced by its output.
//! * Fenced `mermaid` blocks are kept for client-side rendering and flag the
//!   page as needing the diagram script.

use crate::diagram::{self, Render};
use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, LinkType, Tag};
use std::fmt::{self, Display};
use std::io;

/// The info-string language of blocks rendered by the diagram filter.
pub const AAFIGURE_LANGUAGE: &str = "aafigure";

/// The info-string language of blocks rendered in the browser.
pub const MERMAID_LANGUAGE: &str = "mermaid";

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

struct EscapeHref<'a>(&'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

struct EscapeHtml<'a>(&'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

enum TableState {
    Head,
    Body,
}

/// A fenced block whose text is being collected instead of written.
enum Capture {
    Aafigure { options: String, source: String },
    Mermaid { source: String },
}

/// An image whose alt text is being collected.
struct PendingImage {
    dest: String,
    title: String,
    alt: String,
}

/// What a rendered document turned out to need.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Features {
    /// The number of `aafigure` blocks rendered.
    pub diagrams: usize,

    /// True if the document contains a block rendered client-side.
    pub uses_client_diagrams: bool,
}

/// Renders markdown [`Event`]s into HTML. This is largely modeled after
/// [`pulldown_cmark`]'s private [`HtmlWriter`
/// struct](https://github.com/raphlinus/pulldown-cmark/blob/bf0a1a4938dbd2ec41c3add069b3d361d11731f4/src/html.rs#L36-L50).
pub struct HtmlRenderer<'r> {
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// The prefix to prepend onto footnote links.
    footnote_prefix: String,

    /// Renders `aafigure` blocks.
    diagrams: &'r dyn Render,

    capture: Option<Capture>,
    image: Option<PendingImage>,
    features: Features,
}

impl<'r> HtmlRenderer<'r> {
    pub fn new(footnote_prefix: &str, diagrams: &'r dyn Render) -> Self {
        HtmlRenderer {
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            footnote_prefix: footnote_prefix.to_owned(),
            diagrams,
            capture: None,
            image: None,
            features: Features::default(),
        }
    }

    /// Returns what the events seen so far needed.
    pub fn features(&self) -> Features {
        self.features
    }

    pub fn on_event<W: StrWrite>(&mut self, w: &mut W, event: Event) -> Result<()> {
        if self.capture.is_some() {
            return self.on_captured(w, event);
        }
        if let Some(image) = &mut self.image {
            match event {
                Event::End(Tag::Image(..)) => return self.on_image_end(w),
                Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
                _ => {}
            }
            return Ok(());
        }

        match event {
            Event::Start(tag) => self.on_start(w, tag)?,
            Event::End(tag) => self.on_end(w, tag)?,
            Event::Code(code) => write!(w, "<code>{}</code>", EscapeHtml(&code))?,
            Event::FootnoteReference(name) => write!(
                w,
                r#"<sup class="footnote-reference"><a href="{}#{}">{}</a></sup>"#,
                EscapeHtml(&self.footnote_prefix),
                name,
                name,
            )?,
            Event::HardBreak => w.write_str("<br />")?,
            Event::Html(html) => w.write_str(&html)?,
            Event::Rule => w.write_str("<hr />")?,
            Event::SoftBreak => w.write_str("\n")?,
            Event::TaskListMarker(checked) => write!(
                w,
                r#"<input disabled="" type="checkbox" {}/>"#,
                match checked {
                    true => r#"checked="" "#,
                    false => "",
                }
            )?,
            Event::Text(text) => escape_html(&mut *w, &text)?,
        }
        Ok(())
    }

    fn on_captured<W: StrWrite>(&mut self, w: &mut W, event: Event) -> Result<()> {
        match event {
            Event::Text(text) => {
                match &mut self.capture {
                    Some(Capture::Aafigure { source, .. })
                    | Some(Capture::Mermaid { source }) => source.push_str(&text),
                    None => {}
                }
                Ok(())
            }
            Event::End(Tag::CodeBlock(_)) => match self.capture.take() {
                Some(Capture::Aafigure { options, source }) => {
                    self.features.diagrams += 1;
                    let html = self
                        .diagrams
                        .render(&source, &options)
                        .map_err(|err| Error::Diagram {
                            block: self.features.diagrams,
                            err,
                        })?;
                    w.write_str(&html)?;
                    Ok(())
                }
                Some(Capture::Mermaid { source }) => {
                    self.features.uses_client_diagrams = true;
                    write!(w, r#"<pre class="mermaid">{}</pre>"#, EscapeHtml(&source))?;
                    Ok(())
                }
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn on_image_end<W: StrWrite>(&mut self, w: &mut W) -> Result<()> {
        if let Some(image) = self.image.take() {
            write!(
                w,
                r#"<img src="{}" alt="{}" title="{}">"#,
                EscapeHref(&image.dest),
                EscapeHtml(&image.alt),
                EscapeHtml(&image.title),
            )?;
        }
        Ok(())
    }

    fn on_code_block_start<W: StrWrite>(
        &mut self,
        w: &mut W,
        info: &str,
    ) -> io::Result<()> {
        let (lang, options) = match info.trim().split_once(char::is_whitespace) {
            Some((lang, options)) => (lang, options.trim()),
            None => (info.trim(), ""),
        };
        match lang {
            AAFIGURE_LANGUAGE => {
                self.capture = Some(Capture::Aafigure {
                    options: options.to_owned(),
                    source: String::new(),
                });
                Ok(())
            }
            MERMAID_LANGUAGE => {
                self.capture = Some(Capture::Mermaid {
                    source: String::new(),
                });
                Ok(())
            }
            "" => w.write_str("<pre><code>"),
            lang => write!(w, r#"<pre><code class="language-{}">"#, EscapeHtml(lang)),
        }
    }

    fn on_start<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>"),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                self.on_code_block_start(w, &info)
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => w.write_str("<pre><code>"),
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => {
                let name = EscapeHtml(&name);
                write!(
                    w,
                    r#"<div class="footnote-definition" id="{}">{}. &nbsp;"#,
                    &name, &name,
                )
            }
            Tag::Heading(size) => write!(w, "<h{}>", size),
            Tag::Image(_link_type, dest, title) => {
                self.image = Some(PendingImage {
                    dest: dest.to_string(),
                    title: title.to_string(),
                    alt: String::new(),
                });
                Ok(())
            }
            Tag::Item => w.write_str("<li>"),
            Tag::Link(LinkType::Email, dest, title) => write!(
                w,
                r#"<a href="mailto:{}" title="{}">"#,
                EscapeHref(&dest),
                EscapeHtml(&title),
            ),
            Tag::Link(_link_type, dest, title) => write!(
                w,
                r#"<a href="{}" title="{}">"#,
                EscapeHref(&dest),
                EscapeHtml(&title),
            ),
            Tag::List(None) => w.write_str("<ul>"),
            Tag::List(Some(1)) => w.write_str("<ol>"),
            Tag::List(Some(start)) => write!(w, r#"<ol start="{}">"#, start),
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                },
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" align="left""#,
                    Some(Alignment::Right) => r#" align="right""#,
                    Some(Alignment::Center) => r#" align="center""#,
                    _ => "",
                }
            ),
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>"),
            Tag::CodeBlock(_) => w.write_str("</code></pre>"),
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>"),
            Tag::Heading(level) => write!(w, "</h{}>", level),
            // handled by `on_image_end`
            Tag::Image(..) => Ok(()),
            Tag::Item => w.write_str("</li>"),
            Tag::Link(..) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>"),
            Tag::List(None) => w.write_str("</ul>"),
            Tag::Paragraph => w.write_str("</p>"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>")
            }
            Tag::TableRow => w.write_str("</tr>"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                w.write_str(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                })
            }
        }
    }
}

/// Converts [`Event`]s into an HTML string much like
/// `pulldown_cmark::html::push_html` except that this also supports footnote
/// prefixes and diagram blocks. See the module description for more details.
#[cfg(test)]
fn push_html<'a, I>(
    out: &mut String,
    events: I,
    footnote_prefix: &str,
    diagrams: &dyn Render,
) -> Result<Features>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut renderer = HtmlRenderer::new(footnote_prefix, diagrams);
    for event in events {
        renderer.on_event(out, event)?;
    }
    Ok(renderer.features())
}

/// The result of a fallible rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error rendering HTML.
#[derive(Debug)]
pub enum Error {
    /// Returned when writing the output fails.
    Io(io::Error),

    /// Returned when an `aafigure` block can't be rendered. `block` is the
    /// 1-based position of the block in the document.
    Diagram { block: usize, err: diagram::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Diagram { block, err } => {
                write!(f, "rendering diagram block #{}: {}", block, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Diagram { block: _, err } => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::diagram::{self, Render};
    use std::cell::RefCell;

    /// A [`Render`] that records the blocks it's asked to render and returns
    /// a placeholder instead of running `aafigure`.
    #[derive(Default)]
    pub struct Recorder {
        pub blocks: RefCell<Vec<(String, String)>>,
    }

    impl Render for Recorder {
        fn render(&self, source: &str, options: &str) -> diagram::Result<String> {
            self.blocks
                .borrow_mut()
                .push((source.to_owned(), options.to_owned()));
            Ok(format!("<div><svg data-block=\"{}\"></svg></div>", self.blocks.borrow().len()))
        }
    }

    /// A [`Render`] that always fails like a missing `aafigure` would.
    pub struct Missing;

    impl Render for Missing {
        fn render(&self, _: &str, _: &str) -> diagram::Result<String> {
            Err(diagram::Error::Spawn {
                program: "aafigure".to_owned(),
                err: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        }
    }
}
