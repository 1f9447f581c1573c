//! Rewrites links between content files into links between rendered pages.
//! Authors link to other pages by their source path (`ownership.md`,
//! `../effects/index.md`); the rendered site needs `ownership.html` and
//! `effects.html`.

use url::{ParseError, Url};

const MARKDOWN_EXTENSION: &str = ".md";
const HTML_EXTENSION: &str = ".html";
const BUNDLE_INDEX: &str = "/index.md";

/// Rewrites the links found in one content file.
pub struct LinkRewriter<'a> {
    /// The URL the content directory is published at, e.g.
    /// `https://example.org/`. Only links under this root are rewritten.
    site_root: &'a Url,

    /// The URL of the content file itself. Relative links resolve against
    /// it.
    base: Url,
}

impl<'a> LinkRewriter<'a> {
    /// Constructs a rewriter for the content file at `source_path` (relative
    /// to the content directory, e.g. `effects/index.md`).
    pub fn new(site_root: &'a Url, source_path: &str) -> Result<LinkRewriter<'a>> {
        Ok(LinkRewriter {
            site_root,
            base: site_root.join(source_path)?,
        })
    }

    /// Rewrites `link`. Links to markdown files under the site root are
    /// pointed at the rendered page; everything else is only normalized.
    pub fn rewrite(&self, link: &str) -> Result<String> {
        if link.starts_with('#') {
            return Ok(link.to_owned());
        }
        let absolute = match Url::parse(link) {
            Ok(absolute) => absolute,
            Err(ParseError::RelativeUrlWithoutBase) => self.base.join(link)?,
            Err(e) => return Err(e),
        };
        Ok(self.rewrite_absolute(absolute).to_string())
    }

    fn rewrite_absolute(&self, mut absolute: Url) -> Url {
        let fragment = absolute.fragment().map(str::to_owned);
        absolute.set_fragment(None);

        let mut rewritten = match self.site_root.make_relative(&absolute) {
            Some(relative)
                if !relative.starts_with("../")
                    && relative.ends_with(MARKDOWN_EXTENSION) =>
            {
                let id = match bundle_id(&relative) {
                    Some(id) => id,
                    None => relative.trim_end_matches(MARKDOWN_EXTENSION),
                };
                self.site_root
                    .join(&format!("{}{}", id, HTML_EXTENSION))
                    .unwrap_or(absolute)
            }
            _ => absolute,
        };
        rewritten.set_fragment(fragment.as_deref());
        rewritten
    }
}

/// Returns the bundle directory for a top-level bundle's `index.md`, e.g.
/// `effects` for `effects/index.md`.
fn bundle_id(relative: &str) -> Option<&str> {
    let id = relative.strip_suffix(BUNDLE_INDEX)?;
    if id.contains('/') {
        None
    } else {
        Some(id)
    }
}

type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod test {
    use super::*;

    fn rewrite(source_path: &str, link: &str) -> Result<String> {
        LinkRewriter::new(&Url::parse("https://example.org/blog/")?, source_path)?
            .rewrite(link)
    }

    #[test]
    fn test_rewrite_relative_page() -> Result<()> {
        assert_eq!("https://example.org/blog/traits.html", rewrite("ownership.md", "traits.md")?);
        assert_eq!("https://example.org/blog/traits.html", rewrite("ownership.md", "./traits.md")?);
        Ok(())
    }

    #[test]
    fn test_rewrite_relative_page_redundancies() -> Result<()> {
        assert_eq!(
            "https://example.org/blog/traits.html",
            rewrite("ownership.md", "../blog/traits.md")?,
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_bundle() -> Result<()> {
        assert_eq!(
            "https://example.org/blog/effects.html",
            rewrite("ownership.md", "effects/index.md")?,
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_from_bundle() -> Result<()> {
        assert_eq!(
            "https://example.org/blog/effects/handlers.svg",
            rewrite("effects/index.md", "handlers.svg")?,
        );
        assert_eq!(
            "https://example.org/blog/traits.html",
            rewrite("effects/index.md", "../traits.md")?,
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_leaves_assets() -> Result<()> {
        assert_eq!("https://example.org/blog/graph.png", rewrite("ownership.md", "graph.png")?);
        Ok(())
    }

    #[test]
    fn test_rewrite_absolute() -> Result<()> {
        assert_eq!(
            "https://example.org/blog/traits.html",
            rewrite("ownership.md", "https://example.org/blog/traits.md")?,
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_remote_markdown() -> Result<()> {
        assert_eq!(
            "https://github.com/rust-lang/rfcs/README.md",
            rewrite("ownership.md", "https://github.com/rust-lang/rfcs/./README.md")?,
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_keeps_fragments() -> Result<()> {
        assert_eq!("#footnote-1", rewrite("ownership.md", "#footnote-1")?);
        assert_eq!(
            "https://example.org/blog/traits.html#coherence",
            rewrite("ownership.md", "traits.md#coherence")?,
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_outside_root() -> Result<()> {
        assert_eq!(
            "https://example.org/notes.md",
            rewrite("ownership.md", "../notes.md")?,
        );
        Ok(())
    }
}
