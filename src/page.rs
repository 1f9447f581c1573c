//! Defines the [`Page`] type, one unit of content (a blog post or a static
//! page like "About"). See [`Page::to_value`] and [`Page::summarize`] for how
//! pages are converted into template values.

use crate::taxonomy::Taxonomies;
use gtmpl::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

/// The kind of pages listed in the site navigation.
pub const MAIN_KIND: &str = "main";

/// The kind of pages listed on the index pages and in the feeds. Pages
/// without a `Type` in their frontmatter are posts.
pub const POST_KIND: &str = "post";

const FOLD_TAG: &str = "<!-- more -->";

/// Represents a page parsed from a content file. A page is immutable once
/// parsed; its `url` is the permalink for the rest of the build.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// The path of the source file relative to the content directory, less
    /// the extension (or the bundle directory for page bundles).
    pub id: String,

    /// The title of the page.
    pub title: String,

    /// The date of the page (`YYYY-MM-DD`), if any. Static pages usually
    /// don't have one.
    pub date: Option<String>,

    /// The page's type, e.g. [`MAIN_KIND`] or [`POST_KIND`].
    pub kind: String,

    /// Orders the page within weighted listings (lowest first).
    pub weight: i64,

    /// The taxonomies the page belongs to.
    pub taxonomies: Taxonomies,

    /// The permalink of the rendered page.
    pub url: Url,

    /// The target location on disk for the rendered page.
    pub file_path: PathBuf,

    /// The rendered HTML body.
    pub body: String,

    /// True if the body contains a block rendered client-side, i.e. the page
    /// needs the diagram script.
    pub uses_client_diagrams: bool,
}

impl Page {
    /// Returns true for pages of kind [`POST_KIND`].
    pub fn is_post(&self) -> bool {
        self.kind == POST_KIND
    }

    /// Returns the part of the body above the `<!-- more -->` fold and
    /// whether the body was actually folded.
    pub fn summary(&self) -> (&str, bool) {
        match self.body.find(FOLD_TAG) {
            Some(i) => (&self.body[..i], true),
            None => (&self.body, false),
        }
    }

    /// Converts the page into a [`Value::Object`] with fields `id`, `title`,
    /// `date`, `kind`, `url`, `body` and `taxonomies`. A missing date renders
    /// as the empty string.
    pub fn to_value(&self) -> Value {
        let mut m = self.common_fields();
        m.insert("body".to_owned(), Value::String(self.body.clone()));
        Value::Object(m)
    }

    /// Like [`Page::to_value`], but with the body cut at the fold. Adds
    /// `summarized`, which is true if the body was folded.
    pub fn summarize(&self) -> Value {
        let (summary, summarized) = self.summary();
        let mut m = self.common_fields();
        m.insert("body".to_owned(), Value::String(summary.to_owned()));
        m.insert("summarized".to_owned(), Value::Bool(summarized));
        Value::Object(m)
    }

    /// Converts the page into a navigation link: a [`Value::Object`] with
    /// fields `title` and `url`.
    pub fn link(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        Value::Object(m)
    }

    fn common_fields(&self) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("id".to_owned(), Value::String(self.id.clone()));
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert(
            "date".to_owned(),
            Value::String(self.date.clone().unwrap_or_default()),
        );
        m.insert("kind".to_owned(), Value::String(self.kind.clone()));
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        m.insert("taxonomies".to_owned(), (&self.taxonomies).into());
        m
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Builds a page with the given id, title and kind rooted at
    /// `https://example.org/`.
    pub fn page(id: &str, title: &str, kind: &str) -> Page {
        Page {
            id: id.to_owned(),
            title: title.to_owned(),
            date: None,
            kind: kind.to_owned(),
            weight: 0,
            taxonomies: Taxonomies::new(),
            url: Url::parse(&format!("https://example.org/{}.html", id))
                .expect("valid fixture url"),
            file_path: PathBuf::from(format!("/tmp/quire/{}.html", id)),
            body: String::new(),
            uses_client_diagrams: false,
        }
    }
}
