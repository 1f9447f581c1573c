//! Defines the [`Site`] type: the read-only aggregate of every [`Page`] in a
//! build plus the site-wide parameters. A [`Site`] is constructed once per
//! build and passed by reference into every render call; nothing about it
//! changes while pages are rendered.

use crate::page::{Page, MAIN_KIND};
use crate::taxonomy::{PINNED, PINNED_TERM};
use gtmpl::Value;
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// An alternate representation of the site (e.g., an Atom feed), announced
/// on every page with a `<link>` tag.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputFormat {
    /// A short name, e.g. `atom`.
    pub name: String,

    /// The link relation, usually `alternate`.
    pub rel: String,

    /// The MIME type of the format, e.g. `application/atom+xml`.
    pub mime_type: String,

    /// Where the format is published.
    pub url: Url,
}

impl OutputFormat {
    /// Converts the format into a [`Value::Object`] with fields `name`, `rel`,
    /// `mime_type` and `url`.
    pub fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("name".to_owned(), Value::String(self.name.clone()));
        m.insert("rel".to_owned(), Value::String(self.rel.clone()));
        m.insert("mime_type".to_owned(), Value::String(self.mime_type.clone()));
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        Value::Object(m)
    }
}

/// The whole-build aggregate of pages and global configuration.
#[derive(Clone, Debug)]
pub struct Site {
    /// The site title.
    pub title: String,

    /// The site description. Empty if none was configured.
    pub description: String,

    /// The base URL every permalink is rooted at.
    pub base_url: Url,

    /// The script that renders client-side diagrams, included only on the
    /// pages that need it.
    pub diagram_script: Option<Url>,

    /// The alternate output formats announced on every page.
    pub alternates: Vec<OutputFormat>,

    /// Every page in the build, in registration order.
    pub pages: Vec<Page>,
}

impl Site {
    /// Creates a site from its parameters and pages. The order of `pages` is
    /// the registration order used by every listing.
    pub fn new(
        title: String,
        description: String,
        base_url: Url,
        diagram_script: Option<Url>,
        alternates: Vec<OutputFormat>,
        pages: Vec<Page>,
    ) -> Site {
        Site {
            title,
            description,
            base_url,
            diagram_script,
            alternates,
            pages,
        }
    }

    /// The declared alternate output formats.
    pub fn alternates(&self) -> &[OutputFormat] {
        &self.alternates
    }

    /// Returns the document title for a page titled `page_title`: the bare
    /// site title if they're equal, `"{page_title} · {site title}"`
    /// otherwise.
    pub fn page_title(&self, page_title: &str) -> String {
        if page_title == self.title {
            self.title.clone()
        } else {
            format!("{} · {}", page_title, self.title)
        }
    }

    /// Iterates over the pages of kind `main` in registration order.
    pub fn navigation(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(|page| page.kind == MAIN_KIND)
    }

    /// Returns the pinned pages ordered by weight (lowest first). Pages with
    /// equal weights keep their registration order.
    pub fn pinned(&self) -> Vec<&Page> {
        let mut pinned: Vec<&Page> = self
            .pages
            .iter()
            .filter(|page| page.taxonomies.contains(PINNED, PINNED_TERM))
            .collect();
        pinned.sort_by_key(|page| page.weight);
        pinned
    }

    /// Groups the pages by their terms in taxonomy `name`. Terms are sorted;
    /// pages under each term keep their registration order.
    pub fn taxonomy(&self, name: &str) -> BTreeMap<&str, Vec<&Page>> {
        let mut groups: BTreeMap<&str, Vec<&Page>> = BTreeMap::new();
        for page in &self.pages {
            for term in page.taxonomies.terms(name) {
                groups.entry(term).or_default().push(page);
            }
        }
        groups
    }

    /// Returns the posts, most recent first. Undated posts come last, in
    /// registration order.
    pub fn posts(&self) -> Vec<&Page> {
        let mut posts: Vec<&Page> =
            self.pages.iter().filter(|page| page.is_post()).collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        posts
    }

    /// Converts the site parameters into a [`Value::Object`] with fields
    /// `title`, `description` and `base_url`.
    pub fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert(
            "description".to_owned(),
            Value::String(self.description.clone()),
        );
        m.insert("base_url".to_owned(), Value::String(self.base_url.to_string()));
        Value::Object(m)
    }
}


#[cfg(test)]
mod test {
    use super::testing::site;
    use super::*;
    use crate::page::{testing::page, POST_KIND};

    #[test]
    fn test_page_title() {
        let site = site(Vec::new());
        assert_eq!("Notes on Languages", site.page_title("Notes on Languages"));
        assert_eq!(
            "Ownership · Notes on Languages",
            site.page_title("Ownership")
        );
    }

    #[test]
    fn test_navigation() {
        let site = site(vec![
            page("about", "About", MAIN_KIND),
            page("ownership", "Ownership", POST_KIND),
            page("projects", "Projects", MAIN_KIND),
            page("drafts-of-drafts", "Drafts", "note"),
            page("contact", "Contact", MAIN_KIND),
        ]);
        let titles: Vec<&str> =
            site.navigation().map(|p| p.title.as_str()).collect();
        assert_eq!(vec!["About", "Projects", "Contact"], titles);
    }

    #[test]
    fn test_pinned_ordered_by_weight() {
        let mut first = page("first", "First", POST_KIND);
        first.weight = 20;
        first.taxonomies.insert(PINNED, PINNED_TERM);
        let mut second = page("second", "Second", POST_KIND);
        second.weight = 10;
        second.taxonomies.insert(PINNED, PINNED_TERM);
        let mut tie = page("tie", "Tie", POST_KIND);
        tie.weight = 20;
        tie.taxonomies.insert(PINNED, PINNED_TERM);
        let unpinned = page("unpinned", "Unpinned", POST_KIND);

        let site = site(vec![first, unpinned, second, tie]);
        let titles: Vec<&str> =
            site.pinned().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(vec!["Second", "First", "Tie"], titles);
    }

    #[test]
    fn test_taxonomy() {
        let mut traits = page("traits", "Traits", POST_KIND);
        traits.taxonomies.insert("tags", "rust");
        let mut effects = page("effects", "Effects", POST_KIND);
        effects.taxonomies.insert("tags", "rust");
        effects.taxonomies.insert("tags", "effects");

        let site = site(vec![traits, effects]);
        let groups = site.taxonomy("tags");
        assert_eq!(vec!["effects", "rust"], groups.keys().copied().collect::<Vec<_>>());
        let rust: Vec<&str> = groups["rust"].iter().map(|p| p.id.as_str()).collect();
        assert_eq!(vec!["traits", "effects"], rust);
        assert!(site.taxonomy("categories").is_empty());
    }

    #[test]
    fn test_posts_newest_first() {
        let mut old = page("old", "Old", POST_KIND);
        old.date = Some("2019-03-01".to_owned());
        let mut new = page("new", "New", POST_KIND);
        new.date = Some("2021-07-15".to_owned());
        let undated = page("undated", "Undated", POST_KIND);
        let about = page("about", "About", MAIN_KIND);

        let site = site(vec![undated, old, about, new]);
        let ids: Vec<&str> = site.posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(vec!["new", "old", "undated"], ids);
    }
}
