//! Defines the [`Taxonomies`] type, which records the groupings (e.g., tags
//! or the `pinned` flag) a [`crate::page::Page`] belongs to.

use gtmpl::Value;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The taxonomy holding pinned pages.
pub const PINNED: &str = "pinned";

/// The term a page carries in the [`PINNED`] taxonomy when it is pinned.
pub const PINNED_TERM: &str = "yes";

/// The taxonomy populated by the `Tags` frontmatter shorthand.
pub const TAGS: &str = "tags";

/// Maps taxonomy names to the terms a page holds in each. Names and terms are
/// slugified on insertion so `Rust`, `rust` and ` RUST ` all collapse to
/// `rust`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Taxonomies(BTreeMap<String, BTreeSet<String>>);

impl Taxonomies {
    pub fn new() -> Taxonomies {
        Taxonomies::default()
    }

    /// Adds `term` to the taxonomy `name`.
    pub fn insert(&mut self, name: &str, term: &str) {
        self.0
            .entry(slug::slugify(name))
            .or_default()
            .insert(slug::slugify(term));
    }

    /// Returns true if the page holds `term` in taxonomy `name`.
    pub fn contains(&self, name: &str, term: &str) -> bool {
        self.0
            .get(&slug::slugify(name))
            .map_or(false, |terms| terms.contains(&slug::slugify(term)))
    }

    /// Iterates over the terms held in taxonomy `name`, in sorted order.
    pub fn terms<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.0
            .get(&slug::slugify(name))
            .into_iter()
            .flat_map(|terms| terms.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The value of one taxonomy in the frontmatter: a single term, a list of
/// terms, or a boolean flag (`pinned: true` means `pinned: yes`).
#[derive(Deserialize)]
#[serde(untagged)]
enum Terms {
    Flag(bool),
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for Taxonomies {
    fn deserialize<D>(deserializer: D) -> Result<Taxonomies, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Terms>::deserialize(deserializer)?;
        let mut taxonomies = Taxonomies::new();
        for (name, terms) in raw {
            match terms {
                Terms::Flag(true) => taxonomies.insert(&name, PINNED_TERM),
                Terms::Flag(false) => {}
                Terms::One(term) => taxonomies.insert(&name, &term),
                Terms::Many(terms) => {
                    for term in terms {
                        taxonomies.insert(&name, &term);
                    }
                }
            }
        }
        Ok(taxonomies)
    }
}

impl From<&Taxonomies> for Value {
    /// Converts [`Taxonomies`] into a [`Value::Object`] mapping each taxonomy
    /// name to the list of its terms.
    fn from(taxonomies: &Taxonomies) -> Value {
        let m: HashMap<String, Value> = taxonomies
            .0
            .iter()
            .map(|(name, terms)| {
                (
                    name.clone(),
                    Value::Array(
                        terms.iter().cloned().map(Value::String).collect(),
                    ),
                )
            })
            .collect();
        Value::Object(m)
    }
}
