//! Support for creating Atom and RSS feeds from a list of posts.

use crate::config::{Author, FeedFormat};
use crate::page::Page;
use atom_syndication::{Entry, Error as AtomError, Feed, FixedDateTime, Link, Person};
use chrono::{FixedOffset, NaiveDate, ParseError, TimeZone, Utc};
use log::debug;
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use std::fmt;
use std::io::Write;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub author: Option<&'a Author>,

    /// The page the feed links back to. Also serves as the Atom feed id.
    pub home_page: &'a Url,
}

/// Creates a feed in `format` from some configuration ([`FeedConfig`]) and a
/// list of posts, and writes the result to a [`std::io::Write`]. Posts
/// without a date are left out.
pub fn write_feed<W: Write>(
    format: FeedFormat,
    config: &FeedConfig,
    posts: &[&Page],
    w: W,
) -> Result<()> {
    let dated = dated_posts(posts)?;
    match format {
        FeedFormat::Atom => {
            atom_feed(config, &dated).write_to(w)?;
        }
        FeedFormat::Rss => {
            rss_channel(config, &dated).write_to(w)?;
        }
    }
    Ok(())
}

fn dated_posts<'p>(posts: &[&'p Page]) -> Result<Vec<(&'p Page, FixedDateTime)>> {
    let mut dated = Vec::with_capacity(posts.len());
    for post in posts {
        match &post.date {
            Some(date) => dated.push((*post, parse_date(date)?)),
            None => debug!(id = post.id.as_str(); "leaving undated post out of feed"),
        }
    }
    Ok(dated)
}

// Dates are day-precision; they're published as midnight UTC.
fn parse_date(date: &str) -> std::result::Result<FixedDateTime, ParseError> {
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d")?.and_hms(0, 0, 0);
    Ok(FixedOffset::east(0).from_utc_datetime(&naive))
}

fn atom_feed(config: &FeedConfig, posts: &[(&Page, FixedDateTime)]) -> Feed {
    let updated = posts
        .iter()
        .map(|(_, date)| *date)
        .max()
        .unwrap_or_else(|| FixedOffset::east(0).from_utc_datetime(&Utc::now().naive_utc()));

    Feed {
        title: config.title.into(),
        id: config.home_page.to_string(),
        updated,
        authors: author_to_people(config.author),
        subtitle: match config.description.is_empty() {
            true => None,
            false => Some(config.description.into()),
        },
        links: vec![alternate_link(config.home_page)],
        entries: posts
            .iter()
            .map(|(post, date)| Entry {
                id: post.url.to_string(),
                title: post.title.as_str().into(),
                updated: *date,
                published: Some(*date),
                authors: author_to_people(config.author),
                links: vec![alternate_link(&post.url)],
                summary: Some(post.summary().0.into()),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn alternate_link(url: &Url) -> Link {
    Link {
        href: url.to_string(),
        rel: "alternate".to_owned(),
        ..Default::default()
    }
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => vec![Person {
            name: author.name.clone(),
            email: author.email.clone(),
            uri: None,
        }],
        None => Vec::new(),
    }
}

fn rss_channel(config: &FeedConfig, posts: &[(&Page, FixedDateTime)]) -> rss::Channel {
    let managing_editor = config.author.and_then(rss_author);
    let items: Vec<Item> = posts
        .iter()
        .map(|(post, date)| {
            ItemBuilder::default()
                .title(post.title.clone())
                .link(post.url.to_string())
                .guid(
                    GuidBuilder::default()
                        .permalink(true)
                        .value(post.url.to_string())
                        .build(),
                )
                .description(post.summary().0.to_owned())
                .pub_date(date.to_rfc2822())
                .author(managing_editor.clone())
                .build()
        })
        .collect();

    ChannelBuilder::default()
        .title(config.title)
        .link(config.home_page.to_string())
        .description(config.description)
        .managing_editor(managing_editor)
        .items(items)
        .build()
}

// RSS wants authors as `email (Name)`; without an email there's nothing to
// put there.
fn rss_author(author: &Author) -> Option<String> {
    author
        .email
        .as_ref()
        .map(|email| format!("{} ({})", email, author.name))
}

/// The result of a fallible feed operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants inlude I/O, Atom, RSS and
/// date-time parsing issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when there is an RSS-related error.
    Rss(rss::Error),

    /// Returned when there is an issue parsing a post's date.
    DateTimeParse(ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
            Error::Rss(err) => err.fmt(f),
            Error::DateTimeParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
            Error::Rss(err) => Some(err),
            Error::DateTimeParse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<rss::Error> for Error {
    fn from(err: rss::Error) -> Error {
        Error::Rss(err)
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: ParseError) -> Error {
        Error::DateTimeParse(err)
    }
}
