//! The library code for the `quire` static site generator. The architecture
//! can be generally broken down into two distinct steps:
//!
//! 1. Parsing pages from source files on disk ([`crate::parser`]). Markdown
//!    bodies are converted to HTML along the way ([`crate::markdown`]), and
//!    `aafigure` diagram blocks are rendered to inline SVG by an external
//!    program ([`crate::diagram`]).
//! 2. Converting the pages into output files on disk ([`crate::write`],
//!    [`crate::feed`]).
//!
//! Between the two, the pages are gathered into a [`site::Site`], which
//! answers the site-wide questions templates ask: which pages are in the
//! navigation, which are pinned, which posts come first.
//!
//! [`build::build_site`] strings the steps together.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod diagram;
pub mod feed;
pub mod htmlrenderer;
pub mod markdown;
pub mod page;
pub mod parser;
pub mod site;
pub mod taxonomy;
pub mod url;
pub mod write;
