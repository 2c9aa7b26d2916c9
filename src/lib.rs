//! The library code for the `quill` blog toolchain. The crate splits into two
//! halves that meet at the content directory:
//!
//! 1. The content pipeline: resolving slugs from source files
//!    ([`crate::slugmap`]), loading and ordering posts ([`crate::post`]),
//!    rendering markdown to HTML ([`crate::markdown`]), injecting heading IDs
//!    and extracting outlines ([`crate::toc`]), and producing the search and
//!    feed responses ([`crate::search`], [`crate::feed`]). [`crate::build`]
//!    stitches these into the static-site build.
//!
//! 2. The export pipeline: a one-shot batch job that walks a Notion page
//!    tree ([`crate::notion`]), converts page blocks to markdown
//!    ([`crate::blocks`]), and writes content files with synthesized
//!    frontmatter ([`crate::export`]). It runs strictly sequentially with a
//!    fixed inter-request delay; it never runs as part of the site build.
//!
//! Posts are immutable once loaded: every build re-derives them from the
//! file system, and the only cache in the system is the [`crate::slugmap`]
//! map, which is built explicitly and never refreshed behind the caller's
//! back.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod blocks;
pub mod build;
pub mod config;
pub mod export;
pub mod feed;
pub mod markdown;
pub mod notion;
pub mod post;
pub mod search;
pub mod slugmap;
pub mod toc;
