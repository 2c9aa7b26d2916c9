//! Defines the [`Post`] type and the [`Repository`] that loads, filters,
//! orders, and paginates posts. Each post source file is structured as
//! follows:
//!
//! 1. Initial frontmatter fence (`---`)
//! 2. YAML frontmatter; every field is optional and falls back to a
//!    documented default
//! 3. Terminal frontmatter fence (`---`)
//! 4. Post body (markdown)
//!
//! For example:
//!
//! ```md
//! ---
//! title: "RAG 实战"
//! date: "2024-03-01"
//! category: "rag"
//! tags: ["rag", "llm"]
//! ---
//! # 第一章
//!
//! 正文。
//! ```
//!
//! `published` and `listed` are independent gates: an unpublished post does
//! not exist anywhere, while an unlisted post renders individually but is
//! excluded from listings, pagination, search, and the feed.

use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::slugmap::SlugMap;

/// One content item, immutable once loaded.
#[derive(Clone, Debug)]
pub struct Post {
    /// URL-safe identifier: the file name without extension or directory.
    pub slug: String,

    /// Path relative to the content root, forward slashes, possibly with a
    /// series subdirectory.
    pub file_path: String,

    pub title: String,
    pub description: String,

    /// ISO date string, compared chronologically where it parses and
    /// lexicographically where it does not.
    pub date: String,

    pub category: String,
    pub tags: Vec<String>,

    /// Grouping key: the explicit frontmatter field wins, otherwise the
    /// first path segment when the file lives in a subdirectory.
    pub series: Option<String>,

    pub published: bool,
    pub listed: bool,
    pub cover: Option<String>,

    /// The raw markdown body.
    pub content: String,
}

#[derive(Deserialize)]
struct Frontmatter {
    #[serde(default = "Frontmatter::default_title")]
    title: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    date: Option<String>,

    #[serde(default = "Frontmatter::default_category")]
    category: String,

    #[serde(default)]
    tags: Vec<String>,

    #[serde(default)]
    series: Option<String>,

    #[serde(default = "Frontmatter::default_flag")]
    published: bool,

    #[serde(default = "Frontmatter::default_flag")]
    listed: bool,

    #[serde(default)]
    cover: Option<String>,
}

impl Frontmatter {
    fn default_title() -> String {
        "Untitled".to_owned()
    }

    fn default_category() -> String {
        "uncategorized".to_owned()
    }

    fn default_flag() -> bool {
        true
    }
}

impl Post {
    /// Parses a single post from its slug, content-root-relative path, and
    /// raw file contents.
    pub fn from_str(slug: &str, file_path: &str, input: &str) -> Result<Post> {
        fn frontmatter_indices(input: &str) -> Result<(usize, usize, usize)> {
            const FENCE: &str = "---";
            if !input.starts_with(FENCE) {
                return Err(Error::FrontmatterMissingStartFence);
            }
            match input[FENCE.len()..].find("---") {
                None => Err(Error::FrontmatterMissingEndFence),
                Some(offset) => Ok((
                    FENCE.len(),                        // yaml_start
                    FENCE.len() + offset,               // yaml_stop
                    FENCE.len() + offset + FENCE.len(), // body_start
                )),
            }
        }

        let (yaml_start, yaml_stop, body_start) = frontmatter_indices(input)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(&input[yaml_start..yaml_stop])?;

        let derived_series = file_path
            .split('/')
            .next()
            .filter(|_| file_path.contains('/'))
            .map(str::to_owned);

        Ok(Post {
            slug: slug.to_owned(),
            file_path: file_path.to_owned(),
            title: frontmatter.title,
            description: frontmatter.description,
            date: frontmatter
                .date
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            category: frontmatter.category,
            tags: frontmatter.tags,
            series: frontmatter.series.or(derived_series),
            published: frontmatter.published,
            listed: frontmatter.listed,
            cover: frontmatter.cover,
            content: input[body_start..].trim_start_matches('\n').to_owned(),
        })
    }

    /// Chronological sort key. Accepts RFC 3339 timestamps and bare
    /// `YYYY-MM-DD` dates; anything else sorts to the distant past.
    fn date_key(&self) -> NaiveDateTime {
        if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(&self.date) {
            return ts.naive_utc();
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(&self.date, "%Y-%m-%d") {
            return date.and_time(chrono::NaiveTime::MIN);
        }
        NaiveDateTime::MIN
    }
}

/// Loads posts through a [`SlugMap`] and exposes the filtered, ordered views
/// the rest of the system consumes. Every call re-reads the file system; the
/// only cached state is the slug map handed in at construction.
pub struct Repository<'a> {
    slug_map: &'a SlugMap,
    content_root: &'a Path,
    page_size: usize,
}

impl<'a> Repository<'a> {
    pub fn new(slug_map: &'a SlugMap, content_root: &'a Path, page_size: usize) -> Repository<'a> {
        Repository {
            slug_map,
            content_root,
            page_size,
        }
    }

    /// Loads one post by slug, regardless of its `listed` flag. Returns
    /// `Ok(None)` for unknown slugs, slugs that fail percent-decoding, and
    /// unpublished posts; parse failures are errors the caller surfaces as a
    /// failed render for that post alone.
    pub fn get(&self, slug: &str) -> Result<Option<Post>> {
        let file_path = match self.slug_map.lookup(slug) {
            Some(path) => path,
            None => return Ok(None),
        };

        let full_path = self.content_root.join(file_path);
        if !full_path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&full_path)?;
        let slug = percent_encoding::percent_decode_str(slug)
            .decode_utf8()
            // lookup already decoded this exact input
            .expect("slug decoded during lookup");
        let post = Post::from_str(&slug, file_path, &contents)
            .map_err(|e| Error::Annotated(format!("parsing post `{}`", file_path), Box::new(e)))?;

        if !post.published {
            return Ok(None);
        }
        Ok(Some(post))
    }

    /// Every published and listed post, ordered by date descending. Ties
    /// keep scan order. Posts that fail to parse are logged and skipped so
    /// one bad file cannot take down every listing.
    pub fn all(&self) -> Vec<Post> {
        let mut posts = Vec::new();
        for slug in self.slug_map.slugs() {
            match self.get(slug) {
                Ok(Some(post)) if post.listed => posts.push(post),
                Ok(_) => {}
                Err(e) => log::warn!("skipping `{}`: {}", slug, e),
            }
        }
        posts.sort_by(|a, b| b.date_key().cmp(&a.date_key()));
        posts
    }

    pub fn by_category(&self, category: &str) -> Vec<Post> {
        self.all()
            .into_iter()
            .filter(|post| post.category == category)
            .collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Post> {
        self.all()
            .into_iter()
            .filter(|post| post.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for post in self.all() {
            if !seen.contains(&post.category) {
                seen.push(post.category);
            }
        }
        seen
    }

    /// Distinct tags, flattened across posts, in first-seen order.
    pub fn tags(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for post in self.all() {
            for tag in post.tags {
                if !seen.contains(&tag) {
                    seen.push(tag);
                }
            }
        }
        seen
    }

    /// The 1-based `page` slice of the full listing. Out-of-range pages
    /// (including page 0) yield an empty vector rather than an error.
    pub fn page(&self, page: usize) -> Vec<Post> {
        if page == 0 {
            return Vec::new();
        }
        let posts = self.all();
        let start = (page - 1) * self.page_size;
        if start >= posts.len() {
            return Vec::new();
        }
        let end = (start + self.page_size).min(posts.len());
        posts[start..end].to_vec()
    }

    /// `ceil(total posts / page size)`; zero posts means zero pages.
    pub fn total_pages(&self) -> usize {
        let total = self.all().len();
        total.div_ceil(self.page_size)
    }
}

/// Represents the result of a [`Post`]-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a [`Post`].
#[derive(Debug)]
pub enum Error {
    /// Returned when a post source file is missing its starting frontmatter
    /// fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when a post source file is missing its terminal frontmatter
    /// fence (`---` i.e., the starting fence was found but the ending one
    /// was missing).
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "Post must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingStartFence => None,
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
