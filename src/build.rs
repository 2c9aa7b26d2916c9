//! The static build: renders every published post to HTML and writes the
//! feed. One malformed post is logged and skipped; the build only fails for
//! problems that affect the whole site (an unreadable content root, an
//! unwritable output directory).

use std::fmt;
use std::fs;
use std::io;

use crate::config::Config;
use crate::feed;
use crate::markdown::{self, Renderer};
use crate::post::{self, Repository};
use crate::slugmap::{self, SlugMap};
use crate::toc::{HeadingScanner, RegexScanner};

/// What a build accomplished.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub rendered: usize,
    pub skipped: usize,
}

/// Renders the whole site into `config.output_dir`: one
/// `posts/<slug>.html` per published post (anchor ids injected, ready for
/// outline navigation) and a `feed.xml` over the listed posts.
pub fn build_site(config: &Config) -> Result<BuildReport> {
    let slug_map = SlugMap::build(&config.content_dir)?;
    let repository = Repository::new(&slug_map, &config.content_dir, config.page_size());
    let renderer = Renderer::new();
    let scanner = RegexScanner::new();

    let posts_dir = config.output_dir.join("posts");
    fs::create_dir_all(&posts_dir)?;

    let mut report = BuildReport::default();
    for slug in slug_map.slugs() {
        match render_post(&repository, &renderer, &scanner, slug) {
            Ok(Some(html)) => {
                fs::write(posts_dir.join(format!("{}.html", slug)), html)?;
                report.rendered += 1;
            }
            // unpublished posts are simply not part of the site
            Ok(None) => {}
            Err(err) => {
                log::warn!("skipping `{}`: {}", slug, err);
                report.skipped += 1;
            }
        }
    }

    let feed = feed::respond(&config.site, &repository.all())?;
    fs::write(config.output_dir.join("feed.xml"), feed.body)?;

    log::info!(
        "build finished: {} rendered, {} skipped, {} pages of {}",
        report.rendered,
        report.skipped,
        repository.total_pages(),
        config.page_size()
    );
    Ok(report)
}

fn render_post(
    repository: &Repository,
    renderer: &Renderer,
    scanner: &RegexScanner,
    slug: &str,
) -> Result<Option<String>> {
    let post = match repository.get(slug)? {
        Some(post) => post,
        None => return Ok(None),
    };
    let html = renderer.to_html(&post.content)?;
    Ok(Some(scanner.inject_ids(&html)))
}

/// Represents the result of a build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error that takes down a whole build.
#[derive(Debug)]
pub enum Error {
    /// Returned when the content root cannot be scanned.
    SlugMap(slugmap::Error),

    /// Returned when loading a post fails.
    Post(post::Error),

    /// Returned when rendering a post body fails.
    Markdown(markdown::Error),

    /// Returned when the feed cannot be produced.
    Feed(feed::Error),

    /// Returned when writing output files fails.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SlugMap(err) => err.fmt(f),
            Error::Post(err) => err.fmt(f),
            Error::Markdown(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SlugMap(err) => Some(err),
            Error::Post(err) => Some(err),
            Error::Markdown(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<slugmap::Error> for Error {
    /// Converts [`slugmap::Error`]s into [`Error`]s. It allows us to use the
    /// `?` operator when scanning the content root.
    fn from(err: slugmap::Error) -> Error {
        Error::SlugMap(err)
    }
}

impl From<post::Error> for Error {
    /// Converts [`post::Error`]s into [`Error`]s. It allows us to use the
    /// `?` operator when loading posts.
    fn from(err: post::Error) -> Error {
        Error::Post(err)
    }
}

impl From<markdown::Error> for Error {
    /// Converts [`markdown::Error`]s into [`Error`]s. It allows us to use
    /// the `?` operator when rendering post bodies.
    fn from(err: markdown::Error) -> Error {
        Error::Markdown(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts [`feed::Error`]s into [`Error`]s. It allows us to use the
    /// `?` operator when producing the feed.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}

impl From<io::Error> for Error {
    /// Converts [`io::Error`]s into [`Error`]s. It allows us to use the `?`
    /// operator for fallible I/O functions.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use std::path::Path;

    fn write_post(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.content_dir = dir.join("content/posts");
        config.output_dir = dir.join("public");
        config
    }

    #[test]
    fn test_build_renders_posts_and_feed() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_post(
            &config.content_dir,
            "rag/intro.mdx",
            "---\ntitle: Intro\ndate: \"2024-03-01\"\n---\n## 第一章\n\nbody\n",
        );
        write_post(
            &config.content_dir,
            "hidden.mdx",
            "---\npublished: false\ndate: \"2024-03-02\"\n---\nnope\n",
        );

        let report = build_site(&config)?;
        assert_eq!(report, BuildReport { rendered: 1, skipped: 0 });

        let html = fs::read_to_string(config.output_dir.join("posts/intro.html"))?;
        assert!(html.contains("id=\"第一章\""));

        let feed = fs::read_to_string(config.output_dir.join("feed.xml"))?;
        assert!(feed.contains("/posts/intro"));
        assert!(!feed.contains("hidden"));
        Ok(())
    }

    #[test]
    fn test_malformed_post_is_skipped_not_fatal() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_post(&config.content_dir, "good.mdx", "---\ndate: \"2024-01-01\"\n---\nok\n");
        write_post(&config.content_dir, "bad.mdx", "no frontmatter at all");

        let report = build_site(&config)?;
        assert_eq!(report, BuildReport { rendered: 1, skipped: 1 });
        assert!(!config.output_dir.join("posts/bad.html").exists());
        Ok(())
    }

    #[test]
    fn test_empty_site_builds() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let report = build_site(&config)?;
        assert_eq!(report, BuildReport::default());
        assert!(config.output_dir.join("feed.xml").exists());
        Ok(())
    }
}
