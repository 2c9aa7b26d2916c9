//! Defines [`SlugMap`], the resolver that maps URL slugs to content files.
//!
//! A slug is the file name without its extension and without any directory
//! component, so `rag/intro-to-rag.mdx` is reachable as `intro-to-rag`. The
//! map is an explicit, caller-owned cache: build it once with
//! [`SlugMap::build`] and it reflects the file system as of that moment.
//! There is no implicit refresh; rebuilding is the only invalidation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use percent_encoding::percent_decode_str;
use walkdir::WalkDir;

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "mdx"];

/// A mapping from slug to content-root-relative file path (forward slashes).
///
/// Two files in different directories with the same base name collide; the
/// entry encountered later in the scan wins. The collision is logged, not
/// reported as an error — see the policy note on [`SlugMap::build`].
pub struct SlugMap {
    entries: BTreeMap<String, String>,
}

impl SlugMap {
    /// Recursively scans `content_root` for markdown files and builds the
    /// slug map. A missing root yields an empty map rather than an error so
    /// that a freshly-cloned site with no exported content still builds.
    ///
    /// Collision policy: later scan entries silently replace earlier ones
    /// (matching map-insertion order in the original implementation); a
    /// warning names both paths so the loss is visible in the build log.
    pub fn build(content_root: &Path) -> Result<SlugMap> {
        let mut entries = BTreeMap::new();
        if !content_root.exists() {
            return Ok(SlugMap { entries });
        }

        for result in WalkDir::new(content_root).sort_by_file_name() {
            let entry = result?;
            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(content_root)
                // WalkDir only yields descendants of `content_root`
                .expect("walked path must live under the content root");
            let slug = match entry.path().file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_owned(),
                None => {
                    return Err(Error::InvalidFileName(relative.to_owned()));
                }
            };
            let path = relative.to_string_lossy().replace('\\', "/");

            if let Some(previous) = entries.insert(slug.clone(), path.clone()) {
                log::warn!(
                    "slug collision: `{}` maps to both `{}` and `{}`; keeping the latter",
                    slug,
                    previous,
                    path
                );
            }
        }

        Ok(SlugMap { entries })
    }

    /// Returns every known slug.
    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Looks up the relative file path for `slug`. The input is
    /// percent-decoded first, so `%E5%85%A5%E9%97%A8` and the literal CJK
    /// slug resolve identically; input that does not decode to UTF-8 is
    /// simply not found.
    pub fn lookup(&self, slug: &str) -> Option<&str> {
        let decoded = percent_decode_str(slug).decode_utf8().ok()?;
        self.entries.get(decoded.as_ref()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MARKDOWN_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Represents the result of building a [`SlugMap`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error scanning the content root.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O errors during the recursive scan.
    WalkDir(walkdir::Error),

    /// Returned when a content file name isn't valid UTF-8.
    InvalidFileName(std::path::PathBuf),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::WalkDir(err) => err.fmt(f),
            Error::InvalidFileName(path) => {
                write!(f, "invalid file name: {:?}", path)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::WalkDir(err) => Some(err),
            Error::InvalidFileName(_) => None,
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator during the scan.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "---\ntitle: t\n---\nbody\n").unwrap();
    }

    #[test]
    fn test_build_and_lookup() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "hello.mdx");
        touch(dir.path(), "rag/intro-to-rag.mdx");
        touch(dir.path(), "notes.txt"); // ignored: not markdown

        let map = SlugMap::build(dir.path())?;
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("hello"), Some("hello.mdx"));
        assert_eq!(map.lookup("intro-to-rag"), Some("rag/intro-to-rag.mdx"));
        assert_eq!(map.lookup("missing"), None);
        Ok(())
    }

    #[test]
    fn test_lookup_decodes_percent_encoding() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rag-入门.mdx");

        let map = SlugMap::build(dir.path())?;
        assert_eq!(
            map.lookup("rag-%E5%85%A5%E9%97%A8"),
            Some("rag-入门.mdx")
        );
        // Percent-encoded bytes that aren't UTF-8 are "not found", not an
        // error.
        assert_eq!(map.lookup("%ff%fe"), None);
        Ok(())
    }

    #[test]
    fn test_collision_keeps_later_entry() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "intro.mdx");
        touch(dir.path(), "workflow/intro.mdx");

        let map = SlugMap::build(dir.path())?;
        assert_eq!(map.len(), 1);
        // `sort_by_file_name` visits `intro.mdx` before the `workflow`
        // directory, so the nested file wins.
        assert_eq!(map.lookup("intro"), Some("workflow/intro.mdx"));
        Ok(())
    }

    #[test]
    fn test_missing_root_is_empty() -> Result<()> {
        let map = SlugMap::build(Path::new("./does-not-exist"))?;
        assert!(map.is_empty());
        Ok(())
    }
}
