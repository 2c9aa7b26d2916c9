//! Heading-ID injection and table-of-contents extraction over rendered HTML.
//!
//! Both passes pattern-match heading tags rather than structurally parsing
//! the document. That is a deliberate simplification: the input is the
//! narrow HTML our own renderer produces, where headings are never nested
//! inside one another. The [`HeadingScanner`] trait isolates the seam so a
//! structural parser can replace the regex implementation if the input ever
//! becomes less controlled.

use regex::{Captures, Regex};

/// One entry in a post's navigable outline. Derived per render, never
/// persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocItem {
    /// The heading's anchor id.
    pub id: String,

    /// Display text with nested tags stripped.
    pub text: String,

    /// Heading depth; extraction only produces 2 and 3.
    pub level: u8,
}

/// Scans rendered HTML for headings. See [`RegexScanner`] for the default
/// implementation.
pub trait HeadingScanner {
    /// Adds an `id` attribute to every h2–h4 that lacks one, derived from
    /// the heading's visible text. Idempotent: re-running on its own output
    /// changes nothing.
    fn inject_ids(&self, html: &str) -> String;

    /// Extracts the outline from h2–h3 headings in document order. Headings
    /// whose text is empty after tag-stripping are skipped.
    fn extract(&self, html: &str) -> Vec<TocItem>;
}

/// The regex-backed [`HeadingScanner`].
///
/// Two headings that reduce to the same text produce the same id; anchor
/// navigation then targets whichever element the browser resolves first.
/// That is an accepted limitation, not something this scanner tries to
/// repair.
pub struct RegexScanner {
    inject: Regex,
    extract: Regex,
    id_attr: Regex,
    tag: Regex,
    strip: Regex,
    whitespace: Regex,
    hyphens: Regex,
}

impl RegexScanner {
    pub fn new() -> RegexScanner {
        // The patterns are fixed, so compilation cannot fail at runtime.
        RegexScanner {
            inject: Regex::new(r"(?is)<h([2-4])([^>]*)>(.*?)</h([2-4])>")
                .expect("heading injection pattern"),
            extract: Regex::new(r"(?is)<h([23])([^>]*)>(.*?)</h[23]>")
                .expect("heading extraction pattern"),
            id_attr: Regex::new(r#"id="([^"]*)""#).expect("id attribute pattern"),
            tag: Regex::new(r"<[^>]*>").expect("tag-strip pattern"),
            strip: Regex::new(r"[^\w\x{4E00}-\x{9FA5}\s-]").expect("slug strip pattern"),
            whitespace: Regex::new(r"\s+").expect("whitespace pattern"),
            hyphens: Regex::new(r"-+").expect("hyphen collapse pattern"),
        }
    }

    /// Reduces heading text to a URL-friendly anchor: lowercased, with
    /// everything but word characters, CJK ideographs, whitespace, and
    /// hyphens removed, whitespace collapsed to single hyphens, and
    /// leading/trailing hyphens trimmed.
    pub fn slugify(&self, text: &str) -> String {
        self.slugify_preserving_case(&text.to_lowercase())
    }

    /// Like [`RegexScanner::slugify`] but keeps the input's case. Exported
    /// file names preserve their titles' capitalization; anchors do not.
    pub fn slugify_preserving_case(&self, text: &str) -> String {
        let stripped = self.strip.replace_all(text, "");
        let hyphenated = self.whitespace.replace_all(stripped.trim(), "-");
        let collapsed = self.hyphens.replace_all(&hyphenated, "-");
        collapsed.trim_matches('-').to_owned()
    }

    fn visible_text(&self, inner: &str) -> String {
        self.tag.replace_all(inner, "").trim().to_owned()
    }
}

impl Default for RegexScanner {
    fn default() -> RegexScanner {
        RegexScanner::new()
    }
}

impl HeadingScanner for RegexScanner {
    fn inject_ids(&self, html: &str) -> String {
        self.inject
            .replace_all(html, |caps: &Captures| {
                let attrs = &caps[2];
                if attrs.contains("id=\"") {
                    return caps[0].to_owned();
                }
                let id = self.slugify(&self.visible_text(&caps[3]));
                format!(
                    "<h{}{} id=\"{}\">{}</h{}>",
                    &caps[1], attrs, id, &caps[3], &caps[4]
                )
            })
            .into_owned()
    }

    fn extract(&self, html: &str) -> Vec<TocItem> {
        let mut toc = Vec::new();
        for caps in self.extract.captures_iter(html) {
            let level: u8 = caps[1].parse().unwrap_or(2);
            let text = self.visible_text(&caps[3]);
            if text.is_empty() {
                continue;
            }
            let id = match self.id_attr.captures(&caps[2]) {
                Some(id_caps) => id_caps[1].to_owned(),
                None => self.slugify(&text),
            };
            toc.push(TocItem { id, text, level });
        }
        toc
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scanner() -> RegexScanner {
        RegexScanner::new()
    }

    #[test]
    fn test_extract_levels_and_order() {
        let toc = scanner().extract(
            "<h2 id=\"foo\">A</h2><h3>B</h3><h4>Deep</h4><h2>C</h2>",
        );
        assert_eq!(
            toc,
            vec![
                TocItem {
                    id: "foo".to_owned(),
                    text: "A".to_owned(),
                    level: 2,
                },
                TocItem {
                    id: "b".to_owned(),
                    text: "B".to_owned(),
                    level: 3,
                },
                TocItem {
                    id: "c".to_owned(),
                    text: "C".to_owned(),
                    level: 2,
                },
            ]
        );
    }

    #[test]
    fn test_extract_strips_nested_tags_and_skips_empty() {
        let toc = scanner().extract("<h2><em>Hi</em> there</h2><h3><img src=\"x\"></h3>");
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].text, "Hi there");
        assert_eq!(toc[0].id, "hi-there");
    }

    #[test]
    fn test_inject_ids() {
        let scanner = scanner();
        let html = scanner.inject_ids("<h2>Getting Started</h2><h4>Fine Print</h4>");
        assert_eq!(
            html,
            "<h2 id=\"getting-started\">Getting Started</h2>\
             <h4 id=\"fine-print\">Fine Print</h4>"
        );
    }

    #[test]
    fn test_inject_ids_is_idempotent() {
        let scanner = scanner();
        let once = scanner.inject_ids("<h2>A B</h2><h3 id=\"keep\">C</h3>");
        let twice = scanner.inject_ids(&once);
        assert_eq!(once, twice);
        assert!(once.contains("id=\"keep\""));
    }

    #[test]
    fn test_inject_ignores_h1_and_h5() {
        let scanner = scanner();
        let html = scanner.inject_ids("<h1>Title</h1><h5>Tiny</h5>");
        assert_eq!(html, "<h1>Title</h1><h5>Tiny</h5>");
    }

    #[test]
    fn test_slugify_preserves_cjk() {
        let scanner = scanner();
        assert_eq!(scanner.slugify("RAG 实战: 第一章"), "rag-实战-第一章");
        assert_eq!(scanner.slugify("  --Hello,  World!--  "), "hello-world");
        assert_eq!(scanner.slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_preserving_case() {
        let scanner = scanner();
        assert_eq!(scanner.slugify_preserving_case("RAG Guide"), "RAG-Guide");
        assert_eq!(
            scanner.slugify_preserving_case("RAG 实战: 第一章"),
            "RAG-实战-第一章"
        );
    }

    #[test]
    fn test_same_text_same_id() {
        let toc = scanner().extract("<h2>Setup</h2><h2>Setup</h2>");
        assert_eq!(toc[0].id, toc[1].id);
    }
}
