//! Converts post bodies (GitHub-flavored markdown) to HTML. Raw HTML in the
//! source passes through untouched — content is authored by the site owner,
//! so there is no sanitization pass. Fenced code blocks are intercepted from
//! the event stream and replaced with syntect-highlighted HTML using a fixed
//! dark theme; blocks without a language highlight as plain text.

use std::fmt;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

/// The fixed highlighting theme for all code blocks.
const THEME: &str = "base16-ocean.dark";

/// Renders markdown to HTML. Holds the loaded syntax and theme sets so a
/// build highlights many posts without reloading them.
pub struct Renderer {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Renderer {
    pub fn new() -> Renderer {
        let mut themes = ThemeSet::load_defaults();
        Renderer {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme: themes
                .themes
                .remove(THEME)
                // the bundled default theme set includes base16-ocean.dark
                .expect("bundled theme set is missing the fixed theme"),
        }
    }

    /// Converts one markdown body to HTML.
    pub fn to_html(&self, markdown: &str) -> Result<String> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        // Code-block contents are buffered out of the event stream and
        // re-emitted as a single pre-rendered HTML event.
        let mut events: Vec<Event> = Vec::new();
        let mut code_block: Option<(String, String)> = None;

        for ev in Parser::new_ext(markdown, options) {
            match ev {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match &kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .unwrap_or_default()
                            .to_owned(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_block = Some((language, String::new()));
                }
                Event::Text(text) => match code_block.as_mut() {
                    Some((_, buffer)) => buffer.push_str(&text),
                    None => events.push(Event::Text(text)),
                },
                Event::End(Tag::CodeBlock(_)) => {
                    if let Some((language, buffer)) = code_block.take() {
                        let highlighted = self.highlight(&language, &buffer)?;
                        events.push(Event::Html(CowStr::Boxed(
                            highlighted.into_boxed_str(),
                        )));
                    }
                }
                other => events.push(other),
            }
        }

        let mut output = String::new();
        html::push_html(&mut output, events.into_iter());
        Ok(output)
    }

    fn highlight(&self, language: &str, code: &str) -> Result<String> {
        let syntax = match language {
            "" => self.syntaxes.find_syntax_plain_text(),
            token => self
                .syntaxes
                .find_syntax_by_token(token)
                .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text()),
        };
        Ok(highlighted_html_for_string(
            code,
            &self.syntaxes,
            syntax,
            &self.theme,
        )?)
    }
}

impl Default for Renderer {
    fn default() -> Renderer {
        Renderer::new()
    }
}

/// Represents the result of a markdown-rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error converting markdown to HTML.
#[derive(Debug)]
pub enum Error {
    /// Returned when syntax highlighting fails.
    Highlight(syntect::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Highlight(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Highlight(err) => Some(err),
        }
    }
}

impl From<syntect::Error> for Error {
    /// Converts a [`syntect::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for highlighting functions.
    fn from(err: syntect::Error) -> Error {
        Error::Highlight(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_basic_gfm() -> Result<()> {
        let renderer = Renderer::new();
        let html = renderer.to_html("## Heading\n\nSome ~~struck~~ text.\n")?;
        assert!(html.contains("<h2>Heading</h2>"));
        assert!(html.contains("<del>struck</del>"));
        Ok(())
    }

    #[test]
    fn test_raw_html_passes_through() -> Result<()> {
        let renderer = Renderer::new();
        let html = renderer.to_html("before\n\n<div class=\"callout\">hi</div>\n")?;
        assert!(html.contains("<div class=\"callout\">hi</div>"));
        Ok(())
    }

    #[test]
    fn test_fenced_code_is_highlighted() -> Result<()> {
        let renderer = Renderer::new();
        let html = renderer.to_html("```rust\nfn main() {}\n```\n")?;
        // syntect emits inline-styled <pre>; the raw code must not appear as
        // an unhighlighted <pre><code> block.
        assert!(html.contains("<pre"));
        assert!(html.contains("style="));
        assert!(!html.contains("<pre><code"));
        Ok(())
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain_text() -> Result<()> {
        let renderer = Renderer::new();
        let html = renderer.to_html("```no-such-lang\nplain words\n```\n")?;
        assert!(html.contains("plain words"));
        Ok(())
    }

    #[test]
    fn test_table_renders() -> Result<()> {
        let renderer = Renderer::new();
        let html = renderer.to_html("| a | b |\n| - | - |\n| 1 | 2 |\n")?;
        assert!(html.contains("<table>"));
        Ok(())
    }
}
