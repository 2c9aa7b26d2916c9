//! The Notion export pipeline: walks a workspace from a root page, renders
//! each collected page to a frontmattered `.mdx` file under its series
//! directory, localizes remote images, and optionally writes the about-page
//! profile as JSON.
//!
//! The pipeline is strictly sequential with a fixed delay between pages, so
//! it stays comfortably inside the API's rate limits without a limiter. A
//! page that fails to export is logged and skipped; one broken page never
//! aborts the run.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use regex::{Captures, Regex};
use serde_json::{json, Value};
use url::Url;

use crate::blocks;
use crate::config::{ExportConfig, SeriesRule};
use crate::notion::{self, NotionClient, PageProperties};
use crate::toc::RegexScanner;

/// Where localized images are served from, relative to the site root. This
/// mirrors the default `images_dir` under the public directory.
const IMAGE_URL_PREFIX: &str = "/images/posts";

/// The profile text used when the root page has no usable bio paragraphs.
const DEFAULT_BIO: &str = "专注于 AI、技术和创业的探索者。";

/// The maximum length of the exported bio, in characters.
const BIO_LIMIT: usize = 500;

/// Read access to a Notion workspace. [`NotionClient`] is the real
/// implementation; tests substitute an in-memory one.
pub trait PageSource {
    fn retrieve_page(&self, id: &str) -> notion::Result<Value>;
    fn list_children(&self, id: &str) -> notion::Result<Vec<Value>>;
    fn query_database(&self, id: &str) -> notion::Result<Vec<Value>>;
}

impl PageSource for NotionClient {
    fn retrieve_page(&self, id: &str) -> notion::Result<Value> {
        NotionClient::retrieve_page(self, id)
    }

    fn list_children(&self, id: &str) -> notion::Result<Vec<Value>> {
        NotionClient::list_children(self, id)
    }

    fn query_database(&self, id: &str) -> notion::Result<Vec<Value>> {
        NotionClient::query_database(self, id)
    }
}

/// Fetches image bytes by URL. `None` means the image could not be
/// retrieved; callers keep the remote URL in that case.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Option<Vec<u8>>;
}

/// The [`ImageFetcher`] backed by a blocking HTTP client with a 30 second
/// timeout. Redirects are followed (Notion file URLs redirect to S3).
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<HttpFetcher> {
        Ok(HttpFetcher {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
        })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(err) => {
                log::warn!("fetching image {}: {}", url, err);
                return None;
            }
        };
        if !response.status().is_success() {
            log::warn!("fetching image {}: status {}", url, response.status());
            return None;
        }
        match response.bytes() {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(err) => {
                log::warn!("reading image {}: {}", url, err);
                None
            }
        }
    }
}

/// Assigns pages to series directories by title. Rules are tried in their
/// configured order and the first case-insensitive pattern match wins.
pub struct SeriesClassifier {
    rules: Vec<(String, Vec<Regex>)>,
}

impl SeriesClassifier {
    pub fn new(rules: &[SeriesRule]) -> Result<SeriesClassifier> {
        let mut sorted: Vec<&SeriesRule> = rules.iter().collect();
        sorted.sort_by_key(|rule| rule.order.unwrap_or(u32::MAX));

        let mut compiled = Vec::with_capacity(sorted.len());
        for rule in sorted {
            let mut patterns = Vec::with_capacity(rule.patterns.len());
            for pattern in &rule.patterns {
                patterns.push(Regex::new(&format!("(?i){}", pattern))?);
            }
            compiled.push((rule.name.clone(), patterns));
        }
        Ok(SeriesClassifier { rules: compiled })
    }

    /// Returns the series a title belongs to, or `None` for the root
    /// directory.
    pub fn classify(&self, title: &str) -> Option<&str> {
        for (name, patterns) in &self.rules {
            if patterns.iter().any(|pattern| pattern.is_match(title)) {
                return Some(name);
            }
        }
        None
    }
}

/// Derives a file slug from a page title: punctuation stripped (CJK
/// ideographs are kept), whitespace hyphenated, truncated to fifty
/// characters. Case is preserved, so `RAG Guide` exports as `RAG-Guide`.
/// Titles that reduce to nothing, or to the placeholder "untitled", fall
/// back to `post-` plus the first eight characters of the page id.
pub fn generate_slug(scanner: &RegexScanner, title: &str, page_id: &str) -> String {
    let base = scanner.slugify_preserving_case(title);
    let truncated: String = base.chars().take(50).collect();
    let slug = truncated.trim_matches('-');
    if slug.is_empty() || slug.eq_ignore_ascii_case("untitled") {
        let id: String = page_id.chars().filter(|c| *c != '-').take(8).collect();
        return format!("post-{}", id);
    }
    slug.to_owned()
}

/// One page discovered by traversal. `depth` is zero for pages reachable
/// directly from the root; deeper pages are exported unlisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRef {
    pub id: String,
    pub depth: usize,
}

/// The result of submitting one page to the [`ExportQueue`].
#[derive(Debug)]
pub enum ExportOutcome {
    Processed(PathBuf),
    Failed(Error),
}

/// Paces page exports: strictly sequential, with the configured fixed delay
/// before every submission after the first. Retry and backoff policy belongs
/// here, not in traversal.
pub struct ExportQueue {
    delay: Duration,
    submitted: usize,
}

impl ExportQueue {
    pub fn new(delay_ms: u64) -> ExportQueue {
        ExportQueue {
            delay: Duration::from_millis(delay_ms),
            submitted: 0,
        }
    }

    /// Runs one page export under the queue's pacing. A failed worker is an
    /// outcome, not an error: the queue keeps accepting submissions.
    pub fn submit<W>(&mut self, page: &PageRef, worker: W) -> ExportOutcome
    where
        W: FnOnce(&PageRef) -> Result<PathBuf>,
    {
        if self.submitted > 0 && !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.submitted += 1;
        match worker(page) {
            Ok(path) => ExportOutcome::Processed(path),
            Err(err) => ExportOutcome::Failed(err),
        }
    }
}

/// Per-run flags, surfaced as CLI options.
pub struct ExportOptions {
    pub recursive: bool,
    pub max_depth: usize,

    /// Export only the about profile, skipping article export entirely.
    pub about: bool,
}

/// What a run accomplished.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub processed: usize,
    pub failed: usize,
}

/// Drives an export run against a [`PageSource`] and an [`ImageFetcher`].
pub struct Exporter<'a, S, F> {
    source: &'a S,
    images: &'a F,
    config: &'a ExportConfig,
    classifier: SeriesClassifier,
    scanner: RegexScanner,
    image_link: Regex,
}

impl<'a, S: PageSource, F: ImageFetcher> Exporter<'a, S, F> {
    pub fn new(source: &'a S, images: &'a F, config: &'a ExportConfig) -> Result<Self> {
        Ok(Exporter {
            source,
            images,
            config,
            classifier: SeriesClassifier::new(&config.series)?,
            scanner: RegexScanner::new(),
            image_link: Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("image link pattern"),
        })
    }

    /// Runs the pipeline. The about profile is written at the start of every
    /// run; with `about` set the run stops there and no articles are
    /// exported.
    pub fn run(&self, options: &ExportOptions) -> Result<ExportReport> {
        self.export_about()?;
        if options.about {
            return Ok(ExportReport::default());
        }

        let max_depth = if options.recursive {
            options.max_depth
        } else {
            0
        };

        let mut visited = HashSet::new();
        let mut pages = Vec::new();
        self.collect(&self.config.root_page, 0, max_depth, &mut visited, &mut pages)?;
        log::info!("collected {} pages", pages.len());

        let mut queue = ExportQueue::new(self.config.delay_ms);
        let mut report = ExportReport::default();
        for page in &pages {
            match queue.submit(page, |page| self.export_page(page)) {
                ExportOutcome::Processed(path) => {
                    log::info!("exported {}", path.display());
                    report.processed += 1;
                }
                ExportOutcome::Failed(err) => {
                    log::warn!("skipping page {}: {}", page.id, err);
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "export finished: {} written, {} failed",
            report.processed,
            report.failed
        );
        Ok(report)
    }

    /// Scans a block's children for pages. Child pages recurse up to
    /// `max_depth`; child databases contribute their entries at the current
    /// depth. A database that cannot be queried (commonly: not shared with
    /// the integration) is logged and skipped.
    ///
    /// The visited set is caller-owned; pre-populating it excludes those ids
    /// from the run.
    pub fn collect(
        &self,
        block_id: &str,
        depth: usize,
        max_depth: usize,
        visited: &mut HashSet<String>,
        out: &mut Vec<PageRef>,
    ) -> Result<()> {
        for child in self.source.list_children(block_id)? {
            let id = match child.get("id").and_then(Value::as_str) {
                Some(id) => id.to_owned(),
                None => continue,
            };
            match child.get("type").and_then(Value::as_str) {
                Some("child_page") => {
                    if !visited.insert(id.clone()) {
                        continue;
                    }
                    out.push(PageRef {
                        id: id.clone(),
                        depth,
                    });
                    if depth < max_depth {
                        if let Err(err) =
                            self.collect(&id, depth + 1, max_depth, visited, out)
                        {
                            log::warn!("descending into page {}: {}", id, err);
                        }
                    } else {
                        log::debug!("depth limit reached at page {}", id);
                    }
                }
                Some("child_database") => match self.source.query_database(&id) {
                    Ok(rows) => {
                        for row in rows {
                            let row_id = match row.get("id").and_then(Value::as_str) {
                                Some(row_id) => row_id,
                                None => continue,
                            };
                            if !visited.insert(row_id.to_owned()) {
                                continue;
                            }
                            out.push(PageRef {
                                id: row_id.to_owned(),
                                depth,
                            });
                            // Database rows are pages too; their own children
                            // nest one level deeper.
                            if depth < max_depth {
                                if let Err(err) =
                                    self.collect(row_id, depth + 1, max_depth, visited, out)
                                {
                                    log::warn!("descending into page {}: {}", row_id, err);
                                }
                            }
                        }
                    }
                    Err(err) => log::warn!("skipping database {}: {}", id, err),
                },
                _ => {}
            }
        }
        Ok(())
    }

    /// Exports one page to `<output_dir>/<series>/<slug>.mdx` and returns the
    /// written path.
    fn export_page(&self, page: &PageRef) -> Result<PathBuf> {
        let object = self.source.retrieve_page(&page.id)?;
        let mut props = PageProperties::from_page(&object);
        let children = self.source.list_children(&page.id)?;
        let markdown = blocks::to_markdown(&children);

        if props.title == "Untitled" {
            if let Some(title) = blocks::title_from_blocks(&children)
                .or_else(|| first_heading(&markdown))
                .or_else(|| first_line(&markdown))
            {
                props.title = title;
            }
        }

        let slug = generate_slug(&self.scanner, &props.title, &page.id);
        let markdown = self.rewrite_images(&slug, &markdown);
        let cover = self.download_cover(&slug, props.cover.as_deref());

        let mut dir = self.config.output_dir.clone();
        if let Some(series) = self.classifier.classify(&props.title) {
            dir = dir.join(series);
        }
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.mdx", slug));
        let front = frontmatter(&props, cover.as_deref(), page.depth == 0);
        fs::write(&path, format!("{}\n{}\n", front, markdown))?;
        Ok(path)
    }

    /// Localizes remote images: each `![alt](http…)` link is downloaded to
    /// `<images_dir>/<slug>/image-N.<ext>` and rewritten to the site-local
    /// URL. Relative links and failed downloads are left as they are.
    fn rewrite_images(&self, slug: &str, markdown: &str) -> String {
        let mut counter = 0;
        self.image_link
            .replace_all(markdown, |caps: &Captures| {
                let (alt, url) = (&caps[1], &caps[2]);
                if !is_remote(url) {
                    return caps[0].to_owned();
                }
                counter += 1;
                let file_name = format!("image-{}.{}", counter, image_extension(url));
                match self.save_image(slug, &file_name, url) {
                    Some(()) => {
                        format!("![{}]({}/{}/{})", alt, IMAGE_URL_PREFIX, slug, file_name)
                    }
                    None => caps[0].to_owned(),
                }
            })
            .into_owned()
    }

    fn save_image(&self, slug: &str, file_name: &str, url: &str) -> Option<()> {
        let bytes = self.images.fetch(url)?;
        let dir = self.config.images_dir.join(slug);
        let write = fs::create_dir_all(&dir).and_then(|_| fs::write(dir.join(file_name), &bytes));
        if let Err(err) = write {
            log::warn!("saving image {}: {}", url, err);
            return None;
        }
        Some(())
    }

    /// Downloads the page cover, returning its site-local URL. A missing,
    /// non-HTTP, or undownloadable cover yields `None` and the post simply
    /// has no cover.
    fn download_cover(&self, slug: &str, cover: Option<&str>) -> Option<String> {
        let url = cover?;
        if !is_remote(url) {
            return None;
        }
        // Covers always land as cover.jpg, whatever the source format.
        self.save_image(slug, "cover.jpg", url)?;
        Some(format!("{}/{}/cover.jpg", IMAGE_URL_PREFIX, slug))
    }

    /// Writes the about profile from the root page: its title, the leading
    /// paragraphs as a bio, and a localized avatar.
    fn export_about(&self) -> Result<()> {
        let root = &self.config.root_page;
        let object = self.source.retrieve_page(root)?;
        let props = PageProperties::from_page(&object);
        let children = self.source.list_children(root)?;

        let bio = bio_from_blocks(&children);
        let avatar = self.download_avatar(&props);

        let profile = json!({
            "title": props.title,
            "bio": bio,
            "avatar": avatar,
            "exported_at": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(parent) = self.config.about_output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(
            &self.config.about_output,
            serde_json::to_string_pretty(&profile)?,
        )?;
        log::info!("wrote {}", self.config.about_output.display());
        Ok(())
    }

    /// The avatar comes from the root page's icon, falling back to its
    /// cover; emoji icons are not URLs and are skipped. The file lands next
    /// to the posts' image directory so the site serves it from
    /// `/images/avatar.<ext>`.
    fn download_avatar(&self, props: &PageProperties) -> Option<String> {
        let url = [props.icon.as_deref(), props.cover.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| is_remote(url))?;

        let dir = self.config.images_dir.parent()?;
        let file_name = format!("avatar.{}", image_extension(url));
        let bytes = self.images.fetch(url)?;
        let write = fs::create_dir_all(dir).and_then(|_| fs::write(dir.join(&file_name), &bytes));
        if let Err(err) = write {
            log::warn!("saving avatar {}: {}", url, err);
            return None;
        }
        Some(format!("/images/{}", file_name))
    }
}

/// Only absolute http(s) URLs are worth downloading; relative links already
/// point into the site.
fn is_remote(url: &str) -> bool {
    matches!(Url::parse(url), Ok(parsed) if matches!(parsed.scheme(), "http" | "https"))
}

/// Picks a file extension off a URL's path, ignoring the query string
/// (Notion's S3 URLs carry signing parameters). Anything implausible falls
/// back to `jpg`.
fn image_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_owned(),
    };
    match path.rsplit('/').next().and_then(|name| name.rsplit_once('.')) {
        Some((_, ext))
            if !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_owned()
        }
        _ => "jpg".to_owned(),
    }
}

/// The first markdown heading's text, if any.
fn first_heading(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// The first line with any visible text, leading markdown punctuation
/// stripped, truncated to fifty characters.
fn first_line(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .map(|line| line.trim_start_matches(['#', '*', '_', '-', '>', ' ', '\t']).trim())
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(50).collect())
}

/// Synthesizes the YAML frontmatter for an exported page. Double quotes in
/// values are escaped; exported pages are always published, and pages found
/// below the first traversal level are unlisted.
fn frontmatter(props: &PageProperties, cover: Option<&str>, listed: bool) -> String {
    let mut out = String::from("---\n");
    out.push_str(&format!("title: \"{}\"\n", escape(&props.title)));
    out.push_str(&format!("date: \"{}\"\n", props.date));
    out.push_str(&format!("description: \"{}\"\n", escape(&props.description)));
    out.push_str(&format!("category: \"{}\"\n", escape(&props.category)));
    let tags: Vec<String> = props
        .tags
        .iter()
        .map(|tag| format!("\"{}\"", escape(tag)))
        .collect();
    out.push_str(&format!("tags: [{}]\n", tags.join(", ")));
    out.push_str("published: true\n");
    if !listed {
        out.push_str("listed: false\n");
    }
    if let Some(cover) = cover {
        out.push_str(&format!("cover: \"{}\"\n", escape(cover)));
    }
    out.push_str("---\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Collects the root page's leading paragraphs into a bio. Scanning stops at
/// the first heading, child page, or child database; the result is capped at
/// [`BIO_LIMIT`] characters and falls back to [`DEFAULT_BIO`] when empty.
fn bio_from_blocks(blocks: &[Value]) -> String {
    let mut paragraphs = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("paragraph") => {
                let text = notion::rich_text_plain(
                    block
                        .get("paragraph")
                        .and_then(|body| body.get("rich_text"))
                        .unwrap_or(&Value::Null),
                );
                if !text.trim().is_empty() {
                    paragraphs.push(text);
                }
            }
            Some("heading_1" | "heading_2" | "heading_3" | "child_page" | "child_database") => {
                break
            }
            _ => {}
        }
    }

    let bio = paragraphs.join("\n\n");
    if bio.is_empty() {
        return DEFAULT_BIO.to_owned();
    }
    bio.chars().take(BIO_LIMIT).collect()
}

/// Represents the result of an export operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in the export pipeline.
#[derive(Debug)]
pub enum Error {
    /// Returned when writing exported files fails.
    Io(io::Error),

    /// Returned when a Notion API call fails.
    Notion(notion::Error),

    /// Returned when a configured series pattern is not a valid regex.
    Pattern(regex::Error),

    /// Returned when the HTTP client cannot be constructed.
    Http(reqwest::Error),

    /// Returned when serializing the about profile fails.
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Notion(err) => err.fmt(f),
            Error::Pattern(err) => err.fmt(f),
            Error::Http(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Notion(err) => Some(err),
            Error::Pattern(err) => Some(err),
            Error::Http(err) => Some(err),
            Error::Json(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts [`io::Error`]s into [`Error`]s. It allows us to use the `?`
    /// operator for filesystem operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<notion::Error> for Error {
    /// Converts [`notion::Error`]s into [`Error`]s. It allows us to use the
    /// `?` operator for API calls.
    fn from(err: notion::Error) -> Error {
        Error::Notion(err)
    }
}

impl From<regex::Error> for Error {
    /// Converts [`regex::Error`]s into [`Error`]s. It allows us to use the
    /// `?` operator when compiling series patterns.
    fn from(err: regex::Error) -> Error {
        Error::Pattern(err)
    }
}

impl From<reqwest::Error> for Error {
    /// Converts [`reqwest::Error`]s into [`Error`]s. It allows us to use the
    /// `?` operator when building HTTP clients.
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts [`serde_json::Error`]s into [`Error`]s. It allows us to use
    /// the `?` operator when writing the about profile.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}
