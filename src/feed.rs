//! Support for creating the RSS 2.0 feed from a list of posts.

use std::fmt;

use chrono::{NaiveDate, NaiveTime, ParseError, Utc};
use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, ItemBuilder};

use crate::config::SiteMeta;
use crate::post::Post;

/// The shared-cache hint served alongside the feed body.
pub const CACHE_CONTROL: &str = "s-maxage=3600, stale-while-revalidate";

pub const CONTENT_TYPE: &str = "application/xml";

/// A rendered feed response: the XML body plus the headers the endpoint is
/// contractually obliged to send.
pub struct FeedResponse {
    pub body: String,
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

/// Renders the feed over `posts` (the published+listed listing, already
/// sorted). Each item links to `{site.url}/posts/{slug}` with a permalink
/// guid and an RFC 2822 publication date.
pub fn respond(site: &SiteMeta, posts: &[Post]) -> Result<FeedResponse> {
    let mut items = Vec::with_capacity(posts.len());
    for post in posts {
        let link = format!("{}/posts/{}", site.url, post.slug);
        items.push(
            ItemBuilder::default()
                .title(Some(post.title.clone()))
                .link(Some(link.clone()))
                .guid(Some(
                    GuidBuilder::default().value(link).permalink(true).build(),
                ))
                .description(Some(post.description.clone()))
                .pub_date(Some(pub_date(&post.date)?))
                .categories(vec![CategoryBuilder::default()
                    .name(post.category.clone())
                    .build()])
                .build(),
        );
    }

    let channel = ChannelBuilder::default()
        .title(site.name.clone())
        .link(site.url.clone())
        .description(site.description.clone())
        .language(Some(site.language.clone()))
        .last_build_date(Some(Utc::now().to_rfc2822()))
        .items(items)
        .build();

    Ok(FeedResponse {
        body: channel.to_string(),
        content_type: CONTENT_TYPE,
        cache_control: CACHE_CONTROL,
    })
}

/// Converts a post date to RFC 2822. Bare dates are taken as midnight UTC;
/// full timestamps keep their offset.
fn pub_date(date: &str) -> Result<String> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(date) {
        return Ok(ts.to_rfc2822());
    }
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
    Ok(naive.and_time(NaiveTime::MIN).and_utc().to_rfc2822())
}

/// Represents the result of a feed-rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an issue parsing a post's date.
    DateTimeParse(ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DateTimeParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DateTimeParse(err) => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: ParseError) -> Error {
        Error::DateTimeParse(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn site() -> SiteMeta {
        SiteMeta {
            name: "example blog".to_owned(),
            url: "https://example.com".to_owned(),
            description: "notes".to_owned(),
            language: "zh-CN".to_owned(),
        }
    }

    fn post(slug: &str, date: &str) -> Post {
        Post {
            slug: slug.to_owned(),
            file_path: format!("{}.mdx", slug),
            title: format!("title {}", slug),
            description: "desc".to_owned(),
            date: date.to_owned(),
            category: "rag".to_owned(),
            tags: vec![],
            series: None,
            published: true,
            listed: true,
            cover: None,
            content: String::new(),
        }
    }

    #[test]
    fn test_feed_structure() -> Result<()> {
        let response = respond(&site(), &[post("hello", "2024-03-01")])?;
        assert_eq!(response.content_type, "application/xml");
        assert_eq!(response.cache_control, CACHE_CONTROL);
        assert!(response.body.starts_with("<?xml"));
        assert!(response.body.contains("<rss"));
        assert!(response.body.contains("<language>zh-CN</language>"));
        assert!(response
            .body
            .contains("<link>https://example.com/posts/hello</link>"));
        assert!(response.body.contains("<category>rag</category>"));
        Ok(())
    }

    #[test]
    fn test_pub_date_formats() -> Result<()> {
        assert!(pub_date("2024-03-01")?.contains("Mar 2024"));
        assert!(pub_date("2024-03-01T09:30:00+08:00")?.contains("Mar 2024"));
        assert!(pub_date("not a date").is_err());
        Ok(())
    }

    #[test]
    fn test_empty_feed_is_valid() -> Result<()> {
        let response = respond(&site(), &[])?;
        assert!(response.body.contains("<title>example blog</title>"));
        Ok(())
    }
}
