//! A thin blocking HTTP client for the slice of the Notion API the export
//! pipeline needs, plus property extraction over the raw JSON responses.
//!
//! The export pipeline is strictly sequential, so the client is blocking by
//! design; there is no retry or backoff — callers decide what a failed call
//! means (usually: log, skip the page, keep going).

use reqwest::blocking::Client;
use reqwest::header;
use serde_json::Value;
use thiserror::Error;

const NOTION_VERSION: &str = "2022-06-28";
const API_BASE_URL: &str = "https://api.notion.com/v1";

/// A thin wrapper around a blocking reqwest [`Client`] carrying the Notion
/// auth headers.
pub struct NotionClient {
    client: Client,
    base_url: String,
}

impl NotionClient {
    /// Creates a client from an API token. An empty token still builds a
    /// client; every call will then fail with an API error, which the
    /// pipeline catches per page.
    pub fn new(token: &str) -> Result<NotionClient> {
        Self::with_base_url(token, API_BASE_URL)
    }

    /// Like [`NotionClient::new`] with an overridable endpoint, for tests.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<NotionClient> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::InvalidToken(e.to_string()))?,
        );
        headers.insert(
            "Notion-Version",
            header::HeaderValue::from_static(NOTION_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        Ok(NotionClient {
            client: Client::builder().default_headers(headers).build()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn get(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        log::debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        Self::parse_response(response)
    }

    fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        log::debug!("POST {}", url);
        let response = self.client.post(url).json(body).send()?;
        Self::parse_response(response)
    }

    fn parse_response(response: reqwest::blocking::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            // Notion error bodies carry a `code` string; keep it for the log.
            let code = response
                .json::<Value>()
                .ok()
                .and_then(|body| {
                    body.get("code")
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                })
                .unwrap_or_else(|| format!("http_{}", status.as_u16()));
            return Err(Error::Api {
                code,
                status: status.as_u16(),
            });
        }
        Ok(response.json()?)
    }

    /// Retrieves a page object (metadata and properties, not content).
    pub fn retrieve_page(&self, id: &str) -> Result<Value> {
        self.get(&format!("pages/{}", id))
    }

    /// Lists a block's children. A single call with the maximum page size,
    /// matching the exporter this replaces; workspaces with more than 100
    /// children under one block are out of its design envelope.
    pub fn list_children(&self, id: &str) -> Result<Vec<Value>> {
        let body = self.get(&format!("blocks/{}/children?page_size=100", id))?;
        Ok(results(body))
    }

    /// Queries a database for its entries. Only the first page of results is
    /// fetched — a known gap carried over from the original exporter; a
    /// cursor loop can be added here without touching traversal.
    pub fn query_database(&self, id: &str) -> Result<Vec<Value>> {
        let body = self.post(&format!("databases/{}/query", id), &serde_json::json!({}))?;
        Ok(results(body))
    }
}

fn results(body: Value) -> Vec<Value> {
    match body.get("results") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Concatenates the `plain_text` runs of a rich-text array.
pub fn rich_text_plain(value: &Value) -> String {
    match value.as_array() {
        Some(runs) => runs
            .iter()
            .filter_map(|run| run.get("plain_text").and_then(Value::as_str))
            .collect(),
        None => String::new(),
    }
}

/// Structured properties extracted from a page object.
#[derive(Clone, Debug, Default)]
pub struct PageProperties {
    pub title: String,
    pub date: String,
    pub tags: Vec<String>,
    pub category: String,
    pub description: String,
    pub cover: Option<String>,
    pub icon: Option<String>,
}

impl PageProperties {
    /// Extracts properties from a raw page object.
    ///
    /// Fallback chains mirror the content model this workspace uses:
    /// * title: `title` property, then `Name`; "Untitled" if neither yields
    ///   text (callers fall further back to block content).
    /// * date: `created_time` date part, overridden by an explicit `Date`
    ///   property; a `Created` created-time property ranks below both.
    /// * cover/icon: external or hosted file URLs; icons may also be emoji.
    pub fn from_page(page: &Value) -> PageProperties {
        let mut props = PageProperties {
            title: "Untitled".to_owned(),
            category: "uncategorized".to_owned(),
            ..PageProperties::default()
        };

        if let Some(created) = page.get("created_time").and_then(Value::as_str) {
            props.date = created.split('T').next().unwrap_or_default().to_owned();
        }

        let properties = page.get("properties").cloned().unwrap_or(Value::Null);

        for key in ["title", "Name"] {
            if let Some(text) = typed_property(&properties, key, "title")
                .map(rich_text_plain)
                .filter(|t| !t.is_empty())
            {
                props.title = text;
            }
        }

        if let Some(start) = typed_property(&properties, "Date", "date")
            .and_then(|date| date.get("start"))
            .and_then(Value::as_str)
        {
            props.date = start.to_owned();
        } else if props.date.is_empty() {
            if let Some(created) = typed_property(&properties, "Created", "created_time")
                .and_then(Value::as_str)
            {
                props.date = created.split('T').next().unwrap_or_default().to_owned();
            }
        }

        if let Some(tags) = typed_property(&properties, "Tags", "multi_select")
            .and_then(Value::as_array)
        {
            props.tags = tags
                .iter()
                .filter_map(|tag| tag.get("name").and_then(Value::as_str))
                .map(str::to_owned)
                .collect();
        }

        if let Some(category) = typed_property(&properties, "Category", "select")
            .and_then(|select| select.get("name"))
            .and_then(Value::as_str)
        {
            props.category = category.to_owned();
        }

        if let Some(description) =
            typed_property(&properties, "Description", "rich_text").map(rich_text_plain)
        {
            props.description = description;
        }

        props.cover = file_url(page.get("cover"));
        props.icon = file_url(page.get("icon")).or_else(|| {
            page.get("icon")
                .and_then(|icon| icon.get("emoji"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        });

        props
    }
}

/// Looks up `properties[name][type]`, but only when the property's declared
/// type matches — a `Date` property that is actually a checkbox is ignored.
fn typed_property<'a>(properties: &'a Value, name: &str, kind: &str) -> Option<&'a Value> {
    let property = properties.get(name)?;
    if property.get("type").and_then(Value::as_str) != Some(kind) {
        return None;
    }
    property.get(kind)
}

/// Resolves a cover/icon object to a URL: `external.url` or `file.url`.
fn file_url(value: Option<&Value>) -> Option<String> {
    let value = value?;
    let url = match value.get("type").and_then(Value::as_str)? {
        "external" => value.get("external")?.get("url")?,
        "file" => value.get("file")?.get("url")?,
        _ => return None,
    };
    url.as_str().map(str::to_owned)
}

/// Represents the result of a Notion API call.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error talking to the Notion API.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid API token: {0}")]
    InvalidToken(String),

    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Notion API error ({code}, status {status})")]
    Api { code: String, status: u16 },
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn page_fixture() -> Value {
        json!({
            "id": "abc",
            "created_time": "2024-01-15T10:00:00.000Z",
            "properties": {
                "title": {
                    "type": "title",
                    "title": [{"plain_text": "RAG "}, {"plain_text": "实战"}]
                },
                "Date": {
                    "type": "date",
                    "date": {"start": "2024-02-01"}
                },
                "Tags": {
                    "type": "multi_select",
                    "multi_select": [{"name": "rag"}, {"name": "llm"}]
                },
                "Category": {
                    "type": "select",
                    "select": {"name": "ai"}
                },
                "Description": {
                    "type": "rich_text",
                    "rich_text": [{"plain_text": "notes"}]
                }
            },
            "cover": {"type": "external", "external": {"url": "https://img.example/c.png"}},
            "icon": {"type": "emoji", "emoji": "✍️"}
        })
    }

    #[test]
    fn test_from_page_full() {
        let props = PageProperties::from_page(&page_fixture());
        assert_eq!(props.title, "RAG 实战");
        // The explicit Date property overrides created_time.
        assert_eq!(props.date, "2024-02-01");
        assert_eq!(props.tags, vec!["rag", "llm"]);
        assert_eq!(props.category, "ai");
        assert_eq!(props.description, "notes");
        assert_eq!(props.cover.as_deref(), Some("https://img.example/c.png"));
        assert_eq!(props.icon.as_deref(), Some("✍️"));
    }

    #[test]
    fn test_from_page_defaults() {
        let props = PageProperties::from_page(&json!({
            "id": "abc",
            "created_time": "2024-01-15T10:00:00.000Z",
            "properties": {}
        }));
        assert_eq!(props.title, "Untitled");
        assert_eq!(props.date, "2024-01-15");
        assert_eq!(props.category, "uncategorized");
        assert!(props.tags.is_empty());
        assert_eq!(props.cover, None);
    }

    #[test]
    fn test_name_property_wins_over_title() {
        let props = PageProperties::from_page(&json!({
            "properties": {
                "title": {"type": "title", "title": [{"plain_text": "from title"}]},
                "Name": {"type": "title", "title": [{"plain_text": "from Name"}]}
            }
        }));
        assert_eq!(props.title, "from Name");
    }

    #[test]
    fn test_mistyped_property_is_ignored() {
        let props = PageProperties::from_page(&json!({
            "properties": {
                "Date": {"type": "checkbox", "checkbox": true}
            }
        }));
        assert_eq!(props.date, "");
    }

    #[test]
    fn test_rich_text_plain() {
        assert_eq!(
            rich_text_plain(&json!([{"plain_text": "a"}, {"plain_text": "b"}])),
            "ab"
        );
        assert_eq!(rich_text_plain(&Value::Null), "");
    }
}
