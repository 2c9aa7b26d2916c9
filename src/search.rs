//! The search endpoint's logic: free-text matching over the published,
//! listed posts, returning simplified summaries in the `{"results": [...]}`
//! shape the front end consumes.

use serde::Serialize;

use crate::post::Post;

/// A simplified post summary — only the fields a result listing needs.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SearchHit {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub date: String,
}

impl From<&Post> for SearchHit {
    fn from(post: &Post) -> SearchHit {
        SearchHit {
            slug: post.slug.clone(),
            title: post.title.clone(),
            description: post.description.clone(),
            category: post.category.clone(),
            tags: post.tags.clone(),
            date: post.date.clone(),
        }
    }
}

/// The full response body for the search endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Produces the search response for `query` over `posts` (which must already
/// be the published+listed listing). An empty or whitespace-only query
/// returns an empty result list without invoking the matcher at all.
pub fn respond(posts: &[Post], query: &str) -> SearchResponse {
    let query = query.trim();
    if query.is_empty() {
        return SearchResponse {
            results: Vec::new(),
        };
    }

    SearchResponse {
        results: posts
            .iter()
            .filter(|post| matches(post, query))
            .map(SearchHit::from)
            .collect(),
    }
}

/// Case-insensitive substring match over title, description, category,
/// tags, and body.
fn matches(post: &Post, query: &str) -> bool {
    let needle = query.to_lowercase();
    let haystacks = [
        &post.title,
        &post.description,
        &post.category,
        &post.content,
    ];
    haystacks
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
        || post
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::Post;

    fn post(slug: &str, title: &str, tags: &[&str], body: &str) -> Post {
        Post {
            slug: slug.to_owned(),
            file_path: format!("{}.mdx", slug),
            title: title.to_owned(),
            description: String::new(),
            date: "2024-01-01".to_owned(),
            category: "uncategorized".to_owned(),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            series: None,
            published: true,
            listed: true,
            cover: None,
            content: body.to_owned(),
        }
    }

    #[test]
    fn test_empty_query_short_circuits() {
        let posts = vec![post("a", "Anything", &[], "body")];
        assert_eq!(respond(&posts, "").results, vec![]);
        assert_eq!(respond(&posts, "   ").results, vec![]);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let posts = vec![post("a", "Qdrant notes", &[], "vectors")];
        assert_eq!(respond(&posts, "zzzz").results, vec![]);
    }

    #[test]
    fn test_matches_title_case_insensitive() {
        let posts = vec![
            post("a", "Intro to RAG", &[], ""),
            post("b", "Workflow", &[], ""),
        ];
        let response = respond(&posts, "rag");
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].slug, "a");
    }

    #[test]
    fn test_matches_tags_and_body() {
        let posts = vec![
            post("a", "First", &["milvus"], ""),
            post("b", "Second", &[], "deep dive into Milvus internals"),
        ];
        assert_eq!(respond(&posts, "Milvus").results.len(), 2);
    }

    #[test]
    fn test_response_serializes_to_results_shape() {
        let response = respond(&[], "anything");
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"results":[]}"#);
    }
}
