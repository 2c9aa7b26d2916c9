//! End-to-end checks over the public API: export a small fake workspace,
//! then build and query the site from the files the export wrote.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use quill::build::build_site;
use quill::config::Config;
use quill::export::{ExportOptions, Exporter, ImageFetcher, PageSource};
use quill::notion;
use quill::post::Repository;
use quill::search;
use quill::slugmap::SlugMap;

#[derive(Default)]
struct FakeSource {
    pages: HashMap<String, Value>,
    children: HashMap<String, Vec<Value>>,
}

impl PageSource for FakeSource {
    fn retrieve_page(&self, id: &str) -> notion::Result<Value> {
        self.pages.get(id).cloned().ok_or(notion::Error::Api {
            code: "object_not_found".to_owned(),
            status: 404,
        })
    }

    fn list_children(&self, id: &str) -> notion::Result<Vec<Value>> {
        Ok(self.children.get(id).cloned().unwrap_or_default())
    }

    fn query_database(&self, _id: &str) -> notion::Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

struct FakeFetcher;

impl ImageFetcher for FakeFetcher {
    fn fetch(&self, _url: &str) -> Option<Vec<u8>> {
        Some(b"bytes".to_vec())
    }
}

fn page(id: &str, title: &str, date: &str) -> Value {
    json!({
        "id": id,
        "created_time": format!("{}T08:00:00.000Z", date),
        "properties": {
            "title": {"type": "title", "title": [{"plain_text": title}]},
            "Tags": {"type": "multi_select", "multi_select": [{"name": "llm"}]}
        }
    })
}

fn paragraph(text: &str) -> Value {
    json!({"type": "paragraph", "paragraph": {"rich_text": [{"plain_text": text}]}})
}

fn child_page(id: &str) -> Value {
    json!({"id": id, "type": "child_page", "child_page": {"title": ""}})
}

fn workspace() -> FakeSource {
    let mut source = FakeSource::default();
    source
        .pages
        .insert("root".to_owned(), page("root", "My Space", "2024-01-01"));
    source.children.insert(
        "root".to_owned(),
        vec![child_page("p1"), child_page("p2")],
    );
    source
        .pages
        .insert("p1".to_owned(), page("p1", "RAG 入门", "2024-03-02"));
    source.children.insert(
        "p1".to_owned(),
        vec![paragraph("向量数据库是基础。")],
    );
    source
        .pages
        .insert("p2".to_owned(), page("p2", "Daily Notes", "2024-03-01"));
    source
        .children
        .insert("p2".to_owned(), vec![paragraph("nothing fancy")]);
    source
}

fn project_config(dir: &Path) -> Config {
    fs::write(
        dir.join("quill.yaml"),
        "site:\n  name: pipeline test\n  url: https://blog.example\n\
         export:\n  root_page: root\n  delay_ms: 0\n",
    )
    .unwrap();
    Config::from_directory(dir).unwrap()
}

#[test]
fn exported_workspace_builds_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let config = project_config(dir.path());

    // Export the fake workspace into the content directory.
    let source = workspace();
    let fetcher = FakeFetcher;
    let exporter = Exporter::new(&source, &fetcher, &config.export).unwrap();
    let report = exporter
        .run(&ExportOptions {
            recursive: false,
            max_depth: 3,
            about: false,
        })
        .unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);

    // "RAG 入门" matches both the rag and tutorials series; rag ranks first.
    assert!(config
        .export
        .output_dir
        .join("rag/RAG-入门.mdx")
        .exists());
    assert!(config.export.output_dir.join("Daily-Notes.mdx").exists());

    // The about profile refreshes on every run.
    assert!(config.export.about_output.exists());

    // The build picks the exported files up through the slug map.
    let report = build_site(&config).unwrap();
    assert_eq!(report.rendered, 2);
    assert_eq!(report.skipped, 0);
    assert!(config
        .output_dir
        .join("posts/RAG-入门.html")
        .exists());

    let feed = fs::read_to_string(config.output_dir.join("feed.xml")).unwrap();
    assert!(feed.contains("https://blog.example/posts/Daily-Notes"));

    // Listings come out date-descending and search sees the bodies.
    let slug_map = SlugMap::build(&config.content_dir).unwrap();
    let repository = Repository::new(&slug_map, &config.content_dir, config.page_size());
    let posts = repository.all();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].slug, "RAG-入门");
    assert_eq!(posts[0].series.as_deref(), Some("rag"));
    assert_eq!(posts[1].slug, "Daily-Notes");

    let hits = search::respond(&posts, "向量数据库").results;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].slug, "RAG-入门");

    // Re-exporting over the same tree is idempotent: same files, same site.
    let exporter = Exporter::new(&source, &fetcher, &config.export).unwrap();
    exporter
        .run(&ExportOptions {
            recursive: false,
            max_depth: 3,
            about: false,
        })
        .unwrap();
    let slug_map = SlugMap::build(&config.content_dir).unwrap();
    assert_eq!(slug_map.len(), 2);
}
