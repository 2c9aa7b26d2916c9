//! Site and export configuration, loaded from a `quill.yaml` project file.
//! Every field has a default so a bare file (or no file at all) still yields
//! a working configuration.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Clone)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

/// Site-wide metadata, surfaced in the feed channel.
#[derive(Deserialize, Clone)]
pub struct SiteMeta {
    #[serde(default = "SiteMeta::default_name")]
    pub name: String,

    #[serde(default = "SiteMeta::default_url")]
    pub url: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "SiteMeta::default_language")]
    pub language: String,
}

impl SiteMeta {
    fn default_name() -> String {
        "quill".to_owned()
    }

    fn default_url() -> String {
        "https://example.com".to_owned()
    }

    fn default_language() -> String {
        "zh-CN".to_owned()
    }
}

impl Default for SiteMeta {
    fn default() -> Self {
        SiteMeta {
            name: Self::default_name(),
            url: Self::default_url(),
            description: String::new(),
            language: Self::default_language(),
        }
    }
}

/// One topical series: pages whose titles match any of `patterns` are
/// exported into the `name` subdirectory. Rules are tested in order and the
/// first match wins.
#[derive(Deserialize, Clone)]
pub struct SeriesRule {
    pub name: String,
    pub patterns: Vec<String>,

    /// Optional display order for navigation; unused by the pipeline itself.
    #[serde(default)]
    pub order: Option<u32>,
}

/// Settings for the Notion export pipeline.
#[derive(Deserialize, Clone)]
pub struct ExportConfig {
    /// The Notion page id at the root of the traversal.
    #[serde(default)]
    pub root_page: String,

    #[serde(default = "ExportConfig::default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "ExportConfig::default_images_dir")]
    pub images_dir: PathBuf,

    #[serde(default = "ExportConfig::default_about_output")]
    pub about_output: PathBuf,

    /// Maximum traversal depth in recursive mode.
    #[serde(default = "ExportConfig::default_max_depth")]
    pub max_depth: usize,

    /// Fixed delay between successive page exports, in milliseconds.
    #[serde(default = "ExportConfig::default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "ExportConfig::default_series")]
    pub series: Vec<SeriesRule>,
}

impl ExportConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from("content/posts")
    }

    fn default_images_dir() -> PathBuf {
        PathBuf::from("public/images/posts")
    }

    fn default_about_output() -> PathBuf {
        PathBuf::from("content/about.json")
    }

    fn default_max_depth() -> usize {
        3
    }

    fn default_delay_ms() -> u64 {
        500
    }

    /// The built-in series table. A `quill.yaml` with a `series` key replaces
    /// the whole table rather than merging into it.
    fn default_series() -> Vec<SeriesRule> {
        fn rule(name: &str, patterns: &[&str], order: u32) -> SeriesRule {
            SeriesRule {
                name: name.to_owned(),
                patterns: patterns.iter().map(|p| (*p).to_owned()).collect(),
                order: Some(order),
            }
        }

        vec![
            rule("rag", &["RAG", "向量数据库"], 1),
            rule("workflow", &["工作流编排", r"Part\d+[:：]"], 2),
            rule("ai-agents", &["AI Agent", "AI代理"], 3),
            rule(
                "ai-platforms",
                &["Dify", "FastGPT", "Flowise", "n8n", "Autogen"],
                4,
            ),
            rule(
                "vector-db",
                &["Qdrant", "Milvus", "Pinecone", "Weaviate", "Chroma"],
                5,
            ),
            rule(
                "tutorials",
                &["第一章", "第二章", "第三章", "教程", "入门", "实战"],
                6,
            ),
        ]
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            root_page: String::new(),
            output_dir: Self::default_output_dir(),
            images_dir: Self::default_images_dir(),
            about_output: Self::default_about_output(),
            max_depth: Self::default_max_depth(),
            delay_ms: Self::default_delay_ms(),
            series: Self::default_series(),
        }
    }
}

/// The project configuration: site metadata, content locations, and export
/// settings.
#[derive(Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub site: SiteMeta,

    #[serde(default = "Config::default_content_dir")]
    pub content_dir: PathBuf,

    #[serde(default = "Config::default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    page_size: PageSize,

    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    const PROJECT_FILE: &'static str = "quill.yaml";

    fn default_content_dir() -> PathBuf {
        PathBuf::from("content/posts")
    }

    fn default_output_dir() -> PathBuf {
        PathBuf::from("public")
    }

    /// The number of posts per index page.
    pub fn page_size(&self) -> usize {
        self.page_size.0
    }

    /// Searches `dir` and its parent directories for a `quill.yaml` project
    /// file. Paths in the file are resolved relative to the directory that
    /// contains it.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(Self::PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path)
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    Self::PROJECT_FILE
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow!("Opening project file `{}`: {}", path.display(), e))?;
        let mut config: Config = serde_yaml::from_reader(file)
            .map_err(|e| anyhow!("Loading configuration: {}", e))?;
        if let Some(project_root) = path.parent() {
            config.rebase(project_root);
        }
        Ok(config)
    }

    fn rebase(&mut self, root: &Path) {
        for path in [
            &mut self.content_dir,
            &mut self.output_dir,
            &mut self.export.output_dir,
            &mut self.export.images_dir,
            &mut self.export.about_output,
        ] {
            if path.is_relative() {
                *path = root.join(path.as_path());
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            site: SiteMeta::default(),
            content_dir: Self::default_content_dir(),
            output_dir: Self::default_output_dir(),
            page_size: PageSize::default(),
            export: ExportConfig::default(),
        }
    }
}
