use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

use quill::build;
use quill::config::Config;
use quill::export::{Exporter, ExportOptions, HttpFetcher};
use quill::notion::NotionClient;
use quill::post::Repository;
use quill::search;
use quill::slugmap::SlugMap;

#[derive(Parser)]
#[command(name = "quill", version, about = "A Notion-backed static blog pipeline")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every published post and the feed into the output directory
    Build,

    /// Search published posts and print the matches as JSON
    Search {
        /// Free-text query, matched case-insensitively
        query: String,
    },

    /// Export the Notion workspace into the content directory
    Export {
        /// Descend into nested pages instead of only the root's children
        #[arg(short, long)]
        recursive: bool,

        /// Traversal depth limit in recursive mode (defaults to the
        /// configured value)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Export only the root page's profile to about.json, skipping
        /// articles
        #[arg(long)]
        about: bool,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l})} {m}{n}")))
        .build();
    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .expect("logging configuration");
    log4rs::init_config(config).expect("logging initialization");
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(err) = run(cli) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match Config::from_directory(&std::env::current_dir()?) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("{}; using defaults", err);
            Config::default()
        }
    };

    match cli.command {
        Command::Build => {
            build::build_site(&config)?;
        }
        Command::Search { query } => {
            let slug_map = SlugMap::build(&config.content_dir)?;
            let repository = Repository::new(&slug_map, &config.content_dir, config.page_size());
            let response = search::respond(&repository.all(), &query);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Export {
            recursive,
            max_depth,
            about,
        } => {
            // A missing token is not fatal here: the client reports the API's
            // own unauthorized error per page, which is more actionable.
            let token = std::env::var("NOTION_TOKEN").unwrap_or_else(|_| {
                log::warn!("NOTION_TOKEN is not set; Notion API calls will fail");
                String::new()
            });
            let client = NotionClient::new(&token)?;
            let fetcher = HttpFetcher::new()?;
            let exporter = Exporter::new(&client, &fetcher, &config.export)?;
            exporter.run(&ExportOptions {
                recursive,
                max_depth: max_depth.unwrap_or(config.export.max_depth),
                about,
            })?;
        }
    }
    Ok(())
}
