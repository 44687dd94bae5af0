//! # Seed Data Generator
//!
//! Populates a storage backend with tagged notes for development.
//!
//! ## Usage
//! ```bash
//! # 200 notes into the configured backend (default)
//! cargo run -p jotter-db --bin seed
//!
//! # Custom amount, explicit backend and database file
//! cargo run -p jotter-db --bin seed -- --count 1000 --backend embedded --db ./data/jotter.db
//! ```
//!
//! ## Generated Notes
//! Each note is a short sentence built from a topic and a phrase, with one
//! to three hashtags. Tags are created through the normal tag sync, so the
//! usage counts reflect the generated relations. Every fifth note also gets
//! a revision.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use jotter_core::{Document, NoteSearch, Pagination};
use jotter_db::{Backend, BackendKind, StorageConfig};

/// Topics and the hashtags they carry.
const TOPICS: &[(&str, &[&str])] = &[
    ("Apple pie", &["recipe", "dessert"]),
    ("Sourdough starter", &["recipe", "baking"]),
    ("Quarterly planning", &["work", "planning"]),
    ("Standup notes", &["work"]),
    ("Reading list", &["books"]),
    ("Trail run", &["fitness", "outdoors"]),
    ("Garden layout", &["outdoors", "planning"]),
    ("Guitar practice", &["music"]),
];

const PHRASES: &[&str] = &[
    "first draft",
    "things to try next",
    "open questions",
    "what went well",
    "follow up on Monday",
];

fn parse_count(raw: &str) -> Result<usize, String> {
    raw.parse()
        .map_err(|_| format!("Invalid --count: {raw} (expected a whole number)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,jotter=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut backend: Option<BackendKind> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = parse_count(&args[i + 1])?;
                    i += 1;
                }
            }
            "--backend" | "-b" => {
                if i + 1 < args.len() {
                    backend = Some(BackendKind::from_str(&args[i + 1])?);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Jotter Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>        Number of notes to generate (default: 200)");
                println!("  -b, --backend <KIND>   relational | embedded | key_value");
                println!("  -d, --db <PATH>        Database file path");
                println!("      --config <PATH>    Config file (default: platform config dir)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = StorageConfig::load(config_path)?;
    if let Some(kind) = backend {
        config.backend = kind;
    }
    if let Some(path) = db_path {
        config.database_path = path;
    }
    config.validate()?;

    println!("Jotter Seed Data Generator");
    println!("==========================");
    println!("Backend:  {}", config.backend);
    println!("Database: {}", config.database_path.display());
    println!("Notes:    {}", count);
    println!();

    let backend = Backend::open(&config).await?;
    let notes = backend.note_service();

    let existing = backend
        .repositories()
        .notes
        .find_all(Pagination::first(1), Default::default(), Default::default())
        .await?
        .count;
    if existing > 0 {
        println!("Backend already has {} notes", existing);
        println!("  Skipping seed to avoid duplicates.");
        backend.close().await;
        return Ok(());
    }

    println!("Generating notes...");
    let start = std::time::Instant::now();

    for n in 0..count {
        let (topic, tags) = TOPICS[n % TOPICS.len()];
        let phrase = PHRASES[(n / TOPICS.len()) % PHRASES.len()];
        let hashtags: Vec<String> = tags.iter().map(|tag| format!("#{}", tag)).collect();
        let text = format!("{} {}: {} {}", topic, n, phrase, hashtags.join(" "));

        let note = notes.create_note().await?;
        notes
            .update_content(note.id(), Document::from_plain_text(&text))
            .await?;

        if n % 5 == 0 {
            notes.save_revision(note.id()).await?;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("Generated {} notes in {:?}", count, elapsed);

    println!();
    println!("Tag usage:");
    for tag in backend.repositories().tag_queries.find_with_usage().await? {
        println!("  #{:<12} {}", tag.name, tag.usage_count);
    }

    let recipe = backend
        .repositories()
        .tags
        .find_by_name(&jotter_core::TagName::parse("recipe")?)
        .await?;
    let mut search = NoteSearch::new(Pagination::first(5)).query("apple");
    if let Some(tag) = recipe {
        search = search.tags([tag.id]);
    }
    let page = notes.search(search).await?;
    println!();
    println!("Search 'apple' #recipe: {} matches", page.count);
    for note in &page.items {
        println!("  {}", note.text());
    }

    backend.close().await;

    println!();
    println!("Seed complete!");

    Ok(())
}
