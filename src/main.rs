use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use discourse_publisher::config::{Config, LogFormat};
use discourse_publisher::note::{publish_note, NoteDraft};
use discourse_publisher::{Attachment, DiscourseClient, TracingNotifier, VaultDir};

/// Publish notes to a Discourse forum.
#[derive(Debug, Parser)]
#[command(name = "discourse-publisher", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the configured forum URL and API key work
    CheckKey,
    /// List categories, subcategories flattened as "Parent > Child"
    Categories,
    /// List tags, most used first
    Tags,
    /// Show the tags and category of a topic
    Topic { topic_id: u64 },
    /// Upload an image and print its URLs
    Upload { path: PathBuf },
    /// Publish a note, creating a topic or updating the one it was published as
    Publish {
        /// Markdown note to publish
        path: PathBuf,
        /// Topic title (defaults to the frontmatter title, then the file name)
        #[arg(long)]
        title: Option<String>,
        /// Category id (defaults to `discourse_category` in the frontmatter)
        #[arg(long)]
        category: Option<u64>,
        /// Tag to apply; repeat for several (defaults to `discourse_tags`)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Directory embedded images are resolved against (defaults to the note's folder)
        #[arg(long)]
        vault: Option<PathBuf>,
        /// Print the publish result without writing the ids back into the note
        #[arg(long)]
        no_write: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(config.log_format)?;

    let notifier = Arc::new(TracingNotifier);
    let client = DiscourseClient::new(&config, notifier.clone());

    match cli.command {
        Command::CheckKey => {
            client.test_api_key().await?;
            println!("API key accepted by {}", client.base_url());
        }
        Command::Categories => {
            for category in client.fetch_categories().await {
                println!("{}\t{}", category.id, category.name);
            }
        }
        Command::Tags => {
            let tags = client.fetch_tags().await;
            if let Some(first) = tags.first() {
                info!(can_create = first.can_create, "Tag creation capability");
            }
            for tag in tags {
                println!("{}", tag.name);
            }
        }
        Command::Topic { topic_id } => {
            let topic = client
                .fetch_topic_info(topic_id)
                .await
                .with_context(|| format!("Failed to fetch topic {topic_id}"))?;
            println!(
                "category: {}",
                topic
                    .category_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string())
            );
            println!("tags: {}", topic.tags.join(", "));
        }
        Command::Upload { path } => {
            let attachment = Attachment::from_path(&path).await?;
            let image = client
                .upload_image(&attachment)
                .await
                .context("Upload failed")?;
            println!("{}", image.short_url);
            if let Some(full_url) = image.full_url {
                println!("{full_url}");
            }
        }
        Command::Publish {
            path,
            title,
            category,
            tags,
            vault,
            no_write,
        } => {
            publish(
                &client,
                notifier.as_ref(),
                &path,
                PublishOverrides {
                    title,
                    category,
                    tags,
                    vault,
                    no_write,
                },
            )
            .await?;
        }
    }

    Ok(())
}

struct PublishOverrides {
    title: Option<String>,
    category: Option<u64>,
    tags: Vec<String>,
    vault: Option<PathBuf>,
    no_write: bool,
}

async fn publish(
    client: &DiscourseClient,
    notifier: &TracingNotifier,
    path: &Path,
    overrides: PublishOverrides,
) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read note: {}", path.display()))?;

    let default_title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    let mut draft = NoteDraft::from_text(text, default_title);
    if let Some(title) = overrides.title {
        draft.title = title;
    }
    if overrides.category.is_some() {
        draft.category = overrides.category;
    }
    if !overrides.tags.is_empty() {
        draft.tags = overrides.tags;
    }

    let vault_root = overrides.vault.unwrap_or_else(|| {
        path.parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    });
    let vault = VaultDir::new(vault_root);

    let published = publish_note(client, &vault, notifier, &draft).await?;

    if !overrides.no_write {
        tokio::fs::write(path, &published.text)
            .await
            .with_context(|| format!("Failed to write note: {}", path.display()))?;
    }

    let verb = if published.created { "Created" } else { "Updated" };
    println!(
        "{verb} post {} in topic {}",
        published.post.post_id, published.post.topic_id
    );

    Ok(())
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,discourse_publisher=debug"));

    match format {
        LogFormat::Json => {
            // Structured JSON logging for scripted use
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
        }
    }

    Ok(())
}
