//! Publishing a note as a forum topic.
//!
//! A note is Markdown with optional frontmatter. Publishing uploads the local
//! images it embeds, points the embeds at the uploads, and either creates a
//! new topic or updates the one recorded in the frontmatter.

pub mod embeds;
pub mod frontmatter;

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::attachment::AttachmentSource;
use crate::discourse::{DiscourseClient, PostRef, PublishError};
use crate::notify::Notifier;

pub use embeds::{find_image_embeds, rewrite_embeds, ImageEmbed};
pub use frontmatter::{with_post_ref, Frontmatter};

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("no category chosen for this note")]
    MissingCategory,
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// What to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    /// Full note text, frontmatter included.
    pub text: String,
    pub category: Option<u64>,
    pub tags: Vec<String>,
}

impl NoteDraft {
    /// Draft from a note's own frontmatter.
    ///
    /// The title falls back to `default_title` (usually the file name).
    #[must_use]
    pub fn from_text(text: impl Into<String>, default_title: &str) -> Self {
        let text = text.into();
        let (fm, _) = Frontmatter::parse(&text);
        Self {
            title: fm.title().unwrap_or(default_title).to_string(),
            category: fm.category(),
            tags: fm.tags(),
            text,
        }
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedNote {
    pub post: PostRef,
    /// `true` when a new topic was created, `false` for an update.
    pub created: bool,
    /// The note text with the post ids recorded in its frontmatter.
    pub text: String,
}

/// Publish a note, creating a topic or updating the recorded one.
///
/// # Errors
///
/// Returns an error if no category is set or the forum rejects the post.
/// Images that cannot be loaded or uploaded are reported to the user and
/// left as they were.
pub async fn publish_note(
    client: &DiscourseClient,
    source: &dyn AttachmentSource,
    notifier: &dyn Notifier,
    draft: &NoteDraft,
) -> Result<PublishedNote, NoteError> {
    let category = draft.category.ok_or(NoteError::MissingCategory)?;
    let (fm, body) = Frontmatter::parse(&draft.text);
    let content = upload_embedded_images(client, source, notifier, body).await;

    let (post, created) = match fm.post_ref() {
        Some(post) => {
            debug!(
                post_id = post.post_id,
                topic_id = post.topic_id,
                "Note already published, updating"
            );
            client
                .update_post(post, &draft.title, &content, category, &draft.tags)
                .await?;
            (post, false)
        }
        None => {
            let post = client
                .create_post(&draft.title, &content, category, &draft.tags)
                .await?;
            (post, true)
        }
    };

    info!(post_id = post.post_id, topic_id = post.topic_id, created, "Published note");

    Ok(PublishedNote {
        post,
        created,
        text: with_post_ref(&draft.text, post),
    })
}

/// Upload each distinct local image once and rewrite its embeds.
async fn upload_embedded_images(
    client: &DiscourseClient,
    source: &dyn AttachmentSource,
    notifier: &dyn Notifier,
    body: &str,
) -> String {
    let embeds = find_image_embeds(body);
    let mut uploaded: HashMap<String, Option<(String, String)>> = HashMap::new();

    for embed in &embeds {
        if uploaded.contains_key(&embed.target) {
            continue;
        }

        let result = match source.load(&embed.target).await {
            Ok(attachment) => client
                .upload_image(&attachment)
                .await
                .map(|image| (attachment.name, image.short_url)),
            Err(e) => {
                warn!(reference = %embed.target, error = %e, "Embedded image not loaded");
                notifier.notify(&format!("Could not read image {}: {e}", embed.target));
                None
            }
        };
        uploaded.insert(embed.target.clone(), result);
    }

    rewrite_embeds(body, &embeds, |embed| {
        let (name, short_url) = uploaded.get(&embed.target)?.as_ref()?;
        let alt = embed.alt.as_deref().unwrap_or(name);
        Some(format!("![{alt}]({short_url})"))
    })
}
