//! Discourse forum API client.
//!
//! Each method is one request/response round trip against the forum, except
//! [`DiscourseClient::update_post`], which edits the post body and then the
//! topic metadata, and [`DiscourseClient::fetch_tags`], which also probes the
//! tag creation capability.
//!
//! Failures reach the caller through two channels. Publishing and the API key
//! check return a `Result`. Uploads and the metadata lists used to fill in a
//! publishing form report through the [`Notifier`] and return an empty value.
//! The capability probe is silent.

mod error;
mod models;
mod multipart;

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::attachment::Attachment;
use crate::config::Config;
use crate::constants::{API_KEY_HEADER, USER_AGENT};
use crate::notify::Notifier;

pub use error::{ApiKeyError, FetchError, PublishError};
pub use models::{Category, PostRef, Tag, TopicInfo, UploadedImage};

use error::{publish_error_from_body, transport_message};
use models::{
    CategoriesResponse, CategoryEntry, CreatePostRequest, CreatePostResponse, SiteResponse,
    TagEntry, TagsResponse, TopicResponse, TopicTag, UpdatePostRequest, UpdateTopicRequest,
    UploadResponse,
};

/// Client for the forum endpoints the publisher needs.
#[derive(Clone)]
pub struct DiscourseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    edit_reason: String,
    notifier: Arc<dyn Notifier>,
}

impl DiscourseClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: config.base_url.trim().to_string(),
            api_key: config.user_api_key.trim().to_string(),
            edit_reason: config.edit_reason.clone(),
            notifier,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload an image for use in a post.
    ///
    /// Returns `None` after notifying the user if the upload fails.
    pub async fn upload_image(&self, attachment: &Attachment) -> Option<UploadedImage> {
        let body = multipart::upload_body(attachment);
        let content_type = body.content_type();

        let response = match self
            .request(Method::POST, "/uploads.json")
            .header(CONTENT_TYPE, content_type)
            .body(body.bytes)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let message = transport_message(&e);
                warn!(file = %attachment.file_name(), error = %message, "Image upload failed");
                self.notifier.notify(&format!("Image upload failed: {message}"));
                return None;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            warn!(file = %attachment.file_name(), status = %status, "Image upload rejected");
            self.notifier.notify(&format!("Image upload failed ({})", status.as_u16()));
            return None;
        }

        match response.json::<UploadResponse>().await {
            Ok(upload) => {
                let full_url = upload
                    .url
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .map(|u| resolve_full_url(&self.base_url, u));
                info!(
                    file = %attachment.file_name(),
                    short_url = %upload.short_url,
                    "Uploaded image"
                );
                Some(UploadedImage {
                    short_url: upload.short_url,
                    full_url,
                })
            }
            Err(e) => {
                warn!(file = %attachment.file_name(), error = %e, "Unexpected upload response");
                self.notifier.notify(&format!("Image upload failed: {e}"));
                None
            }
        }
    }

    /// Create a new topic with `content` as its first post.
    ///
    /// # Errors
    ///
    /// Returns the forum's own message when it rejects the post, or a generic
    /// message carrying the status code or transport error otherwise.
    pub async fn create_post(
        &self,
        title: &str,
        content: &str,
        category: u64,
        tags: &[String],
    ) -> Result<PostRef, PublishError> {
        let request = CreatePostRequest {
            title,
            raw: content,
            category,
            tags,
        };

        let body = self
            .send_publish(self.request(Method::POST, "/posts.json").json(&request))
            .await?;

        let created: CreatePostResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Post created response has no numeric id");
            PublishError::MissingPostId
        })?;

        info!(post_id = created.id, topic_id = created.topic_id, "Created post");

        Ok(PostRef {
            post_id: created.id,
            topic_id: created.topic_id,
        })
    }

    /// Replace the body of an existing post, then its topic's title, category
    /// and tags.
    ///
    /// The topic is only touched once the post body update has succeeded.
    ///
    /// # Errors
    ///
    /// Returns the error of whichever request failed.
    pub async fn update_post(
        &self,
        post: PostRef,
        title: &str,
        content: &str,
        category: u64,
        tags: &[String],
    ) -> Result<(), PublishError> {
        let post_update = UpdatePostRequest {
            raw: content,
            edit_reason: &self.edit_reason,
        };
        self.send_publish(
            self.request(Method::PUT, &format!("/posts/{}", post.post_id))
                .json(&post_update),
        )
        .await?;

        let topic_update = UpdateTopicRequest {
            title,
            category_id: category,
            tags,
        };
        self.send_publish(
            self.request(Method::PUT, &format!("/t/{}", post.topic_id))
                .json(&topic_update),
        )
        .await?;

        info!(post_id = post.post_id, topic_id = post.topic_id, "Updated post");

        Ok(())
    }

    /// All categories, each followed by its subcategories.
    ///
    /// Returns an empty list after notifying the user if the request fails.
    pub async fn fetch_categories(&self) -> Vec<Category> {
        match self
            .get_json::<CategoriesResponse>("/categories.json?include_subcategories=true")
            .await
        {
            Ok(response) => flatten_categories(response.category_list.categories),
            Err(e) => {
                self.notify_fetch_failure("categories", &e);
                Vec::new()
            }
        }
    }

    /// All tags, most used first.
    ///
    /// Returns an empty list after notifying the user if the request fails.
    pub async fn fetch_tags(&self) -> Vec<Tag> {
        let response = match self.get_json::<TagsResponse>("/tags.json").await {
            Ok(response) => response,
            Err(e) => {
                self.notify_fetch_failure("tags", &e);
                return Vec::new();
            }
        };

        let can_create = self.check_can_create_tags().await;

        merge_tags(response)
            .into_iter()
            .map(|entry| Tag {
                name: entry.name,
                can_create,
            })
            .collect()
    }

    /// Whether the current user may create new tags.
    ///
    /// Any failure counts as `false` and is not reported.
    pub async fn check_can_create_tags(&self) -> bool {
        match self.get_json::<SiteResponse>("/site.json").await {
            Ok(site) => site.can_create_tag.unwrap_or(false),
            Err(e) => {
                debug!(error = %e, "Tag creation capability unknown");
                false
            }
        }
    }

    /// Check that the configured URL and key are accepted by the forum.
    ///
    /// # Errors
    ///
    /// Returns [`ApiKeyError::MissingSettings`] without contacting the forum
    /// when either setting is empty.
    pub async fn test_api_key(&self) -> Result<(), ApiKeyError> {
        if self.base_url.is_empty() || self.api_key.is_empty() {
            return Err(ApiKeyError::MissingSettings);
        }

        let response = self
            .request(Method::GET, "/site.json")
            .send()
            .await
            .map_err(|e| ApiKeyError::Transport(transport_message(&e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = %status, "API key rejected");
            return Err(ApiKeyError::Rejected(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiKeyError::Transport(transport_message(&e)))?;

        match is_truthy_body(&body) {
            Ok(true) => {
                info!("API key accepted");
                Ok(())
            }
            Ok(false) => Err(ApiKeyError::Invalid),
            Err(e) => {
                warn!(error = %e, "Site response is not JSON");
                Err(ApiKeyError::Transport(e.to_string()))
            }
        }
    }

    /// Tags and category of an existing topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a topic.
    pub async fn fetch_topic_info(&self, topic_id: u64) -> Result<TopicInfo, FetchError> {
        let topic: TopicResponse = self.get_json(&format!("/t/{topic_id}.json")).await?;

        Ok(TopicInfo {
            tags: topic
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(TopicTag::into_name)
                .collect(),
            category_id: topic.category_id,
        })
    }

    /// Tags of an existing topic.
    ///
    /// Returns an empty list after notifying the user if the request fails.
    pub async fn fetch_topic_tags(&self, topic_id: u64) -> Vec<String> {
        match self.fetch_topic_info(topic_id).await {
            Ok(info) => info.tags,
            Err(e) => {
                self.notify_fetch_failure("topic tags", &e);
                Vec::new()
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.endpoint(path);
        debug!(method = %method, url = %url, "Forum API request");
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Send a publishing request and return the body of a 200 response.
    async fn send_publish(&self, request: RequestBuilder) -> Result<String, PublishError> {
        let response = request.send().await.map_err(|e| {
            let message = transport_message(&e);
            warn!(error = %message, "Publish request failed");
            PublishError::Transport(message)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(transport_message(&e)))?;

        if status != StatusCode::OK {
            let err = publish_error_from_body(status, &body);
            warn!(status = %status, error = %err, "Publish request rejected");
            return Err(err);
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| FetchError::Transport(transport_message(&e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn notify_fetch_failure(&self, what: &str, error: &FetchError) {
        warn!(error = %error, "Failed to fetch {what}");
        let message = match error {
            FetchError::Status(code) => format!("Failed to fetch {what} ({code})"),
            other => format!("Failed to fetch {what}: {other}"),
        };
        self.notifier.notify(&message);
    }
}

impl std::fmt::Debug for DiscourseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscourseClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &!self.api_key.is_empty())
            .finish_non_exhaustive()
    }
}

/// Absolute URL for an uploaded file.
///
/// Absolute `http(s)` URLs are kept. Relative paths are joined to the base
/// URL with exactly one slash between them.
fn resolve_full_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

fn flatten_categories(categories: Vec<CategoryEntry>) -> Vec<Category> {
    let mut flat = Vec::with_capacity(categories.len());

    for category in categories {
        let children = category.subcategory_list.unwrap_or_default();
        flat.push(Category {
            id: category.id,
            name: category.name.clone(),
        });
        for child in children {
            flat.push(Category {
                id: child.id,
                name: format!("{} > {}", category.name, child.name),
            });
        }
    }

    flat
}

/// Merge the top-level tags with the tag group members.
///
/// A name seen more than once keeps its highest count. The result is ordered
/// by count, descending, ties in first-seen order.
fn merge_tags(response: TagsResponse) -> Vec<TagEntry> {
    let grouped = response
        .extras
        .map(|extras| extras.tag_groups)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|group| group.tags);

    let mut merged: Vec<TagEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tag in response.tags.into_iter().chain(grouped) {
        if tag.name.is_empty() {
            continue;
        }
        if let Some(&i) = index.get(&tag.name) {
            merged[i].count = merged[i].count.max(tag.count);
        } else {
            index.insert(tag.name.clone(), merged.len());
            merged.push(tag);
        }
    }

    merged.sort_by(|a, b| b.count.cmp(&a.count));
    merged
}

/// Whether a JSON response body counts as present.
///
/// Empty text, `null`, `false`, `0` and `""` do not. A body that is not JSON
/// is an error.
fn is_truthy_body(body: &str) -> Result<bool, serde_json::Error> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(false);
    }
    let truthy = match serde_json::from_str::<serde_json::Value>(trimmed)? {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    };
    Ok(truthy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, count: u64) -> TagEntry {
        TagEntry {
            name: name.to_string(),
            count,
        }
    }

    #[test]
    fn test_full_url_absolute_kept_verbatim() {
        assert_eq!(
            resolve_full_url("https://forum.example.com/", "https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(
            resolve_full_url("https://forum.example.com", "http://cdn.example.com/a.png"),
            "http://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_full_url_relative_joined_with_one_slash() {
        for base in ["https://forum.example.com", "https://forum.example.com/"] {
            for path in ["/uploads/default/1.png", "uploads/default/1.png"] {
                assert_eq!(
                    resolve_full_url(base, path),
                    "https://forum.example.com/uploads/default/1.png",
                    "base={base} path={path}"
                );
            }
        }
    }

    #[test]
    fn test_flatten_categories_orders_children_after_parent() {
        let categories = vec![
            CategoryEntry {
                id: 1,
                name: "General".to_string(),
                subcategory_list: Some(vec![
                    CategoryEntry {
                        id: 2,
                        name: "Intro".to_string(),
                        subcategory_list: None,
                    },
                    CategoryEntry {
                        id: 3,
                        name: "Help".to_string(),
                        subcategory_list: None,
                    },
                ]),
            },
            CategoryEntry {
                id: 4,
                name: "Meta".to_string(),
                subcategory_list: None,
            },
        ];

        let flat = flatten_categories(categories);
        let names: Vec<&str> = flat.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["General", "General > Intro", "General > Help", "Meta"]
        );
        assert_eq!(flat[2].id, 3);
    }

    #[test]
    fn test_merge_tags_keeps_max_count() {
        let response = TagsResponse {
            tags: vec![entry("a", 5), entry("b", 7)],
            extras: Some(models::TagExtras {
                tag_groups: vec![models::TagGroup {
                    tags: vec![entry("a", 10), entry("c", 1)],
                }],
            }),
        };

        let merged = merge_tags(response);
        let pairs: Vec<(&str, u64)> = merged.iter().map(|t| (t.name.as_str(), t.count)).collect();
        assert_eq!(pairs, vec![("a", 10), ("b", 7), ("c", 1)]);
    }

    #[test]
    fn test_merge_tags_ties_keep_first_seen_order() {
        let response = TagsResponse {
            tags: vec![entry("x", 2), entry("y", 2), entry("", 9)],
            extras: None,
        };

        let names: Vec<String> = merge_tags(response).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_truthy_body() {
        assert!(is_truthy_body(r#"{"categories":[]}"#).unwrap());
        assert!(is_truthy_body("{}").unwrap());
        assert!(!is_truthy_body("").unwrap());
        assert!(!is_truthy_body("  \n").unwrap());
        assert!(!is_truthy_body("null").unwrap());
        assert!(!is_truthy_body("false").unwrap());
        assert!(!is_truthy_body("0").unwrap());
        assert!(!is_truthy_body("\"\"").unwrap());
    }

    #[test]
    fn test_non_json_body_is_error() {
        assert!(is_truthy_body("<html><body>Login</body></html>").is_err());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = Config {
            base_url: "https://forum.example.com/".to_string(),
            user_api_key: "key".to_string(),
            ..Config::for_testing()
        };
        let client = DiscourseClient::new(&config, Arc::new(crate::notify::MemoryNotifier::new()));
        assert_eq!(
            client.endpoint("/posts.json"),
            "https://forum.example.com/posts.json"
        );
    }
}
