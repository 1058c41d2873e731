//! Request and response shapes for the forum API.
//!
//! Response structs only name the fields this crate reads. Everything is
//! optional or defaulted so that partial bodies still parse.

use serde::{Deserialize, Serialize};

/// A category as offered to the user, subcategories flattened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: u64,
    /// `"Parent > Child"` for subcategories.
    pub name: String,
}

/// A tag as offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    /// Whether the current user may create new tags. Site-wide, identical on
    /// every tag.
    pub can_create: bool,
}

/// Identifies a published post and the topic it opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostRef {
    pub post_id: u64,
    pub topic_id: u64,
}

/// Result of a successful image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// `upload://` URL for use in post markdown.
    pub short_url: String,
    /// Absolute URL of the stored file, when the server reported a path.
    pub full_url: Option<String>,
}

/// Metadata of an existing topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicInfo {
    pub tags: Vec<String>,
    pub category_id: Option<u64>,
}

// Request bodies

#[derive(Debug, Serialize)]
pub(crate) struct CreatePostRequest<'a> {
    pub title: &'a str,
    pub raw: &'a str,
    pub category: u64,
    pub tags: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdatePostRequest<'a> {
    pub raw: &'a str,
    pub edit_reason: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateTopicRequest<'a> {
    pub title: &'a str,
    pub category_id: u64,
    pub tags: &'a [String],
}

// Response bodies

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub short_url: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePostResponse {
    pub id: u64,
    #[serde(default)]
    pub topic_id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoriesResponse {
    pub category_list: CategoryList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryList {
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryEntry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub subcategory_list: Option<Vec<CategoryEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub tags: Vec<TagEntry>,
    #[serde(default)]
    pub extras: Option<TagExtras>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TagExtras {
    #[serde(default)]
    pub tag_groups: Vec<TagGroup>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TagGroup {
    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TagEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SiteResponse {
    #[serde(default)]
    pub can_create_tag: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TopicResponse {
    #[serde(default)]
    pub tags: Option<Vec<TopicTag>>,
    #[serde(default)]
    pub category_id: Option<u64>,
}

/// Topic tags are plain names on older servers and objects on newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TopicTag {
    Name(String),
    Object { name: String },
}

impl TopicTag {
    pub fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Object { name } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_tags_accept_both_shapes() {
        let old: TopicResponse =
            serde_json::from_str(r#"{"tags":["rust","async"],"category_id":4}"#).unwrap();
        let new: TopicResponse = serde_json::from_str(
            r#"{"tags":[{"id":1,"name":"rust","slug":"rust"}],"category_id":null}"#,
        )
        .unwrap();

        let old_names: Vec<String> = old
            .tags
            .unwrap()
            .into_iter()
            .map(TopicTag::into_name)
            .collect();
        assert_eq!(old_names, vec!["rust", "async"]);
        assert_eq!(old.category_id, Some(4));

        let new_names: Vec<String> = new
            .tags
            .unwrap()
            .into_iter()
            .map(TopicTag::into_name)
            .collect();
        assert_eq!(new_names, vec!["rust"]);
        assert_eq!(new.category_id, None);
    }

    #[test]
    fn test_create_post_response_requires_numeric_id() {
        assert!(serde_json::from_str::<CreatePostResponse>(r#"{"id":12,"topic_id":3}"#).is_ok());
        assert!(serde_json::from_str::<CreatePostResponse>(r#"{"id":"12"}"#).is_err());
        assert!(serde_json::from_str::<CreatePostResponse>(r#"{"topic_id":3}"#).is_err());
    }

    #[test]
    fn test_create_request_serializes_category_and_tags() {
        let tags = vec!["a".to_string()];
        let body = serde_json::to_value(CreatePostRequest {
            title: "Hello",
            raw: "Body",
            category: 7,
            tags: &tags,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"title":"Hello","raw":"Body","category":7,"tags":["a"]})
        );
    }
}
